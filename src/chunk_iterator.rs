use std::path::Path;

use crate::encoding::Encoding;
use crate::error::SortError;

/// Half open byte range `[start, end)` of the input that begins and ends on a line boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Chunk {
    index: usize,
    start: u64,
    end: u64,
}

impl Chunk {
    pub(crate) fn new(index: usize, start: u64, end: u64) -> Chunk {
        Chunk {
            index,
            start,
            end,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn start(&self) -> u64 {
        self.start
    }

    pub(crate) fn end(&self) -> u64 {
        self.end
    }

    pub(crate) fn length(&self) -> u64 {
        self.end - self.start
    }
}

/// Splits a memory mapped input into line aligned [Chunk]s of roughly `chunk_size` bytes.
///
/// The input is cut into `ceil(len / chunk_size)` ideal pieces. Each cut starts at its ideal
/// offset and moves forward one symbol at a time until the terminator is found, the chunk then
/// ends right after the terminator. The work per cut is bounded by the distance to the next
/// terminator, not by the chunk size. A cut that lands inside a line longer than the ideal
/// spacing simply starts from the previous boundary, so chunks never overlap. Chunks that
/// would be empty are not produced.
pub(crate) struct ChunkIterator<'a> {
    data: &'a [u8],
    terminator: Vec<u8>,
    symbol_size: usize,
    chunk_count: u64,
    index: usize,
    pos: u64,
}

impl<'a> ChunkIterator<'a> {
    pub(crate) fn new(path: &Path, data: &'a [u8], encoding: Encoding, chunk_size_bytes: u64, terminator: &[u8]) -> Result<ChunkIterator<'a>, anyhow::Error> {
        let length = data.len() as u64;
        if length > 0 && !data.ends_with(terminator) {
            return Err(SortError::malformed(path, "input does not end with the line terminator").into());
        }
        if length % encoding.symbol_size() as u64 != 0 {
            return Err(SortError::malformed(path, format!("length {} is not a multiple of the symbol size", length)).into());
        }

        Ok(
            ChunkIterator {
                data,
                terminator: terminator.to_vec(),
                symbol_size: encoding.symbol_size(),
                chunk_count: length.div_ceil(chunk_size_bytes),
                index: 0,
                pos: 0,
            }
        )
    }

    fn ideal_cut(&self, boundary: u64) -> u64 {
        let length = self.data.len() as u64;
        let cut = (boundary as u128 * length as u128 / self.chunk_count as u128) as u64;
        cut - cut % self.symbol_size as u64
    }

    /// Find the end of the first terminator that starts at or after `from`. The input is
    /// known to end with a terminator, so a cut past its start belongs to the last chunk.
    fn scan(&self, from: u64) -> u64 {
        let window = self.terminator.len();
        let mut pos = from as usize;
        while pos + window <= self.data.len() {
            if self.data[pos..pos + window] == self.terminator[..] {
                return (pos + window) as u64;
            }
            pos += self.symbol_size;
        }
        self.data.len() as u64
    }
}

impl<'a> Iterator for ChunkIterator<'a> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Self::Item> {
        let length = self.data.len() as u64;
        if self.pos >= length {
            return None;
        }

        let end = if self.index as u64 + 1 >= self.chunk_count {
            length
        } else {
            ChunkIterator::scan(self, self.ideal_cut(self.index as u64 + 1).max(self.pos))
        };

        let chunk = Chunk::new(self.index, self.pos, end);
        self.index += 1;
        self.pos = end;
        Some(chunk)
    }
}
