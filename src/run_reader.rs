use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::encoding::Encoding;
use crate::error::SortError;
use crate::line_record::LineRecord;

/// Reads the [LineRecord]s of a run one at a time.
///
/// A line ends at the first occurrence of the encoded terminator that starts on a symbol
/// boundary. Every line, the last one included, must be terminated.
pub(crate) struct RunReader<R: BufRead> {
    path: PathBuf,
    reader: R,
    encoding: Encoding,
    terminator: Vec<u8>,
    delimiter: String,
    buf: Vec<u8>,
    lines: usize,
}

impl RunReader<BufReader<File>> {
    pub(crate) fn open(path: &Path, encoding: Encoding, terminator: &[u8], delimiter: &str) -> Result<RunReader<BufReader<File>>, anyhow::Error> {
        let file = File::open(path).with_context(|| format!("path: {}", path.display()))?;
        Ok(RunReader::new(BufReader::new(file), path, encoding, terminator, delimiter))
    }
}

impl<R: BufRead> RunReader<R> {
    pub(crate) fn new(reader: R, path: &Path, encoding: Encoding, terminator: &[u8], delimiter: &str) -> RunReader<R> {
        RunReader {
            path: path.to_path_buf(),
            reader,
            encoding,
            terminator: terminator.to_vec(),
            delimiter: delimiter.to_string(),
            buf: Vec::new(),
            lines: 0,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next line without its terminator, `None` at the end of the run.
    pub(crate) fn next_line(&mut self) -> Result<Option<String>, anyhow::Error> {
        self.buf.clear();
        let mut scan_from = 0;
        loop {
            let available = self.reader.fill_buf()
                .with_context(|| format!("path: {}", self.path.display()))?;
            if available.is_empty() {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(
                    SortError::malformed(
                        &self.path,
                        format!("line {} is not terminated by {:?}", self.lines + 1, self.terminator),
                    ).into()
                );
            }

            let filled = self.buf.len();
            let appended = available.len();
            self.buf.extend_from_slice(available);
            match find_terminator(&self.buf, scan_from, &self.terminator, self.encoding.symbol_size()) {
                Ok(end) => {
                    self.reader.consume(end - filled);
                    self.buf.truncate(end);
                    break;
                }
                Err(next_scan) => {
                    self.reader.consume(appended);
                    scan_from = next_scan;
                }
            }
        }

        self.lines += 1;
        let content = &self.buf[..self.buf.len() - self.terminator.len()];
        let line = self.encoding.decode(content).map_err(|e| {
            SortError::malformed(&self.path, format!("line {}: {}", self.lines, e))
        })?;
        Ok(Some(line))
    }

    /// Read the next line and split it into a [LineRecord].
    pub(crate) fn next_record(&mut self) -> Result<Option<LineRecord>, anyhow::Error> {
        match self.next_line()? {
            None => Ok(None),
            Some(line) => {
                let record = LineRecord::new(line, &self.delimiter).map_err(|e| {
                    SortError::malformed(&self.path, format!("line {}: {}", self.lines, e))
                })?;
                Ok(Some(record))
            }
        }
    }
}

/// Find the first `terminator` in `buf` that starts on a multiple of `width` at or after
/// `from`. Returns the offset just past it, or the offset to resume from once more bytes are
/// appended.
fn find_terminator(buf: &[u8], from: usize, terminator: &[u8], width: usize) -> Result<usize, usize> {
    let mut pos = from;
    while pos + terminator.len() <= buf.len() {
        if buf[pos..pos + terminator.len()] == *terminator {
            return Ok(pos + terminator.len());
        }
        pos += width;
    }
    Err(pos)
}

/// Writes lines to a run, each followed by the encoded terminator.
pub(crate) struct RunWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    encoding: Encoding,
    terminator: Vec<u8>,
    encoded: Vec<u8>,
    lines: usize,
}

impl RunWriter {
    pub(crate) fn create(path: &Path, encoding: Encoding, terminator: &[u8]) -> Result<RunWriter, anyhow::Error> {
        let file = File::create(path).with_context(|| format!("path: {}", path.display()))?;
        Ok(
            RunWriter {
                path: path.to_path_buf(),
                writer: BufWriter::new(file),
                encoding,
                terminator: terminator.to_vec(),
                encoded: Vec::new(),
                lines: 0,
            }
        )
    }

    pub(crate) fn write_line(&mut self, line: &str) -> Result<(), anyhow::Error> {
        self.encoded.clear();
        self.encoding.encode_into(line, &mut self.encoded);
        self.encoded.extend_from_slice(&self.terminator);
        self.writer.write_all(&self.encoded)
            .with_context(|| format!("path: {}", self.path.display()))?;
        self.lines += 1;
        Ok(())
    }

    /// Flush buffered lines, returns the number of lines written.
    pub(crate) fn finish(mut self) -> Result<usize, anyhow::Error> {
        self.writer.flush().with_context(|| format!("path: {}", self.path.display()))?;
        Ok(self.lines)
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;
    use std::path::Path;

    use crate::encoding::Encoding;
    use crate::error::is_malformed_input;
    use crate::run_reader::{RunReader, RunWriter};

    fn reader<'a>(data: &'a [u8], encoding: Encoding, terminator: &str) -> RunReader<BufReader<&'a [u8]>> {
        RunReader::new(
            BufReader::new(data),
            Path::new("memory"),
            encoding,
            &encoding.encode(terminator),
            ". ",
        )
    }

    #[test]
    fn test_crlf_lines() -> Result<(), anyhow::Error> {
        let mut run = reader(b"1. a\r\n2. b\r\n", Encoding::Utf8, "\r\n");
        assert_eq!(run.next_line()?, Some("1. a".to_string()));
        let record = run.next_record()?.unwrap();
        assert_eq!(record.field(), "b");
        assert_eq!(run.next_line()?, None);
        Ok(())
    }

    #[test]
    fn test_lone_terminator_byte_inside_line() -> Result<(), anyhow::Error> {
        let mut run = reader(b"1. a\nb\r\n", Encoding::Utf8, "\r\n");
        assert_eq!(run.next_line()?, Some("1. a\nb".to_string()));
        assert_eq!(run.next_line()?, None);
        Ok(())
    }

    #[test]
    fn test_utf16_alignment() -> Result<(), anyhow::Error> {
        // [0x41, 0x0A] [0x00, 0x01] holds the terminator bytes across a symbol boundary
        let encoding = Encoding::Utf16Le;
        let data = encoding.encode("1. \u{0a41}\u{0100}\n");
        let mut run = reader(&data, encoding, "\n");
        assert_eq!(run.next_line()?, Some("1. \u{0a41}\u{0100}".to_string()));
        assert_eq!(run.next_line()?, None);
        Ok(())
    }

    #[test]
    fn test_terminator_split_across_reads() -> Result<(), anyhow::Error> {
        let encoding = Encoding::Utf16Le;
        let data = encoding.encode("1. Apple\r\n22. \u{0a0d}\u{0a00}\r\n3. Banana\r\n");
        // an odd capacity cuts lines, symbols and terminators at every possible offset
        let mut run = RunReader::new(
            BufReader::with_capacity(3, data.as_slice()),
            Path::new("memory"),
            encoding,
            &encoding.encode("\r\n"),
            ". ",
        );
        assert_eq!(run.next_line()?, Some("1. Apple".to_string()));
        assert_eq!(run.next_line()?, Some("22. \u{0a0d}\u{0a00}".to_string()));
        assert_eq!(run.next_line()?, Some("3. Banana".to_string()));
        assert_eq!(run.next_line()?, None);
        Ok(())
    }

    #[test]
    fn test_unterminated_last_line() -> Result<(), anyhow::Error> {
        let mut run = reader(b"1. a\n2. b", Encoding::Utf8, "\n");
        assert!(run.next_line()?.is_some());
        let error = run.next_line().unwrap_err();
        assert!(is_malformed_input(&error));
        Ok(())
    }

    #[test]
    fn test_missing_delimiter() {
        let mut run = reader(b"no delimiter\n", Encoding::Utf8, "\n");
        let error = run.next_record().unwrap_err();
        assert!(is_malformed_input(&error));
    }

    #[test]
    fn test_written_lines_read_back() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run.sorted");
        let encoding = Encoding::Utf16Be;
        let terminator = encoding.encode("\r\n");
        let mut writer = RunWriter::create(&path, encoding, &terminator)?;
        writer.write_line("1. Яблоко")?;
        writer.write_line("2. Apple")?;
        assert_eq!(writer.finish()?, 2);

        let mut reader = RunReader::open(&path, encoding, &terminator, ". ")?;
        assert_eq!(reader.next_record()?.unwrap().field(), "Яблоко");
        assert_eq!(reader.next_record()?.unwrap().prefix(), "2");
        assert!(reader.next_record()?.is_none());
        Ok(())
    }
}
