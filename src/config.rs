use std::path::PathBuf;

use crate::cancellation::CancellationToken;
use crate::encoding::Encoding;
use crate::error::SortError;

pub(crate) const UNSORTED_EXTENSION: &str = "unsorted";
pub(crate) const SORTED_EXTENSION: &str = "sorted";
pub(crate) const REMOVAL_EXTENSION: &str = "removal";

#[derive(Clone, Debug)]
pub(crate) struct Config {
    tmp: PathBuf,
    tasks: usize,
    queue_size: usize,
    encoding: Encoding,
    delimiter: String,
    line_terminator: String,
    encoded_terminator: Vec<u8>,
    chunk_size_bytes: u64,
    files_per_merge: usize,
    copy_buffer_size: usize,
    cache_capacity: usize,
    cancellation: CancellationToken,
}

impl Config {
    pub(crate) fn new(
        tmp: PathBuf,
        tasks: usize,
        encoding: Encoding,
        delimiter: String,
        line_terminator: String,
        chunk_size_bytes: u64,
        files_per_merge: usize,
        copy_buffer_size: usize,
        cache_capacity: usize,
        cancellation: CancellationToken,
    ) -> Result<Config, SortError> {
        if delimiter.is_empty() {
            return Err(SortError::InvalidConfig("delimiter must not be empty".to_string()));
        }
        if line_terminator.is_empty() {
            return Err(SortError::InvalidConfig("line terminator must not be empty".to_string()));
        }
        if chunk_size_bytes == 0 {
            return Err(SortError::InvalidConfig("chunk size must be positive".to_string()));
        }
        if files_per_merge < 2 {
            return Err(SortError::InvalidConfig(format!("files per merge must be at least 2, got {}", files_per_merge)));
        }
        if copy_buffer_size == 0 {
            return Err(SortError::InvalidConfig("copy buffer size must be positive".to_string()));
        }
        if tasks == 0 {
            return Err(SortError::InvalidConfig("tasks must be positive".to_string()));
        }

        let queue_size = 4096;
        let encoded_terminator = encoding.encode(&line_terminator);
        Ok(
            Config {
                tmp,
                tasks,
                queue_size,
                encoding,
                delimiter,
                line_terminator,
                encoded_terminator,
                chunk_size_bytes,
                files_per_merge,
                copy_buffer_size,
                cache_capacity,
                cancellation,
            }
        )
    }

    pub(crate) fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub(crate) fn tasks(&self) -> usize {
        self.tasks
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub(crate) fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub(crate) fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub(crate) fn line_terminator(&self) -> &str {
        &self.line_terminator
    }

    pub(crate) fn encoded_terminator(&self) -> &[u8] {
        &self.encoded_terminator
    }

    pub(crate) fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_bytes
    }

    pub(crate) fn files_per_merge(&self) -> usize {
        self.files_per_merge
    }

    pub(crate) fn copy_buffer_size(&self) -> usize {
        self.copy_buffer_size
    }

    pub(crate) fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Path of the unsorted file materialized for chunk `index`.
    pub(crate) fn unsorted_chunk_path(&self, index: usize) -> PathBuf {
        self.tmp.join(format!("data_{}.{}", index, UNSORTED_EXTENSION))
    }

    /// Path the final merge writes to before it is moved onto the output.
    pub(crate) fn final_run_path(&self) -> PathBuf {
        self.tmp.join(format!("data_final.{}", SORTED_EXTENSION))
    }

    /// Path of the run produced by merging batch `batch` of generation `generation`.
    pub(crate) fn merged_run_path(&self, generation: usize, batch: usize) -> PathBuf {
        self.tmp.join(format!("data_{}_{}.{}", generation, batch, SORTED_EXTENSION))
    }
}
