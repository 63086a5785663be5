use std::cmp::{max, min, Ordering};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use memmap2::Mmap;
use rlimit::{getrlimit, setrlimit, Resource};

use crate::cancellation::CancellationToken;
use crate::chunk_iterator::{Chunk, ChunkIterator};
use crate::config::Config;
use crate::encoding::Encoding;
use crate::error::SortError;
use crate::line_comparator::LineComparator;
use crate::materialize_command::{materialize_chunks, prepare_tmp_dir};
use crate::merger::merge_all;
use crate::run_reader::RunReader;
use crate::sort_command::{sort_chunks, sorted_path};
use crate::stage::timed;

/// Sort a text file of `<prefix><delimiter><field>` lines
///
/// Lines are ordered by field, lines with equal fields by prefix: a shorter prefix first,
/// prefixes of the same length character by character.
///
/// The input is split into line aligned chunks that are copied into files of a temporary
/// directory, each chunk is sorted in memory, then the sorted runs are merged a few at a time
/// until one output file remains. The temporary directory is wiped at start and removed after
/// a successful sort. After a failure or cancellation it is left in place and the output is
/// never produced.
///
/// # Examples
/// ```
/// use std::path::PathBuf;
/// use doc_sort::sort::Sort;
///
/// fn sort_document(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     let mut document_sort = Sort::new(input, output);
///     // use 4 worker threads and merge at most 8 runs at a time
///     document_sort.with_tasks(4);
///     document_sort.with_files_per_merge(8);
///     // a dedicated directory on the same file system as the output is recommended
///     document_sort.with_tmp_dir(tmp);
///     document_sort.sort()
/// }
/// ```
pub struct Sort {
    input: PathBuf,
    output: PathBuf,
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
}

impl Sort {
    /// Create a default Sort definition.
    ///
    /// * encoding is UTF-8
    /// * the delimiter is ". " and lines end with "\n"
    /// * the input is split in chunks of 1 MiB
    /// * at most 5 runs are merged at a time
    /// * intermediate files go to the `tmp` directory, relative to the working directory
    /// * the number of tasks is three quarters of the CPU cores
    pub fn new(input: PathBuf, output: PathBuf) -> Sort {
        Sort {
            input,
            output,
            tmp: PathBuf::from("tmp"),
            tasks: 0,
            encoding: Encoding::Utf8,
            delimiter: ". ".to_string(),
            line_terminator: "\n".to_string(),
            chunk_size_bytes: 1024 * 1024,
            files_per_merge: 5,
            copy_buffer_size: 1024 * 1024,
            cache_capacity: 10 * 1024 * 1024,
            cancellation: CancellationToken::new(),
        }
    }

    /// Set the directory for intermediate files. Any existing content is deleted when a sort
    /// starts.
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.tmp = tmp;
    }

    /// Set the number of tasks. Zero, the default, uses three quarters of the CPU cores
    pub fn with_tasks(&mut self, tasks: usize) {
        self.tasks = tasks;
    }

    pub fn with_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    /// Set the delimiter that separates the prefix from the field. The default is ". "
    pub fn with_delimiter(&mut self, delimiter: &str) {
        self.delimiter = delimiter.to_string();
    }

    /// Set the line terminator. The default is "\n"
    pub fn with_line_terminator(&mut self, line_terminator: &str) {
        self.line_terminator = line_terminator.to_string();
    }

    /// The input will be split in chunks of about 'chunk_size_bytes' respecting line boundaries
    pub fn with_chunk_size_bytes(&mut self, chunk_size_bytes: u64) {
        self.chunk_size_bytes = chunk_size_bytes;
    }

    /// Set how many sorted runs are merged together, at least 2. The default is 5
    pub fn with_files_per_merge(&mut self, files_per_merge: usize) {
        self.files_per_merge = files_per_merge;
    }

    /// Set the size of the buffer used to copy chunks out of the input. The default is 1 MiB
    pub fn with_copy_buffer_size(&mut self, copy_buffer_size: usize) {
        self.copy_buffer_size = copy_buffer_size;
    }

    /// Set how many field comparisons are remembered. The default is 10 Mi entries
    pub fn with_cache_capacity(&mut self, cache_capacity: usize) {
        self.cache_capacity = cache_capacity;
    }

    /// Use `cancellation` to stop the sort from another thread
    pub fn with_cancellation_token(&mut self, cancellation: CancellationToken) {
        self.cancellation = cancellation;
    }

    /// Sort the input file into the output file
    pub fn sort(&self) -> Result<(), anyhow::Error> {
        let config = self.create_config()?;
        self.with_rlimits(&config, || self.internal_sort(&config))
    }

    /// Merge files that are already sorted into the output file. The input files are left
    /// untouched.
    pub fn merge(&self, input_files: Vec<PathBuf>) -> Result<(), anyhow::Error> {
        let config = self.create_config()?;
        self.with_rlimits(&config, || self.internal_merge(&input_files, &config))
    }

    /// Check that the input file is sorted
    pub fn check(&self) -> Result<bool, anyhow::Error> {
        let config = self.create_config()?;
        let comparator = LineComparator::new(config.cache_capacity());
        let mut reader = RunReader::open(&self.input, config.encoding(), config.encoded_terminator(), config.delimiter())?;
        let mut previous = match reader.next_record()? {
            Some(record) => record,
            None => return Ok(true),
        };
        while let Some(current) = reader.next_record()? {
            if comparator.compare(&previous, &current) == Ordering::Greater {
                log::info!("Out of order: {:?} before {:?}", previous.line(), current.line());
                return Ok(false);
            }
            previous = current;
        }
        Ok(true)
    }

    fn default_tasks() -> usize {
        let cores = num_cpus::get();
        max(cores / 2 + cores / 4, 1)
    }

    fn create_config(&self) -> Result<Config, anyhow::Error> {
        let tasks = if self.tasks == 0 {
            Self::default_tasks()
        } else {
            self.tasks
        };

        let config = Config::new(
            self.tmp.clone(),
            tasks,
            self.encoding,
            self.delimiter.clone(),
            self.line_terminator.clone(),
            self.chunk_size_bytes,
            self.files_per_merge,
            self.copy_buffer_size,
            self.cache_capacity,
            self.cancellation.clone(),
        )?;
        Ok(config)
    }

    fn get_rlimits() -> Result<(u64, u64), anyhow::Error> {
        getrlimit(Resource::NOFILE).with_context(|| "getrlimit")
    }

    fn set_rlimits(soft: u64, hard: u64) -> Result<(), anyhow::Error> {
        setrlimit(Resource::NOFILE, soft, hard)
            .with_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", soft, hard))?;
        Ok(())
    }

    /// Every merge worker holds `files_per_merge` inputs and one output open, raise the open
    /// files limit for the duration of `f`.
    fn with_rlimits<F>(&self, config: &Config, f: F) -> Result<(), anyhow::Error>
    where
        F: FnOnce() -> Result<(), anyhow::Error>,
    {
        let (current_soft, current_hard) = Self::get_rlimits()?;
        log::info!("Current rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let needed = ((config.files_per_merge() + 1) * config.tasks() + 256) as u64;
        let new_soft = min(max(needed, current_soft), current_hard);
        if new_soft != current_soft {
            log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
            Self::set_rlimits(new_soft, current_hard)?;
        }

        let result = f();

        if new_soft != current_soft {
            log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
            if let Err(e) = Self::set_rlimits(current_soft, current_hard) {
                log::warn!("{:#}", e);
            }
        }
        result
    }

    fn internal_sort(&self, config: &Config) -> Result<(), anyhow::Error> {
        log::info!("Start parallel sort of {} into {}, tasks: {}", self.input.display(), self.output.display(), config.tasks());
        log::info!(
            "Encoding: {:?}, delimiter: {:?}, line terminator: {:?}, chunk size: {}, files per merge: {}",
            config.encoding(),
            config.delimiter(),
            config.line_terminator(),
            config.chunk_size_bytes(),
            config.files_per_merge(),
        );
        self.remove_stale_output(std::slice::from_ref(&self.input))?;
        config.cancellation().check()?;

        let file = File::open(&self.input).with_context(|| format!("path: {}", self.input.display()))?;
        let length = file.metadata().with_context(|| format!("path: {}", self.input.display()))?.len();
        if length == 0 {
            File::create(&self.output).with_context(|| format!("path: {}", self.output.display()))?;
            log::info!("Input {} is empty", self.input.display());
            return Ok(());
        }
        // SAFETY: the input is not modified while it is mapped
        let source = Arc::new(
            unsafe { Mmap::map(&file) }.with_context(|| format!("map path: {}", self.input.display()))?
        );

        let chunks = timed("computing chunk boundaries", || {
            let chunks: Vec<Chunk> = ChunkIterator::new(
                &self.input,
                &source,
                config.encoding(),
                config.chunk_size_bytes(),
                config.encoded_terminator(),
            )?.collect();
            log::info!("{} bytes split into {} chunks", length, chunks.len());
            Ok(chunks)
        })?;
        let unsorted = timed("materializing chunks", || materialize_chunks(source.clone(), &chunks, config))?;
        drop(source);

        let comparator = Arc::new(LineComparator::new(config.cache_capacity()));
        let sorted = timed("sorting chunks", || sort_chunks(&unsorted, comparator.clone(), config))?;
        let summary = timed("merging sorted runs", || merge_all(sorted, &self.output, comparator.clone(), config))?;
        log::info!(
            "Merged {} runs in {} passes plus the final merge, {} lines",
            summary.runs,
            summary.passes,
            summary.lines,
        );

        Self::remove_tmp_dir(config);
        log::info!("Finish parallel sort");
        Ok(())
    }

    fn internal_merge(&self, input_files: &[PathBuf], config: &Config) -> Result<(), anyhow::Error> {
        log::info!("Merging {} sorted files into {}", input_files.len(), self.output.display());
        self.remove_stale_output(input_files)?;
        config.cancellation().check()?;
        prepare_tmp_dir(config)?;

        let mut runs = Vec::with_capacity(input_files.len());
        for (index, path) in input_files.iter().enumerate() {
            let run = sorted_path(&config.unsorted_chunk_path(index));
            std::fs::copy(path, &run)
                .with_context(|| format!("copy {} to {}", path.display(), run.display()))?;
            runs.push(run);
        }

        let comparator = Arc::new(LineComparator::new(config.cache_capacity()));
        let summary = timed("merging sorted files", || merge_all(runs, &self.output, comparator, config))?;
        log::info!("Merged {} files, {} lines", summary.runs, summary.lines);

        Self::remove_tmp_dir(config);
        Ok(())
    }

    /// Remove an output left by an earlier run so that an output file exists only after a
    /// successful run. Writing over one of the inputs is rejected.
    fn remove_stale_output(&self, inputs: &[PathBuf]) -> Result<(), anyhow::Error> {
        if !self.output.exists() {
            return Ok(());
        }
        let output = self.output.canonicalize()
            .with_context(|| format!("path: {}", self.output.display()))?;
        for input in inputs {
            if input.canonicalize().is_ok_and(|input| input == output) {
                return Err(
                    SortError::InvalidConfig(format!("output {} is also an input", self.output.display())).into()
                );
            }
        }
        log::info!("Removing existing output {}", self.output.display());
        std::fs::remove_file(&self.output).with_context(|| format!("path: {}", self.output.display()))?;
        Ok(())
    }

    fn remove_tmp_dir(config: &Config) {
        if let Err(e) = std::fs::remove_dir_all(config.tmp()) {
            log::warn!("Failed to remove temporary directory {}: {}", config.tmp().display(), e);
        }
    }
}
