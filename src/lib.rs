//! This crate implements an external merge sort for text documents that do not fit in memory.
//!
//! Every line of a document has the form `<prefix><delimiter><field>`, for example
//! `415. Apple` with the delimiter `". "`. Lines are ordered by field first. Lines with equal
//! fields are ordered by prefix: a shorter prefix comes first, prefixes of equal length are
//! compared character by character.
//!
//! The input is memory mapped and cut into chunks at line boundaries, the chunks are copied into
//! a temporary directory and sorted in parallel, then the sorted runs are merged a few at a time
//! until one output file remains. Field comparisons are memoized in a bounded cache shared by
//! all workers, documents with many repeated fields sort considerably faster.
//!
//! # Examples
//! ```
//! use std::path::PathBuf;
//! use doc_sort::sort::Sort;
//!
//! // optimized for use with Jemalloc
//! use tikv_jemallocator::Jemalloc;
//! #[global_allocator]
//! static GLOBAL: Jemalloc = Jemalloc;
//!
//! fn sort_document(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut document_sort = Sort::new(input, output);
//!
//!     // set the number of worker threads. The default is three quarters of the CPU cores.
//!     document_sort.with_tasks(2);
//!
//!     // set the directory for intermediate results. Its content is deleted when the sort
//!     // starts, for large files a dedicated directory on the same file system as the output
//!     // is recommended.
//!     document_sort.with_tmp_dir(tmp);
//!
//!     // cut the input in chunks of about 64 MiB
//!     document_sort.with_chunk_size_bytes(64 * 1024 * 1024);
//!
//!     document_sort.sort()
//! }
//! ```
//!

pub(crate) mod config;
pub(crate) mod line_record;
pub(crate) mod comparison_cache;
pub(crate) mod line_comparator;
pub(crate) mod chunk_iterator;
pub(crate) mod run_reader;
pub(crate) mod worker_pool;
pub(crate) mod stage;
pub(crate) mod materialize_command;
pub(crate) mod sort_command;
pub(crate) mod merge_command;
pub(crate) mod merger;

pub mod sort;
pub mod encoding;
pub mod error;
pub mod cancellation;
pub mod generator;
