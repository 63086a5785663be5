use std::cmp::min;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use command_executor::command::Command;
use memmap2::{Mmap, MmapMut};

use crate::chunk_iterator::Chunk;
use crate::config::Config;
use crate::worker_pool::{create_pool, finish_pool, get_tl_config, Outcome, COPY_BUFFER};

/// Copies one [Chunk] of the mapped input into its own `.unsorted` file.
pub(crate) struct MaterializeCommand {
    source: Arc<Mmap>,
    chunk: Chunk,
    outcome: Outcome,
}

impl MaterializeCommand {
    pub(crate) fn new(source: Arc<Mmap>, chunk: Chunk, outcome: Outcome) -> MaterializeCommand {
        MaterializeCommand {
            source,
            chunk,
            outcome,
        }
    }

    fn materialize(&self) -> Result<(), anyhow::Error> {
        let config = get_tl_config()?;
        config.cancellation().check()?;
        let path = config.unsorted_chunk_path(self.chunk.index());
        let length = self.chunk.length() as usize;
        let start = self.chunk.start() as usize;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("path: {}", path.display()))?;
        file.set_len(self.chunk.length())
            .with_context(|| format!("path: {}, length: {}", path.display(), length))?;
        // SAFETY: the chunk file was just created by this worker and nothing else opens it
        let mut target = unsafe { MmapMut::map_mut(&file) }
            .with_context(|| format!("map path: {}", path.display()))?;

        COPY_BUFFER.with(|buffer| {
            let mut buffer = buffer.borrow_mut();
            if buffer.len() != config.copy_buffer_size() {
                buffer.resize(config.copy_buffer_size(), 0);
            }
            let mut copied = 0;
            while copied < length {
                let n = min(buffer.len(), length - copied);
                buffer[..n].copy_from_slice(&self.source[start + copied..start + copied + n]);
                target[copied..copied + n].copy_from_slice(&buffer[..n]);
                copied += n;
            }
        });

        target.flush().with_context(|| format!("flush path: {}", path.display()))?;
        log::debug!("Materialized chunk {} ({} bytes) into {}", self.chunk.index(), length, path.display());
        Ok(())
    }
}

impl Command for MaterializeCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        if !self.outcome.failed() {
            self.outcome.capture(self.materialize());
        }
        Ok(())
    }
}

/// Recreate the temporary directory and copy every chunk of `source` into its own file, in
/// parallel. Returns the chunk file paths in chunk order.
pub(crate) fn materialize_chunks(source: Arc<Mmap>, chunks: &[Chunk], config: &Config) -> Result<Vec<PathBuf>, anyhow::Error> {
    prepare_tmp_dir(config)?;

    let outcome = Outcome::new();
    let mut pool = create_pool("materializing", config)?;
    for chunk in chunks {
        pool.submit(Box::new(MaterializeCommand::new(source.clone(), *chunk, outcome.clone())));
    }
    finish_pool(pool, "materializing", &outcome)?;

    Ok(chunks.iter().map(|chunk| config.unsorted_chunk_path(chunk.index())).collect())
}

/// Wipe any previous content of the temporary directory and create it afresh.
pub(crate) fn prepare_tmp_dir(config: &Config) -> Result<(), anyhow::Error> {
    let tmp = config.tmp();
    if tmp.exists() {
        log::info!("Removing existing temporary directory {}", tmp.display());
        std::fs::remove_dir_all(tmp).with_context(|| format!("path: {}", tmp.display()))?;
    }
    std::fs::create_dir_all(tmp).with_context(|| format!("path: {}", tmp.display()))?;
    Ok(())
}
