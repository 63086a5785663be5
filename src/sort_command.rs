use std::cell::RefCell;
use std::cmp::max;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use command_executor::command::Command;

use crate::config::{Config, SORTED_EXTENSION};
use crate::line_comparator::LineComparator;
use crate::line_record::LineRecord;
use crate::run_reader::{RunReader, RunWriter};
use crate::worker_pool::{create_pool, finish_pool, get_tl_config, Outcome};

thread_local! {
    static LINE_RECORDS_CAPACITY: RefCell<usize> = RefCell::new(1);
}

fn get_line_records_capacity() -> usize {
    LINE_RECORDS_CAPACITY.with(|capacity| *capacity.borrow())
}

fn set_line_records_capacity(value: usize) {
    LINE_RECORDS_CAPACITY.with(|capacity| capacity.replace(value));
}

/// Sorts one materialized chunk file in memory and renames it from `.unsorted` to `.sorted`.
pub(crate) struct SortCommand {
    path: PathBuf,
    comparator: Arc<LineComparator>,
    outcome: Outcome,
}

impl SortCommand {
    pub(crate) fn new(path: PathBuf, comparator: Arc<LineComparator>, outcome: Outcome) -> SortCommand {
        SortCommand {
            path,
            comparator,
            outcome,
        }
    }

    fn read_records(&self, config: &Config) -> Result<Vec<LineRecord>, anyhow::Error> {
        let capacity = get_line_records_capacity();
        let mut line_records = Vec::with_capacity(capacity);
        let mut reader = RunReader::open(&self.path, config.encoding(), config.encoded_terminator(), config.delimiter())?;
        while let Some(record) = reader.next_record()? {
            line_records.push(record);
        }
        set_line_records_capacity(max(line_records.len(), capacity));
        Ok(line_records)
    }

    fn sort(&self) -> Result<(), anyhow::Error> {
        let config = get_tl_config()?;
        config.cancellation().check()?;

        let mut records = self.read_records(&config)?;
        records.sort_unstable_by(|a, b| self.comparator.compare(a, b));
        write_records(&self.path, &records, &config)?;

        let sorted = sorted_path(&self.path);
        std::fs::rename(&self.path, &sorted)
            .with_context(|| format!("rename {} to {}", self.path.display(), sorted.display()))?;
        log::debug!("Sorted {} lines into {}", records.len(), sorted.display());
        Ok(())
    }
}

impl Command for SortCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        if !self.outcome.failed() {
            self.outcome.capture(self.sort());
        }
        Ok(())
    }
}

fn write_records(path: &Path, records: &[LineRecord], config: &Config) -> Result<(), anyhow::Error> {
    let mut writer = RunWriter::create(path, config.encoding(), config.encoded_terminator())?;
    for record in records {
        writer.write_line(record.line())?;
    }
    writer.finish()?;
    Ok(())
}

pub(crate) fn sorted_path(path: &Path) -> PathBuf {
    path.with_extension(SORTED_EXTENSION)
}

/// Sort every chunk file in parallel. Returns the sorted run paths in chunk order.
pub(crate) fn sort_chunks(paths: &[PathBuf], comparator: Arc<LineComparator>, config: &Config) -> Result<Vec<PathBuf>, anyhow::Error> {
    let outcome = Outcome::new();
    let mut pool = create_pool("sorting", config)?;
    for path in paths {
        pool.submit(Box::new(SortCommand::new(path.clone(), comparator.clone(), outcome.clone())));
    }
    finish_pool(pool, "sorting", &outcome)?;
    Ok(paths.iter().map(|path| sorted_path(path)).collect())
}
