use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use command_executor::command::Command;

use crate::line_comparator::LineComparator;
use crate::merger::merge_files;
use crate::worker_pool::{get_tl_config, Outcome};

/// Merges one batch of sorted runs into a single run of the next generation.
pub(crate) struct MergeCommand {
    batch: Vec<PathBuf>,
    output: PathBuf,
    comparator: Arc<LineComparator>,
    outcome: Outcome,
}

impl MergeCommand {
    pub(crate) fn new(batch: Vec<PathBuf>, output: PathBuf, comparator: Arc<LineComparator>, outcome: Outcome) -> MergeCommand {
        MergeCommand {
            batch,
            output,
            comparator,
            outcome,
        }
    }

    fn merge(&self) -> Result<(), anyhow::Error> {
        let config = get_tl_config()?;
        config.cancellation().check()?;

        if let [single] = self.batch.as_slice() {
            std::fs::rename(single, &self.output)
                .with_context(|| format!("rename {} to {}", single.display(), self.output.display()))?;
            log::debug!("Moved {} to {}", single.display(), self.output.display());
        } else {
            merge_files(&self.batch, &self.output, &self.comparator, &config)
                .with_context(|| format!("merging into {}", self.output.display()))?;
        }
        Ok(())
    }
}

impl Command for MergeCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        if !self.outcome.failed() {
            self.outcome.capture(self.merge());
        }
        Ok(())
    }
}
