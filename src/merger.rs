use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use data_encoding::HEXLOWER;

use crate::config::{Config, REMOVAL_EXTENSION};
use crate::line_comparator::LineComparator;
use crate::line_record::LineRecord;
use crate::merge_command::MergeCommand;
use crate::run_reader::{RunReader, RunWriter};
use crate::worker_pool::{create_pool, finish_pool, Outcome};

/// What a complete merge did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MergeSummary {
    /// Intermediate generations produced before the final merge
    pub(crate) passes: usize,
    /// Sorted runs at the start of the merge
    pub(crate) runs: usize,
    /// Lines written to the output
    pub(crate) lines: usize,
}

/// Head line of one input run during a k-way merge.
struct MergeCursor {
    source: usize,
    record: LineRecord,
}

/// Merge sorted runs into `output` until a single file remains.
///
/// While there are more runs than `files_per_merge`, runs are grouped into batches of that
/// size and each batch is merged into a run of the next generation, batches of a generation
/// in parallel. A batch of one run is renamed into the next generation. Generations are
/// strictly sequential. The last at most `files_per_merge` runs are merged into a final run of
/// the temporary directory that is moved onto `output` once complete, so `output` only ever
/// appears whole. Every input run is deleted once consumed.
pub(crate) fn merge_all(runs: Vec<PathBuf>, output: &Path, comparator: Arc<LineComparator>, config: &Config) -> Result<MergeSummary, anyhow::Error> {
    let initial_runs = runs.len();
    let mut runs = runs;
    let mut generation = 0;

    while runs.len() > config.files_per_merge() {
        config.cancellation().check()?;

        let name = format!("merging-{}", generation);
        let outcome = Outcome::new();
        let mut pool = create_pool(&name, config)?;
        let mut next_generation = Vec::with_capacity(runs.len().div_ceil(config.files_per_merge()));
        for (batch_index, batch) in runs.chunks(config.files_per_merge()).enumerate() {
            let batch_output = config.merged_run_path(generation, batch_index);
            next_generation.push(batch_output.clone());
            pool.submit(
                Box::new(
                    MergeCommand::new(batch.to_vec(), batch_output, comparator.clone(), outcome.clone())
                )
            );
        }
        finish_pool(pool, &name, &outcome)?;

        log::info!("Merge pass {} reduced {} runs to {}", generation, runs.len(), next_generation.len());
        runs = next_generation;
        generation += 1;
    }

    config.cancellation().check()?;
    log::info!("Final merge of {} runs into {}", runs.len(), output.display());
    let final_run = config.final_run_path();
    let merged = merge_files(&runs, &final_run, &comparator, config)
        .and_then(|lines| publish_run(&final_run, output).map(|_| lines));
    match merged {
        Ok(lines) => Ok(
            MergeSummary {
                passes: generation,
                runs: initial_runs,
                lines,
            }
        ),
        Err(e) => {
            if final_run.exists() {
                if let Err(remove_error) = std::fs::remove_file(&final_run) {
                    log::warn!("Failed to remove incomplete run {}: {}", final_run.display(), remove_error);
                }
            }
            Err(e)
        }
    }
}

/// Move the completed final run onto `output`. A rename across file systems fails, the run
/// is copied in that case.
fn publish_run(run: &Path, output: &Path) -> Result<(), anyhow::Error> {
    if let Err(e) = std::fs::rename(run, output) {
        log::debug!("Rename {} to {} failed, copying: {}", run.display(), output.display(), e);
        std::fs::copy(run, output)
            .with_context(|| format!("copy {} to {}", run.display(), output.display()))?;
        std::fs::remove_file(run).with_context(|| format!("path: {}", run.display()))?;
    }
    Ok(())
}

/// K-way merge of sorted `inputs` into `output`, returns the number of lines written.
///
/// The active cursors are kept ordered by their head line. After the head is emitted only the
/// head cursor can be out of place, so it is moved forward by a linear walk instead of sorting
/// the whole list again. Inputs are deleted after the output is complete.
pub(crate) fn merge_files(inputs: &[PathBuf], output: &Path, comparator: &LineComparator, config: &Config) -> Result<usize, anyhow::Error> {
    let mut readers = Vec::with_capacity(inputs.len());
    for path in inputs {
        readers.push(RunReader::open(path, config.encoding(), config.encoded_terminator(), config.delimiter())?);
    }

    let mut active = Vec::with_capacity(readers.len());
    for (source, reader) in readers.iter_mut().enumerate() {
        if let Some(record) = reader.next_record()? {
            active.push(MergeCursor { source, record });
        }
    }
    active.sort_by(|a, b| comparator.compare(&a.record, &b.record));

    let mut writer = RunWriter::create(output, config.encoding(), config.encoded_terminator())?;
    while !active.is_empty() {
        writer.write_line(active[0].record.line())?;

        let source = active[0].source;
        match readers[source].next_record()? {
            None => {
                log::debug!("Run {} exhausted", readers[source].path().display());
                active.remove(0);
            }
            Some(record) => {
                active[0].record = record;
                let mut i = 1;
                while i < active.len() && comparator.compare(&active[i - 1].record, &active[i].record) == Ordering::Greater {
                    active.swap(i - 1, i);
                    i += 1;
                }
            }
        }
    }
    let lines = writer.finish()?;
    drop(readers);

    for path in inputs {
        remove_run(path)?;
    }
    log::debug!("Merged {} runs into {}, {} lines", inputs.len(), output.display(), lines);
    Ok(lines)
}

/// Delete a consumed run. The file is first renamed to a unique throwaway name so a slow
/// delete never collides with a new run created under the same name.
pub(crate) fn remove_run(path: &Path) -> Result<(), anyhow::Error> {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}.{}", HEXLOWER.encode(&rand::random::<[u8; 8]>()), REMOVAL_EXTENSION));
    let throwaway = PathBuf::from(name);
    std::fs::rename(path, &throwaway)
        .with_context(|| format!("rename {} to {}", path.display(), throwaway.display()))?;
    std::fs::remove_file(&throwaway)
        .with_context(|| format!("path: {}", throwaway.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    use crate::config::tests::test_config;
    use crate::error::{is_cancelled, is_malformed_input};
    use crate::line_comparator::LineComparator;
    use crate::merger::{merge_all, merge_files};

    fn write_runs(dir: &PathBuf, runs: &[&str]) -> Result<Vec<PathBuf>, anyhow::Error> {
        let mut paths = Vec::new();
        for (i, content) in runs.iter().enumerate() {
            let path = dir.join(format!("data_{}.sorted", i));
            fs::write(&path, content)?;
            paths.push(path);
        }
        Ok(paths)
    }

    #[test]
    fn test_merge_files() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let tmp = dir.path().to_path_buf();
        let config = test_config(tmp.clone(), 5);
        let inputs = write_runs(&tmp, &[
            "1. Apple\n3. Cherry\n",
            "",
            "2. Apple\n5. Banana\n7. Date\n",
            "4. Banana\n",
        ])?;
        let output = tmp.join("out.txt");

        let lines = merge_files(&inputs, &output, &LineComparator::new(1024), &config)?;
        assert_eq!(lines, 6);
        assert_eq!(
            fs::read_to_string(&output)?,
            "1. Apple\n2. Apple\n4. Banana\n5. Banana\n3. Cherry\n7. Date\n"
        );
        for input in inputs {
            assert!(!input.exists());
        }
        let leftovers: Vec<_> = fs::read_dir(&tmp)?.collect();
        assert_eq!(leftovers.len(), 1);
        Ok(())
    }

    #[test]
    fn test_fan_in_two_with_five_runs() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let tmp = dir.path().join("tmp");
        fs::create_dir_all(&tmp)?;
        let config = test_config(tmp.clone(), 2);
        let runs = write_runs(&tmp, &["5. e\n", "3. c\n", "1. a\n", "4. d\n", "2. b\n"])?;
        let output = dir.path().join("out.txt");

        let summary = merge_all(runs, &output, Arc::new(LineComparator::new(1024)), &config)?;
        assert_eq!(summary.passes, 2);
        assert_eq!(summary.runs, 5);
        assert_eq!(summary.lines, 5);
        assert_eq!(fs::read_to_string(&output)?, "1. a\n2. b\n3. c\n4. d\n5. e\n");
        assert_eq!(fs::read_dir(&tmp)?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_no_pass_when_runs_fit_fan_in() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let tmp = dir.path().to_path_buf();
        let config = test_config(tmp.clone(), 5);
        let runs = write_runs(&tmp, &["2. b\n", "1. a\n"])?;
        let output = tmp.join("out.txt");
        fs::write(&output, "9. left over from an earlier run\n")?;

        let summary = merge_all(runs, &output, Arc::new(LineComparator::new(1024)), &config)?;
        assert_eq!(summary.passes, 0);
        assert_eq!(fs::read_to_string(&output)?, "1. a\n2. b\n");
        Ok(())
    }

    #[test]
    fn test_no_runs_gives_empty_output() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path().to_path_buf(), 5);
        let output = dir.path().join("out.txt");

        let summary = merge_all(vec![], &output, Arc::new(LineComparator::new(1024)), &config)?;
        assert_eq!(summary.lines, 0);
        assert_eq!(fs::metadata(&output)?.len(), 0);
        Ok(())
    }

    #[test]
    fn test_failed_final_merge_removes_output() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let tmp = dir.path().to_path_buf();
        let config = test_config(tmp.clone(), 5);
        let runs = write_runs(&tmp, &["1. a\n2. b\n", "1. a\nbroken\n"])?;
        let output = tmp.join("out.txt");

        let error = merge_all(runs, &output, Arc::new(LineComparator::new(1024)), &config).unwrap_err();
        assert!(is_malformed_input(&error));
        assert!(!output.exists());
        assert!(!config.final_run_path().exists());
        Ok(())
    }

    #[test]
    fn test_cancelled_between_passes() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let tmp = dir.path().to_path_buf();
        let config = test_config(tmp.clone(), 2);
        let runs = write_runs(&tmp, &["1. a\n", "2. b\n", "3. c\n"])?;
        let output = tmp.join("out.txt");
        config.cancellation().cancel();

        let error = merge_all(runs.clone(), &output, Arc::new(LineComparator::new(1024)), &config).unwrap_err();
        assert!(is_cancelled(&error));
        assert!(!output.exists());
        assert!(runs.iter().all(|run| run.exists()));
        Ok(())
    }
}
