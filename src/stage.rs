use std::time::Instant;

/// Run one pipeline stage and log how long it took, whether it succeeded or not.
pub(crate) fn timed<T, F>(stage: &str, f: F) -> Result<T, anyhow::Error>
where
    F: FnOnce() -> Result<T, anyhow::Error>,
{
    log::info!("Start {}", stage);
    let started = Instant::now();
    let result = f();
    let elapsed = started.elapsed().as_secs_f64();
    match &result {
        Ok(_) => log::info!("Finish {}, elapsed: {:.3}s", stage, elapsed),
        Err(e) => log::warn!("Failed {} after {:.3}s: {:#}", stage, elapsed, e),
    }
    result
}
