use std::cell::RefCell;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use command_executor::shutdown_mode::ShutdownMode;
use command_executor::thread_pool::ThreadPool;
use command_executor::thread_pool_builder::ThreadPoolBuilder;

use crate::config::Config;

thread_local! {
    pub(crate) static CONFIG: RefCell<Option<Config>> = RefCell::new(None);
    pub(crate) static COPY_BUFFER: RefCell<Vec<u8>> = RefCell::new(Vec::new());
}

/// The [Config] installed on the current worker thread.
pub(crate) fn get_tl_config() -> Result<Config, anyhow::Error> {
    CONFIG.with(|config| config.borrow().clone())
        .context("worker thread has no configuration installed")
}

/// Build a pool of `config.tasks()` workers, each with `config` installed as its thread local
/// configuration. Pending commands are completed on shutdown.
pub(crate) fn create_pool(name: &str, config: &Config) -> Result<ThreadPool, anyhow::Error> {
    let mut thread_pool_builder = ThreadPoolBuilder::new();
    let mut pool = thread_pool_builder
        .with_name(name.to_string())
        .with_tasks(config.tasks())
        .with_queue_size(config.queue_size())
        .with_shutdown_mode(ShutdownMode::CompletePending)
        .build()
        .with_context(|| format!("failed to build {} pool", name))?;
    pool.set_thread_local(&CONFIG, Some(config.clone()));
    Ok(pool)
}

/// Wait for every submitted command of `pool` and surface the first recorded failure.
pub(crate) fn finish_pool(mut pool: ThreadPool, name: &str, outcome: &Outcome) -> Result<(), anyhow::Error> {
    log::debug!("Shutting down {} pool", name);
    pool.shutdown();
    pool.join()?;
    outcome.take()
}

/// Failure slot shared by the commands of one pool.
///
/// Commands run detached from the submitting thread, so they report errors here instead of
/// through their return value. Only the first error is kept.
#[derive(Clone, Default)]
pub(crate) struct Outcome {
    error: Arc<Mutex<Option<anyhow::Error>>>,
}

impl Outcome {
    pub(crate) fn new() -> Outcome {
        Outcome::default()
    }

    /// True once any command failed, later commands use it to skip their work.
    pub(crate) fn failed(&self) -> bool {
        match self.error.lock() {
            Ok(guard) => guard.is_some(),
            Err(_) => true,
        }
    }

    pub(crate) fn capture(&self, result: Result<(), anyhow::Error>) {
        if let Err(e) = result {
            log::error!("{:#}", e);
            if let Ok(mut guard) = self.error.lock() {
                if guard.is_none() {
                    *guard = Some(e);
                }
            }
        }
    }

    pub(crate) fn take(&self) -> Result<(), anyhow::Error> {
        let mut guard = self.error.lock()
            .map_err(|_| anyhow::anyhow!("worker panicked while recording a failure"))?;
        match guard.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
