use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SortError;

/// Cooperative cancellation flag shared between the caller and the sort workers.
///
/// Workers look at the flag before picking up the next file and before each merge pass.
/// Work already in progress runs to the end of its current file.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), anyhow::Error> {
        if self.is_cancelled() {
            Err(SortError::Cancelled.into())
        } else {
            Ok(())
        }
    }
}
