//! Cooperative cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

/// Shared cancellation token for a launch.
///
/// Aborting does not interrupt work already in flight. Every suspension point
/// in the launch pipeline calls [`AbortSignal::check`] and turns the next step
/// into an [`Error::Aborted`] instead.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    aborted: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal every holder of this token.
    pub fn abort(&self) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            tracing::debug!("abort signaled");
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_aborted() {
            Err(Error::Aborted)
        } else {
            Ok(())
        }
    }
}

/// Check an optional token.
pub fn check(signal: Option<&AbortSignal>) -> Result<()> {
    signal.map_or(Ok(()), AbortSignal::check)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let signal = AbortSignal::new();
        let other = signal.clone();
        assert!(other.check().is_ok());
        signal.abort();
        assert!(other.is_aborted());
        assert!(matches!(other.check(), Err(Error::Aborted)));
    }

    #[test]
    fn missing_token_never_aborts() {
        assert!(check(None).is_ok());
        let signal = AbortSignal::new();
        signal.abort();
        assert!(check(Some(&signal)).is_err());
    }
}
