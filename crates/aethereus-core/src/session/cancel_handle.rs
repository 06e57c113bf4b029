use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Cancels whichever exchange is currently running.
///
/// Each exchange gets a fresh token, so cancelling never affects the next one.
/// Clones share the slot and can be moved to other tasks (e.g. a Ctrl-C handler).
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    current: Arc<Mutex<CancellationToken>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.current.lock().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.current.lock().is_cancelled()
    }

    /// Token for a new exchange, replacing the previous one
    pub(crate) fn fresh(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock() = token.clone();
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_only_hits_current_exchange() {
        let handle = CancelHandle::new();
        let first = handle.fresh();
        handle.cancel();
        assert!(first.is_cancelled());

        let second = handle.fresh();
        assert!(!second.is_cancelled());
        assert!(!handle.is_cancelled());

        handle.clone().cancel();
        assert!(second.is_cancelled());
    }
}
