//! Cooperative shutdown flag

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide termination request
///
/// Set by SIGINT/SIGTERM, the `haltApplication` command, or a fatal
/// scheduling error. Checked by the reactor between dispatches and by the
/// command server between reads. Setting it twice is harmless.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination
    pub fn request(&self) {
        if !self.0.swap(true, Ordering::SeqCst) {
            log::info!("Shutdown requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = ShutdownFlag::new();
        let other = flag.clone();
        assert!(!other.is_requested());

        flag.request();
        flag.request();
        assert!(other.is_requested());
    }
}
