//! Cooperative shutdown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use contracts::ContractError;

/// Shutdown flag polled by the capture loop between cycles
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Flip `token` on Ctrl+C
///
/// The handler only sets the flag. Can be installed once per process.
pub fn install_signal_handler(token: &ShutdownToken) -> Result<(), ContractError> {
    let token = token.clone();
    ctrlc::set_handler(move || token.trigger())
    .map_err(|e| ContractError::Other(format!("failed to install signal handler: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shared_between_clones() {
        let token = ShutdownToken::new();
        let observer = token.clone();
        assert!(!observer.is_shutdown());
        token.trigger();
        assert!(observer.is_shutdown());
    }
}
