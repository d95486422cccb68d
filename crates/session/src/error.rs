//! Session error types

use contracts::{ContractError, StreamKind};
use thiserror::Error;

use crate::SessionState;

/// Session specific error
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation called before the session reached the required state
    #[error("'{operation}' is not valid while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// Operation called after `stop`
    #[error("'{operation}' called after the session was stopped")]
    UseAfterStop { operation: &'static str },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl SessionError {
    /// Whether the capture loop may retry after this error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Contract(err) if err.is_timeout())
    }

    /// Streams that had not delivered when a wait timed out
    pub fn missing_streams(&self) -> &[StreamKind] {
        match self {
            Self::Contract(ContractError::Timeout { missing, .. }) => missing,
            _ => &[],
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        let timeout: SessionError = ContractError::Timeout {
            waited_ms: 5,
            missing: vec![StreamKind::Infrared],
        }
        .into();
        assert!(timeout.is_timeout());
        assert_eq!(timeout.missing_streams(), &[StreamKind::Infrared]);

        let other = SessionError::UseAfterStop { operation: "start" };
        assert!(!other.is_timeout());
        assert!(other.missing_streams().is_empty());
        assert_eq!(other.to_string(), "'start' called after the session was stopped");
    }
}
