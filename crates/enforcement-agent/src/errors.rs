use thiserror::Error;

use rule_store::StoreError;

use crate::protocol::ErrorCode;

#[derive(Clone, Debug, Error)]
pub enum AgentError {
    #[error("persistence unavailable: {0}")]
    Persistence(#[from] StoreError),
    #[error("mutation queue closed")]
    QueueClosed,
}

impl AgentError {
    /// Wire code reported to the control surface for this failure.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AgentError::Persistence(_) => ErrorCode::PersistenceUnavailable,
            AgentError::QueueClosed => ErrorCode::AgentStopped,
        }
    }
}
