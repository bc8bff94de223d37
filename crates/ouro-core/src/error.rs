//! Error types for Ouro

use crate::types::Phase;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("collaborator failed during {phase}: {message}")]
    Collaborator { phase: Phase, message: String },

    #[error("cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("checkpoint failed: {0}")]
    Checkpoint(String),

    #[error("chain integrity violation at sequence {sequence}: {detail}")]
    IntegrityViolation { sequence: u64, detail: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn collaborator(phase: Phase, message: impl Into<String>) -> Self {
        Self::Collaborator {
            phase,
            message: message.into(),
        }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn integrity(sequence: u64, detail: impl Into<String>) -> Self {
        Self::IntegrityViolation {
            sequence,
            detail: detail.into(),
        }
    }
}
