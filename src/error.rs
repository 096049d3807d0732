//! Central error handling for the transparency pipeline.
//!
//! Setup-time failures only: capacity overflow during a frame is policy
//! (tail blend or discard), never an error, and numeric degeneracy is
//! epsilon-clamped at resolve.

use crate::config::Algorithm;

/// Centralized error type for pipeline construction and configuration.
#[derive(thiserror::Error, Debug)]
pub enum OitError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("{algorithm:?} requires {missing}, which this platform lacks, and fallback is disabled")]
    Unsupported {
        algorithm: Algorithm,
        missing: &'static str,
    },
}

impl OitError {
    pub fn config<T: ToString>(msg: T) -> Self {
        OitError::Config(msg.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type OitResult<T> = Result<T, OitError>;
