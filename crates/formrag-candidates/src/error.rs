//! Error types for candidate extraction

use thiserror::Error;

/// Errors that can occur while generating candidates
#[derive(Error, Debug)]
pub enum CandidateError {
    /// The model runner failed to produce output
    #[error("model runner failed: {0}")]
    Model(String),

    /// The page image could not be found
    #[error("image not found: {0}")]
    ImageNotFound(String),
}

/// Result type for candidate extraction
pub type Result<T> = std::result::Result<T, CandidateError>;
