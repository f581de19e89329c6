//! Error taxonomy for the knowledge store and context assembly.

use std::path::PathBuf;

/// Errors produced by store loading and chunk serialization.
///
/// Malformed cards are not errors: they are reported through
/// [`crate::store::LoadReport`] and skipped.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("field cards file not found: {}", path.display())]
    FieldCardsNotFound { path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// True when the mandatory field-card file is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FieldCardsNotFound { .. })
    }
}

/// Result type for formrag operations.
pub type Result<T> = std::result::Result<T, RagError>;
