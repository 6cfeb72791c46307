use thiserror::Error;

/// Typed errors surfaced at the HTTP boundary (§7). Internal component code
/// uses `anyhow::Result` and converts into these only where a caller needs
/// to distinguish error kinds (e.g. 400 vs 500).
#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("ingest path unreadable: {0}")]
    TraversalFailure(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RagError {
    /// HTTP status code this error kind maps to, per §7's error table.
    pub fn status_code(&self) -> u16 {
        match self {
            RagError::InvalidInput(_) => 400,
            RagError::TraversalFailure(_) => 500,
            RagError::Internal(_) => 500,
        }
    }
}
