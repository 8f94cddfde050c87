use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    /// Bad run arguments (strategy name, epoch count, arity).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The loaded model lacks a submodule the strategy needs.
    #[error("model structure mismatch: {0}")]
    StructuralMismatch(String),

    #[error("training failed: {0}")]
    TrainingFailure(String),

    #[error("failed to persist artifact: {0}")]
    Persistence(String),

    /// Recoverable: a sample could not be shown. Never aborts a run.
    #[error("display error: {0}")]
    Display(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrainingError {
    /// Whether the run may continue after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Display(_))
    }
}
