use emotune_training::TrainingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("model source error: {0}")]
    Source(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("engine not prepared: call prepare() before training")]
    NotPrepared,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;

impl From<ModelError> for TrainingError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnknownParameter(name) => {
                TrainingError::StructuralMismatch(format!("unknown parameter: {name}"))
            }
            ModelError::Io(e) => TrainingError::Io(e),
            other => TrainingError::TrainingFailure(other.to_string()),
        }
    }
}
