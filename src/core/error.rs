use super::catalog::ModelIdentifier;
use std::path::PathBuf;
use std::time::Duration;

/// Failures surfaced to callers of the prediction service.
///
/// Alignment mismatches between a decoded continuation and the caller text
/// are not represented here: they are absorbed as an empty fragment.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("unknown prediction model: {0}")]
    UnknownModel(String),

    #[error("timed out after {timeout:?} waiting for the construction lock of {model}")]
    LockTimeout {
        model: ModelIdentifier,
        timeout: Duration,
    },

    #[error("failed to acquire construction lock file {path}")]
    LockFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load prediction model {model}")]
    ModelLoad {
        model: ModelIdentifier,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("{0} is a masked model and has no sentence completion")]
    SentenceCompletionUnsupported(ModelIdentifier),
}

impl PredictionError {
    pub fn model_load(model: ModelIdentifier, source: anyhow::Error) -> Self {
        Self::ModelLoad {
            model,
            source: source.into(),
        }
    }

    /// Whether a later call with the same arguments may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. } | Self::LockFile { .. } | Self::ModelLoad { .. }
        )
    }
}
