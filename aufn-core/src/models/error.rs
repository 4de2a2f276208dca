use std::path::PathBuf;

use thiserror::Error;

use super::audio_models::TapPoint;

/// Failure to turn an effect descriptor into a processing-node configuration.
///
/// Always recoverable: the stage is skipped and the rest of the chain is built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("unknown effect: {0}")]
    UnknownEffect(String),
}

/// Errors raised while rewiring the signal graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("graph is capturing; rebuild rejected")]
    CaptureActive,

    #[error("a tap is already installed on {0:?}")]
    TapAlreadyInstalled(TapPoint),

    #[error("graph has not been built")]
    NotBuilt,

    #[error("engine start failed: {0}")]
    EngineStartFailed(String),
}

/// Errors that can occur during recording.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("engine start failed: {0}")]
    EngineStartFailed(String),

    #[error("finalize failed: {reason} (temporary file kept at {})", temp_path.display())]
    FinalizeFailed { reason: String, temp_path: PathBuf },

    #[error("write failed during capture: {reason} (temporary file kept at {})", temp_path.display())]
    WriteFailed { reason: String, temp_path: PathBuf },

    #[error("not recording")]
    NotRecording,

    #[error("already recording")]
    AlreadyRecording,

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

impl CaptureError {
    /// Path of a temporary file left on disk for inspection, if any.
    pub fn temp_path(&self) -> Option<&PathBuf> {
        match self {
            Self::FinalizeFailed { temp_path, .. } | Self::WriteFailed { temp_path, .. } => {
                Some(temp_path)
            }
            _ => None,
        }
    }
}

impl From<GraphError> for CaptureError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::EngineStartFailed(reason) => Self::EngineStartFailed(reason),
            GraphError::ConnectionFailed(reason) => Self::EngineStartFailed(reason),
            GraphError::CaptureActive | GraphError::TapAlreadyInstalled(_) => {
                Self::AlreadyRecording
            }
            GraphError::NotBuilt => Self::EngineStartFailed("graph has not been built".into()),
        }
    }
}
