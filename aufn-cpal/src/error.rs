use aufn_core::models::error::GraphError;
use thiserror::Error;

/// Failures talking to the host audio API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CpalError {
    #[error("no default input device")]
    NoInputDevice,

    #[error("input device not found: {0}")]
    DeviceNotFound(String),

    #[error("device enumeration failed: {0}")]
    Enumeration(String),

    #[error("unsupported stream configuration: {0}")]
    Config(String),

    #[error("stream error: {0}")]
    Stream(String),
}

impl From<CpalError> for GraphError {
    fn from(err: CpalError) -> Self {
        match err {
            CpalError::NoInputDevice | CpalError::DeviceNotFound(_) | CpalError::Config(_) => {
                GraphError::ConnectionFailed(err.to_string())
            }
            CpalError::Enumeration(_) | CpalError::Stream(_) => {
                GraphError::EngineStartFailed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_lookup_failures_are_connection_errors() {
        let err: GraphError = CpalError::DeviceNotFound("USB Mic".into()).into();
        assert_eq!(
            err,
            GraphError::ConnectionFailed("input device not found: USB Mic".into())
        );
    }

    #[test]
    fn stream_failures_are_start_errors() {
        let err: GraphError = CpalError::Stream("busy".into()).into();
        assert!(matches!(err, GraphError::EngineStartFailed(ref r) if r.contains("busy")));
    }
}
