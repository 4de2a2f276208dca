use crate::models::error::CaptureError;

/// Opaque key-value persistence the host provides.
///
/// Implementations might be a file, a platform settings API, or memory.
pub trait PreferenceStore: Send + Sync {
    /// Raw bytes for `key`, or `None` if never saved.
    fn load(&self, key: &str) -> Option<Vec<u8>>;

    fn save(&self, key: &str, value: &[u8]) -> Result<(), CaptureError>;
}
