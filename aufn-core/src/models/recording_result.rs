use std::path::PathBuf;

use chrono::{DateTime, Local};

use super::config::RecordingFormat;

/// Result returned when a recording is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub format: RecordingFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub started_at: DateTime<Local>,
    pub finalized_at: DateTime<Local>,
    pub duration_secs: f64,
    /// SHA-256 of the finished file, lowercase hex.
    pub checksum: String,
    /// Buffers the disk tap had to drop because the writer fell behind.
    pub dropped_buffers: u64,
}

impl RecordingResult {
    pub fn is_complete(&self) -> bool {
        self.dropped_buffers == 0
    }
}
