use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::models::config::RecordingFormat;

/// Stem of the in-progress capture file.
pub const TEMP_FILE_STEM: &str = "temp_recording";

/// Stem prefix of finalized recordings.
pub const FINAL_FILE_PREFIX: &str = "recording_";

/// Stem prefix of temporary files moved aside before a new capture.
pub const RECOVERED_FILE_PREFIX: &str = "recovered_";

const TIMESTAMP_PATTERN: &str = "%Y%m%d%H%M%S";

/// `<dir>/temp_recording.<ext>`
pub fn temporary_path(directory: &Path, format: RecordingFormat) -> PathBuf {
    directory.join(format!("{}.{}", TEMP_FILE_STEM, format.extension()))
}

/// `recording_<yyyyMMddHHmmss>.<ext>`
pub fn final_file_name(finalized_at: DateTime<Local>, format: RecordingFormat) -> String {
    format!(
        "{}{}.{}",
        FINAL_FILE_PREFIX,
        finalized_at.format(TIMESTAMP_PATTERN),
        format.extension()
    )
}

/// First free final path for the timestamp.
///
/// When `recording_<stamp>.<ext>` is taken, `_1`, `_2`, ... is inserted
/// before the extension until a name is free.
pub fn unique_final_path(directory: &Path, finalized_at: DateTime<Local>, format: RecordingFormat) -> PathBuf {
    unique_path(directory, FINAL_FILE_PREFIX, finalized_at, format)
}

/// First free `recovered_<stamp>.<ext>` path, numbered like final names.
pub fn unique_recovery_path(directory: &Path, moved_at: DateTime<Local>, format: RecordingFormat) -> PathBuf {
    unique_path(directory, RECOVERED_FILE_PREFIX, moved_at, format)
}

fn unique_path(directory: &Path, prefix: &str, stamp: DateTime<Local>, format: RecordingFormat) -> PathBuf {
    let stem = format!("{}{}", prefix, stamp.format(TIMESTAMP_PATTERN));
    let candidate = directory.join(format!("{}.{}", stem, format.extension()));
    if !candidate.exists() {
        return candidate;
    }

    let mut suffix = 1u32;
    loop {
        let candidate = directory.join(format!("{}_{}.{}", stem, suffix, format.extension()));
        if !candidate.exists() {
            log::debug!("name collision on {} resolved with suffix _{}", stem, suffix);
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn stamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn temp_name_uses_lowercase_extension() {
        let dir = Path::new("/data");
        assert_eq!(temporary_path(dir, RecordingFormat::Wav), PathBuf::from("/data/temp_recording.wav"));
        assert_eq!(temporary_path(dir, RecordingFormat::M4a), PathBuf::from("/data/temp_recording.m4a"));
    }

    #[test]
    fn final_name_is_zero_padded() {
        assert_eq!(final_file_name(stamp(), RecordingFormat::Wav), "recording_20240309070501.wav");
        assert_eq!(final_file_name(stamp(), RecordingFormat::M4a), "recording_20240309070501.m4a");
    }

    #[test]
    fn free_name_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = unique_final_path(dir.path(), stamp(), RecordingFormat::Wav);
        assert_eq!(path.file_name().unwrap(), "recording_20240309070501.wav");
    }

    #[test]
    fn collisions_get_numbered_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("recording_20240309070501.wav"), b"a").unwrap();
        fs::write(dir.path().join("recording_20240309070501_1.wav"), b"b").unwrap();

        let path = unique_final_path(dir.path(), stamp(), RecordingFormat::Wav);
        assert_eq!(path.file_name().unwrap(), "recording_20240309070501_2.wav");

        // Other formats do not collide with each other.
        let path = unique_final_path(dir.path(), stamp(), RecordingFormat::M4a);
        assert_eq!(path.file_name().unwrap(), "recording_20240309070501.m4a");
    }

    #[test]
    fn recovery_names_do_not_clash() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_recovery_path(dir.path(), stamp(), RecordingFormat::Wav);
        assert_eq!(first.file_name().unwrap(), "recovered_20240309070501.wav");

        fs::write(&first, b"old").unwrap();
        let second = unique_recovery_path(dir.path(), stamp(), RecordingFormat::Wav);
        assert_eq!(second.file_name().unwrap(), "recovered_20240309070501_1.wav");
    }
}
