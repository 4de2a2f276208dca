pub mod file_naming;
pub mod preferences;
pub mod recording_writer;
