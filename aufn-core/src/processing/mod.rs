pub mod format_converter;
pub mod level_buffer;
pub mod wav_format;
