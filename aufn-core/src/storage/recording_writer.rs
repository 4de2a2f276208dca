use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::config::{CaptureConfiguration, RecordingFormat};
use crate::models::error::CaptureError;
use crate::processing::format_converter::convert_to_int16_pcm;
use crate::processing::wav_format::{WavSpec, WAV_HEADER_SIZE};
use crate::traits::encoder::CompressedEncoder;

/// Largest PCM payload a RIFF header can describe: the chunk size field
/// (`36 + data`) is a `u32`.
pub const MAX_WAV_DATA_BYTES: u64 = u32::MAX as u64 - (WAV_HEADER_SIZE as u64 - 8);

/// Streaming recording-file writer.
///
/// Lives on the writer thread; the render callback never touches it.
///
/// ## File Format
///
/// **WAV:**
/// ```text
/// [44-byte WAV header, sizes patched on close]
/// [raw 16-bit PCM data...]
/// ```
///
/// **Compressed:**
/// ```text
/// [encoder header bytes][encoded chunks...][encoder trailer bytes]
/// ```
pub struct RecordingWriter {
    file_path: PathBuf,
    format: RecordingFormat,
    sample_rate: u32,
    channels: u16,
    bit_depth: u16,
    encoder: Option<Box<dyn CompressedEncoder>>,
    file: Option<BufWriter<File>>,
    total_bytes_written: u64,
    frames_written: u64,
    is_open: bool,
}

impl RecordingWriter {
    pub fn new(file_path: PathBuf, config: &CaptureConfiguration) -> Self {
        Self {
            file_path,
            format: config.format,
            sample_rate: config.sample_rate,
            channels: config.channels,
            bit_depth: config.bit_depth,
            encoder: config.encoder.clone(),
            file: None,
            total_bytes_written: 0,
            frames_written: 0,
            is_open: false,
        }
    }

    /// Create (or truncate) the file and write the container header.
    pub fn open(&mut self) -> Result<(), CaptureError> {
        if self.is_open {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
        }

        let header = if self.format.is_compressed() {
            let (sample_rate, channels) = (self.sample_rate, self.channels);
            let encoder = self.encoder.as_mut().ok_or_else(|| {
                CaptureError::ConfigurationFailed(format!("no encoder for {}", self.format))
            })?;
            encoder
                .begin(sample_rate, channels)
                .map_err(|e| CaptureError::ConfigurationFailed(format!("encoder rejected stream: {}", e)))?
        } else {
            self.wav_spec().header(0).to_vec()
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.file_path)
            .map_err(|e| CaptureError::StorageError(format!("failed to create file: {}", e)))?;
        self.file = Some(BufWriter::new(file));

        self.write_raw(&header)?;
        self.is_open = true;
        Ok(())
    }

    /// Append interleaved f32 samples already in the file's layout.
    pub fn write_samples(&mut self, samples: &[f32]) -> Result<(), CaptureError> {
        if !self.is_open {
            return Err(CaptureError::StorageError("file is not open for writing".into()));
        }
        if samples.is_empty() {
            return Ok(());
        }

        let bytes = match (&mut self.encoder, self.format.is_compressed()) {
            (Some(encoder), true) => encoder
                .encode(samples)
                .map_err(|e| CaptureError::StorageError(format!("encoding failed: {}", e)))?,
            _ => {
                let pcm = convert_to_int16_pcm(samples);
                if self.data_bytes() + pcm.len() as u64 > MAX_WAV_DATA_BYTES {
                    return Err(CaptureError::StorageError(
                        "WAV data would exceed the 4 GiB RIFF limit".into(),
                    ));
                }
                pcm
            }
        };
        self.write_raw(&bytes)?;
        self.frames_written += (samples.len() / self.channels.max(1) as usize) as u64;
        Ok(())
    }

    /// Finish the container and compute the SHA-256 checksum of the file.
    pub fn close(&mut self) -> Result<String, CaptureError> {
        if !self.is_open {
            return Err(CaptureError::StorageError("file is not open".into()));
        }

        if self.format.is_compressed() {
            if let Some(encoder) = self.encoder.as_mut() {
                let trailer = encoder
                    .finish()
                    .map_err(|e| CaptureError::StorageError(format!("encoder flush failed: {}", e)))?;
                self.write_raw(&trailer)?;
            }
        } else {
            let data_size = u32::try_from(self.data_bytes()).map_err(|_| {
                CaptureError::StorageError("WAV data exceeds the RIFF size field".into())
            })?;
            let header = self.wav_spec().header(data_size);
            let file = self
                .file
                .as_mut()
                .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
            file.seek(SeekFrom::Start(0))
                .map_err(|e| CaptureError::StorageError(e.to_string()))?;
            file.write_all(&header)
                .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        }

        let mut file = self
            .file
            .take()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        self.is_open = false;
        file.flush().map_err(|e| CaptureError::StorageError(e.to_string()))?;
        let file = file.get_mut();
        file.sync_all()
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;

        sha256_of(file)
    }

    /// Total bytes written so far, header included.
    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames_written as f64 / self.sample_rate as f64
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Bytes written after the container header.
    fn data_bytes(&self) -> u64 {
        self.total_bytes_written.saturating_sub(WAV_HEADER_SIZE as u64)
    }

    fn wav_spec(&self) -> WavSpec {
        WavSpec::new(self.sample_rate, self.channels, self.bit_depth)
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }
}

/// SHA-256 hex digest of an open file, read from the start in chunks.
fn sha256_of(file: &mut File) -> Result<String, CaptureError> {
    let checksum_err =
        |e: io::Error| CaptureError::StorageError(format!("failed to read file for checksum: {}", e));
    file.seek(SeekFrom::Start(0)).map_err(checksum_err)?;
    let mut hasher = Sha256::new();
    io::copy(file, &mut hasher).map_err(checksum_err)?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::config::IoBufferDuration;

    /// Test encoder: `ENC!` header, raw f32 LE samples, `END!` trailer.
    #[derive(Clone, Default)]
    pub(crate) struct FakeEncoder;

    impl CompressedEncoder for FakeEncoder {
        fn begin(&mut self, _sample_rate: u32, _channels: u16) -> Result<Vec<u8>, String> {
            Ok(b"ENC!".to_vec())
        }

        fn encode(&mut self, samples: &[f32]) -> Result<Vec<u8>, String> {
            Ok(samples.iter().flat_map(|s| s.to_le_bytes()).collect())
        }

        fn finish(&mut self) -> Result<Vec<u8>, String> {
            Ok(b"END!".to_vec())
        }

        fn format_name(&self) -> &str {
            "FAKE"
        }

        fn clone_box(&self) -> Box<dyn CompressedEncoder> {
            Box::new(FakeEncoder)
        }
    }

    fn config(format: RecordingFormat, channels: u16) -> CaptureConfiguration {
        CaptureConfiguration {
            format,
            sample_rate: 48000,
            bit_depth: 16,
            channels,
            io_buffer: IoBufferDuration::Relaxed,
            output_directory: PathBuf::from("."),
            encoder: Some(Box::new(FakeEncoder)),
        }
    }

    #[test]
    fn write_plain_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.wav");

        let mut writer = RecordingWriter::new(path.clone(), &config(RecordingFormat::Wav, 2));
        writer.open().unwrap();
        writer.write_samples(&[0.0; 8]).unwrap();

        let checksum = writer.close().unwrap();
        assert_eq!(checksum.len(), 64);

        let file_data = fs::read(&path).unwrap();
        assert_eq!(file_data.len(), 44 + 16);
        assert_eq!(&file_data[0..4], b"RIFF");
        assert_eq!(&file_data[8..12], b"WAVE");

        let (spec, data_size) = WavSpec::parse(&file_data).unwrap();
        assert_eq!(spec, WavSpec::new(48000, 2, 16));
        assert_eq!(data_size, 16);
        let chunk_size = u32::from_le_bytes([file_data[4], file_data[5], file_data[6], file_data[7]]);
        assert_eq!(chunk_size, 36 + 16);
    }

    #[test]
    fn wav_keeps_sample_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("order.wav");

        let mut writer = RecordingWriter::new(path.clone(), &config(RecordingFormat::Wav, 1));
        writer.open().unwrap();
        writer.write_samples(&[0.5]).unwrap();
        writer.write_samples(&[-0.5]).unwrap();
        writer.close().unwrap();

        let data = fs::read(&path).unwrap();
        let first = i16::from_le_bytes([data[44], data[45]]);
        let second = i16::from_le_bytes([data[46], data[47]]);
        assert!(first > 0 && second < 0);
        assert_eq!(first, -second);
    }

    #[test]
    fn compressed_uses_encoder_framing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enc.m4a");

        let mut writer = RecordingWriter::new(path.clone(), &config(RecordingFormat::M4a, 1));
        writer.open().unwrap();
        writer.write_samples(&[1.0, 2.0]).unwrap();
        writer.close().unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(&data[0..4], b"ENC!");
        assert_eq!(f32::from_le_bytes([data[4], data[5], data[6], data[7]]), 1.0);
        assert_eq!(&data[data.len() - 4..], b"END!");
        assert_eq!(data.len(), 4 + 8 + 4);
    }

    #[test]
    fn duration_counts_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordingWriter::new(dir.path().join("d.wav"), &config(RecordingFormat::Wav, 2));
        writer.open().unwrap();
        writer.write_samples(&vec![0.0; 48000 * 2]).unwrap();
        assert!((writer.duration_secs() - 1.0).abs() < 1e-9);
        writer.close().unwrap();
    }

    #[test]
    fn checksum_covers_the_finished_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sum.wav");

        let mut writer = RecordingWriter::new(path.clone(), &config(RecordingFormat::Wav, 1));
        writer.open().unwrap();
        writer.write_samples(&[0.25; 3000]).unwrap();
        let checksum = writer.close().unwrap();

        let expected = hex_encode(&Sha256::digest(fs::read(&path).unwrap()));
        assert_eq!(checksum, expected);
    }

    #[test]
    fn wav_refuses_data_past_riff_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordingWriter::new(dir.path().join("big.wav"), &config(RecordingFormat::Wav, 1));
        writer.open().unwrap();
        writer.total_bytes_written = WAV_HEADER_SIZE as u64 + MAX_WAV_DATA_BYTES - 2;

        writer.write_samples(&[0.0]).unwrap();
        let err = writer.write_samples(&[0.0]).unwrap_err();
        assert!(matches!(err, CaptureError::StorageError(ref r) if r.contains("RIFF")));
    }

    #[test]
    fn write_before_open_fails() {
        let mut writer = RecordingWriter::new(PathBuf::from("never.wav"), &config(RecordingFormat::Wav, 1));
        assert!(matches!(writer.write_samples(&[0.0]), Err(CaptureError::StorageError(_))));
        assert!(writer.close().is_err());
    }
}
