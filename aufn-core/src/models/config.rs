use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use crate::traits::encoder::CompressedEncoder;

/// Sample rates offered to the user, indexed by `RecordingSettings::sample_rate_index`.
pub const SAMPLE_RATES: [u32; 4] = [44100, 48000, 88200, 96000];

/// File formats offered to the user, indexed by `RecordingSettings::format_index`.
pub const RECORDING_FORMATS: [RecordingFormat; 2] = [RecordingFormat::Wav, RecordingFormat::M4a];

/// Highest sample-rate index a compressed format may use (48 kHz).
const COMPRESSED_MAX_RATE_INDEX: usize = 1;

/// Container/codec of a recording file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordingFormat {
    #[serde(rename = "WAV")]
    Wav,
    #[serde(rename = "M4A")]
    M4a,
}

impl RecordingFormat {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Wav => "WAV",
            Self::M4a => "M4A",
        }
    }

    /// Lowercase file extension, no leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::M4a => "m4a",
        }
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self, Self::Wav)
    }

    pub fn max_sample_rate_index(&self) -> usize {
        if self.is_compressed() {
            COMPRESSED_MAX_RATE_INDEX
        } else {
            SAMPLE_RATES.len() - 1
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        RECORDING_FORMATS
            .iter()
            .copied()
            .find(|f| f.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for RecordingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Preferred hardware IO buffer duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoBufferDuration {
    /// 5 ms.
    Fast,
    /// 10 ms.
    Relaxed,
}

impl IoBufferDuration {
    pub fn as_secs_f64(&self) -> f64 {
        match self {
            Self::Fast => 0.005,
            Self::Relaxed => 0.01,
        }
    }

    /// Frames per buffer at `sample_rate`, never zero.
    pub fn frames_at(&self, sample_rate: f64) -> u32 {
        ((sample_rate * self.as_secs_f64()).round() as u32).max(1)
    }
}

/// User-facing recording preferences.
///
/// Indices are kept private so the format/sample-rate coupling can only be
/// changed through `select_format` and `select_sample_rate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSettings {
    format_index: usize,
    sample_rate_index: usize,
    pub stereo: bool,
    pub low_latency: bool,
}

impl RecordingSettings {
    pub fn format_index(&self) -> usize {
        self.format_index
    }

    pub fn sample_rate_index(&self) -> usize {
        self.sample_rate_index
    }

    pub fn format(&self) -> RecordingFormat {
        RECORDING_FORMATS[self.format_index.min(RECORDING_FORMATS.len() - 1)]
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES[self.sample_rate_index.min(SAMPLE_RATES.len() - 1)]
    }

    pub fn channels(&self) -> u16 {
        if self.stereo {
            2
        } else {
            1
        }
    }

    pub fn io_buffer_duration(&self) -> IoBufferDuration {
        if self.low_latency {
            IoBufferDuration::Fast
        } else {
            IoBufferDuration::Relaxed
        }
    }

    /// Switch file format.
    ///
    /// Moving to a compressed format while a high sample rate is selected
    /// clamps the rate to 48 kHz. Returns `true` when that clamp happened.
    /// Re-selecting the current format is a no-op.
    pub fn select_format(&mut self, index: usize) -> Result<bool, CaptureError> {
        let format = *RECORDING_FORMATS.get(index).ok_or_else(|| {
            CaptureError::ConfigurationFailed(format!("no format at index {}", index))
        })?;
        if index == self.format_index {
            return Ok(false);
        }
        self.format_index = index;

        let max = format.max_sample_rate_index();
        if self.sample_rate_index > max {
            log::info!(
                "{} does not support {} Hz; sample rate set to {} Hz",
                format,
                SAMPLE_RATES[self.sample_rate_index],
                SAMPLE_RATES[max]
            );
            self.sample_rate_index = max;
            return Ok(true);
        }
        Ok(false)
    }

    /// Pick a sample rate. Rates the current format cannot carry are rejected.
    pub fn select_sample_rate(&mut self, index: usize) -> Result<(), CaptureError> {
        if index >= SAMPLE_RATES.len() {
            return Err(CaptureError::ConfigurationFailed(format!(
                "no sample rate at index {}",
                index
            )));
        }
        if index > self.format().max_sample_rate_index() {
            return Err(CaptureError::ConfigurationFailed(format!(
                "{} Hz is not available for {}",
                SAMPLE_RATES[index],
                self.format()
            )));
        }
        self.sample_rate_index = index;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.format_index >= RECORDING_FORMATS.len() {
            return Err(CaptureError::ConfigurationFailed(format!(
                "format index {} out of range",
                self.format_index
            )));
        }
        if self.sample_rate_index >= SAMPLE_RATES.len() {
            return Err(CaptureError::ConfigurationFailed(format!(
                "sample rate index {} out of range",
                self.sample_rate_index
            )));
        }
        if self.sample_rate_index > self.format().max_sample_rate_index() {
            return Err(CaptureError::ConfigurationFailed(format!(
                "{} Hz is not available for {}",
                self.sample_rate(),
                self.format()
            )));
        }
        Ok(())
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            format_index: 0,
            sample_rate_index: 0,
            stereo: true,
            low_latency: false,
        }
    }
}

/// Everything one capture needs, frozen at `start()`.
#[derive(Clone)]
pub struct CaptureConfiguration {
    pub format: RecordingFormat,

    /// Target file sample rate in Hz.
    pub sample_rate: u32,

    /// Bit depth for PCM output. Only 16 is written.
    pub bit_depth: u16,

    /// 1 = mono, 2 = stereo.
    pub channels: u16,

    pub io_buffer: IoBufferDuration,

    /// Directory holding both the temporary and the final files.
    pub output_directory: PathBuf,

    /// Encoder prototype for compressed formats; cloned per capture.
    pub encoder: Option<Box<dyn CompressedEncoder>>,
}

impl CaptureConfiguration {
    pub fn from_settings(
        settings: &RecordingSettings,
        output_directory: PathBuf,
        encoder: Option<Box<dyn CompressedEncoder>>,
    ) -> Result<Self, CaptureError> {
        settings.validate()?;
        Ok(Self {
            format: settings.format(),
            sample_rate: settings.sample_rate(),
            bit_depth: 16,
            channels: settings.channels(),
            io_buffer: settings.io_buffer_duration(),
            output_directory,
            encoder,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.bit_depth != 16 {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.format.is_compressed() && self.encoder.is_none() {
            return Err(format!("no encoder available for {}", self.format));
        }
        Ok(())
    }
}

impl fmt::Debug for CaptureConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfiguration")
            .field("format", &self.format)
            .field("sample_rate", &self.sample_rate)
            .field("bit_depth", &self.bit_depth)
            .field("channels", &self.channels)
            .field("io_buffer", &self.io_buffer)
            .field("output_directory", &self.output_directory)
            .field("encoder", &self.encoder.as_ref().map(|e| e.format_name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_wav_44100_stereo() {
        let s = RecordingSettings::default();
        assert_eq!(s.format(), RecordingFormat::Wav);
        assert_eq!(s.sample_rate(), 44100);
        assert_eq!(s.channels(), 2);
        assert_eq!(s.io_buffer_duration(), IoBufferDuration::Relaxed);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn switching_to_m4a_clamps_high_rate_once() {
        let mut s = RecordingSettings::default();
        s.select_sample_rate(3).unwrap();
        assert_eq!(s.sample_rate(), 96000);

        assert!(s.select_format(1).unwrap());
        assert_eq!(s.sample_rate(), 48000);
        assert_eq!(s.sample_rate_index(), 1);

        // Re-selecting the same format does not trigger the rule again.
        assert!(!s.select_format(1).unwrap());
        assert_eq!(s.sample_rate_index(), 1);
    }

    #[test]
    fn switching_to_m4a_keeps_allowed_rate() {
        let mut s = RecordingSettings::default();
        assert!(!s.select_format(1).unwrap());
        assert_eq!(s.sample_rate(), 44100);
    }

    #[test]
    fn m4a_rejects_high_rate_selection() {
        let mut s = RecordingSettings::default();
        s.select_format(1).unwrap();
        assert!(matches!(
            s.select_sample_rate(2),
            Err(CaptureError::ConfigurationFailed(_))
        ));
        assert_eq!(s.sample_rate(), 44100);
    }

    #[test]
    fn back_to_wav_allows_high_rates_again() {
        let mut s = RecordingSettings::default();
        s.select_format(1).unwrap();
        s.select_format(0).unwrap();
        s.select_sample_rate(2).unwrap();
        assert_eq!(s.sample_rate(), 88200);
    }

    #[test]
    fn out_of_range_format_rejected() {
        let mut s = RecordingSettings::default();
        assert!(s.select_format(7).is_err());
        assert_eq!(s.format_index(), 0);
    }

    #[test]
    fn format_labels_and_extensions() {
        assert_eq!(RecordingFormat::from_label("m4a"), Some(RecordingFormat::M4a));
        assert_eq!(RecordingFormat::from_label("WAV"), Some(RecordingFormat::Wav));
        assert_eq!(RecordingFormat::from_label("flac"), None);
        assert_eq!(RecordingFormat::M4a.extension(), "m4a");
    }

    #[test]
    fn io_buffer_frames() {
        assert_eq!(IoBufferDuration::Fast.frames_at(48000.0), 240);
        assert_eq!(IoBufferDuration::Relaxed.frames_at(44100.0), 441);
    }

    #[test]
    fn compressed_configuration_requires_encoder() {
        let mut s = RecordingSettings::default();
        s.select_format(1).unwrap();
        let config = CaptureConfiguration::from_settings(&s, PathBuf::from("."), None).unwrap();
        assert!(config.validate().is_err());
    }
}
