//! Canonical 44-byte RIFF/WAV header for 16-bit PCM.
//!
//! The writer emits a header with a zero data length on open and rewrites it
//! in place on close.

/// Bytes before the first sample.
pub const WAV_HEADER_SIZE: usize = 44;

/// `fmt ` chunk body length for plain PCM.
const PCM_FMT_CHUNK_LEN: u32 = 16;

/// WAVE_FORMAT_PCM.
const PCM_FORMAT_TAG: u16 = 1;

/// Sample layout described by a WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WavSpec {
    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Bytes per interleaved frame.
    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Header for `data_len` bytes of sample data.
    ///
    /// ```text
    /// RIFF <36 + data_len> WAVE
    /// fmt  <16> <tag=1> <channels> <rate> <byte rate> <block align> <bits>
    /// data <data_len>
    /// ```
    pub fn header(&self, data_len: u32) -> [u8; WAV_HEADER_SIZE] {
        let mut bytes = Vec::with_capacity(WAV_HEADER_SIZE);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(WAV_HEADER_SIZE as u32 - 8 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");

        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&PCM_FMT_CHUNK_LEN.to_le_bytes());
        bytes.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
        bytes.extend_from_slice(&self.channels.to_le_bytes());
        bytes.extend_from_slice(&self.sample_rate.to_le_bytes());
        bytes.extend_from_slice(&self.byte_rate().to_le_bytes());
        bytes.extend_from_slice(&self.block_align().to_le_bytes());
        bytes.extend_from_slice(&self.bits_per_sample.to_le_bytes());

        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());

        let mut header = [0u8; WAV_HEADER_SIZE];
        header.copy_from_slice(&bytes);
        header
    }

    /// Read a canonical PCM header back. Returns the layout and data length.
    pub fn parse(header: &[u8]) -> Option<(Self, u32)> {
        if header.len() < WAV_HEADER_SIZE
            || &header[0..4] != b"RIFF"
            || &header[8..12] != b"WAVE"
            || &header[12..16] != b"fmt "
            || &header[36..40] != b"data"
        {
            return None;
        }
        let u16_at = |i: usize| u16::from_le_bytes([header[i], header[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]]);

        if u16_at(20) != PCM_FORMAT_TAG {
            return None;
        }
        let spec = Self::new(u32_at(24), u16_at(22), u16_at(34));
        Some((spec, u32_at(40)))
    }
}
