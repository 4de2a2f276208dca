use crate::models::audio_models::StreamFormat;

/// Converts graph-format audio into the layout the recording file expects.
///
/// Runs on the writer thread, never in the render callback:
/// ```text
/// [graph: rate R, N ch] → channel remap → linear resample → [file: rate F, M ch]
/// ```
///
/// The resampler is continuous across calls: the fractional read position
/// and the last frame of the previous buffer carry over, so a stream of
/// buffers converts exactly like one long buffer.
#[derive(Debug, Clone)]
pub struct FormatConverter {
    source: StreamFormat,
    target_sample_rate: f64,
    target_channels: u16,
    /// Source frames advanced per output frame.
    step: f64,
    /// Read position of the next output frame, relative to the start of the
    /// next buffer. `-1.0` addresses `last_frame`.
    position: f64,
    last_frame: Vec<f32>,
}

impl FormatConverter {
    pub fn new(source: StreamFormat, target_sample_rate: u32, target_channels: u16) -> Self {
        let target_sample_rate = target_sample_rate as f64;
        Self {
            source,
            target_sample_rate,
            target_channels,
            step: source.sample_rate / target_sample_rate,
            position: 0.0,
            last_frame: Vec::new(),
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.source.channels == self.target_channels && self.same_rate()
    }

    fn same_rate(&self) -> bool {
        (self.source.sample_rate - self.target_sample_rate).abs() < 0.01
    }

    /// Interleaved source samples → interleaved target samples.
    pub fn convert(&mut self, samples: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return samples.to_vec();
        }
        let remapped = self.remap(samples);
        if self.same_rate() {
            return remapped;
        }
        self.resample(&remapped)
    }

    /// Forget the carried position and frame, e.g. between recordings.
    pub fn reset(&mut self) {
        self.position = 0.0;
        self.last_frame.clear();
    }

    fn remap(&self, samples: &[f32]) -> Vec<f32> {
        let source_channels = self.source.channels as usize;
        match self.target_channels {
            1 => downmix_to_mono(samples, source_channels),
            _ => {
                let (left, right) = split_stereo(samples, source_channels);
                interleave(&left, &right)
            }
        }
    }

    /// Linear interpolation over interleaved frames in the target layout.
    fn resample(&mut self, samples: &[f32]) -> Vec<f32> {
        let channels = self.target_channels.max(1) as usize;
        let frame_count = samples.len() / channels;
        if frame_count == 0 {
            return Vec::new();
        }

        let capacity = ((frame_count as f64 - self.position) / self.step).ceil().max(0.0) as usize;
        let mut output = Vec::with_capacity(capacity * channels);
        let mut position = self.position;
        // An output frame needs both neighbours; the last frame waits for
        // the next buffer.
        while position < (frame_count - 1) as f64 {
            let index = position.floor() as isize;
            let fraction = (position - index as f64) as f32;
            let a = frame_at(samples, &self.last_frame, index, channels);
            let b = frame_at(samples, &self.last_frame, index + 1, channels);
            for ch in 0..channels {
                output.push(a[ch] * (1.0 - fraction) + b[ch] * fraction);
            }
            position += self.step;
        }

        self.position = position - frame_count as f64;
        self.last_frame.clear();
        self.last_frame
            .extend_from_slice(&samples[(frame_count - 1) * channels..frame_count * channels]);
        output
    }
}

/// Frame `index` of `samples`, where `-1` is the carried frame.
fn frame_at<'a>(samples: &'a [f32], carried: &'a [f32], index: isize, channels: usize) -> &'a [f32] {
    if index < 0 {
        return carried;
    }
    let start = index as usize * channels;
    &samples[start..start + channels]
}

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Left/right planes from an interleaved buffer. Mono is duplicated; channels
/// beyond the second are ignored.
fn split_stereo(samples: &[f32], channels: usize) -> (Vec<f32>, Vec<f32>) {
    if channels <= 1 {
        return (samples.to_vec(), samples.to_vec());
    }
    samples
        .chunks_exact(channels)
        .map(|frame| (frame[0], frame[1]))
        .unzip()
}

/// Interleave two mono channels into stereo `[L0, R0, L1, R1, ...]`.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    let frame_count = left.len().max(right.len());
    let mut stereo = vec![0.0f32; frame_count * 2];
    for i in 0..frame_count {
        stereo[i * 2] = left.get(i).copied().unwrap_or(0.0);
        stereo[i * 2 + 1] = right.get(i).copied().unwrap_or(0.0);
    }
    stereo
}

/// Convert f32 samples `[-1.0, 1.0]` to 16-bit PCM (little-endian bytes).
///
/// Clamps out-of-range values. Output length = `samples.len() * 2` bytes.
pub fn convert_to_int16_pcm(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let int16_value = (clamped * i16::MAX as f32) as i16;
        data.extend_from_slice(&int16_value.to_le_bytes());
    }
    data
}

/// RMS of one channel of an interleaved buffer: `sqrt(mean(x²))`.
pub fn channel_rms(samples: &[f32], channels: usize, channel: usize) -> f32 {
    let channels = channels.max(1);
    let mut sum_sq = 0.0f32;
    let mut count = 0usize;
    for frame in samples.chunks_exact(channels) {
        if let Some(s) = frame.get(channel) {
            sum_sq += s * s;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    (sum_sq / count as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rms_of_constant_is_its_magnitude() {
        let samples = vec![-0.4f32; 512];
        assert_relative_eq!(channel_rms(&samples, 1, 0), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn rms_of_alternating_sign() {
        let samples: Vec<f32> = (0..512).map(|i| if i % 2 == 0 { 0.3 } else { -0.3 }).collect();
        assert_relative_eq!(channel_rms(&samples, 1, 0), 0.3, epsilon = 1e-6);
    }

    #[test]
    fn rms_reads_only_requested_channel() {
        let samples: Vec<f32> = (0..256).flat_map(|_| [0.5, 1.0]).collect();
        assert_relative_eq!(channel_rms(&samples, 2, 0), 0.5, epsilon = 1e-6);
        assert_relative_eq!(channel_rms(&samples, 2, 1), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn rms_of_empty_is_zero() {
        assert_eq!(channel_rms(&[], 2, 0), 0.0);
    }

    #[test]
    fn passthrough_when_formats_match() {
        let mut conv = FormatConverter::new(StreamFormat::new(48000.0, 2), 48000, 2);
        assert!(conv.is_passthrough());
        assert_eq!(conv.convert(&[0.1, 0.2]), vec![0.1, 0.2]);
    }

    #[test]
    fn stereo_to_mono_averages() {
        let mut conv = FormatConverter::new(StreamFormat::new(48000.0, 2), 48000, 1);
        let mono = conv.convert(&[0.2, 0.8, 0.4, 0.6]);
        assert_eq!(mono.len(), 2);
        assert_relative_eq!(mono[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(mono[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn mono_to_stereo_duplicates() {
        let mut conv = FormatConverter::new(StreamFormat::new(44100.0, 1), 44100, 2);
        assert_eq!(conv.convert(&[0.1, 0.2]), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn upsample_2x_interpolates_across_buffers() {
        let mut conv = FormatConverter::new(StreamFormat::new(24000.0, 1), 48000, 1);
        let first = conv.convert(&[0.0, 1.0]);
        let second = conv.convert(&[2.0, 3.0]);

        let all: Vec<f32> = first.into_iter().chain(second).collect();
        let expected = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5];
        assert_eq!(all.len(), expected.len());
        for (got, want) in all.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn resample_stereo_downsample_keeps_frames_aligned() {
        let mut conv = FormatConverter::new(StreamFormat::new(96000.0, 2), 48000, 2);
        let input: Vec<f32> = (0..100).flat_map(|i| [i as f32, -(i as f32)]).collect();
        let out = conv.convert(&input);
        assert_eq!(out.len(), 100);
        for frame in out.chunks_exact(2) {
            assert_eq!(frame[0], -frame[1]);
        }
    }

    #[test]
    fn buffered_stream_keeps_every_frame() {
        // 100 buffers of 512 stereo frames at 48 kHz written at 44.1 kHz.
        let mut conv = FormatConverter::new(StreamFormat::new(48000.0, 2), 44100, 2);
        let mut output = Vec::new();
        for buffer in 0..100 {
            let input: Vec<f32> = (0..512)
                .flat_map(|i| {
                    let t = (buffer * 512 + i) as f32 * 1e-4;
                    [t, -t]
                })
                .collect();
            output.extend(conv.convert(&input));
        }

        assert_eq!(output.len() / 2, 51200 * 44100 / 48000);

        // A ramp stays a ramp: no repeated samples or jumps at buffer edges.
        let step = 48000.0 / 44100.0;
        for (k, frame) in output.chunks_exact(2).enumerate() {
            let expected = (k as f64 * step * 1e-4) as f32;
            assert_relative_eq!(frame[0], expected, epsilon = 1e-4);
            assert_relative_eq!(frame[1], -expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn reset_starts_a_fresh_stream() {
        let mut conv = FormatConverter::new(StreamFormat::new(24000.0, 1), 48000, 1);
        conv.convert(&[0.0, 1.0]);
        conv.reset();
        let out = conv.convert(&[4.0, 6.0]);
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[0], 4.0, epsilon = 1e-6);
        assert_relative_eq!(out[1], 5.0, epsilon = 1e-6);
    }

    #[test]
    fn convert_to_int16_pcm_clamps() {
        let pcm = convert_to_int16_pcm(&[0.0, 1.0, -1.0, 2.0]);
        assert_eq!(pcm.len(), 8);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 0);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), -i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[6], pcm[7]]), i16::MAX);
    }

    #[test]
    fn interleave_unequal_lengths() {
        let result = interleave(&[1.0, 2.0], &[4.0, 5.0, 6.0]);
        assert_eq!(result, vec![1.0, 4.0, 2.0, 5.0, 0.0, 6.0]);
    }
}
