use std::f32::consts::{LN_2, PI};

use crate::traits::processor::Processor;

use super::node_config::{EqBand, FilterType};

/// Butterworth Q for the pass filters.
const PASS_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

const DENORMAL_THRESHOLD: f32 = 1e-15;

/// Normalized RBJ cookbook coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    fn for_band(band: &EqBand, sample_rate: f32) -> Self {
        let nyquist = sample_rate * 0.5;
        let freq = band.frequency.clamp(20.0, nyquist * 0.95);
        let omega0 = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega0.sin();
        let cos_omega = omega0.cos();
        let a = 10f32.powf(band.gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match band.filter_type {
            FilterType::HighPass => {
                let alpha = sin_omega / (2.0 * PASS_Q);
                (
                    (1.0 + cos_omega) / 2.0,
                    -(1.0 + cos_omega),
                    (1.0 + cos_omega) / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_omega,
                    1.0 - alpha,
                )
            }
            FilterType::LowPass => {
                let alpha = sin_omega / (2.0 * PASS_Q);
                (
                    (1.0 - cos_omega) / 2.0,
                    1.0 - cos_omega,
                    (1.0 - cos_omega) / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_omega,
                    1.0 - alpha,
                )
            }
            FilterType::Parametric => {
                let bw = band.bandwidth.clamp(0.05, 5.0);
                let alpha = sin_omega * (LN_2 / 2.0 * bw * omega0 / sin_omega).sinh();
                (
                    1.0 + alpha * a,
                    -2.0 * cos_omega,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_omega,
                    1.0 - alpha / a,
                )
            }
            FilterType::LowShelf => {
                // shelf slope S = 1
                let alpha = sin_omega / 2.0 * std::f32::consts::SQRT_2;
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
                    a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
                    (a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha,
                )
            }
            FilterType::HighShelf => {
                let alpha = sin_omega / 2.0 * std::f32::consts::SQRT_2;
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
                    a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
                    (a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Direct Form I delay line for one channel.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

/// One biquad band, with independent state per channel.
#[derive(Debug, Clone)]
pub struct Biquad {
    coefficients: Coefficients,
    states: Vec<ChannelState>,
}

impl Biquad {
    pub fn new(band: &EqBand, sample_rate: f32, channels: usize) -> Self {
        Self {
            coefficients: Coefficients::for_band(band, sample_rate),
            states: vec![ChannelState::default(); channels.max(1)],
        }
    }

    #[inline]
    fn tick(&mut self, channel: usize, input: f32) -> f32 {
        let c = self.coefficients;
        let s = &mut self.states[channel];
        let mut output = c.b0 * input + c.b1 * s.x1 + c.b2 * s.x2 - c.a1 * s.y1 - c.a2 * s.y2;
        if output.abs() < DENORMAL_THRESHOLD {
            output = 0.0;
        }
        s.x2 = s.x1;
        s.x1 = input;
        s.y2 = s.y1;
        s.y1 = output;
        output
    }

    fn reset(&mut self) {
        self.states.fill(ChannelState::default());
    }
}

/// Multi-band equalizer: bands run in series.
pub struct EqProcessor {
    bands: Vec<Biquad>,
}

impl EqProcessor {
    pub fn new(bands: &[EqBand], sample_rate: f32, channels: usize) -> Self {
        Self {
            bands: bands
                .iter()
                .map(|b| Biquad::new(b, sample_rate, channels))
                .collect(),
        }
    }
}

impl Processor for EqProcessor {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for band in &mut self.bands {
            let tracked = band.states.len();
            for frame in buffer.chunks_mut(channels) {
                for (ch, sample) in frame.iter_mut().enumerate().take(tracked) {
                    *sample = band.tick(ch, *sample);
                }
            }
        }
    }

    fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
    }

    fn name(&self) -> &'static str {
        "equalizer"
    }
}
