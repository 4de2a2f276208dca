use crate::traits::processor::Processor;

use super::node_config::ReverbPreset;

/// Comb delays in samples at 44.1 kHz.
const COMB_TUNING: [usize; 4] = [1116, 1188, 1277, 1356];
const ALLPASS_TUNING: [usize; 2] = [556, 441];
/// Extra delay on odd channels to decorrelate left and right.
const STEREO_SPREAD: usize = 23;
const REFERENCE_RATE: f32 = 44100.0;
const ALLPASS_FEEDBACK: f32 = 0.5;
/// Keeps the summed comb output near unity.
const INPUT_GAIN: f32 = 0.015;

struct PresetShape {
    feedback: f32,
    damping: f32,
}

fn shape(preset: ReverbPreset) -> PresetShape {
    match preset {
        ReverbPreset::Plate => PresetShape {
            feedback: 0.82,
            damping: 0.15,
        },
    }
}

struct Comb {
    buffer: Vec<f32>,
    index: usize,
    store: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
            store: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32, feedback: f32, damping: f32) -> f32 {
        let output = self.buffer[self.index];
        self.store = output * (1.0 - damping) + self.store * damping;
        self.buffer[self.index] = input + self.store * feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.store = 0.0;
    }
}

struct AllPass {
    buffer: Vec<f32>,
    index: usize,
}

impl AllPass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.index];
        let output = delayed - input;
        self.buffer[self.index] = input + delayed * ALLPASS_FEEDBACK;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
    }
}

struct ChannelTank {
    combs: Vec<Comb>,
    allpasses: Vec<AllPass>,
}

/// Schroeder-style reverb with a wet/dry mix given in percent.
pub struct ReverbProcessor {
    tanks: Vec<ChannelTank>,
    wet: f32,
    dry: f32,
    feedback: f32,
    damping: f32,
}

impl ReverbProcessor {
    pub fn new(preset: ReverbPreset, wet_dry_mix: f32, sample_rate: f32, channels: usize) -> Self {
        let scale = sample_rate / REFERENCE_RATE;
        let tanks = (0..channels.max(1))
            .map(|ch| {
                let spread = if ch % 2 == 1 { STEREO_SPREAD } else { 0 };
                ChannelTank {
                    combs: COMB_TUNING
                        .iter()
                        .map(|&len| Comb::new(((len + spread) as f32 * scale) as usize))
                        .collect(),
                    allpasses: ALLPASS_TUNING
                        .iter()
                        .map(|&len| AllPass::new(((len + spread) as f32 * scale) as usize))
                        .collect(),
                }
            })
            .collect();
        let wet = (wet_dry_mix / 100.0).clamp(0.0, 1.0);
        let shape = shape(preset);
        Self {
            tanks,
            wet,
            dry: 1.0 - wet,
            feedback: shape.feedback,
            damping: shape.damping,
        }
    }
}

impl Processor for ReverbProcessor {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let (feedback, damping) = (self.feedback, self.damping);
        for frame in buffer.chunks_mut(channels) {
            for (sample, tank) in frame.iter_mut().zip(self.tanks.iter_mut()) {
                let input = *sample * INPUT_GAIN;
                let mut acc = 0.0;
                for comb in &mut tank.combs {
                    acc += comb.tick(input, feedback, damping);
                }
                for allpass in &mut tank.allpasses {
                    acc = allpass.tick(acc);
                }
                *sample = *sample * self.dry + acc * self.wet;
            }
        }
    }

    fn reset(&mut self) {
        for tank in &mut self.tanks {
            tank.combs.iter_mut().for_each(Comb::clear);
            tank.allpasses.iter_mut().for_each(AllPass::clear);
        }
    }

    fn name(&self) -> &'static str {
        "reverb"
    }
}
