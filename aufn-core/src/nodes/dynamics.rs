use crate::traits::processor::Processor;

use super::node_config::DynamicsSettings;

/// Floor for level detection, keeps log10 finite on silence.
const MIN_LEVEL_DB: f32 = -120.0;

/// Feed-forward compressor with downward expansion below a second threshold.
///
/// A single gain is computed per frame from the loudest channel and applied to
/// all channels so the stereo image does not shift.
pub struct DynamicsProcessor {
    settings: DynamicsSettings,
    ratio: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed gain reduction in dB (≤ 0).
    gain_db: f32,
}

impl DynamicsProcessor {
    pub fn new(settings: DynamicsSettings, sample_rate: f32) -> Self {
        Self {
            ratio: settings.compression_ratio(),
            attack_coeff: time_coefficient(settings.attack_secs, sample_rate),
            release_coeff: time_coefficient(settings.release_secs, sample_rate),
            settings,
            gain_db: 0.0,
        }
    }

    /// Static gain curve: target gain change in dB for an input level in dB.
    pub fn target_gain_db(&self, level_db: f32) -> f32 {
        let s = &self.settings;
        if level_db > s.threshold_db {
            let out = s.threshold_db + (level_db - s.threshold_db) / self.ratio;
            out - level_db
        } else if level_db < s.expansion_threshold_db && level_db > MIN_LEVEL_DB {
            let out = s.expansion_threshold_db
                + (level_db - s.expansion_threshold_db) * s.expansion_ratio;
            (out - level_db).max(MIN_LEVEL_DB)
        } else {
            0.0
        }
    }
}

fn time_coefficient(secs: f32, sample_rate: f32) -> f32 {
    if secs <= 0.0 {
        return 0.0;
    }
    (-1.0 / (secs * sample_rate)).exp()
}

impl Processor for DynamicsProcessor {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        for frame in buffer.chunks_mut(channels.max(1)) {
            let peak = frame.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            let level_db = if peak > 0.0 {
                (20.0 * peak.log10()).max(MIN_LEVEL_DB)
            } else {
                MIN_LEVEL_DB
            };
            let target = self.target_gain_db(level_db);
            // more reduction = attack, less = release
            let coeff = if target < self.gain_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain_db = target + coeff * (self.gain_db - target);

            let gain = 10f32.powf(self.gain_db / 20.0);
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn reset(&mut self) {
        self.gain_db = 0.0;
    }

    fn name(&self) -> &'static str {
        "dynamics"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DynamicsSettings {
        DynamicsSettings {
            threshold_db: -24.0,
            headroom_db: 5.0,
            expansion_ratio: 2.0,
            expansion_threshold_db: -40.0,
            attack_secs: 0.01,
            release_secs: 0.5,
        }
    }

    #[test]
    fn unity_between_thresholds() {
        let p = DynamicsProcessor::new(settings(), 48000.0);
        assert_eq!(p.target_gain_db(-30.0), 0.0);
    }

    #[test]
    fn compresses_above_threshold() {
        let p = DynamicsProcessor::new(settings(), 48000.0);
        // 24 dB over threshold at 4.8:1 → 5 dB over
        let g = p.target_gain_db(0.0);
        assert!((g - (-19.0)).abs() < 1e-4, "gain {}", g);
    }

    #[test]
    fn expands_below_expansion_threshold() {
        let p = DynamicsProcessor::new(settings(), 48000.0);
        // 10 dB under at 2:1 → 20 dB under
        let g = p.target_gain_db(-50.0);
        assert!((g - (-10.0)).abs() < 1e-4, "gain {}", g);
    }

    #[test]
    fn loud_signal_is_reduced_after_attack() {
        let mut p = DynamicsProcessor::new(settings(), 48000.0);
        let mut buffer = vec![0.9f32; 48000];
        p.process(&mut buffer, 1);
        assert!(buffer[47999] < 0.2, "last {}", buffer[47999]);
        assert!(buffer[0] > buffer[47999]);
    }

    #[test]
    fn reset_clears_envelope() {
        let mut p = DynamicsProcessor::new(settings(), 48000.0);
        let mut buffer = vec![0.9f32; 4800];
        p.process(&mut buffer, 1);
        p.reset();
        let mut probe = [0.1f32];
        p.process(&mut probe, 1);
        // -20 dBFS sits between the thresholds
        assert!((probe[0] - 0.1).abs() < 1e-6);
    }
}
