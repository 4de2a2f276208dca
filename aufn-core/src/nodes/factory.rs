//! Maps effect descriptors onto node configurations.
//!
//! Pure: nothing here touches the engine. `SignalGraph` instantiates the
//! returned configurations.

use crate::models::effect::{
    clamp_frequency, clamp_gain, EffectDescriptor, EffectKind, PARAM_FREQUENCY, PARAM_GAIN,
};
use crate::models::error::ResolutionError;

use super::node_config::{DynamicsSettings, EqBand, NodeConfig, ReverbPreset};

/// dB of band gain per unit of linear preset gain on the Custom preset.
const CUSTOM_GAIN_SCALE_DB: f32 = 10.0;

const CUSTOM_DEFAULT_GAIN: f32 = 0.5;
const CUSTOM_DEFAULT_FREQUENCY: f32 = 1000.0;

/// Resolve a descriptor.
///
/// Disabled descriptors resolve to `Ok(None)` (pass-through). Unknown names
/// are an error the caller is expected to log and skip.
pub fn resolve(descriptor: &EffectDescriptor) -> Result<Option<NodeConfig>, ResolutionError> {
    if !descriptor.enabled {
        return Ok(None);
    }
    let config = match descriptor.kind {
        EffectKind::MicrophonePreset => resolve_preset(descriptor),
        EffectKind::Plugin => resolve_plugin(&descriptor.name),
    };
    config
        .map(Some)
        .ok_or_else(|| ResolutionError::UnknownEffect(descriptor.name.clone()))
}

fn resolve_preset(descriptor: &EffectDescriptor) -> Option<NodeConfig> {
    let bands = match descriptor.name.as_str() {
        // SM7B-style dynamic
        "Dynamic" => vec![
            EqBand::high_pass(50.0),
            EqBand::parametric(5000.0, 4.0, 1.0),
            EqBand::low_shelf(200.0, 2.0),
        ],
        // large-diaphragm tube condenser
        "Condenser" => vec![
            EqBand::high_shelf(2000.0, 4.0),
            EqBand::parametric(5000.0, 2.0, 1.0),
            EqBand::low_shelf(100.0, 2.0),
        ],
        "Ribbon" => vec![
            EqBand::high_pass(100.0),
            EqBand::low_shelf(200.0, 2.0),
            EqBand::parametric(4000.0, 4.0, 1.0),
        ],
        "Custom" => {
            let gain = clamp_gain(descriptor.parameter(PARAM_GAIN).unwrap_or(CUSTOM_DEFAULT_GAIN));
            let frequency = clamp_frequency(
                descriptor
                    .parameter(PARAM_FREQUENCY)
                    .unwrap_or(CUSTOM_DEFAULT_FREQUENCY),
            );
            let mut band = EqBand::high_pass(frequency);
            band.gain_db = gain * CUSTOM_GAIN_SCALE_DB;
            vec![band]
        }
        _ => return None,
    };
    Some(NodeConfig::Equalizer { bands })
}

fn resolve_plugin(name: &str) -> Option<NodeConfig> {
    match name.to_ascii_lowercase().as_str() {
        // LA-2A-style leveling
        "compressor" => Some(NodeConfig::Dynamics(DynamicsSettings {
            threshold_db: -24.0,
            headroom_db: 5.0,
            expansion_ratio: 2.0,
            expansion_threshold_db: -40.0,
            attack_secs: 0.01,
            release_secs: 0.5,
        })),
        // 1073-style console EQ
        "equalizer" => Some(NodeConfig::Equalizer {
            bands: vec![
                EqBand::low_shelf(110.0, 4.0),
                EqBand::parametric(1100.0, -3.0, 0.71),
                EqBand::high_shelf(10000.0, -2.0),
            ],
        }),
        "reverb" => Some(NodeConfig::Reverb {
            preset: ReverbPreset::Plate,
            wet_dry_mix: 30.0,
        }),
        _ => None,
    }
}
