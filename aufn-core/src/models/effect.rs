use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Preset input gain bounds (linear).
pub const GAIN_RANGE: (f32, f32) = (0.0, 2.0);

/// Preset frequency bounds in Hz.
pub const FREQUENCY_RANGE: (f32, f32) = (20.0, 20000.0);

pub const PARAM_GAIN: &str = "gain";
pub const PARAM_FREQUENCY: &str = "frequency";

/// Which slot of the chain a descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
    MicrophonePreset,
    Plugin,
}

/// Pure-data description of one processing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDescriptor {
    pub kind: EffectKind,
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f32>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl EffectDescriptor {
    pub fn plugin(name: impl Into<String>) -> Self {
        Self {
            kind: EffectKind::Plugin,
            name: name.into(),
            parameters: BTreeMap::new(),
            enabled: true,
        }
    }

    /// A microphone preset with its gain/frequency clamped to the allowed ranges.
    pub fn microphone_preset(name: impl Into<String>, gain: f32, frequency: f32) -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert(PARAM_GAIN.to_string(), clamp_gain(gain));
        parameters.insert(PARAM_FREQUENCY.to_string(), clamp_frequency(frequency));
        Self {
            kind: EffectKind::MicrophonePreset,
            name: name.into(),
            parameters,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn parameter(&self, key: &str) -> Option<f32> {
        self.parameters.get(key).copied()
    }

    /// Update a numeric parameter, applying the preset clamps for gain and frequency.
    pub fn set_parameter(&mut self, key: &str, value: f32) {
        let value = match key {
            PARAM_GAIN => clamp_gain(value),
            PARAM_FREQUENCY => clamp_frequency(value),
            _ => value,
        };
        self.parameters.insert(key.to_string(), value);
    }

    /// Case-insensitive name comparison; plugin lookups ignore case.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        return GAIN_RANGE.0;
    }
    gain.clamp(GAIN_RANGE.0, GAIN_RANGE.1)
}

pub fn clamp_frequency(frequency: f32) -> f32 {
    if frequency.is_nan() {
        return FREQUENCY_RANGE.0;
    }
    frequency.clamp(FREQUENCY_RANGE.0, FREQUENCY_RANGE.1)
}

/// The four microphone presets, with their default settings.
pub fn default_microphone_presets() -> Vec<EffectDescriptor> {
    vec![
        EffectDescriptor::microphone_preset("Dynamic", 0.5, 1000.0),
        EffectDescriptor::microphone_preset("Condenser", 0.7, 1500.0),
        EffectDescriptor::microphone_preset("Ribbon", 0.4, 800.0),
        EffectDescriptor::microphone_preset("Custom", 0.5, 1000.0),
    ]
}

/// The built-in plugins.
pub fn default_plugins() -> Vec<EffectDescriptor> {
    ["Compressor", "Equalizer", "Reverb"]
        .into_iter()
        .map(EffectDescriptor::plugin)
        .collect()
}

/// Ordered selection of stages applied to the live signal.
///
/// The microphone preset, when present, always runs first; plugins follow in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSpec {
    microphone_preset: Option<EffectDescriptor>,
    #[serde(default)]
    plugins: Vec<EffectDescriptor>,
}

impl ChainSpec {
    pub fn new(microphone_preset: Option<EffectDescriptor>, plugins: Vec<EffectDescriptor>) -> Self {
        let microphone_preset = microphone_preset.map(|mut p| {
            p.kind = EffectKind::MicrophonePreset;
            p
        });
        let plugins = plugins
            .into_iter()
            .map(|mut p| {
                p.kind = EffectKind::Plugin;
                p
            })
            .collect();
        Self {
            microphone_preset,
            plugins,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn microphone_preset(&self) -> Option<&EffectDescriptor> {
        self.microphone_preset.as_ref()
    }

    pub fn plugins(&self) -> &[EffectDescriptor] {
        &self.plugins
    }

    /// Replace the microphone preset. `None` clears it.
    pub fn select_microphone_preset(&mut self, preset: Option<EffectDescriptor>) {
        self.microphone_preset = preset.map(|mut p| {
            p.kind = EffectKind::MicrophonePreset;
            p
        });
    }

    /// Remove the plugin if it is selected, otherwise append it.
    /// Returns `true` when the plugin is now part of the chain.
    pub fn toggle_plugin(&mut self, mut plugin: EffectDescriptor) -> bool {
        if let Some(pos) = self.plugins.iter().position(|p| p.is_named(&plugin.name)) {
            self.plugins.remove(pos);
            false
        } else {
            plugin.kind = EffectKind::Plugin;
            self.plugins.push(plugin);
            true
        }
    }

    /// All stages in processing order.
    pub fn stages(&self) -> impl Iterator<Item = &EffectDescriptor> {
        self.microphone_preset.iter().chain(self.plugins.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.microphone_preset.is_none() && self.plugins.is_empty()
    }

    /// Names of the enabled stages, in processing order.
    pub fn resolved_stage_names(&self) -> Vec<&str> {
        self.stages()
            .filter(|d| d.enabled)
            .map(|d| d.name.as_str())
            .collect()
    }
}
