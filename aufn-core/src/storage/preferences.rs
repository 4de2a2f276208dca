use std::collections::HashMap;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::config::RecordingSettings;
use crate::models::effect::{ChainSpec, EffectDescriptor};
use crate::models::error::CaptureError;
use crate::traits::preference_store::PreferenceStore;

pub const KEY_RECORDING_SETTINGS: &str = "recordingSettings";
pub const KEY_MICROPHONE_PRESET: &str = "microphonePreset";
pub const KEY_PLUGINS: &str = "plugins";

/// In-process store, used by tests and hosts without persistence.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self, key: &str) -> Option<Vec<u8>> {
        self.values.lock().get(key).cloned()
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<(), CaptureError> {
        self.values.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// JSON encoding of recording settings and the selected chain.
///
/// Reads never fail: a missing, corrupt, or invalid value falls back to the
/// default and logs a warning.
pub struct Preferences<S: PreferenceStore> {
    store: S,
}

impl<S: PreferenceStore> Preferences<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load_settings(&self) -> RecordingSettings {
        match self.read::<RecordingSettings>(KEY_RECORDING_SETTINGS) {
            Some(settings) => match settings.validate() {
                Ok(()) => settings,
                Err(e) => {
                    log::warn!("stored recording settings rejected ({}), using defaults", e);
                    RecordingSettings::default()
                }
            },
            None => RecordingSettings::default(),
        }
    }

    pub fn save_settings(&self, settings: &RecordingSettings) -> Result<(), CaptureError> {
        self.write(KEY_RECORDING_SETTINGS, settings)
    }

    pub fn load_chain(&self) -> ChainSpec {
        let preset = self
            .read::<Option<EffectDescriptor>>(KEY_MICROPHONE_PRESET)
            .flatten();
        let plugins = self
            .read::<Vec<EffectDescriptor>>(KEY_PLUGINS)
            .unwrap_or_default();
        ChainSpec::new(preset, plugins)
    }

    pub fn save_chain(&self, chain: &ChainSpec) -> Result<(), CaptureError> {
        self.write(KEY_MICROPHONE_PRESET, &chain.microphone_preset())?;
        self.write(KEY_PLUGINS, chain.plugins())
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.store.load(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("ignoring corrupt preference '{}': {}", key, e);
                None
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CaptureError> {
        let json = serde_json::to_vec(value)
            .map_err(|e| CaptureError::StorageError(format!("failed to serialize {}: {}", key, e)))?;
        self.store.save(key, &json)
    }
}
