//! Input device enumeration via the cpal default host.

use cpal::traits::{DeviceTrait, HostTrait};

use aufn_core::models::audio_models::InputDeviceInfo;

use crate::error::CpalError;

/// Lists and resolves input devices on the default host.
pub struct DeviceEnumerator {
    host: cpal::Host,
}

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Every input device the host reports, default first.
    pub fn list_input_devices(&self) -> Result<Vec<InputDeviceInfo>, CpalError> {
        let default_name = self
            .host
            .default_input_device()
            .and_then(|d| d.name().ok());

        let devices = self
            .host
            .input_devices()
            .map_err(|e| CpalError::Enumeration(e.to_string()))?;

        let mut infos: Vec<InputDeviceInfo> = devices
            .filter_map(|device| match device.name() {
                Ok(name) => Some(name),
                Err(e) => {
                    log::debug!("skipping unnamed input device: {}", e);
                    None
                }
            })
            .map(|name| InputDeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                id: name.clone(),
                name,
            })
            .collect();
        infos.sort_by_key(|info| !info.is_default);
        Ok(infos)
    }

    /// The named input device, or the host default when `name` is `None`.
    pub fn input_device(&self, name: Option<&str>) -> Result<cpal::Device, CpalError> {
        let Some(name) = name else {
            return self.host.default_input_device().ok_or(CpalError::NoInputDevice);
        };
        self.host
            .input_devices()
            .map_err(|e| CpalError::Enumeration(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CpalError::DeviceNotFound(name.to_string()))
    }

    pub fn default_output_device(&self) -> Option<cpal::Device> {
        self.host.default_output_device()
    }
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}
