//! # aufn-cpal
//!
//! cpal backend for aufn-core.
//!
//! Provides:
//! - `CpalDevice`: `AudioDevice` over a cpal input stream, with optional
//!   monitoring on the default output device
//! - `DeviceEnumerator`: input device listing on the default host
//!
//! ## Usage
//! ```ignore
//! use aufn_core::{ChainSpec, EffectDescriptor, RecordingSession, RecordingSettings};
//! use aufn_cpal::CpalDevice;
//!
//! let device = CpalDevice::default_device().with_monitoring(true);
//! let session = RecordingSession::new(device, "/path/to/recordings".into());
//! session.apply_chain(ChainSpec::new(None, vec![EffectDescriptor::plugin("Reverb")]))?;
//! session.start(&RecordingSettings::default())?;
//! // ...
//! let result = session.stop()?;
//! ```

pub mod cpal_device;
pub mod device_enumerator;
pub mod error;

pub use cpal_device::CpalDevice;
pub use device_enumerator::DeviceEnumerator;
pub use error::CpalError;
