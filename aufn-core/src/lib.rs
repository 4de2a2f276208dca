//! # aufn-core
//!
//! Platform-agnostic recording core: a linear effect chain on a live input,
//! level metering, and capture to WAV or an encoded format.
//!
//! Platform backends implement the `AudioDevice` trait and hand it to a
//! `RecordingSession`, which owns the `SignalGraph` and serializes every
//! control operation.
//!
//! ## Architecture
//!
//! ```text
//! aufn-core (this crate)
//! ├── traits/       ← AudioDevice, Processor, CaptureDelegate, CompressedEncoder, PreferenceStore
//! ├── models/       ← EffectDescriptor, ChainSpec, RecordingSettings, errors, SessionState
//! ├── nodes/        ← effect resolution, EQ / dynamics / reverb stages
//! ├── graph/        ← SignalGraph (input → stages → output, taps)
//! ├── processing/   ← LevelBuffer, FormatConverter, WAV header generation
//! ├── session/      ← CaptureController, RecordingSession
//! └── storage/      ← RecordingWriter, file naming, preferences
//! ```

pub mod graph;
pub mod models;
pub mod nodes;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use graph::{Connection, Endpoint, RebuildReport, SignalGraph};
pub use models::audio_models::{InputDeviceInfo, IoPreferences, StreamFormat, TapPoint};
pub use models::config::{CaptureConfiguration, IoBufferDuration, RecordingFormat, RecordingSettings};
pub use models::effect::{ChainSpec, EffectDescriptor, EffectKind};
pub use models::error::{CaptureError, GraphError, ResolutionError};
pub use models::recording_result::RecordingResult;
pub use models::state::SessionState;
pub use nodes::factory::resolve;
pub use nodes::node_config::NodeConfig;
pub use processing::level_buffer::LevelBuffer;
pub use session::capture::CaptureController;
pub use session::recording::RecordingSession;
pub use storage::preferences::{MemoryPreferenceStore, Preferences};
pub use storage::recording_writer::RecordingWriter;
pub use traits::audio_device::{AudioDevice, DeviceErrorCallback, RenderCallback};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::encoder::CompressedEncoder;
pub use traits::preference_store::PreferenceStore;
pub use traits::processor::Processor;
