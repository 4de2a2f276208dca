use std::sync::Arc;

use crate::models::audio_models::{InputDeviceInfo, IoPreferences, StreamFormat};
use crate::models::error::GraphError;

/// Callback invoked once per hardware buffer.
///
/// `buffer` holds interleaved f32 input samples in the device's native format.
/// The callback processes it in place; whatever it leaves behind is the
/// signal routed to the hardware output.
pub type RenderCallback = Arc<dyn Fn(&mut [f32]) + Send + Sync + 'static>;

/// Callback invoked when the device disappears or revokes access mid-stream.
pub type DeviceErrorCallback = Arc<dyn Fn(String) + Send + Sync + 'static>;

/// Platform audio input/output that drives the signal graph.
///
/// Implemented by:
/// - `CpalDevice` (aufn-cpal)
pub trait AudioDevice: Send + 'static {
    /// Native format of the hardware input. Every graph link uses it.
    fn input_format(&self) -> Result<StreamFormat, GraphError>;

    /// Start streaming, calling `render` for every buffer.
    ///
    /// The callback runs on a real-time audio thread; keep work bounded.
    fn start(
        &mut self,
        preferences: IoPreferences,
        render: RenderCallback,
        on_error: DeviceErrorCallback,
    ) -> Result<(), GraphError>;

    /// Stop streaming. After this returns no further callbacks fire.
    fn stop(&mut self) -> Result<(), GraphError>;

    fn is_running(&self) -> bool;

    fn device_info(&self) -> InputDeviceInfo;
}
