use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::SessionState;

/// Event sink for session notifications.
///
/// `on_levels_updated` is called from the audio thread. `on_error` for a lost
/// device comes from the device's error callback and the state change that
/// follows from the session's recovery thread. Everything else is called
/// from whichever thread issued the control operation. Implementations
/// should marshal to the UI thread if needed.
pub trait CaptureDelegate: Send + Sync {
    fn on_state_changed(&self, state: SessionState);

    /// Oldest-first snapshot of the level meter after each append.
    fn on_levels_updated(&self, levels: &[f32]);

    fn on_error(&self, error: &CaptureError);

    /// A recording was finalized and is ready to be listed.
    fn on_recording_available(&self, result: &RecordingResult);
}
