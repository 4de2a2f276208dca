//! Test doubles: a device that renders on the calling thread and a delegate
//! that records every notification.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{InputDeviceInfo, IoPreferences, StreamFormat};
use crate::models::error::{CaptureError, GraphError};
use crate::models::recording_result::RecordingResult;
use crate::models::state::SessionState;
use crate::traits::audio_device::{AudioDevice, DeviceErrorCallback, RenderCallback};
use crate::traits::capture_delegate::CaptureDelegate;

#[derive(Default)]
struct Shared {
    format: Option<StreamFormat>,
    render: Option<RenderCallback>,
    on_error: Option<DeviceErrorCallback>,
    fail_next_start: Option<String>,
    preferences: Option<IoPreferences>,
    start_count: usize,
}

/// Device whose buffers are pushed by the test through a `ManualHandle`.
pub(crate) struct ManualDevice {
    shared: Arc<Mutex<Shared>>,
}

/// Test-side control of a `ManualDevice` after it has been moved into a graph.
#[derive(Clone)]
pub(crate) struct ManualHandle {
    shared: Arc<Mutex<Shared>>,
}

impl ManualDevice {
    pub(crate) fn new(sample_rate: f64, channels: u16) -> (Self, ManualHandle) {
        let shared = Arc::new(Mutex::new(Shared {
            format: Some(StreamFormat::new(sample_rate, channels)),
            ..Default::default()
        }));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            ManualHandle { shared },
        )
    }
}

impl AudioDevice for ManualDevice {
    fn input_format(&self) -> Result<StreamFormat, GraphError> {
        self.shared
            .lock()
            .format
            .ok_or_else(|| GraphError::ConnectionFailed("no input".into()))
    }

    fn start(
        &mut self,
        preferences: IoPreferences,
        render: RenderCallback,
        on_error: DeviceErrorCallback,
    ) -> Result<(), GraphError> {
        let mut s = self.shared.lock();
        if let Some(reason) = s.fail_next_start.take() {
            return Err(GraphError::EngineStartFailed(reason));
        }
        s.render = Some(render);
        s.on_error = Some(on_error);
        s.preferences = Some(preferences);
        s.start_count += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), GraphError> {
        let mut s = self.shared.lock();
        s.render = None;
        s.on_error = None;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.shared.lock().render.is_some()
    }

    fn device_info(&self) -> InputDeviceInfo {
        InputDeviceInfo {
            id: "manual".into(),
            name: "Manual Test Input".into(),
            is_default: true,
        }
    }
}

impl ManualHandle {
    /// Deliver one buffer. Returns the rendered output, or an empty vec when
    /// the device is stopped.
    pub(crate) fn push(&self, samples: &[f32]) -> Vec<f32> {
        let render = self.shared.lock().render.clone();
        match render {
            Some(render) => {
                let mut buffer = samples.to_vec();
                render(&mut buffer);
                buffer
            }
            None => Vec::new(),
        }
    }

    /// Simulate the device vanishing mid-stream.
    pub(crate) fn fail(&self, reason: &str) {
        let on_error = self.shared.lock().on_error.clone();
        if let Some(on_error) = on_error {
            on_error(reason.to_string());
        }
    }

    pub(crate) fn fail_next_start(&self, reason: &str) {
        self.shared.lock().fail_next_start = Some(reason.to_string());
    }

    pub(crate) fn set_format(&self, format: StreamFormat) {
        self.shared.lock().format = Some(format);
    }

    pub(crate) fn last_preferences(&self) -> Option<IoPreferences> {
        self.shared.lock().preferences
    }

    pub(crate) fn start_count(&self) -> usize {
        self.shared.lock().start_count
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    State(SessionState),
    Levels(Vec<f32>),
    Error(CaptureError),
    Available(PathBuf),
}

/// Delegate that keeps every notification in arrival order.
#[derive(Default)]
pub(crate) struct EventLog {
    events: Mutex<Vec<Event>>,
}

impl EventLog {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub(crate) fn states(&self) -> Vec<SessionState> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::State(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn errors(&self) -> Vec<CaptureError> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Error(err) => Some(err.clone()),
                _ => None,
            })
            .collect()
    }
}

impl CaptureDelegate for EventLog {
    fn on_state_changed(&self, state: SessionState) {
        self.events.lock().push(Event::State(state));
    }

    fn on_levels_updated(&self, levels: &[f32]) {
        self.events.lock().push(Event::Levels(levels.to_vec()));
    }

    fn on_error(&self, error: &CaptureError) {
        self.events.lock().push(Event::Error(error.clone()));
    }

    fn on_recording_available(&self, result: &RecordingResult) {
        self.events.lock().push(Event::Available(result.file_path.clone()));
    }
}
