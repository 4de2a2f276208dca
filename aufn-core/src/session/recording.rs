use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread;

use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};

use crate::graph::{RebuildReport, SignalGraph};
use crate::models::config::{CaptureConfiguration, RecordingSettings};
use crate::models::effect::ChainSpec;
use crate::models::error::{CaptureError, GraphError};
use crate::models::recording_result::RecordingResult;
use crate::models::state::SessionState;
use crate::processing::level_buffer::LevelBuffer;
use crate::session::capture::CaptureController;
use crate::traits::audio_device::AudioDevice;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::encoder::CompressedEncoder;

/// Device faults waiting for the recovery thread.
const FAULT_QUEUE_CAPACITY: usize = 4;

/// Everything the control lock protects.
struct Inner<D: AudioDevice> {
    graph: SignalGraph<D>,
    controller: CaptureController,
    chain: ChainSpec,
    pending_chain: Option<ChainSpec>,
    encoder: Option<Box<dyn CompressedEncoder>>,
}

/// State shared with the device-fault recovery thread.
///
/// Lock order is `inner` before `state`. `state` is only held to read or
/// swap the value, never across graph calls or delegate callbacks.
struct Shared<D: AudioDevice> {
    inner: Mutex<Inner<D>>,
    state: Mutex<SessionState>,
    delegate: RwLock<Option<Arc<dyn CaptureDelegate>>>,
}

/// Owns the signal graph and capture controller and serializes every
/// control operation through one lock.
///
/// ```text
/// Idle ⇄ Armed → Recording → Finalizing → Idle
/// ```
///
/// A chain change while recording is held back and applied once the
/// session returns to Idle. Failures are reported to the delegate and
/// always leave the session in Idle. A device lost mid-recording is torn
/// down by a background thread: the delegate gets `DeviceUnavailable`,
/// then the session drops to Idle with the partial file left on disk.
///
/// Delegate callbacks may call `state()`, `is_recording()` and `levels()`.
/// They must not call any other session method.
pub struct RecordingSession<D: AudioDevice> {
    shared: Arc<Shared<D>>,
    levels: Arc<Mutex<LevelBuffer>>,
    output_directory: PathBuf,
}

impl<D: AudioDevice> RecordingSession<D> {
    pub fn new(device: D, output_directory: PathBuf) -> Self {
        let mut controller = CaptureController::new();
        let levels = controller.levels();
        let (fault_sink, faults) = crossbeam_channel::bounded(FAULT_QUEUE_CAPACITY);
        controller.set_fault_sink(fault_sink);

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                graph: SignalGraph::new(device),
                controller,
                chain: ChainSpec::empty(),
                pending_chain: None,
                encoder: None,
            }),
            state: Mutex::new(SessionState::Idle),
            delegate: RwLock::new(None),
        });

        let watched = Arc::downgrade(&shared);
        if let Err(e) = thread::Builder::new()
            .name("aufn-fault-recovery".into())
            .spawn(move || watch_faults(faults, watched))
        {
            log::error!("device fault recovery unavailable: {}", e);
        }

        Self {
            shared,
            levels,
            output_directory,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.shared
            .inner
            .lock()
            .controller
            .set_delegate(Arc::clone(&delegate));
        *self.shared.delegate.write() = Some(delegate);
    }

    /// Encoder prototype used for compressed formats.
    pub fn set_encoder(&mut self, encoder: Box<dyn CompressedEncoder>) {
        self.shared.inner.lock().encoder = Some(encoder);
    }

    pub fn output_directory(&self) -> &PathBuf {
        &self.output_directory
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_recording(&self) -> bool {
        self.shared.state().is_recording()
    }

    /// Current level history, oldest first.
    pub fn levels(&self) -> Vec<f32> {
        self.levels.lock().snapshot()
    }

    /// Chain currently wired (or last requested while idle).
    pub fn chain(&self) -> ChainSpec {
        self.shared.inner.lock().chain.clone()
    }

    /// Chain waiting for the current recording to finish.
    pub fn pending_chain(&self) -> Option<ChainSpec> {
        self.shared.inner.lock().pending_chain.clone()
    }

    /// Run `f` against the graph under the control lock.
    pub fn with_graph<R>(&self, f: impl FnOnce(&SignalGraph<D>) -> R) -> R {
        f(&self.shared.inner.lock().graph)
    }

    /// Adopt a new chain selection.
    ///
    /// While Idle or Armed the graph is rebuilt at once and the session is
    /// Armed; returns the rebuild report. While recording the chain is
    /// queued and `Ok(None)` is returned. A failed rebuild keeps the
    /// previous graph and state.
    pub fn apply_chain(&self, chain: ChainSpec) -> Result<Option<RebuildReport>, GraphError> {
        let shared = &*self.shared;
        let mut inner = shared.inner.lock();
        if !shared.state().accepts_rebuild() {
            log::info!("chain change deferred until recording ends");
            inner.pending_chain = Some(chain);
            return Ok(None);
        }

        let report = inner.graph.rebuild(&chain)?;
        inner.chain = chain;
        inner.pending_chain = None;
        shared.set_state(SessionState::Armed);
        Ok(Some(report))
    }

    /// Begin recording with `settings` frozen for this capture.
    pub fn start(&self, settings: &RecordingSettings) -> Result<(), CaptureError> {
        let shared = &*self.shared;
        let mut inner = shared.inner.lock();
        if !shared.state().accepts_start() {
            return Err(CaptureError::AlreadyRecording);
        }

        let config = match CaptureConfiguration::from_settings(
            settings,
            self.output_directory.clone(),
            inner.encoder.clone(),
        ) {
            Ok(config) => config,
            Err(e) => return Err(shared.fail(e)),
        };

        let Inner {
            graph,
            controller,
            chain,
            ..
        } = &mut *inner;
        if let Err(e) = controller.start(graph, chain, config) {
            return Err(shared.fail(e));
        }

        shared.set_state(SessionState::Recording);
        Ok(())
    }

    /// Stop recording and finalize the file.
    ///
    /// `NotRecording` when no capture is active; the state is left as is.
    pub fn stop(&self) -> Result<RecordingResult, CaptureError> {
        let shared = &*self.shared;
        let mut inner = shared.inner.lock();
        if !shared.state().is_recording() {
            return Err(CaptureError::NotRecording);
        }

        shared.set_state(SessionState::Finalizing);
        let Inner {
            graph, controller, ..
        } = &mut *inner;
        let result = controller.stop(graph);

        match result {
            Ok(result) => {
                shared.set_state(SessionState::Idle);
                shared.apply_pending(&mut inner);
                Ok(result)
            }
            Err(e @ CaptureError::DeviceUnavailable(_)) => {
                // Already reported by the device callback.
                log::warn!("recording ended by device loss: {}", e);
                shared.set_state(SessionState::Idle);
                shared.apply_pending(&mut inner);
                Err(e)
            }
            Err(e) => {
                let e = shared.fail(e);
                shared.apply_pending(&mut inner);
                Err(e)
            }
        }
    }

    /// Tear down an active recording without finalizing.
    ///
    /// Returns the path of the temporary file, which stays on disk. Call
    /// from a control thread, not from inside a device callback.
    pub fn abort(&self) -> Option<PathBuf> {
        let shared = &*self.shared;
        let mut inner = shared.inner.lock();
        if !shared.state().is_recording() {
            return None;
        }
        let Inner {
            graph, controller, ..
        } = &mut *inner;
        let temp_path = controller.abort(graph);
        shared.set_state(SessionState::Idle);
        shared.apply_pending(&mut inner);
        temp_path
    }
}

impl<D: AudioDevice> Shared<D> {
    fn state(&self) -> SessionState {
        *self.state.lock()
    }

    fn delegate(&self) -> Option<Arc<dyn CaptureDelegate>> {
        self.delegate.read().clone()
    }

    /// Report `error`, fall back to Idle and hand the error back.
    fn fail(&self, error: CaptureError) -> CaptureError {
        log::error!("recording session error: {}", error);
        if let Some(delegate) = self.delegate() {
            delegate.on_error(&error);
        }
        self.set_state(SessionState::Idle);
        error
    }

    /// Tear down a capture whose device went away. The delegate has already
    /// been told by the device callback.
    fn recover_from_device_loss(&self, reason: &str) {
        let mut inner = self.inner.lock();
        if !self.state().is_recording() || !inner.controller.has_device_fault() {
            return;
        }
        let Inner {
            graph, controller, ..
        } = &mut *inner;
        if let Some(temp_path) = controller.abort(graph) {
            log::warn!(
                "recording abandoned after device loss ({}); partial file at {}",
                reason,
                temp_path.display()
            );
        }
        self.set_state(SessionState::Idle);
        self.apply_pending(&mut inner);
    }

    /// Wire a chain that arrived while recording. Leaves Idle for Armed on
    /// success; a failure is logged and the session stays Idle.
    fn apply_pending(&self, inner: &mut Inner<D>) {
        let Some(chain) = inner.pending_chain.take() else {
            return;
        };
        match inner.graph.rebuild(&chain) {
            Ok(report) => {
                log::info!("applied deferred chain: {:?}", report.attached);
                inner.chain = chain;
                self.set_state(SessionState::Armed);
            }
            Err(e) => log::warn!("deferred chain could not be wired: {}", e),
        }
    }

    fn set_state(&self, state: SessionState) {
        let previous = {
            let mut current = self.state.lock();
            if *current == state {
                return;
            }
            std::mem::replace(&mut *current, state)
        };
        log::debug!("session {} -> {}", previous.name(), state.name());
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(state);
        }
    }
}

/// Recovery thread body. Ends when the session is gone or its controller
/// (the only sender) has been dropped.
fn watch_faults<D: AudioDevice>(faults: Receiver<String>, shared: Weak<Shared<D>>) {
    for reason in faults.iter() {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.recover_from_device_loss(&reason);
    }
    log::trace!("device fault recovery thread finished");
}
