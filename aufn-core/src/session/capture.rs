use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::graph::{SignalGraph, TapCallback};
use crate::models::audio_models::{IoPreferences, StreamFormat, TapPoint};
use crate::models::config::CaptureConfiguration;
use crate::models::effect::ChainSpec;
use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::processing::format_converter::{channel_rms, FormatConverter};
use crate::processing::level_buffer::{LevelBuffer, LEVEL_HISTORY};
use crate::storage::file_naming;
use crate::storage::recording_writer::RecordingWriter;
use crate::traits::audio_device::{AudioDevice, DeviceErrorCallback};
use crate::traits::capture_delegate::CaptureDelegate;

/// Buffers the disk tap may queue ahead of the writer thread.
pub const DISK_QUEUE_CAPACITY: usize = 256;

/// Frames reserved in each pooled disk buffer before the first capture.
const POOLED_BUFFER_FRAMES: usize = 2048;

/// What the writer thread hands back once its queue closes.
struct WriterOutcome {
    checksum: String,
    duration_secs: f64,
}

/// One in-flight capture: temp file, writer thread and counters.
pub struct CaptureSession {
    config: CaptureConfiguration,
    temp_path: PathBuf,
    started_at: DateTime<Local>,
    dropped_buffers: Arc<AtomicU64>,
    device_fault: Arc<Mutex<Option<String>>>,
    writer_handle: Option<thread::JoinHandle<Result<WriterOutcome, CaptureError>>>,
}

impl CaptureSession {
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn dropped_buffers(&self) -> u64 {
        self.dropped_buffers.load(Ordering::Relaxed)
    }

    /// Reason of the device failure reported during this capture, if any.
    pub fn device_fault(&self) -> Option<String> {
        self.device_fault.lock().clone()
    }

    /// Wait for the writer thread to drain its queue and close the file.
    fn join_writer(&mut self) -> Result<WriterOutcome, CaptureError> {
        let handle = self
            .writer_handle
            .take()
            .ok_or_else(|| CaptureError::StorageError("writer already joined".into()))?;
        handle
            .join()
            .map_err(|_| CaptureError::StorageError("writer thread panicked".into()))?
    }
}

/// Drives the engine through start/stop with metering and disk output.
///
/// Data flow while recording:
/// ```text
/// [Input tap] → RMS(ch 0) → [LevelBuffer] → delegate.on_levels_updated
///
/// [MixedOutput tap] → pooled buffer → try_send → [bounded queue] → writer thread
///        ↑                                                          │
///        └───────────────── recycled buffers ───────────────────────┘
///                                   FormatConverter → RecordingWriter
/// ```
///
/// The controller holds no lock of its own; callers serialize `start`,
/// `stop` and graph rebuilds.
pub struct CaptureController {
    levels: Arc<Mutex<LevelBuffer>>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    fault_sink: Option<Sender<String>>,
    queue_capacity: usize,
    session: Option<CaptureSession>,
}

impl CaptureController {
    pub fn new() -> Self {
        Self::with_queue_capacity(DISK_QUEUE_CAPACITY)
    }

    /// Controller whose disk queue holds at most `capacity` buffers.
    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self {
            levels: Arc::new(Mutex::new(LevelBuffer::default())),
            delegate: None,
            fault_sink: None,
            queue_capacity: capacity.max(1),
            session: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Channel that receives the reason of every device failure, once per
    /// capture, after the delegate has been told.
    pub fn set_fault_sink(&mut self, sink: Sender<String>) {
        self.fault_sink = Some(sink);
    }

    /// Shared handle to the level history.
    pub fn levels(&self) -> Arc<Mutex<LevelBuffer>> {
        Arc::clone(&self.levels)
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn is_capturing(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the active capture has lost its device.
    pub fn has_device_fault(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.device_fault.lock().is_some())
    }

    /// Install both taps, open the temporary file and start the engine.
    ///
    /// The graph is built with `chain` first if it has never been wired. A
    /// temporary file left by an earlier capture is moved aside under a
    /// `recovered_` name before the new one is created. On any failure the
    /// taps are removed, the new temporary file is deleted and no session
    /// exists afterwards.
    pub fn start<D: AudioDevice>(
        &mut self,
        graph: &mut SignalGraph<D>,
        chain: &ChainSpec,
        config: CaptureConfiguration,
    ) -> Result<(), CaptureError> {
        if self.session.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        config.validate().map_err(CaptureError::EngineStartFailed)?;

        if !graph.is_built() {
            let report = graph.rebuild(chain)?;
            log::debug!("graph built on first start: {:?}", report.attached);
        }

        let graph_format = graph.format();
        let temp_path = file_naming::temporary_path(&config.output_directory, config.format);
        preserve_leftover(&temp_path, &config)?;

        let mut writer = RecordingWriter::new(temp_path.clone(), &config);
        if let Err(e) = writer.open() {
            remove_temp_file(&temp_path);
            return Err(CaptureError::EngineStartFailed(e.to_string()));
        }

        let (sender, receiver) = crossbeam_channel::bounded::<Vec<f32>>(self.queue_capacity);
        let pool = BufferPool::new(
            self.queue_capacity + 2,
            POOLED_BUFFER_FRAMES * graph_format.channels.max(1) as usize,
        );
        let converter = FormatConverter::new(graph_format, config.sample_rate, config.channels);
        let recycle = pool.recycler();
        let writer_handle = thread::Builder::new()
            .name("aufn-disk-writer".into())
            .spawn(move || run_writer(receiver, recycle, writer, converter))
            .map_err(|e| {
                remove_temp_file(&temp_path);
                CaptureError::EngineStartFailed(format!("failed to spawn writer thread: {}", e))
            })?;

        let mut session = CaptureSession {
            config,
            temp_path,
            started_at: Local::now(),
            dropped_buffers: Arc::new(AtomicU64::new(0)),
            device_fault: Arc::new(Mutex::new(None)),
            writer_handle: Some(writer_handle),
        };

        self.levels.lock().clear();
        let installed = graph
            .install_tap(TapPoint::Input, self.metering_tap())
            .and_then(|()| {
                graph.install_tap(
                    TapPoint::MixedOutput,
                    disk_tap(sender, pool, Arc::clone(&session.dropped_buffers)),
                )
            });

        let preferences = IoPreferences {
            sample_rate: session.config.sample_rate as f64,
            buffer_duration: session.config.io_buffer,
        };
        let started = installed.and_then(|()| {
            graph.start_engine(preferences, self.device_error_callback(&session.device_fault))
        });

        if let Err(e) = started {
            log::error!("capture start failed: {}", e);
            graph.remove_tap(TapPoint::Input);
            graph.remove_tap(TapPoint::MixedOutput);
            if let Err(stop_err) = graph.stop_engine() {
                log::warn!("engine stop after failed start: {}", stop_err);
            }
            // Closing the queue lets the writer thread finish before the file goes.
            let _ = session.join_writer();
            remove_temp_file(&session.temp_path);
            return Err(CaptureError::EngineStartFailed(e.to_string()));
        }

        log::info!(
            "capture started: {} {} Hz {} ch -> {}",
            session.config.format,
            session.config.sample_rate,
            session.config.channels,
            session.temp_path.display()
        );
        self.session = Some(session);
        Ok(())
    }

    /// Remove both taps, stop the engine, close the file and move it to its
    /// final timestamped name.
    ///
    /// A write error latched during capture is returned as `WriteFailed`, a
    /// failed move as `FinalizeFailed`; both keep the temporary file. A
    /// device failure during capture ends in `DeviceUnavailable`.
    pub fn stop<D: AudioDevice>(
        &mut self,
        graph: &mut SignalGraph<D>,
    ) -> Result<RecordingResult, CaptureError> {
        let mut session = self.session.take().ok_or(CaptureError::NotRecording)?;

        graph.remove_tap(TapPoint::Input);
        graph.remove_tap(TapPoint::MixedOutput);
        if let Err(e) = graph.stop_engine() {
            log::warn!("engine stop failed: {}", e);
        }

        let outcome = session.join_writer();

        if let Some(reason) = session.device_fault() {
            log::warn!(
                "device lost during capture; partial file kept at {}",
                session.temp_path.display()
            );
            return Err(CaptureError::DeviceUnavailable(reason));
        }

        let outcome = outcome.map_err(|e| CaptureError::WriteFailed {
            reason: e.to_string(),
            temp_path: session.temp_path.clone(),
        })?;

        let finalized_at = Local::now();
        let config = &session.config;
        let final_path =
            file_naming::unique_final_path(&config.output_directory, finalized_at, config.format);
        fs::rename(&session.temp_path, &final_path).map_err(|e| {
            log::error!("finalize failed: {}", e);
            CaptureError::FinalizeFailed {
                reason: e.to_string(),
                temp_path: session.temp_path.clone(),
            }
        })?;

        let dropped_buffers = session.dropped_buffers();
        if dropped_buffers > 0 {
            log::warn!("disk writer fell behind; {} buffer(s) dropped", dropped_buffers);
        }

        let result = RecordingResult {
            file_path: final_path,
            format: config.format,
            sample_rate: config.sample_rate,
            channels: config.channels,
            started_at: session.started_at,
            finalized_at,
            duration_secs: outcome.duration_secs,
            checksum: outcome.checksum,
            dropped_buffers,
        };
        log::info!(
            "recording finalized: {} ({:.2}s)",
            result.file_path.display(),
            result.duration_secs
        );

        if let Some(ref delegate) = self.delegate {
            delegate.on_recording_available(&result);
        }
        Ok(result)
    }

    /// Best-effort teardown without finalizing.
    ///
    /// Returns the temporary file path, which is left on disk.
    pub fn abort<D: AudioDevice>(&mut self, graph: &mut SignalGraph<D>) -> Option<PathBuf> {
        let mut session = self.session.take()?;

        graph.remove_tap(TapPoint::Input);
        graph.remove_tap(TapPoint::MixedOutput);
        if let Err(e) = graph.stop_engine() {
            log::warn!("engine stop during abort failed: {}", e);
        }
        if let Err(e) = session.join_writer() {
            log::warn!("writer error during abort: {}", e);
        }

        log::warn!("capture aborted; temporary file at {}", session.temp_path.display());
        Some(session.temp_path)
    }

    /// Input tap: per-buffer RMS of channel 0, appended under one lock.
    ///
    /// The delegate is called on the audio thread with the graph locked.
    fn metering_tap(&self) -> TapCallback {
        let levels = Arc::clone(&self.levels);
        let delegate = self.delegate.clone();
        let mut snapshot = Vec::with_capacity(LEVEL_HISTORY);
        Box::new(move |samples: &[f32], format: StreamFormat| {
            let rms = channel_rms(samples, format.channels as usize, 0);
            {
                let mut levels = levels.lock();
                levels.push(rms);
                levels.copy_into(&mut snapshot);
            }
            if let Some(ref delegate) = delegate {
                delegate.on_levels_updated(&snapshot);
            }
        })
    }

    fn device_error_callback(&self, fault: &Arc<Mutex<Option<String>>>) -> DeviceErrorCallback {
        let fault = Arc::clone(fault);
        let delegate = self.delegate.clone();
        let sink = self.fault_sink.clone();
        Arc::new(move |reason: String| {
            log::error!("audio device failed: {}", reason);
            {
                let mut fault = fault.lock();
                if fault.is_some() {
                    return;
                }
                *fault = Some(reason.clone());
            }
            if let Some(ref delegate) = delegate {
                delegate.on_error(&CaptureError::DeviceUnavailable(reason.clone()));
            }
            if let Some(ref sink) = sink {
                if sink.try_send(reason).is_err() {
                    log::warn!("device fault could not be queued for recovery");
                }
            }
        })
    }
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::new()
    }
}

/// Preallocated sample buffers shared by the disk tap and the writer thread.
struct BufferPool {
    free: Receiver<Vec<f32>>,
    recycle: Sender<Vec<f32>>,
}

impl BufferPool {
    fn new(count: usize, samples_per_buffer: usize) -> Self {
        let (recycle, free) = crossbeam_channel::bounded(count);
        for _ in 0..count {
            let _ = recycle.try_send(Vec::with_capacity(samples_per_buffer));
        }
        Self { free, recycle }
    }

    fn recycler(&self) -> Sender<Vec<f32>> {
        self.recycle.clone()
    }
}

/// Output tap: copy each buffer into a pooled vector and hand it to the
/// writer thread without blocking. An empty pool or a full queue drops the
/// buffer and counts it.
fn disk_tap(sender: Sender<Vec<f32>>, pool: BufferPool, dropped: Arc<AtomicU64>) -> TapCallback {
    Box::new(move |samples: &[f32], _format: StreamFormat| {
        let Ok(mut buffer) = pool.free.try_recv() else {
            dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        buffer.clear();
        buffer.extend_from_slice(samples);
        match sender.try_send(buffer) {
            Ok(()) => {}
            Err(TrySendError::Full(buffer)) | Err(TrySendError::Disconnected(buffer)) => {
                let _ = pool.recycle.try_send(buffer);
                dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    })
}

/// Writer thread body. Runs until every sender is gone.
///
/// After the first write error the queue is still drained so the tap never
/// blocks, but nothing more is written.
fn run_writer(
    receiver: Receiver<Vec<f32>>,
    recycle: Sender<Vec<f32>>,
    mut writer: RecordingWriter,
    mut converter: FormatConverter,
) -> Result<WriterOutcome, CaptureError> {
    let mut failure: Option<CaptureError> = None;
    for buffer in receiver.iter() {
        if failure.is_none() {
            let converted = converter.convert(&buffer);
            if let Err(e) = writer.write_samples(&converted) {
                log::error!("disk write failed: {}", e);
                failure = Some(e);
            }
        }
        let _ = recycle.try_send(buffer);
    }

    let closed = writer.close();
    if let Some(e) = failure {
        return Err(e);
    }
    let checksum = closed?;
    log::debug!(
        "writer closed {} ({} bytes)",
        writer.file_path().display(),
        writer.bytes_written()
    );
    Ok(WriterOutcome {
        checksum,
        duration_secs: writer.duration_secs(),
    })
}

/// Move a temporary file left by an earlier capture out of the way so the
/// next capture cannot truncate or delete it.
fn preserve_leftover(temp_path: &Path, config: &CaptureConfiguration) -> Result<(), CaptureError> {
    if !temp_path.exists() {
        return Ok(());
    }
    let recovered =
        file_naming::unique_recovery_path(&config.output_directory, Local::now(), config.format);
    fs::rename(temp_path, &recovered).map_err(|e| {
        CaptureError::StorageError(format!(
            "could not move leftover {} aside: {}",
            temp_path.display(),
            e
        ))
    })?;
    log::warn!(
        "leftover temporary file moved to {} before new capture",
        recovered.display()
    );
    Ok(())
}

fn remove_temp_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("could not remove {}: {}", path.display(), e),
    }
}
