//! `AudioDevice` on top of a cpal input stream, with optional monitoring
//! through the default output device.
//!
//! cpal streams are not `Send` on every host, so they are built, played and
//! dropped on one dedicated thread, the same way for every platform.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use aufn_core::models::audio_models::{InputDeviceInfo, IoPreferences, StreamFormat};
use aufn_core::models::config::IoBufferDuration;
use aufn_core::models::error::GraphError;
use aufn_core::traits::audio_device::{AudioDevice, DeviceErrorCallback, RenderCallback};

use crate::device_enumerator::DeviceEnumerator;
use crate::error::CpalError;

/// Rendered buffers queued for the monitoring output.
const MONITOR_QUEUE_CAPACITY: usize = 8;

/// cpal-backed input device.
pub struct CpalDevice {
    device_name: Option<String>,
    monitoring: bool,
    running: Arc<AtomicBool>,
    stream_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CpalDevice {
    /// The host's default input device.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            monitoring: false,
            running: Arc::new(AtomicBool::new(false)),
            stream_handle: Mutex::new(None),
        }
    }

    /// A specific input device by name, as listed by `DeviceEnumerator`.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            ..Self::default_device()
        }
    }

    /// Play the processed signal on the default output device.
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitoring = enabled;
        self
    }

    fn input_device(&self) -> Result<cpal::Device, CpalError> {
        DeviceEnumerator::new().input_device(self.device_name.as_deref())
    }
}

impl AudioDevice for CpalDevice {
    fn input_format(&self) -> Result<StreamFormat, GraphError> {
        let config = self
            .input_device()?
            .default_input_config()
            .map_err(|e| CpalError::Config(e.to_string()))?;
        Ok(StreamFormat::new(config.sample_rate().0 as f64, config.channels()))
    }

    fn start(
        &mut self,
        preferences: IoPreferences,
        render: RenderCallback,
        on_error: DeviceErrorCallback,
    ) -> Result<(), GraphError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(GraphError::EngineStartFailed("input stream already running".into()));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let device_name = self.device_name.clone();
        let monitoring = self.monitoring;
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), CpalError>>(1);

        let handle = thread::Builder::new()
            .name("aufn-cpal-stream".into())
            .spawn(move || {
                match open_streams(device_name.as_deref(), preferences, monitoring, render, on_error) {
                    Ok(streams) => {
                        let _ = ready_tx.send(Ok(()));
                        while running.load(Ordering::SeqCst) {
                            thread::sleep(Duration::from_millis(10));
                        }
                        drop(streams);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                GraphError::EngineStartFailed(format!("failed to spawn stream thread: {}", e))
            })?;

        let opened = ready_rx
            .recv()
            .map_err(|_| CpalError::Stream("stream thread exited before reporting".into()))
            .and_then(|r| r);
        if let Err(e) = opened {
            self.running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(GraphError::EngineStartFailed(e.to_string()));
        }

        *self.stream_handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), GraphError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.stream_handle.lock().take() {
            handle
                .join()
                .map_err(|_| GraphError::EngineStartFailed("stream thread panicked".into()))?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn device_info(&self) -> InputDeviceInfo {
        let name = self
            .input_device()
            .and_then(|d| d.name().map_err(|e| CpalError::Enumeration(e.to_string())))
            .unwrap_or_else(|_| "Default Input".into());
        InputDeviceInfo {
            id: name.clone(),
            name,
            is_default: self.device_name.is_none(),
        }
    }
}

/// Live streams; dropping this stops them.
struct Streams {
    _input: cpal::Stream,
    _monitor: Option<cpal::Stream>,
}

/// Build and play the input stream (and monitor, if asked).
///
/// Sequence:
/// 1. Resolve the input device (named or default)
/// 2. Take its default config, requesting a fixed buffer for the IO preference
/// 3. Optionally open a matching output stream on the default output device
/// 4. Build the input stream for the device's sample type and play
fn open_streams(
    device_name: Option<&str>,
    preferences: IoPreferences,
    monitoring: bool,
    render: RenderCallback,
    on_error: DeviceErrorCallback,
) -> Result<Streams, CpalError> {
    let enumerator = DeviceEnumerator::new();
    let device = enumerator.input_device(device_name)?;
    let supported = device
        .default_input_config()
        .map_err(|e| CpalError::Config(e.to_string()))?;

    let native_rate = supported.sample_rate().0;
    if (preferences.sample_rate - native_rate as f64).abs() > 0.5 {
        log::info!(
            "device runs at {} Hz; {} Hz is converted on write",
            native_rate,
            preferences.sample_rate
        );
    }

    let mut config = supported.config();
    config.buffer_size = buffer_size_for(supported.buffer_size(), preferences.buffer_duration, native_rate);
    log::debug!(
        "input config: {} Hz, {} ch, {:?}, {:?}",
        native_rate,
        config.channels,
        supported.sample_format(),
        config.buffer_size
    );

    let (monitor_tx, monitor) = if monitoring {
        match open_monitor(&enumerator, &config) {
            Ok((tx, stream)) => (Some(tx), Some(stream)),
            Err(e) => {
                log::warn!("monitoring disabled: {}", e);
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let input = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_input::<f32>(&device, &config, render, on_error, monitor_tx)?,
        cpal::SampleFormat::I16 => build_input::<i16>(&device, &config, render, on_error, monitor_tx)?,
        cpal::SampleFormat::I32 => build_input::<i32>(&device, &config, render, on_error, monitor_tx)?,
        cpal::SampleFormat::U16 => build_input::<u16>(&device, &config, render, on_error, monitor_tx)?,
        other => return Err(CpalError::Config(format!("unsupported sample format: {}", other))),
    };
    input.play().map_err(|e| CpalError::Stream(e.to_string()))?;
    if let Some(ref monitor) = monitor {
        monitor.play().map_err(|e| CpalError::Stream(e.to_string()))?;
    }

    log::info!("cpal input stream playing");
    Ok(Streams {
        _input: input,
        _monitor: monitor,
    })
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    render: RenderCallback,
    on_error: DeviceErrorCallback,
    monitor: Option<Sender<Vec<f32>>>,
) -> Result<cpal::Stream, CpalError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                scratch.extend(data.iter().map(|s| s.to_sample::<f32>()));
                render(scratch.as_mut_slice());
                if let Some(ref monitor) = monitor {
                    // A full queue means the output is behind; skip this buffer.
                    let _ = monitor.try_send(scratch.clone());
                }
            },
            move |err: cpal::StreamError| {
                on_error(err.to_string());
            },
            None,
        )
        .map_err(|e| CpalError::Stream(e.to_string()))
}

fn open_monitor(
    enumerator: &DeviceEnumerator,
    input_config: &cpal::StreamConfig,
) -> Result<(Sender<Vec<f32>>, cpal::Stream), CpalError> {
    let device = enumerator
        .default_output_device()
        .ok_or_else(|| CpalError::Config("no default output device".into()))?;
    let config = cpal::StreamConfig {
        channels: input_config.channels,
        sample_rate: input_config.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    let (tx, rx) = crossbeam_channel::bounded(MONITOR_QUEUE_CAPACITY);
    let mut feed = MonitorFeed::new(rx);
    let stream = device
        .build_output_stream(
            &config,
            move |out: &mut [f32], _: &cpal::OutputCallbackInfo| feed.fill(out),
            // Losing the monitor does not stop the recording.
            move |err: cpal::StreamError| log::warn!("monitor output error: {}", err),
            None,
        )
        .map_err(|e| CpalError::Stream(e.to_string()))?;
    Ok((tx, stream))
}

/// Pick a fixed buffer for the IO preference when the host reports a range.
fn buffer_size_for(
    supported: &cpal::SupportedBufferSize,
    duration: IoBufferDuration,
    sample_rate: u32,
) -> cpal::BufferSize {
    match supported {
        cpal::SupportedBufferSize::Range { min, max } => {
            let frames = duration.frames_at(sample_rate as f64).clamp(*min, *max);
            cpal::BufferSize::Fixed(frames)
        }
        cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Default,
    }
}

/// Drains rendered buffers into output callbacks of any size.
struct MonitorFeed {
    receiver: Receiver<Vec<f32>>,
    pending: Vec<f32>,
    position: usize,
}

impl MonitorFeed {
    fn new(receiver: Receiver<Vec<f32>>) -> Self {
        Self {
            receiver,
            pending: Vec::new(),
            position: 0,
        }
    }

    /// Fill `out`, padding with silence when nothing is queued.
    fn fill(&mut self, out: &mut [f32]) {
        let mut written = 0;
        while written < out.len() {
            if self.position >= self.pending.len() {
                match self.receiver.try_recv() {
                    Ok(buffer) => {
                        self.pending = buffer;
                        self.position = 0;
                        continue;
                    }
                    Err(_) => break,
                }
            }
            let n = (self.pending.len() - self.position).min(out.len() - written);
            out[written..written + n].copy_from_slice(&self.pending[self.position..self.position + n]);
            self.position += n;
            written += n;
        }
        out[written..].fill(0.0);
    }
}
