use super::config::IoBufferDuration;

/// Interleaved f32 stream layout shared by every link in the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub channels: u16,
}

impl StreamFormat {
    pub fn new(sample_rate: f64, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0.0 && self.sample_rate.is_finite() && self.channels > 0
    }
}

/// Hardware preferences requested when the engine starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IoPreferences {
    pub sample_rate: f64,
    pub buffer_duration: IoBufferDuration,
}

/// An input device available for recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// Where a tap observes the running graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapPoint {
    /// Raw hardware input, before any stage.
    Input,
    /// Post-chain signal at the output mix point.
    MixedOutput,
}
