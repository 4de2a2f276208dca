/// Recording session state machine.
///
/// State transitions:
/// ```text
/// idle ⇄ armed → recording → finalizing → idle
///   ↑                              │
///   └──── (error: reported, then idle)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Armed,
    Recording,
    Finalizing,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    /// Whether a new chain may be wired in right now.
    pub fn accepts_rebuild(&self) -> bool {
        matches!(self, Self::Idle | Self::Armed)
    }

    /// Whether `start()` is allowed from this state.
    pub fn accepts_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Armed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
        }
    }
}
