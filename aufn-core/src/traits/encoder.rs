/// Streaming encoder for compressed recording formats.
///
/// The core writes WAV itself; compressed containers are produced by a
/// platform encoder handed in through `CaptureConfiguration`. Each capture
/// works on a fresh `clone_box()` of the configured prototype.
pub trait CompressedEncoder: Send {
    /// Prepare for a stream. Returns any container header bytes.
    fn begin(&mut self, sample_rate: u32, channels: u16) -> Result<Vec<u8>, String>;

    /// Encode interleaved f32 frames, returning bytes ready to append.
    fn encode(&mut self, samples: &[f32]) -> Result<Vec<u8>, String>;

    /// Flush remaining frames and return trailing bytes.
    fn finish(&mut self) -> Result<Vec<u8>, String>;

    /// Format identifier (e.g., "AAC").
    fn format_name(&self) -> &str;

    /// Fresh, un-begun copy of this encoder.
    fn clone_box(&self) -> Box<dyn CompressedEncoder>;
}

impl Clone for Box<dyn CompressedEncoder> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
