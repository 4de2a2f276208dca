/// One live DSP stage inside the signal graph.
///
/// Processes interleaved f32 audio in place. Implementations must not
/// allocate or block inside `process`.
pub trait Processor: Send {
    fn process(&mut self, buffer: &mut [f32], channels: usize);

    /// Clear internal state (delay lines, envelopes).
    fn reset(&mut self);

    fn name(&self) -> &'static str;
}
