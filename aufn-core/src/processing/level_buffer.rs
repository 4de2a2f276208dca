/// Number of level samples kept for display.
pub const LEVEL_HISTORY: usize = 30;

/// Fixed-capacity history of the most recent RMS levels.
///
/// Circular storage; appending past capacity drops the oldest sample.
/// Wrap in `Arc<parking_lot::Mutex<LevelBuffer>>` for cross-thread access so
/// append-and-trim happens as one step.
#[derive(Debug, Clone)]
pub struct LevelBuffer {
    buffer: Vec<f32>,
    write_index: usize,
    available: usize,
    capacity: usize,
}

impl LevelBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0.0; capacity],
            write_index: 0,
            available: 0,
            capacity,
        }
    }

    pub fn push(&mut self, level: f32) {
        self.buffer[self.write_index] = level;
        self.write_index = (self.write_index + 1) % self.capacity;
        self.available = (self.available + 1).min(self.capacity);
    }

    /// Stored levels, oldest first.
    pub fn snapshot(&self) -> Vec<f32> {
        let mut levels = Vec::with_capacity(self.available);
        self.copy_into(&mut levels);
        levels
    }

    /// Overwrite `out` with the stored levels, oldest first. Reuses `out`'s
    /// allocation.
    pub fn copy_into(&self, out: &mut Vec<f32>) {
        let start = (self.write_index + self.capacity - self.available) % self.capacity;
        out.clear();
        out.extend((0..self.available).map(|i| self.buffer[(start + i) % self.capacity]));
    }

    /// Full-width history, left-padded with silence, for a fixed-size meter.
    pub fn padded(&self) -> Vec<f32> {
        let mut levels = vec![0.0; self.capacity - self.available];
        levels.extend(self.snapshot());
        levels
    }

    pub fn latest(&self) -> Option<f32> {
        if self.available == 0 {
            return None;
        }
        Some(self.buffer[(self.write_index + self.capacity - 1) % self.capacity])
    }

    pub fn len(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    pub fn clear(&mut self) {
        self.write_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LevelBuffer {
    fn default() -> Self {
        Self::new(LEVEL_HISTORY)
    }
}
