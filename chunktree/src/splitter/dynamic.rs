use super::ChunkSplitter;
use std::collections::VecDeque;

/// A fingerprint over a sliding window of bytes
pub trait RollingHash: Clone + Send + 'static {
    /// add `incoming` to the window, removing `outgoing` once the window is full
    fn roll(&mut self, incoming: u8, outgoing: Option<u8>);

    fn fingerprint(&self) -> u64;

    fn reset(&mut self);
}

/// only the low 32 bits of a fingerprint take part in the boundary decision
const MASK: u64 = 0xffff_ffff;

/// Content defined splitter on top of a rolling hash.
///
/// Boundaries are never placed before `min_size` bytes and always at `max_size`
/// bytes. In between, a byte ends a chunk if the masked fingerprint is below
/// `MASK / target_size`, which gives an expected chunk size of about `target_size`
/// beyond the minimum.
#[derive(Debug, Clone)]
pub struct DynamicSplitter<H> {
    hash: H,
    window: VecDeque<u8>,
    window_size: usize,
    min_size: u64,
    max_size: u64,
    threshold: u64,
    position: u64,
    triggered: bool,
}

impl<H: RollingHash> DynamicSplitter<H> {
    pub fn new(hash: H, target_size: u32, min_size: u32, max_size: u32, window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            hash,
            window: VecDeque::with_capacity(window_size),
            window_size,
            min_size: min_size as u64,
            max_size: (max_size as u64).max(1),
            threshold: MASK / (target_size.max(1) as u64),
            position: 0,
            triggered: false,
        }
    }
}

impl<H: RollingHash> ChunkSplitter for DynamicSplitter<H> {
    fn update(&mut self, byte: u8) -> bool {
        self.position += 1;
        if self.triggered {
            return true;
        }
        // the fingerprint only matters from min_size on, start rolling early enough
        // that the window is full by then
        if self.position + self.window_size as u64 > self.min_size {
            let outgoing = if self.window.len() == self.window_size {
                self.window.pop_front()
            } else {
                None
            };
            self.window.push_back(byte);
            self.hash.roll(byte, outgoing);
        }
        if self.position >= self.max_size
            || (self.position >= self.min_size
                && (self.hash.fingerprint() & MASK) < self.threshold)
        {
            self.triggered = true;
        }
        self.triggered
    }

    fn is_triggered(&self) -> bool {
        self.triggered
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn reset(&mut self) {
        self.hash.reset();
        self.window.clear();
        self.position = 0;
        self.triggered = false;
    }

    fn new_instance(&self) -> Box<dyn ChunkSplitter> {
        let mut result = self.clone();
        result.reset();
        Box::new(result)
    }
}
