//! chunk boundary detection
//!
//! A splitter consumes one byte at a time and reports whether the byte just
//! consumed ends a chunk. Once triggered, a splitter stays triggered until it is
//! [reset](ChunkSplitter::reset). Every tree level and every padding pass needs
//! its own instance, so splitters can produce fresh copies of themselves via
//! [new_instance](ChunkSplitter::new_instance).
//!
//! Data chunks are split with the configured algorithm. Nodes are split with
//! the same algorithm, fed with the data hashes of their entries, using sizes
//! divided by the node size factor.
use crate::{
    config::{ChunkingConfig, SplitterAlgorithm},
    hash::Hash,
};
mod cyclic_poly;
mod dynamic;
mod fixed;
mod rabin;

pub use cyclic_poly::CyclicPolyHash;
pub use dynamic::{DynamicSplitter, RollingHash};
pub use fixed::FixedSizeSplitter;
pub use rabin::RabinHash;

pub trait ChunkSplitter: Send {
    /// feed a single byte, returns true if the splitter is triggered
    fn update(&mut self, byte: u8) -> bool;

    /// true if a boundary was found since the last reset
    fn is_triggered(&self) -> bool;

    /// number of bytes consumed since the last reset
    fn position(&self) -> u64;

    fn reset(&mut self);

    /// an independent, freshly reset splitter with the same configuration
    fn new_instance(&self) -> Box<dyn ChunkSplitter>;

    /// feed bytes until the splitter triggers.
    ///
    /// Returns the number of bytes consumed. If this is less than `data.len()`,
    /// the splitter triggered on the last consumed byte.
    fn write(&mut self, data: &[u8]) -> usize {
        for (i, byte) in data.iter().enumerate() {
            if self.update(*byte) {
                return i + 1;
            }
        }
        data.len()
    }
}

/// Smallest boundary position for node splitters.
///
/// A node splitter must never trigger inside the first entry, otherwise a level
/// could consist of single entry nodes and the tree would never converge to a root.
const MIN_NODE_SPLIT: u32 = Hash::SIZE as u32 + 1;

fn build(config: &ChunkingConfig, target: u32, min: u32, max: u32) -> Box<dyn ChunkSplitter> {
    let window = config.window_size as usize;
    match &config.algorithm {
        SplitterAlgorithm::FixedSize => Box::new(FixedSizeSplitter::new(target as u64)),
        SplitterAlgorithm::Rabin => Box::new(DynamicSplitter::new(
            RabinHash::new(window),
            target,
            min,
            max,
            window,
        )),
        SplitterAlgorithm::CyclicPoly { seed } => Box::new(DynamicSplitter::new(
            CyclicPolyHash::new(seed, window),
            target,
            min,
            max,
            window,
        )),
    }
}

/// splitter for data chunks
pub fn data_splitter(config: &ChunkingConfig) -> Box<dyn ChunkSplitter> {
    build(
        config,
        config.target_chunk_size,
        config.min_chunk_size,
        config.max_chunk_size,
    )
}

/// splitter for nodes, scaled down by the node size factor
pub fn node_splitter(config: &ChunkingConfig, node_size_factor: f64) -> Box<dyn ChunkSplitter> {
    let scale = |size: u32| (size as f64 / node_size_factor) as u32;
    match config.algorithm {
        SplitterAlgorithm::FixedSize => {
            let size = scale(config.target_chunk_size).max(MIN_NODE_SPLIT);
            build(config, size, size, size)
        }
        _ => {
            let min = scale(config.min_chunk_size).max(MIN_NODE_SPLIT);
            let max = scale(config.max_chunk_size).max(min);
            let target = scale(config.target_chunk_size).max(1);
            build(config, target, min, max)
        }
    }
}
