//! normalization of the physical size of stored chunks
//!
//! Padding only ever changes the stored bytes. Hashes and positions always use
//! the logical length, and readers truncate or stop parsing at that length.
use crate::{
    config::{Config, WriteStrategy},
    splitter::{data_splitter, node_splitter, ChunkSplitter},
};

/// Pads finalized chunk bytes according to a [WriteStrategy]
pub(crate) struct Padder {
    strategy: WriteStrategy,
    data_splitter: Box<dyn ChunkSplitter>,
    node_splitter: Box<dyn ChunkSplitter>,
    node_size_factor: f64,
}

impl Padder {
    pub fn new(config: &Config) -> Self {
        let node_size_factor = config.boxing.node_size_factor();
        Self {
            strategy: config.boxing.write_strategy.clone(),
            data_splitter: data_splitter(&config.chunking),
            node_splitter: node_splitter(&config.chunking, node_size_factor),
            node_size_factor,
        }
    }

    /// the physical length for a chunk of `data` at `level`
    pub fn padded_length(&mut self, data: &[u8], level: u32) -> usize {
        let len = data.len();
        if len == 0 {
            return 0;
        }
        match self.strategy {
            WriteStrategy::Plain => len,
            WriteStrategy::FixedSizePadding { node_size } => {
                let node_size = node_size.max(1) as usize;
                (len + node_size - 1) / node_size * node_size
            }
            WriteStrategy::DynamicPadding => {
                let (splitter, factor) = if level == 0 {
                    (&mut self.data_splitter, 1.0)
                } else {
                    (&mut self.node_splitter, self.node_size_factor)
                };
                splitter.reset();
                for byte in data {
                    splitter.update(*byte);
                }
                // the boundary that ended this chunk starts the padding run
                if splitter.is_triggered() {
                    splitter.reset();
                }
                let start = splitter.position();
                // filler is the chunk itself, repeated. Every splitter triggers at its max size.
                for byte in data.iter().cycle() {
                    if splitter.update(*byte) {
                        break;
                    }
                }
                let padding = ((splitter.position() - start) as f64 * factor).ceil() as usize;
                splitter.reset();
                len + padding
            }
        }
    }

    /// pad `data` to its physical length, by cyclically repeating its own bytes
    pub fn finalize(&mut self, mut data: Vec<u8>, level: u32) -> Vec<u8> {
        let len = data.len();
        let target = self.padded_length(&data, level);
        if target > len {
            let filler = data.iter().cycle().take(target - len).copied().collect::<Vec<_>>();
            data.extend(filler);
        }
        data
    }
}
