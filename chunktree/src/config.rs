//! configuration of chunking and of how chunks are boxed for storage
use crate::{error::Error, hash::Hash, pointer::ChunkPointer};
use serde::{Deserialize, Serialize};

/// Algorithm used to find chunk boundaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitterAlgorithm {
    /// split every `target_chunk_size` bytes
    FixedSize,
    /// content defined, using a Rabin fingerprint over GF(2)[x]
    Rabin,
    /// content defined, using a cyclic polynomial hash with tables derived from a
    /// repository specific seed
    CyclicPoly { seed: Vec<u8> },
}

/// Chunking parameters for data chunks.
///
/// Node level chunking is never configured separately, it is derived from these
/// values via the node size factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub algorithm: SplitterAlgorithm,
    /// expected chunk size. For [SplitterAlgorithm::FixedSize] this is the exact size.
    pub target_chunk_size: u32,
    /// no content defined boundary is placed before this many bytes
    pub min_chunk_size: u32,
    /// a boundary is forced at this many bytes
    pub max_chunk_size: u32,
    /// size of the rolling hash window
    pub window_size: u32,
}

/// How finalized chunk bytes are post processed before they are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteStrategy {
    /// store the bytes as they are
    Plain,
    /// pad every chunk to a multiple of `node_size` bytes
    FixedSizePadding { node_size: u32 },
    /// pad every chunk to a length drawn from the chunk size distribution of the
    /// splitter, so stored sizes do not reveal content defined boundaries
    DynamicPadding,
}

/// Storage related configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxConfig {
    /// use the compact pointer encoding, which derives the iv from the data hash
    pub compact_pointers: bool,
    pub write_strategy: WriteStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Configuration for a chunk container. Persisted as part of the container reference.
pub struct Config {
    pub chunking: ChunkingConfig,
    pub boxing: BoxConfig,
}

impl ChunkingConfig {
    pub fn fixed_size(size: u32) -> Self {
        Self {
            algorithm: SplitterAlgorithm::FixedSize,
            target_chunk_size: size,
            min_chunk_size: size,
            max_chunk_size: size,
            window_size: 0,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.target_chunk_size > 0,
            Error::InvalidConfig("target chunk size must be > 0")
        );
        if self.algorithm == SplitterAlgorithm::FixedSize {
            return Ok(());
        }
        anyhow::ensure!(self.window_size > 0, Error::InvalidConfig("window size must be > 0"));
        anyhow::ensure!(
            self.min_chunk_size > 0,
            Error::InvalidConfig("min chunk size must be > 0")
        );
        anyhow::ensure!(
            self.min_chunk_size <= self.max_chunk_size,
            Error::InvalidConfig("min chunk size must not exceed max chunk size")
        );
        anyhow::ensure!(
            self.target_chunk_size <= self.max_chunk_size,
            Error::InvalidConfig("target chunk size must not exceed max chunk size")
        );
        if let SplitterAlgorithm::CyclicPoly { seed } = &self.algorithm {
            anyhow::ensure!(
                !seed.is_empty(),
                Error::InvalidConfig("cyclic poly splitter needs a seed")
            );
        }
        Ok(())
    }
}

impl BoxConfig {
    /// serialized size of one pointer
    pub fn pointer_size(&self) -> usize {
        ChunkPointer::encoded_size(self.compact_pointers)
    }

    /// ratio of the size of a serialized pointer to the size of a content hash
    ///
    /// Node splitters are fed the data hashes of their entries, so their sizes
    /// are divided by this factor to get nodes with the same physical size
    /// distribution as data chunks.
    pub fn node_size_factor(&self) -> f64 {
        self.pointer_size() as f64 / Hash::SIZE as f64
    }
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            compact_pointers: true,
            write_strategy: WriteStrategy::Plain,
        }
    }
}

impl Config {
    pub fn new(chunking: ChunkingConfig, boxing: BoxConfig) -> Self {
        Self { chunking, boxing }
    }

    /// config that will produce deep trees with very little data
    pub fn debug() -> Self {
        Self {
            chunking: ChunkingConfig::fixed_size(64),
            boxing: BoxConfig::default(),
        }
    }

    /// content defined chunking with small chunks, to get interesting trees in tests
    pub fn debug_fast() -> Self {
        Self::cyclic_poly(b"debug".to_vec(), 256, 64, 1024, 16)
    }

    pub fn cyclic_poly(seed: Vec<u8>, target: u32, min: u32, max: u32, window: u32) -> Self {
        Self {
            chunking: ChunkingConfig {
                algorithm: SplitterAlgorithm::CyclicPoly { seed },
                target_chunk_size: target,
                min_chunk_size: min,
                max_chunk_size: max,
                window_size: window,
            },
            boxing: BoxConfig::default(),
        }
    }

    pub fn rabin(target: u32, min: u32, max: u32, window: u32) -> Self {
        Self {
            chunking: ChunkingConfig {
                algorithm: SplitterAlgorithm::Rabin,
                target_chunk_size: target,
                min_chunk_size: min,
                max_chunk_size: max,
                window_size: window,
            },
            boxing: BoxConfig::default(),
        }
    }

    pub fn with_compact_pointers(mut self, compact: bool) -> Self {
        self.boxing.compact_pointers = compact;
        self
    }

    pub fn with_write_strategy(mut self, write_strategy: WriteStrategy) -> Self {
        self.boxing.write_strategy = write_strategy;
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.chunking.validate()?;
        if let WriteStrategy::FixedSizePadding { node_size } = self.boxing.write_strategy {
            anyhow::ensure!(node_size > 0, Error::InvalidConfig("padding node size must be > 0"));
        }
        Ok(())
    }
}

impl Default for Config {
    /// 8 KiB average chunks with a Rabin fingerprint
    fn default() -> Self {
        Self::rabin(8 * 1024, 2 * 1024, 64 * 1024, 48)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() -> anyhow::Result<()> {
        Config::debug().validate()?;
        Config::debug_fast().validate()?;
        Config::default().validate()?;
        Ok(())
    }

    #[test]
    fn invalid_configs() {
        assert!(ChunkingConfig::fixed_size(0).validate().is_err());
        let mut config = Config::rabin(1024, 2048, 512, 16);
        assert!(config.validate().is_err());
        config.chunking.min_chunk_size = 256;
        config.chunking.max_chunk_size = 4096;
        assert!(config.validate().is_ok());
        assert!(Config::cyclic_poly(Vec::new(), 1024, 256, 4096, 16)
            .validate()
            .is_err());
        assert!(Config::debug()
            .with_write_strategy(WriteStrategy::FixedSizePadding { node_size: 0 })
            .validate()
            .is_err());
    }

    #[test]
    fn node_size_factor() {
        let compact = BoxConfig::default();
        assert_eq!(compact.node_size_factor(), 72.0 / 32.0);
        let full = BoxConfig {
            compact_pointers: false,
            ..BoxConfig::default()
        };
        assert_eq!(full.node_size_factor(), 88.0 / 32.0);
    }
}
