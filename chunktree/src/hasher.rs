//! root hash of a byte stream, without building a tree
//!
//! Chunk hashes of each level are fed into the level above, chunked with the
//! node splitter. The first chunk of a level is held back until a second one
//! shows up, because a level with a single chunk is the root.
use crate::{
    config::Config,
    hash::{Hash, HashBuilder},
    splitter::{data_splitter, node_splitter, ChunkSplitter},
};
use anyhow::Result;
use futures::{pin_mut, Stream, StreamExt};
use std::io;

/// Chunks the hashes of the level below into nodes
struct NodeLayer {
    splitter: Box<dyn ChunkSplitter>,
    builder: HashBuilder,
    entries: usize,
}

impl NodeLayer {
    fn new(splitter: Box<dyn ChunkSplitter>) -> Self {
        Self {
            splitter,
            builder: HashBuilder::new(),
            entries: 0,
        }
    }

    /// add an entry, returns the hash of the node it completes
    fn add(&mut self, hash: &Hash) -> Option<Hash> {
        self.builder.update(hash.as_bytes());
        self.entries += 1;
        self.splitter.write(hash.as_bytes());
        if self.splitter.is_triggered() {
            self.splitter.reset();
            self.entries = 0;
            Some(self.builder.finalize_reset())
        } else {
            None
        }
    }

    fn finish(&mut self) -> Option<Hash> {
        if self.entries > 0 {
            self.entries = 0;
            Some(self.builder.finalize_reset())
        } else {
            None
        }
    }
}

/// Chunk hashes of one level
#[derive(Default)]
struct Level {
    first: Option<Hash>,
    /// present once there is more than one chunk on this level
    layer: Option<NodeLayer>,
}

/// Computes the root hash a container would have for the bytes written to it.
pub struct ChunkHasher {
    splitter: Box<dyn ChunkSplitter>,
    node_splitter: Box<dyn ChunkSplitter>,
    builder: HashBuilder,
    chunk_length: usize,
    position: u64,
    levels: Vec<Level>,
}

impl ChunkHasher {
    pub fn new(config: &Config) -> Self {
        Self {
            splitter: data_splitter(&config.chunking),
            node_splitter: node_splitter(&config.chunking, config.boxing.node_size_factor()),
            builder: HashBuilder::new(),
            chunk_length: 0,
            position: 0,
            levels: Vec::new(),
        }
    }

    /// number of bytes hashed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn update(&mut self, mut data: &[u8]) {
        self.position += data.len() as u64;
        while !data.is_empty() {
            let n = self.splitter.write(data);
            self.builder.update(&data[..n]);
            self.chunk_length += n;
            if self.splitter.is_triggered() {
                self.splitter.reset();
                self.chunk_length = 0;
                let hash = self.builder.finalize_reset();
                self.push(0, hash);
            }
            data = &data[n..];
        }
    }

    /// the root hash, zero if no data was written
    pub fn finalize(mut self) -> Hash {
        if self.chunk_length > 0 {
            let hash = self.builder.finalize_reset();
            self.push(0, hash);
        }
        // levels can be added while finishing the ones below
        let mut level = 0;
        while level < self.levels.len() {
            if let Some(hash) = self.levels[level].layer.as_mut().and_then(|l| l.finish()) {
                self.push(level + 1, hash);
            }
            level += 1;
        }
        self.levels
            .last()
            .and_then(|level| level.first)
            .unwrap_or_else(Hash::zero)
    }

    fn push(&mut self, level: usize, hash: Hash) {
        if self.levels.len() <= level {
            self.levels.push(Level::default());
        }
        let entry = &mut self.levels[level];
        let mut completed = Vec::new();
        match entry.layer {
            Some(ref mut layer) => completed.extend(layer.add(&hash)),
            None => match entry.first {
                None => entry.first = Some(hash),
                Some(first) => {
                    let mut layer = NodeLayer::new(self.node_splitter.new_instance());
                    completed.extend(layer.add(&first));
                    completed.extend(layer.add(&hash));
                    entry.layer = Some(layer);
                }
            },
        }
        for node in completed {
            self.push(level + 1, node);
        }
    }
}

impl io::Write for ChunkHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// root hash of a stream of byte buffers
pub async fn hash_stream<S, B>(config: &Config, stream: S) -> Result<Hash>
where
    S: Stream<Item = Result<B>>,
    B: AsRef<[u8]>,
{
    let mut hasher = ChunkHasher::new(config);
    pin_mut!(stream);
    while let Some(buffer) = stream.next().await {
        hasher.update(buffer?.as_ref());
    }
    Ok(hasher.finalize())
}

/// root hash of a byte slice
pub fn hash_bytes(config: &Config, data: &[u8]) -> Hash {
    let mut hasher = ChunkHasher::new(config);
    hasher.update(data);
    hasher.finalize()
}
