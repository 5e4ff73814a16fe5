//! # Chunk trees
//!
//! A chunk tree stores a byte sequence of arbitrary size as a tree of
//! content-addressed chunks. The bytes are cut into data chunks by a content
//! defined splitter, and the hashes of the data chunks are grouped into nodes
//! by a second splitter that works on hashes instead of bytes. Nodes are grouped
//! into higher level nodes the same way, until a single root remains.
//!
//! ## Determinism
//!
//! Chunk boundaries only depend on the content, so identical data always yields
//! identical chunks and an identical tree. The hash of the root node therefore
//! identifies the content, and can be computed without building a tree using a
//! [ChunkHasher].
//!
//! ## Editing
//!
//! A [ChunkContainer] supports inserting and removing data chunks at arbitrary
//! positions. Edits only update the affected leaf and the lengths of its
//! ancestors. Restoring the canonical tree shape is deferred until
//! [flush](ChunkContainer::flush), which persists all modified nodes and yields a
//! [ChunkContainerRef] that can be used to open the container again.
//!
//! Byte level editing is available via [ContainerWriter], which keeps the data
//! chunking content defined, and reading via [ContainerReader].
//!
//! ## Storage
//!
//! Chunks are stored through a [ChunkAccessor]. Chunk bytes can optionally be
//! padded before they are stored, see [WriteStrategy].
pub mod config;
pub mod container;
pub mod error;
pub mod hash;
pub mod hasher;
mod node;
pub mod pointer;
#[cfg(feature = "metrics")]
mod prom;
pub mod splitter;
pub mod store;
pub mod stream;
mod write_strategy;

pub use config::{BoxConfig, ChunkingConfig, Config, SplitterAlgorithm, WriteStrategy};
pub use container::{ChunkContainer, ChunkContainerRef, InsertPosition, NodeInfo};
pub use error::Error;
pub use hash::Hash;
pub use hasher::{hash_bytes, hash_stream, ChunkHasher};
pub use pointer::{ChunkPointer, ChunkRef, DataChunk, Iv};
#[cfg(feature = "metrics")]
pub use prom::register_metrics;
pub use store::{ArcChunkAccessor, ChunkAccessor, MemAccessor, PutResult};
pub use stream::{ContainerReader, ContainerWriter, WriteMode};

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
