//! interface to a content-addressed chunk store
use crate::{hash::Hash, pointer::ChunkPointer, pointer::Iv};
use anyhow::Result;
use std::sync::Arc;
mod mem_accessor;

pub use mem_accessor::MemAccessor;

/// Outcome of storing a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutResult {
    /// key under which the bytes can be retrieved again
    pub key: Hash,
    /// true if identical bytes were already stored under this key
    pub was_present: bool,
}

/// Storage for boxed chunk bytes.
///
/// Storing identical bytes twice must yield the same key. Calls are blocking,
/// a store backed by network or disk io is expected to block the calling thread.
pub trait ChunkAccessor: Send + Sync {
    /// get the stored bytes for a pointer, fails if they are absent
    fn get(&self, pointer: &ChunkPointer) -> Result<Box<[u8]>>;

    /// store bytes. The iv is a seed for stores that encrypt.
    fn put(&self, data: Vec<u8>, iv: &Iv) -> Result<PutResult>;

    /// advisory decrement of the reference count of a key
    fn release(&self, key: &Hash) -> Result<()>;
}

/// A chunk accessor, we use dyn to avoid having just another type parameter
pub type ArcChunkAccessor = Arc<dyn ChunkAccessor + 'static>;

impl ChunkAccessor for ArcChunkAccessor {
    fn get(&self, pointer: &ChunkPointer) -> Result<Box<[u8]>> {
        self.as_ref().get(pointer)
    }

    fn put(&self, data: Vec<u8>, iv: &Iv) -> Result<PutResult> {
        self.as_ref().put(data, iv)
    }

    fn release(&self, key: &Hash) -> Result<()> {
        self.as_ref().release(key)
    }
}
