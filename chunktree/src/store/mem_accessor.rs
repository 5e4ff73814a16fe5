use super::{ChunkAccessor, PutResult};
use crate::{hash::Hash, pointer::ChunkPointer, pointer::Iv};
use anyhow::anyhow;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// A MemAccessor is a pure in memory, reference counted store. Mostly useful for testing.
///
/// Keys are the SHA-256 of the stored bytes. The iv is ignored, nothing is encrypted.
#[derive(Clone)]
pub struct MemAccessor(Arc<Inner>);

struct Inner {
    blocks: Mutex<Blocks>,
    max_size: usize,
}

#[derive(Debug, Default)]
struct Blocks {
    map: FnvHashMap<Hash, Entry>,
    current_size: usize,
}

#[derive(Debug)]
struct Entry {
    data: Box<[u8]>,
    refs: usize,
}

impl MemAccessor {
    pub fn new(max_size: usize) -> Self {
        Self(Arc::new(Inner {
            blocks: Mutex::new(Blocks::default()),
            max_size,
        }))
    }

    /// number of distinct chunks currently stored
    pub fn len(&self) -> usize {
        self.0.blocks.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// total size of all stored chunks
    pub fn size(&self) -> usize {
        self.0.blocks.lock().current_size
    }

    /// current reference count of a key, 0 if absent
    pub fn refs(&self, key: &Hash) -> usize {
        self.0.blocks.lock().map.get(key).map(|e| e.refs).unwrap_or_default()
    }

    pub fn into_inner(self) -> anyhow::Result<FnvHashMap<Hash, Box<[u8]>>> {
        let inner = Arc::try_unwrap(self.0).map_err(|_| anyhow!("busy"))?;
        let blocks = inner.blocks.into_inner();
        Ok(blocks
            .map
            .into_iter()
            .map(|(key, entry)| (key, entry.data))
            .collect())
    }

    fn get0(&self, key: &Hash) -> Option<Box<[u8]>> {
        let blocks = self.0.blocks.lock();
        blocks.map.get(key).map(|entry| entry.data.clone())
    }

    fn put0(&self, data: Vec<u8>) -> anyhow::Result<PutResult> {
        let key = Hash::digest(&data);
        let len = data.len();
        let mut blocks = self.0.blocks.lock();
        if let Some(entry) = blocks.map.get_mut(&key) {
            entry.refs += 1;
            return Ok(PutResult {
                key,
                was_present: true,
            });
        }
        if blocks.current_size + len > self.0.max_size {
            anyhow::bail!("full");
        }
        blocks.map.insert(
            key,
            Entry {
                data: data.into(),
                refs: 1,
            },
        );
        blocks.current_size += len;
        Ok(PutResult {
            key,
            was_present: false,
        })
    }
}

impl Default for MemAccessor {
    fn default() -> Self {
        Self::new(usize::max_value())
    }
}

impl ChunkAccessor for MemAccessor {
    fn get(&self, pointer: &ChunkPointer) -> anyhow::Result<Box<[u8]>> {
        if let Some(value) = self.get0(&pointer.box_hash) {
            tracing::trace!("get {} ({} bytes)", pointer.box_hash, value.len());
            Ok(value)
        } else {
            Err(anyhow!("not there: {}", pointer.box_hash))
        }
    }

    fn put(&self, data: Vec<u8>, _iv: &Iv) -> anyhow::Result<PutResult> {
        let result = self.put0(data)?;
        tracing::trace!("put {} present={}", result.key, result.was_present);
        Ok(result)
    }

    fn release(&self, key: &Hash) -> anyhow::Result<()> {
        let mut blocks = self.0.blocks.lock();
        let remove = match blocks.map.get_mut(key) {
            Some(entry) => {
                entry.refs -= 1;
                entry.refs == 0
            }
            None => {
                tracing::warn!("release of unknown key {}", key);
                false
            }
        };
        if remove {
            if let Some(entry) = blocks.map.remove(key) {
                blocks.current_size -= entry.data.len();
            }
        }
        Ok(())
    }
}
