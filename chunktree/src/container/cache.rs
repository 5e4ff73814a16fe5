use crate::{hash::Hash, node::NodeId};
use lru::LruCache;

/// number of leaf chunks kept after an eviction pass
pub const TARGET_CAPACITY: usize = 10;
/// number of leaf chunks that triggers an eviction pass
pub const TRIGGER_CAPACITY: usize = 15;
/// number of levels at the top of the tree, root included, that are never evicted
pub const KEPT_METADATA_LEVELS: u32 = 2;

/// A cached data chunk, identified by the leaf node holding its pointer
pub(crate) type CacheEntry = (NodeId, Hash);

/// LRU bookkeeping of materialized data chunks.
///
/// This only decides *what* to evict. Dropping the cached bytes and walking up
/// to release now unused nodes is done by the container.
pub(crate) struct CacheManager {
    entries: LruCache<CacheEntry, ()>,
    target_capacity: usize,
    trigger_capacity: usize,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("len", &self.entries.len())
            .field("target_capacity", &self.target_capacity)
            .field("trigger_capacity", &self.trigger_capacity)
            .finish()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(TARGET_CAPACITY, TRIGGER_CAPACITY)
    }
}

impl CacheManager {
    pub fn new(target_capacity: usize, trigger_capacity: usize) -> Self {
        Self {
            // eviction is batched, so the lru itself never drops anything
            entries: LruCache::unbounded(),
            target_capacity,
            trigger_capacity: trigger_capacity.max(target_capacity),
        }
    }

    /// mark an entry as most recently used. Returns entries to evict, oldest first.
    pub fn touch(&mut self, entry: CacheEntry) -> Vec<CacheEntry> {
        self.entries.put(entry, ());
        let mut evicted = Vec::new();
        if self.entries.len() >= self.trigger_capacity {
            while self.entries.len() > self.target_capacity {
                match self.entries.pop_lru() {
                    Some((entry, _)) => evicted.push(entry),
                    None => break,
                }
            }
        }
        evicted
    }

    /// forget an entry without evicting anything
    pub fn remove(&mut self, entry: &CacheEntry) -> bool {
        self.entries.pop(entry).is_some()
    }

    /// the entry moved to a different leaf node
    pub fn rename(&mut self, from: &CacheEntry, to: CacheEntry) {
        if self.entries.pop(from).is_some() {
            self.entries.put(to, ());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
