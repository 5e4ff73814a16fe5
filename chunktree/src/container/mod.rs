//! position addressed chunk container
//!
//! A container is a tree of nodes over a sequence of data chunks. Positions are
//! resolved by summing the `data_length` of pointers, so no offsets are stored.
//!
//! Edits only touch the affected node and the lengths of its ancestors. All
//! restructuring is deferred to [flush](ChunkContainer::flush), which brings the
//! tree into the unique shape that the node splitter defines for the current
//! sequence of data chunks. That shape only depends on the data chunks, so the
//! root hash can be computed independently by a [ChunkHasher](crate::ChunkHasher).
use crate::{
    config::Config,
    error::Error,
    hash::Hash,
    node::{Node, NodeId, Nodes},
    pointer::{CachedChunk, ChunkPointer, ChunkRef, DataChunk, Iv},
    splitter::{node_splitter, ChunkSplitter},
    store::{ArcChunkAccessor, PutResult},
    stream::{ContainerReader, ContainerWriter, WriteMode},
    write_strategy::Padder,
};
use anyhow::Result;
use rand::RngCore;
use std::{collections::BTreeMap, fmt, sync::Arc};
use tracing::*;
mod balance;
mod cache;
mod reference;

use cache::CacheManager;
pub use cache::{KEPT_METADATA_LEVELS, TARGET_CAPACITY, TRIGGER_CAPACITY};
pub use reference::ChunkContainerRef;

#[cfg(feature = "metrics")]
use crate::prom;

/// trees deeper than this can not be produced by any valid configuration
const MAX_LEVEL: u32 = 64;

/// Where a data chunk would be inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPosition {
    leaf: NodeId,
    /// index in the slots of the leaf node
    pub index: usize,
}

/// Summary of a node, for visualization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub level: u32,
    /// number of slots
    pub children: usize,
    pub data_length: u64,
    /// the node is materialized in memory
    pub cached: bool,
}

/// A node in a depth first walk over the tree
pub(crate) struct Visit<'a> {
    /// arena id, if the node is materialized
    pub id: Option<NodeId>,
    /// pointer to this node, none for the root
    pub pointer: Option<&'a ChunkPointer>,
    pub level: u32,
    pub slots: &'a [ChunkPointer],
    pub depth: usize,
}

pub struct ChunkContainer {
    accessor: ArcChunkAccessor,
    config: Config,
    nodes: Nodes,
    root: NodeId,
    /// pointer to the persisted root, as of the last flush
    root_pointer: ChunkPointer,
    cache: CacheManager,
    padder: Padder,
    node_splitter: Box<dyn ChunkSplitter>,
    /// box hashes that were unreachable from the root after an edit or flush
    superseded: Vec<Hash>,
}

impl fmt::Debug for ChunkContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkContainer")
            .field("length", &self.length())
            .field("height", &self.height())
            .field("nodes", &self.nodes.len())
            .field("root", &self.root_pointer)
            .finish()
    }
}

impl ChunkContainer {
    /// create a new, empty container
    pub fn create(accessor: ArcChunkAccessor, config: Config) -> Result<Self> {
        Self::open(accessor, &ChunkContainerRef::empty(config))
    }

    /// open a container from a reference record written by [flush](Self::flush)
    pub fn open(accessor: ArcChunkAccessor, reference: &ChunkContainerRef) -> Result<Self> {
        let config = reference.config.clone();
        config.validate()?;
        if reference.height == 0 || reference.height > MAX_LEVEL {
            return Err(Error::UnknownLevel(reference.height).into());
        }
        let root_pointer = reference.root_pointer();
        let mut nodes = Nodes::default();
        let root = if reference.level == 0 {
            if reference.height != 1 {
                return Err(Error::UnknownLevel(reference.height).into());
            }
            let slots = if reference.length == 0 {
                Vec::new()
            } else {
                vec![root_pointer.clone()]
            };
            Node::new(1, None, slots)
        } else {
            if reference.level != reference.height {
                return Err(Error::UnknownLevel(reference.level).into());
            }
            let bytes = Self::fetch(&accessor, &root_pointer)?;
            let slots = Node::deserialize(
                &bytes,
                root_pointer.data_length,
                root_pointer.level,
                config.boxing.compact_pointers,
            )?;
            let node = Node::new(root_pointer.level, None, slots);
            Self::verify(&root_pointer, node.hash())?;
            node
        };
        let root = nodes.insert(Node {
            on_disk: true,
            ..root
        });
        let node_splitter = node_splitter(&config.chunking, config.boxing.node_size_factor());
        let padder = Padder::new(&config);
        info!(
            "container opened length={} height={}",
            reference.length, reference.height
        );
        Ok(Self {
            accessor,
            config,
            nodes,
            root,
            root_pointer,
            cache: CacheManager::default(),
            padder,
            node_splitter,
            superseded: Vec::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn accessor(&self) -> &ArcChunkAccessor {
        &self.accessor
    }

    /// total logical length, including unflushed edits
    pub fn length(&self) -> u64 {
        self.nodes
            .get(self.root)
            .map(|root| root.data_length())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// level of the root node
    pub fn height(&self) -> u32 {
        self.nodes
            .get(self.root)
            .map(|root| root.level)
            .unwrap_or(1)
    }

    /// the reference record as of the last flush
    pub fn reference(&self) -> ChunkContainerRef {
        ChunkContainerRef::new(self.config.clone(), &self.root_pointer, self.height())
    }

    /// the root hash as of the last flush
    pub fn root_hash(&self) -> Hash {
        self.root_pointer.data_hash
    }

    /// true if there are edits that are not yet flushed
    pub fn is_dirty(&self) -> bool {
        self.nodes
            .get(self.root)
            .map(|root| !root.on_disk)
            .unwrap_or_default()
    }

    /// box hashes that are no longer reachable from the current tree.
    ///
    /// Previous versions of the container may still refer to them, so it is up to the
    /// caller to decide whether to [release](crate::ChunkAccessor::release) them.
    pub fn drain_superseded(&mut self) -> Vec<Hash> {
        std::mem::take(&mut self.superseded)
    }

    /// number of materialized nodes
    pub fn cached_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// number of data chunks tracked by the cache
    pub fn cached_chunks(&self) -> usize {
        self.cache.len()
    }

    /// the data chunk containing `position`.
    ///
    /// The bytes are loaded and verified right away, so the returned handle can be
    /// used without access to the container. Use [leaf_pointers](Self::leaf_pointers)
    /// to look at chunks without loading them.
    pub fn get(&mut self, position: u64) -> Result<ChunkRef> {
        let (leaf, index, start) = self.locate(position)?;
        let data = self.chunk_data(leaf, index)?;
        let pointer = self.nodes.get(leaf)?.slots[index].detached();
        self.touch(leaf, pointer.data_hash)?;
        Ok(ChunkRef {
            start,
            pointer,
            data,
        })
    }

    /// where a chunk inserted at `position` goes.
    ///
    /// `position` must be the start of a data chunk or the end of the container.
    pub fn find_insert_position(&mut self, position: u64) -> Result<InsertPosition> {
        let length = self.length();
        if position > length {
            return Err(Error::OutOfRange { position, length }.into());
        }
        let mut id = self.root;
        let mut offset = position;
        loop {
            let node = self.nodes.get(id)?;
            if node.level == 1 {
                for (index, slot) in node.slots.iter().enumerate() {
                    if offset == 0 {
                        return Ok(InsertPosition { leaf: id, index });
                    }
                    if offset < slot.data_length {
                        return Err(Error::Misaligned {
                            position,
                            length: 0,
                        }
                        .into());
                    }
                    offset -= slot.data_length;
                }
                return if offset == 0 {
                    Ok(InsertPosition {
                        leaf: id,
                        index: node.slots.len(),
                    })
                } else {
                    Err(Error::OutOfRange { position, length }.into())
                };
            }
            // never advance past the last child, so the end resolves to the last leaf
            let last = node.slots.len().checked_sub(1).ok_or_else(|| {
                Error::Format(format!("empty node at level {}", node.level))
            })?;
            let mut index = last;
            for (i, slot) in node.slots.iter().enumerate() {
                if offset < slot.data_length || i == last {
                    index = i;
                    break;
                }
                offset -= slot.data_length;
            }
            id = self.child_node(id, index)?;
        }
    }

    /// store `data` as a new data chunk at `position`
    pub fn insert(&mut self, data: Vec<u8>, position: u64) -> Result<ChunkPointer> {
        if data.is_empty() {
            return Err(Error::EmptyChunk.into());
        }
        let at = self.find_insert_position(position)?;
        self.insert_at(data, at)
    }

    /// store `data` as a new data chunk at the end
    pub fn append(&mut self, data: Vec<u8>) -> Result<ChunkPointer> {
        let length = self.length();
        self.insert(data, length)
    }

    /// store `data` as a new data chunk at a position found by [find_insert_position](Self::find_insert_position)
    pub fn insert_at(&mut self, data: Vec<u8>, at: InsertPosition) -> Result<ChunkPointer> {
        if data.is_empty() {
            return Err(Error::EmptyChunk.into());
        }
        let length = self.nodes.get(at.leaf)?.slots.len();
        if at.index > length {
            return Err(Error::DanglingNode.into());
        }
        let pointer = self.store_data(data)?;
        let result = pointer.detached();
        self.nodes.get_mut(at.leaf)?.slots.insert(at.index, pointer);
        self.adjust_lengths(at.leaf, result.data_length as i64)?;
        self.touch(at.leaf, result.data_hash)?;
        Ok(result)
    }

    /// remove the data chunk starting at `position`, which must be exactly `length` bytes long
    pub fn remove(&mut self, position: u64, length: u64) -> Result<ChunkPointer> {
        let (leaf, index, start) = self.locate(position)?;
        let node = self.nodes.get_mut(leaf)?;
        if start != position || node.slots[index].data_length != length {
            return Err(Error::Misaligned { position, length }.into());
        }
        let removed = node.slots.remove(index);
        self.cache.remove(&(leaf, removed.data_hash));
        self.supersede(removed.box_hash);
        self.adjust_lengths(leaf, -(length as i64))?;
        self.remove_if_empty(leaf)?;
        Ok(removed.detached())
    }

    /// all data chunk pointers, in order
    pub fn leaf_pointers(&self) -> Result<Vec<ChunkPointer>> {
        let mut result = Vec::new();
        self.walk(|visit| {
            if visit.level == 1 {
                result.extend(visit.slots.iter().map(|slot| slot.detached()));
            }
            Ok(())
        })?;
        Ok(result)
    }

    /// structural problems of the tree, empty if everything is fine
    pub fn check_invariants(&self) -> Result<Vec<String>> {
        let mut msgs = Vec::new();
        macro_rules! check {
            ($expression:expr) => {
                if !$expression {
                    let text = stringify!($expression);
                    msgs.push(text.to_string());
                }
            };
        }
        self.walk(|visit| {
            check!(visit.level >= 1);
            check!(visit.pointer.is_none() || !visit.slots.is_empty());
            for slot in visit.slots {
                check!(slot.level + 1 == visit.level);
                check!(slot.data_length > 0);
            }
            let data_length = visit.slots.iter().map(|slot| slot.data_length).sum::<u64>();
            if let Some(pointer) = visit.pointer {
                check!(pointer.data_length == data_length);
            } else {
                check!(visit.level == self.height());
            }
            if let Some(id) = visit.id {
                let node = self.nodes.get(id)?;
                check!(node.level == visit.level);
                for slot in &node.slots {
                    if let Some(child) = slot.cached_node() {
                        let child = self.nodes.get(child)?;
                        check!(child.parent == Some(id));
                        check!(child.level == slot.level);
                        check!(!child.on_disk || slot.data_hash == child.hash());
                    }
                    check!(slot.cached_data().is_none() || slot.level == 0);
                }
                check!(node.on_disk || node.parent.map_or(true, |p| self
                    .nodes
                    .get(p)
                    .map(|p| !p.on_disk)
                    .unwrap_or_default()));
            }
            Ok(())
        })?;
        Ok(msgs)
    }

    /// panics with all invariant violations, for tests
    pub fn assert_invariants(&self) -> Result<()> {
        let msgs = self.check_invariants()?;
        if !msgs.is_empty() {
            for msg in &msgs {
                error!("Invariant failed: {}", msg);
            }
            panic!("assert_invariants failed: {:?}", msgs);
        }
        Ok(())
    }

    /// log the shape of the tree
    pub fn dump(&self) -> Result<()> {
        info!(
            "ChunkContainer(length={}, height={}, dirty={})",
            self.length(),
            self.height(),
            self.is_dirty()
        );
        self.walk(|visit| {
            let prefix = "  ".repeat(visit.depth + 1);
            let cached = visit.id.is_some();
            if visit.level == 1 {
                info!(
                    "{}Leaf(chunks={}, length={}, cached={})",
                    prefix,
                    visit.slots.len(),
                    visit.slots.iter().map(|x| x.data_length).sum::<u64>(),
                    cached,
                );
            } else {
                info!(
                    "{}Branch(level={}, children={}, length={}, cached={})",
                    prefix,
                    visit.level,
                    visit.slots.len(),
                    visit.slots.iter().map(|x| x.data_length).sum::<u64>(),
                    cached,
                );
            }
            Ok(())
        })
    }

    /// Nodes and edges of the tree, with nodes numbered in depth first order.
    ///
    /// `f` maps a node number and its summary to the node type of the graph.
    pub fn dump_graph<S>(
        &self,
        f: impl Fn((usize, NodeInfo)) -> S,
    ) -> Result<(Vec<(usize, usize)>, BTreeMap<usize, S>)> {
        let mut nodes = BTreeMap::new();
        let mut edges = Vec::new();
        // ids of the ancestors of the current node, by depth
        let mut path: Vec<usize> = Vec::new();
        self.walk(|visit| {
            let id = nodes.len();
            path.truncate(visit.depth);
            if let Some(parent) = path.last() {
                edges.push((*parent, id));
            }
            path.push(id);
            let info = NodeInfo {
                level: visit.level,
                children: visit.slots.len(),
                data_length: visit.slots.iter().map(|x| x.data_length).sum(),
                cached: visit.id.is_some(),
            };
            nodes.insert(id, f((id, info)));
            Ok(())
        })?;
        Ok((edges, nodes))
    }

    /// sequential reader starting at position 0
    pub fn reader(&mut self) -> ContainerReader<'_> {
        ContainerReader::new(self)
    }

    /// writer starting at position 0
    pub fn writer(&mut self, mode: WriteMode) -> ContainerWriter<'_> {
        ContainerWriter::new(self, mode)
    }

    /// depth first walk over all nodes, loading the ones that are not materialized without caching them
    pub(crate) fn walk(&self, mut f: impl FnMut(Visit<'_>) -> Result<()>) -> Result<()> {
        enum Item {
            Cached(NodeId, Option<ChunkPointer>),
            Stored(ChunkPointer),
        }
        let compact = self.config.boxing.compact_pointers;
        let mut stack = vec![(Item::Cached(self.root, None), 0usize)];
        while let Some((item, depth)) = stack.pop() {
            let (id, pointer, level, slots) = match item {
                Item::Cached(id, pointer) => {
                    let node = self.nodes.get(id)?;
                    (Some(id), pointer, node.level, node.slots.clone())
                }
                Item::Stored(pointer) => {
                    let bytes = Self::fetch(&self.accessor, &pointer)?;
                    let slots =
                        Node::deserialize(&bytes, pointer.data_length, pointer.level, compact)?;
                    let level = pointer.level;
                    (None, Some(pointer), level, slots)
                }
            };
            f(Visit {
                id,
                pointer: pointer.as_ref(),
                level,
                slots: &slots,
                depth,
            })?;
            if level > 1 {
                for slot in slots.iter().rev() {
                    let item = match slot.cached_node() {
                        Some(child) => Item::Cached(child, Some(slot.detached())),
                        None => Item::Stored(slot.detached()),
                    };
                    stack.push((item, depth + 1));
                }
            }
        }
        Ok(())
    }

    /// leaf node, slot index and absolute start of the data chunk containing `position`
    fn locate(&mut self, position: u64) -> Result<(NodeId, usize, u64)> {
        let length = self.length();
        if position >= length {
            return Err(Error::OutOfRange { position, length }.into());
        }
        let mut id = self.root;
        let mut offset = position;
        let mut start = 0;
        loop {
            let node = self.nodes.get(id)?;
            let mut found = None;
            for (index, slot) in node.slots.iter().enumerate() {
                if offset < slot.data_length {
                    found = Some(index);
                    break;
                }
                offset -= slot.data_length;
                start += slot.data_length;
            }
            let index = found.ok_or(Error::OutOfRange { position, length })?;
            if node.level == 1 {
                return Ok((id, index, start));
            }
            id = self.child_node(id, index)?;
        }
    }

    /// materialize the child node at `index` of `parent`
    pub(crate) fn child_node(&mut self, parent: NodeId, index: usize) -> Result<NodeId> {
        let slot = self
            .nodes
            .get(parent)?
            .slots
            .get(index)
            .ok_or(Error::DanglingNode)?;
        if let Some(id) = slot.cached_node() {
            return Ok(id);
        }
        if slot.level == 0 {
            return Err(Error::UnknownLevel(0).into());
        }
        let pointer = slot.detached();
        let bytes = Self::fetch(&self.accessor, &pointer)?;
        let slots = Node::deserialize(
            &bytes,
            pointer.data_length,
            pointer.level,
            self.config.boxing.compact_pointers,
        )?;
        let node = Node {
            on_disk: true,
            ..Node::new(pointer.level, Some(parent), slots)
        };
        Self::verify(&pointer, node.hash())?;
        let id = self.nodes.insert(node);
        self.nodes.get_mut(parent)?.slots[index].cached = Some(CachedChunk::Node(id));
        trace!("loaded node {:?} level={}", id, pointer.level);
        Ok(id)
    }

    /// materialize the data chunk at `index` of `leaf`
    fn chunk_data(&mut self, leaf: NodeId, index: usize) -> Result<Arc<DataChunk>> {
        let slot = self
            .nodes
            .get(leaf)?
            .slots
            .get(index)
            .ok_or(Error::DanglingNode)?;
        if let Some(data) = slot.cached_data() {
            return Ok(data.clone());
        }
        let pointer = slot.detached();
        let bytes = Self::fetch(&self.accessor, &pointer)?;
        let data = DataChunk::with_length(bytes.into_vec(), pointer.data_length as usize)?;
        Self::verify(&pointer, data.hash())?;
        let data = Arc::new(data);
        self.nodes.get_mut(leaf)?.slots[index].cached = Some(CachedChunk::Data(data.clone()));
        Ok(data)
    }

    fn fetch(accessor: &ArcChunkAccessor, pointer: &ChunkPointer) -> Result<Box<[u8]>> {
        #[cfg(feature = "metrics")]
        let _timer = prom::CHUNK_GET_HIST.start_timer();
        let bytes = accessor.get(pointer)?;
        #[cfg(feature = "metrics")]
        prom::CHUNK_GET_SIZE_HIST.observe(bytes.len() as f64);
        Ok(bytes)
    }

    fn verify(pointer: &ChunkPointer, actual: Hash) -> Result<()> {
        if pointer.data_hash != actual {
            return Err(Error::IntegrityMismatch {
                expected: pointer.data_hash,
                actual,
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn store(&mut self, data: Vec<u8>, level: u32, iv: &Iv) -> Result<PutResult> {
        let boxed = self.padder.finalize(data, level);
        #[cfg(feature = "metrics")]
        let _timer = prom::CHUNK_PUT_HIST.start_timer();
        #[cfg(feature = "metrics")]
        prom::CHUNK_PUT_SIZE_HIST.observe(boxed.len() as f64);
        self.accessor.put(boxed, iv)
    }

    /// iv for a chunk, derived from its hash for compact pointers
    pub(crate) fn iv_for(&self, data_hash: &Hash) -> Iv {
        if self.config.boxing.compact_pointers {
            ChunkPointer::derived_iv(data_hash)
        } else {
            let mut iv = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut iv);
            iv
        }
    }

    fn store_data(&mut self, data: Vec<u8>) -> Result<ChunkPointer> {
        let data_hash = Hash::digest(&data);
        let iv = self.iv_for(&data_hash);
        let result = self.store(data.clone(), 0, &iv)?;
        trace!(
            "data chunk stored length={} present={}",
            data.len(),
            result.was_present
        );
        let mut pointer = ChunkPointer::new(data_hash, result.key, iv, data.len() as u64, 0);
        pointer.cached = Some(Arc::new(DataChunk::new(data)).into());
        Ok(pointer)
    }

    /// add `delta` to the length of `id` and all its ancestors, marking them as modified
    pub(crate) fn adjust_lengths(&mut self, mut id: NodeId, delta: i64) -> Result<()> {
        loop {
            let node = self.nodes.get_mut(id)?;
            node.on_disk = false;
            let parent = match node.parent {
                Some(parent) => parent,
                None => return Ok(()),
            };
            let parent_node = self.nodes.get_mut(parent)?;
            let index = parent_node.index_of(id).ok_or(Error::DanglingNode)?;
            let slot = &mut parent_node.slots[index];
            slot.data_length = (slot.data_length as i64 + delta) as u64;
            id = parent;
        }
    }

    pub(crate) fn mark_dirty(&mut self, id: NodeId) -> Result<()> {
        self.adjust_lengths(id, 0)
    }

    /// remove `id` from the tree if it has no slots left, and so on for its ancestors
    pub(crate) fn remove_if_empty(&mut self, mut id: NodeId) -> Result<()> {
        loop {
            let node = self.nodes.get_mut(id)?;
            if !node.slots.is_empty() {
                return Ok(());
            }
            let parent = match node.parent {
                Some(parent) => parent,
                None => {
                    // an empty root is a leaf
                    node.level = 1;
                    node.on_disk = false;
                    return Ok(());
                }
            };
            self.nodes.remove(id)?;
            let parent_node = self.nodes.get_mut(parent)?;
            let index = parent_node.index_of(id).ok_or(Error::DanglingNode)?;
            let removed = parent_node.slots.remove(index);
            debug!("removed empty node {:?} level={}", id, removed.level);
            self.supersede(removed.box_hash);
            self.mark_dirty(parent)?;
            id = parent;
        }
    }

    pub(crate) fn supersede(&mut self, box_hash: Hash) {
        if !box_hash.is_zero() {
            self.superseded.push(box_hash);
        }
    }

    /// move a slot to the end of `target`, keeping the arena consistent
    pub(crate) fn attach(&mut self, target: NodeId, source: NodeId, mut slot: ChunkPointer) -> Result<()> {
        if let Some(child) = slot.cached_node() {
            self.nodes.get_mut(child)?.parent = Some(target);
        } else if slot.cached_data().is_some() {
            // cached bytes stay with the leaf they were loaded for
            self.cache.remove(&(source, slot.data_hash));
            slot.cached = None;
        }
        self.nodes.get_mut(target)?.slots.push(slot);
        Ok(())
    }

    /// mark a data chunk as recently used, evicting old ones if needed
    fn touch(&mut self, leaf: NodeId, data_hash: Hash) -> Result<()> {
        for entry in self.cache.touch((leaf, data_hash)) {
            self.evict(entry.0, entry.1)?;
        }
        Ok(())
    }

    /// drop cached data of a leaf, and then all ancestors that no longer hold anything cached
    fn evict(&mut self, leaf: NodeId, data_hash: Hash) -> Result<()> {
        if !self.nodes.contains(leaf) {
            return Ok(());
        }
        for slot in self.nodes.get_mut(leaf)?.slots.iter_mut() {
            if slot.data_hash == data_hash && slot.cached_data().is_some() {
                slot.cached = None;
            }
        }
        #[cfg(feature = "metrics")]
        prom::CACHE_EVICTIONS.inc();
        let height = self.height();
        let mut id = leaf;
        loop {
            let node = self.nodes.get(id)?;
            let parent = match node.parent {
                Some(parent) => parent,
                None => return Ok(()),
            };
            if !node.on_disk
                || node.level + KEPT_METADATA_LEVELS > height
                || node.slots.iter().any(|slot| slot.cached.is_some())
            {
                return Ok(());
            }
            self.nodes.remove(id)?;
            let parent_node = self.nodes.get_mut(parent)?;
            if let Some(index) = parent_node.index_of(id) {
                parent_node.slots[index].cached = None;
            }
            trace!("evicted node {:?}", id);
            id = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemAccessor;

    fn container(config: Config) -> anyhow::Result<ChunkContainer> {
        ChunkContainer::create(Arc::new(MemAccessor::default()), config)
    }

    #[test]
    fn empty_container() -> anyhow::Result<()> {
        let mut c = container(Config::debug())?;
        assert_eq!(c.length(), 0);
        assert_eq!(c.height(), 1);
        let r = c.flush()?;
        assert!(r.root_hash().is_zero());
        assert!(r.is_empty());
        assert!(c.get(0).is_err());
        c.assert_invariants()?;
        Ok(())
    }

    #[test]
    fn short_data_persists_no_node() -> anyhow::Result<()> {
        let store = MemAccessor::default();
        let mut c = ChunkContainer::create(Arc::new(store.clone()), Config::debug())?;
        c.append(b"hello".to_vec())?;
        let r = c.flush()?;
        assert_eq!(r.level, 0);
        assert_eq!(r.height, 1);
        assert_eq!(r.root_hash(), Hash::digest(b"hello"));
        // only the data chunk itself was stored
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn insert_requires_boundary() -> anyhow::Result<()> {
        let mut c = container(Config::debug())?;
        c.append(b"abcd".to_vec())?;
        let err = c.insert(b"x".to_vec(), 2).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Misaligned { .. })));
        let err = c.insert(b"x".to_vec(), 5).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::OutOfRange { .. })));
        let err = c.insert(Vec::new(), 0).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::EmptyChunk)));
        c.insert(b"x".to_vec(), 4)?;
        c.insert(b"y".to_vec(), 0)?;
        assert_eq!(c.length(), 6);
        assert_eq!(c.get(0)?.data.as_slice(), b"y");
        assert_eq!(c.get(5)?.data.as_slice(), b"x");
        assert_eq!(c.get(3)?.start, 1);
        Ok(())
    }

    #[test]
    fn graph_of_a_small_tree() -> anyhow::Result<()> {
        let mut c = container(Config::debug())?;
        for _ in 0..3 {
            c.append(vec![1u8; 64])?;
        }
        c.flush()?;
        // a root with two leaves
        let (edges, nodes) = c.dump_graph(|(_, info)| info)?;
        assert_eq!(edges, vec![(0, 1), (0, 2)]);
        assert_eq!(nodes[&0].level, 2);
        assert_eq!(nodes[&1].children, 2);
        assert_eq!(nodes[&2].data_length, 64);
        Ok(())
    }

    #[test]
    fn remove_requires_exact_chunk() -> anyhow::Result<()> {
        let mut c = container(Config::debug())?;
        c.append(b"abcd".to_vec())?;
        c.append(b"ef".to_vec())?;
        assert!(c.remove(1, 3).is_err());
        assert!(c.remove(0, 3).is_err());
        let removed = c.remove(4, 2)?;
        assert_eq!(removed.data_length, 2);
        assert_eq!(c.length(), 4);
        c.remove(0, 4)?;
        assert!(c.is_empty());
        assert_eq!(c.drain_superseded().len(), 2);
        c.assert_invariants()?;
        Ok(())
    }
}
