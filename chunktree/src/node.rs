//! tree nodes and the arena that owns them
//!
//! Nodes refer to their parent by id, and pointers refer to materialized child
//! nodes by id, so there are no ownership cycles. A node is dropped from the
//! arena when it is evicted or removed from the tree. Ids are never reused,
//! so a stale id fails to resolve instead of aliasing another node.
use crate::{
    error::Error,
    hash::{Hash, HashBuilder},
    pointer::ChunkPointer,
};
use anyhow::Result;
use fnv::FnvHashMap;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    /// 1 for nodes holding data pointers
    pub level: u32,
    pub parent: Option<NodeId>,
    pub slots: Vec<ChunkPointer>,
    /// the persisted bytes reflect the current slots
    pub on_disk: bool,
}

impl Node {
    pub fn new(level: u32, parent: Option<NodeId>, slots: Vec<ChunkPointer>) -> Self {
        Self {
            level,
            parent,
            slots,
            on_disk: false,
        }
    }

    /// logical length of everything below this node
    pub fn data_length(&self) -> u64 {
        self.slots.iter().map(|slot| slot.data_length).sum()
    }

    /// hash of the concatenated data hashes of the children
    pub fn hash(&self) -> Hash {
        let mut builder = HashBuilder::new();
        for slot in &self.slots {
            builder.update(slot.data_hash.as_bytes());
        }
        builder.finalize()
    }

    /// index of the slot whose cached node is `child`
    pub fn index_of(&self, child: NodeId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.cached_node() == Some(child))
    }

    pub fn serialize(&self, compact: bool) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.slots.len() * ChunkPointer::encoded_size(compact));
        for slot in &self.slots {
            slot.write(compact, &mut result);
        }
        result
    }

    /// parse pointers until `data_length` is covered. Trailing bytes are padding.
    pub fn deserialize(data: &[u8], data_length: u64, level: u32, compact: bool) -> Result<Vec<ChunkPointer>> {
        if level == 0 {
            return Err(Error::UnknownLevel(level).into());
        }
        let size = ChunkPointer::encoded_size(compact);
        let mut slots = Vec::new();
        let mut remaining = data_length;
        let mut offset = 0;
        while remaining > 0 {
            let slot = ChunkPointer::read(&data[offset.min(data.len())..], compact, level - 1)?;
            if slot.data_length > remaining {
                return Err(Error::Format(format!(
                    "node children exceed declared length {}",
                    data_length
                ))
                .into());
            }
            remaining -= slot.data_length;
            offset += size;
            slots.push(slot);
        }
        Ok(slots)
    }
}

/// Owner of all materialized nodes of a container
#[derive(Debug, Default)]
pub(crate) struct Nodes {
    map: FnvHashMap<NodeId, Node>,
    next: u64,
}

impl Nodes {
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        self.map.insert(id, node);
        id
    }

    pub fn remove(&mut self, id: NodeId) -> Result<Node> {
        self.map.remove(&id).ok_or_else(|| Error::DanglingNode.into())
    }

    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.map.get(&id).ok_or_else(|| Error::DanglingNode.into())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.map.get_mut(&id).ok_or_else(|| Error::DanglingNode.into())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.map.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}
