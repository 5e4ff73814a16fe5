//! deferred rebalancing and persistence
//!
//! Flush restores the shape the node splitter defines for the current data
//! chunks. Levels are processed bottom up, and within a level from left to
//! right, starting with the leftmost modified node. The start of that node is
//! then always a boundary of the final shape, so splitting it where the
//! splitter triggers, or filling it from its right neighbour until it triggers,
//! makes its end a boundary as well. Nodes that were not modified keep their
//! boundaries.
use super::ChunkContainer;
use crate::{
    container::ChunkContainerRef,
    error::Error,
    node::{Node, NodeId},
    pointer::{CachedChunk, ChunkPointer},
    splitter::ChunkSplitter,
};
use anyhow::Result;
use std::collections::VecDeque;
use tracing::*;

#[cfg(feature = "metrics")]
use crate::prom;

/// Where the node splitter triggers for a sequence of slots, resetting after every trigger.
struct Boundaries {
    /// indices at which to cut, so that every piece but the last ends with a trigger
    cuts: Vec<usize>,
    /// the last piece does not end with a trigger
    open: bool,
}

fn boundaries(splitter: &mut dyn ChunkSplitter, slots: &[ChunkPointer]) -> Boundaries {
    splitter.reset();
    let mut cuts = Vec::new();
    let mut open = false;
    for (i, slot) in slots.iter().enumerate() {
        splitter.write(slot.data_hash.as_bytes());
        if splitter.is_triggered() {
            if i + 1 < slots.len() {
                cuts.push(i + 1);
            }
            splitter.reset();
            open = false;
        } else {
            open = true;
        }
    }
    Boundaries { cuts, open }
}

impl ChunkContainer {
    /// rebalance and persist all modified nodes, and return the new reference record.
    ///
    /// Flushing an unmodified container does nothing.
    pub fn flush(&mut self) -> Result<ChunkContainerRef> {
        if self.is_dirty() {
            #[cfg(feature = "metrics")]
            let _timer = prom::FLUSH_HIST.start_timer();
            self.flush_children()?;
            self.collapse_root()?;
            self.persist_root()?;
            info!(
                "flushed length={} height={} root={}",
                self.length(),
                self.height(),
                self.root_hash()
            );
        }
        Ok(self.reference())
    }

    /// rebalance and persist everything below the root, adding levels as needed
    fn flush_children(&mut self) -> Result<()> {
        loop {
            for level in 1..self.height() {
                self.balance_level(level)?;
            }
            if !self.balance_root()? {
                return Ok(());
            }
        }
    }

    /// balance and persist all modified nodes of a level below the root, from left to right
    fn balance_level(&mut self, level: u32) -> Result<()> {
        loop {
            let mut queue: VecDeque<NodeId> = self.modified_nodes(level)?.into();
            if queue.is_empty() {
                return Ok(());
            }
            while let Some(id) = queue.pop_front() {
                if !self.nodes.contains(id) || self.nodes.get(id)?.on_disk {
                    continue;
                }
                let next = self.balance(id)?;
                self.persist_node(id)?;
                // nodes right of this one that were created or changed come next
                for id in next.into_iter().rev() {
                    queue.push_front(id);
                }
            }
        }
    }

    /// modified nodes of a level below the root, in order
    fn modified_nodes(&self, level: u32) -> Result<Vec<NodeId>> {
        let mut result = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.nodes.get(id)?;
            if node.level == level {
                if node.parent.is_some() {
                    result.push(id);
                }
                continue;
            }
            // ancestors of modified nodes are always modified
            for slot in node.slots.iter().rev() {
                if let Some(child) = slot.cached_node() {
                    if !self.nodes.get(child)?.on_disk {
                        stack.push(child);
                    }
                }
            }
        }
        Ok(result)
    }

    /// Balance a node whose start is a boundary.
    ///
    /// Returns the nodes to the right of it that were created or modified.
    fn balance(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut splitter = self.node_splitter.new_instance();
        let Boundaries { cuts, open } = boundaries(splitter.as_mut(), &self.nodes.get(id)?.slots);
        if !cuts.is_empty() {
            // split from the back, so that every new sibling is inserted right after this node
            let mut siblings = Vec::with_capacity(cuts.len());
            for cut in cuts.into_iter().rev() {
                siblings.push(self.split_off(id, cut)?);
            }
            siblings.reverse();
            debug!("split {:?} into {} more nodes", id, siblings.len());
            return Ok(siblings);
        }
        if !open {
            return Ok(Vec::new());
        }
        // not full, take children from the right until the splitter triggers
        let mut neighbour = None;
        let mut pulled = 0usize;
        loop {
            let source = match neighbour {
                Some(source) => source,
                None => match self.right_neighbour(id)? {
                    Some(source) => source,
                    None => break,
                },
            };
            let slot = {
                let node = self.nodes.get_mut(source)?;
                if node.slots.is_empty() {
                    return Err(Error::Format("empty neighbour node".into()).into());
                }
                node.slots.remove(0)
            };
            let hash = slot.data_hash;
            let length = slot.data_length as i64;
            self.adjust_lengths(source, -length)?;
            self.attach(id, source, slot)?;
            self.adjust_lengths(id, length)?;
            pulled += 1;
            if self.nodes.get(source)?.slots.is_empty() {
                // find the next neighbour once this one is gone
                self.remove_if_empty(source)?;
                neighbour = None;
            } else {
                neighbour = Some(source);
            }
            splitter.write(hash.as_bytes());
            if splitter.is_triggered() {
                break;
            }
        }
        if pulled > 0 {
            debug!("pulled {} children into {:?}", pulled, id);
        }
        Ok(neighbour.into_iter().collect())
    }

    /// the node right of `id` on the same level, loading it if needed
    fn right_neighbour(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        let mut current = id;
        let mut depth = 0;
        // walk up to the first ancestor where we are not the last child
        let (mut node, index) = loop {
            let parent = match self.nodes.get(current)?.parent {
                Some(parent) => parent,
                None => return Ok(None),
            };
            let parent_node = self.nodes.get(parent)?;
            let index = parent_node.index_of(current).ok_or(Error::DanglingNode)?;
            if index + 1 < parent_node.slots.len() {
                break (parent, index + 1);
            }
            current = parent;
            depth += 1;
        };
        // and down along the leftmost path
        node = self.child_node(node, index)?;
        for _ in 0..depth {
            if self.nodes.get(node)?.slots.is_empty() {
                return Err(Error::Format("empty node below the root".into()).into());
            }
            node = self.child_node(node, 0)?;
        }
        Ok(Some(node))
    }

    /// move the slots from `at` into a new node right after `id`
    fn split_off(&mut self, id: NodeId, at: usize) -> Result<NodeId> {
        let (level, parent, tail) = {
            let node = self.nodes.get_mut(id)?;
            let tail = node.slots.split_off(at);
            (node.level, node.parent, tail)
        };
        let parent = parent.ok_or(Error::DanglingNode)?;
        let length = tail.iter().map(|slot| slot.data_length).sum::<u64>();
        let sibling = self.nodes.insert(Node::new(level, Some(parent), Vec::new()));
        for slot in tail {
            self.attach(sibling, id, slot)?;
        }
        let parent_node = self.nodes.get_mut(parent)?;
        let index = parent_node.index_of(id).ok_or(Error::DanglingNode)?;
        parent_node.slots[index].data_length -= length;
        parent_node
            .slots
            .insert(index + 1, Self::unstored_pointer(sibling, length, level));
        self.mark_dirty(id)?;
        Ok(sibling)
    }

    fn unstored_pointer(id: NodeId, data_length: u64, level: u32) -> ChunkPointer {
        let mut pointer = ChunkPointer::empty();
        pointer.data_length = data_length;
        pointer.level = level;
        pointer.cached = Some(CachedChunk::Node(id));
        pointer
    }

    /// Balance the root. If it splits, the root moves one level up, keeping its id.
    ///
    /// Returns true if a level was added.
    fn balance_root(&mut self) -> Result<bool> {
        let root = self.root;
        let cut = {
            let node = self.nodes.get(root)?;
            if node.on_disk {
                return Ok(false);
            }
            boundaries(self.node_splitter.as_mut(), &node.slots).cuts.first().copied()
        };
        let cut = match cut {
            Some(cut) => cut,
            None => return Ok(false),
        };
        let (level, slots) = {
            let node = self.nodes.get_mut(root)?;
            (node.level, std::mem::take(&mut node.slots))
        };
        let mut children = Vec::with_capacity(2);
        let mut slots = slots.into_iter();
        for count in [cut, usize::max_value()] {
            let child = self.nodes.insert(Node::new(level, Some(root), Vec::new()));
            for slot in slots.by_ref().take(count) {
                self.attach(child, root, slot)?;
            }
            let length = self.nodes.get(child)?.data_length();
            children.push(Self::unstored_pointer(child, length, level));
        }
        let node = self.nodes.get_mut(root)?;
        node.slots = children;
        node.level = level + 1;
        debug!("root split, height is now {}", level + 1);
        Ok(true)
    }

    /// replace a root with a single child by that child, as often as possible
    fn collapse_root(&mut self) -> Result<()> {
        let root = self.root;
        loop {
            let node = self.nodes.get(root)?;
            if node.level <= 1 || node.slots.len() != 1 {
                break;
            }
            let child = self.child_node(root, 0)?;
            let child_node = self.nodes.remove(child)?;
            let old = self.nodes.get(root)?.slots[0].box_hash;
            self.supersede(old);
            for slot in &child_node.slots {
                if let Some(grandchild) = slot.cached_node() {
                    self.nodes.get_mut(grandchild)?.parent = Some(root);
                } else if slot.cached_data().is_some() {
                    self.cache.rename(&(child, slot.data_hash), (root, slot.data_hash));
                }
            }
            let node = self.nodes.get_mut(root)?;
            node.slots = child_node.slots;
            node.level = child_node.level;
            node.on_disk = false;
            debug!("root collapsed, height is now {}", node.level);
        }
        let node = self.nodes.get_mut(root)?;
        if node.slots.is_empty() {
            node.level = 1;
        }
        Ok(())
    }

    /// persist the root, or just remember the only data chunk for short data
    fn persist_root(&mut self) -> Result<()> {
        let node = self.nodes.get(self.root)?;
        if node.on_disk {
            return Ok(());
        }
        if node.level == 1 && node.slots.len() <= 1 {
            let pointer = node
                .slots
                .first()
                .map(|slot| slot.detached())
                .unwrap_or_else(ChunkPointer::empty);
            if self.root_pointer.level > 0 {
                let old = self.root_pointer.box_hash;
                self.supersede(old);
            }
            self.root_pointer = pointer;
            self.nodes.get_mut(self.root)?.on_disk = true;
            Ok(())
        } else {
            self.persist_node(self.root)
        }
    }

    /// serialize and store a node, and update the pointer to it
    fn persist_node(&mut self, id: NodeId) -> Result<()> {
        let compact = self.config.boxing.compact_pointers;
        let (bytes, hash, level, length, parent) = {
            let node = self.nodes.get(id)?;
            (
                node.serialize(compact),
                node.hash(),
                node.level,
                node.data_length(),
                node.parent,
            )
        };
        let iv = self.iv_for(&hash);
        let result = self.store(bytes, level, &iv)?;
        self.nodes.get_mut(id)?.on_disk = true;
        trace!(
            "node stored level={} length={} present={}",
            level,
            length,
            result.was_present
        );
        let old = match parent {
            Some(parent) => {
                let parent_node = self.nodes.get_mut(parent)?;
                parent_node.on_disk = false;
                let index = parent_node.index_of(id).ok_or(Error::DanglingNode)?;
                let slot = &mut parent_node.slots[index];
                slot.data_hash = hash;
                slot.iv = iv;
                std::mem::replace(&mut slot.box_hash, result.key)
            }
            None => {
                let old = if self.root_pointer.level > 0 {
                    self.root_pointer.box_hash
                } else {
                    Default::default()
                };
                self.root_pointer = ChunkPointer::new(hash, result.key, iv, length, level);
                old
            }
        };
        self.supersede(old);
        Ok(())
    }
}
