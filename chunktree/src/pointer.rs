//! chunk pointers and materialized chunks
use crate::{error::Error, hash::Hash, node::NodeId};
use anyhow::Result;
use derive_more::From;
use std::{convert::TryInto, fmt, sync::Arc};

/// Initialization vector handed to the accessor when a chunk is stored
pub type Iv = [u8; 16];

/// size of the serialized length field
const LENGTH_SIZE: usize = 8;
const IV_SIZE: usize = 16;

/// The bytes of a data chunk.
///
/// The buffer may be longer than the logical length when it was read back from
/// storage with padding applied.
#[derive(Clone, PartialEq, Eq)]
pub struct DataChunk {
    buffer: Vec<u8>,
    length: usize,
}

impl DataChunk {
    pub fn new(data: Vec<u8>) -> Self {
        let length = data.len();
        Self {
            buffer: data,
            length,
        }
    }

    /// a chunk with a physical buffer that is longer than its logical content
    pub fn with_length(buffer: Vec<u8>, length: usize) -> Result<Self> {
        if length > buffer.len() {
            return Err(Error::Format(format!(
                "declared length {} exceeds buffer of {} bytes",
                length,
                buffer.len()
            ))
            .into());
        }
        Ok(Self { buffer, length })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.length]
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn hash(&self) -> Hash {
        Hash::digest(self.as_slice())
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.buffer.truncate(self.length);
        self.buffer
    }
}

impl AsRef<[u8]> for DataChunk {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for DataChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataChunk")
            .field("length", &self.length)
            .field("physical", &self.buffer.len())
            .finish()
    }
}

/// In memory materialization of the chunk a pointer refers to
#[derive(Debug, Clone, From)]
pub(crate) enum CachedChunk {
    /// bytes of a level 0 chunk
    Data(Arc<DataChunk>),
    /// a tree node in the container's node arena
    Node(NodeId),
}

/// Reference to a chunk, either raw data (level 0) or a tree node.
///
/// `data_length` is the logical length of everything below this pointer, so
/// positions can be resolved by summing lengths without storing offsets.
#[derive(Clone)]
pub struct ChunkPointer {
    /// hash of the plaintext. For nodes, the hash of the concatenated data hashes of the children.
    pub data_hash: Hash,
    /// key under which the accessor stored the boxed bytes
    pub box_hash: Hash,
    pub iv: Iv,
    pub data_length: u64,
    pub level: u32,
    pub(crate) cached: Option<CachedChunk>,
}

impl ChunkPointer {
    pub fn new(data_hash: Hash, box_hash: Hash, iv: Iv, data_length: u64, level: u32) -> Self {
        Self {
            data_hash,
            box_hash,
            iv,
            data_length,
            level,
            cached: None,
        }
    }

    /// pointer to nothing, used as the root of an empty container
    pub fn empty() -> Self {
        Self::new(Hash::zero(), Hash::zero(), [0u8; 16], 0, 0)
    }

    /// size of one serialized pointer
    pub const fn encoded_size(compact: bool) -> usize {
        if compact {
            LENGTH_SIZE + 2 * Hash::SIZE
        } else {
            LENGTH_SIZE + 2 * Hash::SIZE + IV_SIZE
        }
    }

    /// iv derived from the data hash, used by the compact encoding
    pub fn derived_iv(data_hash: &Hash) -> Iv {
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&data_hash.as_bytes()[..IV_SIZE]);
        iv
    }

    pub fn is_data(&self) -> bool {
        self.level == 0
    }

    /// true if the pointer was persisted at least once
    pub fn is_stored(&self) -> bool {
        !self.box_hash.is_zero()
    }

    /// a copy without the in memory materialization
    pub fn detached(&self) -> Self {
        Self {
            cached: None,
            ..self.clone()
        }
    }

    pub(crate) fn cached_node(&self) -> Option<NodeId> {
        match &self.cached {
            Some(CachedChunk::Node(id)) => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn cached_data(&self) -> Option<&Arc<DataChunk>> {
        match &self.cached {
            Some(CachedChunk::Data(data)) => Some(data),
            _ => None,
        }
    }

    /// `length:i64 BE | data_hash | box_hash | iv`, the iv is omitted in compact form
    pub fn write(&self, compact: bool, target: &mut Vec<u8>) {
        target.extend_from_slice(&(self.data_length as i64).to_be_bytes());
        target.extend_from_slice(self.data_hash.as_bytes());
        target.extend_from_slice(self.box_hash.as_bytes());
        if !compact {
            target.extend_from_slice(&self.iv);
        }
    }

    /// reads a pointer at the start of `data`, the level is implied by the containing node
    pub fn read(data: &[u8], compact: bool, level: u32) -> Result<Self> {
        let size = Self::encoded_size(compact);
        if data.len() < size {
            return Err(Error::Format(format!(
                "truncated pointer: {} of {} bytes",
                data.len(),
                size
            ))
            .into());
        }
        let length = i64::from_be_bytes(data[..LENGTH_SIZE].try_into()?);
        if length <= 0 {
            return Err(Error::Format(format!("invalid pointer length {}", length)).into());
        }
        let data_hash = Hash::read(&data[LENGTH_SIZE..])?;
        let box_hash = Hash::read(&data[LENGTH_SIZE + Hash::SIZE..])?;
        let iv = if compact {
            Self::derived_iv(&data_hash)
        } else {
            data[LENGTH_SIZE + 2 * Hash::SIZE..size].try_into()?
        };
        Ok(Self::new(data_hash, box_hash, iv, length as u64, level))
    }
}

impl PartialEq for ChunkPointer {
    fn eq(&self, other: &Self) -> bool {
        self.data_hash == other.data_hash
            && self.box_hash == other.box_hash
            && self.iv == other.iv
            && self.data_length == other.data_length
            && self.level == other.level
    }
}

impl Eq for ChunkPointer {}

impl fmt::Debug for ChunkPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkPointer")
            .field("level", &self.level)
            .field("data_length", &self.data_length)
            .field("data_hash", &self.data_hash)
            .field("box_hash", &self.box_hash)
            .field("cached", &self.cached.is_some())
            .finish()
    }
}

/// A data chunk located in a container
#[derive(Debug, Clone)]
pub struct ChunkRef {
    /// absolute position of the first byte of the chunk
    pub start: u64,
    pub pointer: ChunkPointer,
    pub data: Arc<DataChunk>,
}

impl ChunkRef {
    /// position after the last byte of the chunk
    pub fn end(&self) -> u64 {
        self.start + self.pointer.data_length
    }

    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && position < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer() -> ChunkPointer {
        let data_hash = Hash::digest(b"data");
        ChunkPointer::new(data_hash, Hash::digest(b"box"), [7u8; 16], 1234, 1)
    }

    #[test]
    fn wire_format() -> anyhow::Result<()> {
        let p = pointer();
        let mut full = Vec::new();
        p.write(false, &mut full);
        assert_eq!(full.len(), 88);
        assert_eq!(&full[..8], &1234i64.to_be_bytes());
        assert_eq!(&full[8..40], p.data_hash.as_bytes());
        assert_eq!(&full[72..], &[7u8; 16]);
        assert_eq!(ChunkPointer::read(&full, false, 1)?, p);

        let mut compact = Vec::new();
        p.write(true, &mut compact);
        assert_eq!(compact.len(), 72);
        let q = ChunkPointer::read(&compact, true, 1)?;
        assert_eq!(q.iv, ChunkPointer::derived_iv(&p.data_hash));
        assert_eq!(q.data_length, p.data_length);
        Ok(())
    }

    #[test]
    fn rejects_garbage() {
        let mut bytes = Vec::new();
        pointer().write(true, &mut bytes);
        assert!(ChunkPointer::read(&bytes[..40], true, 1).is_err());
        bytes[..8].copy_from_slice(&(-1i64).to_be_bytes());
        let err = ChunkPointer::read(&bytes, true, 1).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Format(_))));
    }

    #[test]
    fn equality_ignores_cache() {
        let a = pointer();
        let mut b = a.clone();
        b.cached = Some(Arc::new(DataChunk::new(b"data".to_vec())).into());
        assert_eq!(a, b);
        assert!(b.detached().cached.is_none());
    }

    #[test]
    fn padded_chunk() -> anyhow::Result<()> {
        let chunk = DataChunk::with_length(b"hello world".to_vec(), 5)?;
        assert_eq!(chunk.as_slice(), b"hello");
        assert_eq!(chunk.hash(), Hash::digest(b"hello"));
        assert_eq!(chunk.into_vec(), b"hello".to_vec());
        assert!(DataChunk::with_length(vec![1, 2], 3).is_err());
        Ok(())
    }
}
