use crate::{
    config::Config,
    hash::Hash,
    pointer::{ChunkPointer, Iv},
};
use serde::{Deserialize, Serialize};

/// Persisted reference to a container.
///
/// Holds everything needed to find the root node and to keep chunking the
/// container the same way it was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkContainerRef {
    pub config: Config,
    /// total logical length
    pub length: u64,
    /// level of the root node, 1 for short data
    pub height: u32,
    /// level of the chunk the root fields refer to. 0 for short data, then the
    /// root fields describe the only data chunk, or are zero for an empty container.
    pub level: u32,
    pub data_hash: Hash,
    pub box_hash: Hash,
    #[serde(with = "hex_iv")]
    pub iv: Iv,
}

impl ChunkContainerRef {
    pub(crate) fn new(config: Config, root: &ChunkPointer, height: u32) -> Self {
        Self {
            config,
            length: root.data_length,
            height,
            level: root.level,
            data_hash: root.data_hash,
            box_hash: root.box_hash,
            iv: root.iv,
        }
    }

    /// an empty container
    pub fn empty(config: Config) -> Self {
        Self::new(config, &ChunkPointer::empty(), 1)
    }

    pub fn root_pointer(&self) -> ChunkPointer {
        ChunkPointer::new(
            self.data_hash,
            self.box_hash,
            self.iv,
            self.length,
            self.level,
        )
    }

    /// the root hash, zero for an empty container
    pub fn root_hash(&self) -> Hash {
        self.data_hash
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

mod hex_iv {
    use crate::pointer::Iv;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::convert::TryInto;

    pub fn serialize<S: Serializer>(iv: &Iv, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(iv))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Iv, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(&text).map_err(de::Error::custom)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| de::Error::custom("expected 16 hex encoded bytes"))
    }
}
