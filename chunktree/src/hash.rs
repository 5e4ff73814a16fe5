//! content hashes
use anyhow::Result;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::{convert::TryInto, fmt, str::FromStr};

/// A 32 byte SHA-256 content hash.
///
/// Used both for the hash of a chunk's plaintext (`data_hash`) and for the key
/// under which an accessor stores a chunk (`box_hash`).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const SIZE: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// all zero hash, used for the root of an empty container
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = HashBuilder::new();
        hasher.update(data);
        hasher.finalize()
    }

    pub fn read(data: &[u8]) -> Result<Self> {
        anyhow::ensure!(data.len() >= Self::SIZE, "not enough bytes for a hash");
        Ok(Self(data[0..Self::SIZE].try_into()?))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(&self.0[..8]))
    }
}

impl FromStr for Hash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        anyhow::ensure!(bytes.len() == Self::SIZE, "expected 32 hex encoded bytes");
        Self::read(&bytes)
    }
}

/// serialized as a hex string
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

/// Incremental hash computation
#[derive(Clone, Default)]
pub struct HashBuilder(Sha256);

impl HashBuilder {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// finalizes the current hash and resets the builder
    pub fn finalize_reset(&mut self) -> Hash {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0.finalize_reset());
        Hash(out)
    }

    pub fn finalize(mut self) -> Hash {
        self.finalize_reset()
    }
}

impl fmt::Debug for HashBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashBuilder").finish()
    }
}
