use crate::hash::Hash;

/// Error kinds raised by the chunk tree itself.
///
/// Operations return `anyhow::Result`, so these travel inside an `anyhow::Error`
/// and can be recovered with `downcast_ref::<Error>()`. Failures of the
/// underlying [ChunkAccessor](crate::store::ChunkAccessor) are passed through
/// unchanged and are not wrapped in this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Position out of range: {}, length: {}", .position, .length)]
    OutOfRange { position: u64, length: u64 },

    #[error("Misaligned access at {} with length {}", .position, .length)]
    Misaligned { position: u64, length: u64 },

    #[error("Format error: {}", .0)]
    Format(String),

    #[error("Integrity mismatch: expected {}, got {}", .expected, .actual)]
    IntegrityMismatch { expected: Hash, actual: Hash },

    #[error("Unknown chunk level {}", .0)]
    UnknownLevel(u32),

    #[error("Data chunks must not be empty")]
    EmptyChunk,

    #[error("Invalid config: {}", .0)]
    InvalidConfig(&'static str),

    #[error("Node is not part of the tree")]
    DanglingNode,
}
