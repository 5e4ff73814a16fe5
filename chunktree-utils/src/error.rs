use chunktree::Hash;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("chunk {} not found", .0)]
    NotFound(Hash),
}
