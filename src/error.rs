use std::io;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ChestError>;

/// Every failure mode of a single container operation.
///
/// All variants are fatal to the operation in progress and are never retried
/// internally; callers may retry the whole operation.
#[derive(Error, Debug)]
pub enum ChestError {
    #[error("not a container: {0}")]
    NotAContainer(String),

    #[error("page {page} out of range (container has {count} pages)")]
    OutOfRange { page: u32, count: u32 },

    #[error("corrupt chain: {0}")]
    CorruptChain(String),

    #[error("corrupt catalog: {0}")]
    CorruptCatalog(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("nested container depth limit ({0}) exceeded")]
    DepthLimitExceeded(usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
