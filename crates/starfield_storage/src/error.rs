use crate::OctreeError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[cfg(feature = "sled")]
    #[error("database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Octree(#[from] OctreeError),
    #[error("no octree has been written")]
    MissingRoot,
    #[error("corrupt octree data: {0}")]
    Corrupt(String),
}
