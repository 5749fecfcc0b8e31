#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! Storage and construction of point catalog octrees.
//!
//! The `OctreeBuilder` sorts a catalog by importance and distributes it into an `Octree` topology plus one `Bucket` of points
//! per octant. The result can be kept in memory with a `MemorySource`, or persisted to an `OctreeDb` (backed by `sled`, with
//! buckets compressed by any `Compression`). Either way, runtime consumers only see the `OctreeSource` trait: the topology is
//! read once up front, and buckets are read one octant at a time.
//!
//! Also includes an `LruCache` that the runtime uses to bound the number of resident buckets.

pub mod caching;
pub mod compression;
pub mod error;
pub mod octree;
pub mod source;

#[cfg(feature = "sled")]
pub mod database;

pub use caching::*;
pub use compression::*;
pub use error::*;
pub use octree::*;
pub use source::*;

#[cfg(feature = "sled")]
pub use database::*;

// Hash types to use for small keys like `OctantId`.
pub type SmallKeyHashMap<K, V> = ahash::AHashMap<K, V>;
pub type SmallKeyHashSet<K> = ahash::AHashSet<K>;
pub type SmallKeyBuildHasher = ahash::RandomState;

pub mod prelude {
    pub use super::{
        BincodeCompression, BuildError, BuildParams, BuiltOctree, Bucket, Compressed, Compression,
        MemorySource, NoCompression, NodeIndex, Octree, OctreeBuilder, OctreeNode, OctreeSource,
        OctreeVisitor, SmallKeyHashMap, SmallKeyHashSet, SmallKeyLruCache, StorageError,
        VisitStatus,
    };

    #[cfg(feature = "lz4")]
    pub use super::Lz4;

    #[cfg(feature = "sled")]
    pub use super::OctreeDb;
}
