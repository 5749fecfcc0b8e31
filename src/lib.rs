//! Spatial indexing and streaming for catalogs of billions of points, like star catalogs.
//!
//! This library is organized into several crates:
//! - **core**: octant identifiers and boxes, view frusta, and the `CatalogPoint` abstraction
//! - **storage**: the offline `OctreeBuilder`, the octree topology, point buckets and their persistence
//! - **index**: the runtime `OctreeIndex` that selects observed octants each frame and streams their buckets in and out
//!
//! A typical pipeline builds an octree once with `OctreeBuilder`, writes it to an `OctreeDb`, and then opens that database
//! as the `OctreeSource` of an `OctreeIndex` in the interactive application.

pub use starfield_core as core;
pub use starfield_index as index;
pub use starfield_storage as storage;

pub mod prelude {
    pub use super::core::prelude::*;
    pub use super::index::prelude::*;
    pub use super::storage::prelude::*;
}
