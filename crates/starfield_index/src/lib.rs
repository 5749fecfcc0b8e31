#![allow(clippy::too_many_arguments)]

//! The runtime side of a point catalog octree.
//!
//! Each frame, `OctreeIndex::update` takes the camera's `ViewState` and:
//!   1. applies bucket loads that completed since the last frame
//!   2. runs `select_octants` to rebuild the list of observed octants
//!   3. requests buckets for observed octants that are not resident
//!   4. evicts least recently used buckets once resident points exceed the budget
//!
//! Bucket reads run on a `futures` thread pool through the `BucketLoader`. The per-octant state machine is kept by the
//! `ResidencyTable`, and a `Focus` can pin one octant (and its ancestors) regardless of what the camera sees.

pub mod config;
pub mod focus;
pub mod index;
pub mod loader;
pub mod residency;
pub mod selection;

#[cfg(test)]
mod test_util;

pub use config::{IndexConfig, InvalidIndexConfig};
pub use focus::{Focus, FocusTarget};
pub use index::{FrameReport, IndexError, ObservedOctant, OctreeIndex};
pub use loader::{BucketLoader, LoadCompletion};
pub use residency::{Residency, ResidencyTable};
pub use selection::{select_octants, SelectedOctant};

pub use futures::executor::ThreadPool;

pub mod prelude {
    pub use super::{
        FocusTarget, FrameReport, IndexConfig, IndexError, ObservedOctant, OctreeIndex, Residency,
        ThreadPool,
    };
}
