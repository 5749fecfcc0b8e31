#![allow(clippy::too_many_arguments)]

//! The core data types for indexing huge point catalogs in space:
//! - `OctantId`: the path of an octant from the octree root, packed into a location code
//! - `OctantBox`: the cube covered by an octant, and the boundary rule for routing coordinates into children
//! - `Frustum` and `ViewState`: what the camera sees this frame
//! - `CatalogPoint` and `PriorityOrder`: what gets indexed and which points are most important

pub mod catalog;
pub mod frustum;
pub mod octant;
pub mod view;

pub use catalog::{BrightnessOrder, CatalogPoint, DistanceOrder, PointId, PriorityOrder, StarPoint};
pub use frustum::{Frustum, Plane};
pub use octant::{
    child_index_containing, octant_box, octant_id_at_level, OctantBox, OctantId, MAX_OCTANT_LEVEL,
};
pub use view::ViewState;

pub use glam;

pub mod prelude {
    pub use super::{
        BrightnessOrder, CatalogPoint, DistanceOrder, Frustum, OctantBox, OctantId, Plane, PointId,
        PriorityOrder, StarPoint, ViewState,
    };
    pub use glam::{DMat4, DVec3};
}
