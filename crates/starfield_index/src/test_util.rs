use crate::IndexConfig;

use starfield_core::{glam::DVec3, BrightnessOrder, StarPoint, ViewState};
use starfield_storage::{BuildParams, BuiltOctree, OctreeBuilder};
use utilities::data_sets::nine_star_fixture;

/// Root `[-10, 10]^3` with stars 1-4 at the root, 5-8 in child 7 and star 9 two levels down under child 0.
pub fn nine_star_octree() -> BuiltOctree<StarPoint> {
    OctreeBuilder::new(BuildParams {
        max_points_per_node: 4,
        ..Default::default()
    })
    .build(nine_star_fixture(), &BrightnessOrder)
    .unwrap()
}

/// Small thresholds that make the nine star octree interesting from tens of units away.
pub fn test_config() -> IndexConfig {
    IndexConfig::new(0.1, 0.2, 0.05, usize::MAX, 64)
}

pub fn camera(position: DVec3, direction: DVec3) -> ViewState {
    ViewState::perspective(
        position,
        direction,
        DVec3::Y,
        std::f64::consts::FRAC_PI_4,
        1.0,
        0.1,
        1000.0,
        0,
    )
}
