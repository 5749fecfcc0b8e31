//! Offline construction of an `Octree` from an unordered catalog.
//!
//! The catalog is sorted once by a `PriorityOrder`, then walked in at most `max_levels` passes. Pass `L` routes points into
//! the octants at level `L` until one of them fills up to `max_points_per_node`; the remaining points spill into pass `L + 1`.
//! The most important points therefore end up closest to the root, and the comparator is the only policy knob.
//!
//! ```
//! use starfield_core::prelude::*;
//! use starfield_storage::prelude::*;
//!
//! let catalog: Vec<_> = (0..100)
//!     .map(|i| StarPoint::new(i, DVec3::new(i as f64, (i % 7) as f64, (i % 3) as f64), (i % 10) as f32))
//!     .collect();
//!
//! let params = BuildParams { max_points_per_node: 16, ..Default::default() };
//! let built = OctreeBuilder::new(params).build(catalog, &BrightnessOrder).unwrap();
//!
//! assert_eq!(built.octree.root().num_points(), 100);
//! assert!(built.buckets.iter().all(|b| b.len() <= 16));
//! ```

use super::{Bucket, NodeIndex, Octree, OctreeError};

use starfield_core::{
    glam::DVec3, octant_id_at_level, CatalogPoint, OctantBox, OctantId, PriorityOrder,
    MAX_OCTANT_LEVEL,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct BuildParams {
    /// Capacity of every octant's bucket.
    pub max_points_per_node: usize,
    /// The number of level passes. Points left over after the last pass make the build fail.
    pub max_levels: u8,
    /// The volume covered by the root. When `None`, this is the bounding cube of the catalog. Points outside of an explicit
    /// root box are discarded.
    pub root_box: Option<OctantBox>,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            max_points_per_node: 100_000,
            max_levels: 25,
            root_box: None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("the catalog has no points")]
    EmptyCatalog,
    #[error("invalid build parameters: {0}")]
    InvalidParams(&'static str),
    #[error("computed octant {computed:?} but materialized {created:?}")]
    OctantIdMismatch {
        computed: OctantId,
        created: OctantId,
    },
    #[error("{remaining} points could not be placed within the level limit")]
    Unroutable { remaining: usize },
    #[error(transparent)]
    Octree(#[from] OctreeError),
}

/// The output of a build: topology, one bucket per non-empty octant, and how many points were dropped.
#[derive(Clone, Debug)]
pub struct BuiltOctree<P> {
    pub octree: Octree,
    pub buckets: Vec<Bucket<P>>,
    pub num_discarded: usize,
}

impl<P> BuiltOctree<P> {
    pub fn bucket(&self, id: OctantId) -> Option<&Bucket<P>> {
        self.buckets.iter().find(|b| b.octant == id)
    }
}

pub struct OctreeBuilder {
    params: BuildParams,
}

impl OctreeBuilder {
    pub fn new(params: BuildParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BuildParams {
        &self.params
    }

    pub fn build<P, O>(&self, mut catalog: Vec<P>, order: &O) -> Result<BuiltOctree<P>, BuildError>
    where
        P: CatalogPoint,
        O: PriorityOrder<P>,
    {
        let BuildParams {
            max_points_per_node,
            max_levels,
            root_box,
        } = self.params;

        if max_points_per_node == 0 {
            return Err(BuildError::InvalidParams("max_points_per_node must be positive"));
        }
        if max_levels == 0 || max_levels > MAX_OCTANT_LEVEL + 1 {
            return Err(BuildError::InvalidParams("max_levels out of range"));
        }
        if catalog.is_empty() {
            return Err(BuildError::EmptyCatalog);
        }

        let mut num_discarded = 0;
        let root_box = match root_box {
            Some(root_box) => {
                let before = catalog.len();
                catalog.retain(|p| root_box.contains(p.position()));
                num_discarded = before - catalog.len();
                root_box
            }
            None => OctantBox::bounding_cube(catalog.iter().map(|p| p.position()))
                .ok_or(BuildError::EmptyCatalog)?,
        };

        info!("Sorting source catalog with {} points", catalog.len());
        catalog.sort_by(|a, b| order.compare(a, b));
        info!("Catalog sorting done");

        let mut octree = Octree::new(root_box);
        // Staging buckets, indexed in parallel with the octree arena.
        let mut staging: Vec<Vec<P>> = vec![Vec::new()];

        let total = catalog.len();
        let mut routed = 0;
        let mut points = catalog.into_iter();
        for level in 0..max_levels {
            if routed == total {
                break;
            }
            info!("Generating level {} ({} points left)", level, total - routed);

            for point in &mut points {
                routed += 1;

                let position = point.position();
                let id = octant_id_at_level(&root_box, position, level);
                let node = match octree.index_of(id) {
                    Some(node) => node,
                    None => Self::create_octant(&mut octree, id, position, level)?,
                };
                if staging.len() < octree.len() {
                    staging.resize_with(octree.len(), Vec::new);
                }

                let bucket = &mut staging[node.index()];
                bucket.push(point);
                if bucket.len() >= max_points_per_node {
                    // On to the next level.
                    break;
                }
            }
        }

        if routed < total {
            return Err(BuildError::Unroutable {
                remaining: total - routed,
            });
        }

        let mut buckets = Vec::new();
        for (i, staged) in staging.into_iter().enumerate() {
            if staged.is_empty() {
                continue;
            }
            let node = NodeIndex(i as u32);
            octree.set_own_points(node, staged.len());
            buckets.push(Bucket::new(octree.node(node).id(), staged));
        }
        octree.update_aggregates();

        info!(
            "Octree generated with {} octants, {} buckets, depth {}, {} points discarded",
            octree.len(),
            buckets.len(),
            octree.depth(),
            num_discarded
        );

        Ok(BuiltOctree {
            octree,
            buckets,
            num_discarded,
        })
    }

    /// Walks down from the root toward `position`, materializing any missing octants on the way, and returns the octant at
    /// `level`. The walk uses the same boundary rule as `octant_id_at_level`, and the result must agree with `id`.
    fn create_octant(
        octree: &mut Octree,
        id: OctantId,
        position: DVec3,
        level: u8,
    ) -> Result<NodeIndex, BuildError> {
        let mut current = Octree::ROOT;
        for _ in 0..level {
            let (child_index, _) = octree.node(current).bounds().child_containing(position);
            current = match octree.node(current).child(child_index) {
                Some(child) => child,
                None => {
                    let child = octree.insert_child(current, child_index)?;
                    debug!("Created octant {:?}", octree.node(child).id());
                    child
                }
            };
        }

        let created = octree.node(current).id();
        if created != id {
            return Err(BuildError::OctantIdMismatch {
                computed: id,
                created,
            });
        }

        Ok(current)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use starfield_core::{BrightnessOrder, StarPoint};
    use utilities::data_sets::{nine_star_fixture, random_star_catalog};

    use pretty_assertions::assert_eq;

    fn params(max_points_per_node: usize) -> BuildParams {
        BuildParams {
            max_points_per_node,
            ..Default::default()
        }
    }

    fn bucket_ids(built: &BuiltOctree<StarPoint>, id: OctantId) -> Vec<u64> {
        let mut ids: Vec<_> = built
            .bucket(id)
            .map(|b| b.points.iter().map(|p| p.id).collect())
            .unwrap_or_default();
        ids.sort_unstable();

        ids
    }

    #[test]
    fn small_catalog_fits_in_root() {
        let catalog: Vec<_> = nine_star_fixture().into_iter().take(4).collect();
        let built = OctreeBuilder::new(params(4))
            .build(catalog, &BrightnessOrder)
            .unwrap();

        assert_eq!(built.octree.len(), 1);
        assert_eq!(built.buckets.len(), 1);
        assert_eq!(bucket_ids(&built, OctantId::ROOT), vec![1, 2, 3, 4]);
    }

    #[test]
    fn nine_star_fixture_spills_deterministically() {
        let built = OctreeBuilder::new(params(4))
            .build(nine_star_fixture(), &BrightnessOrder)
            .unwrap();

        // The four brightest stars fill the root.
        assert_eq!(bucket_ids(&built, OctantId::ROOT), vec![1, 2, 3, 4]);
        // Stars 5-8 all fall in the upper corner octant and fill it, which ends the level 1 pass.
        assert_eq!(
            bucket_ids(&built, OctantId::ROOT.child(0b111)),
            vec![5, 6, 7, 8]
        );
        // So the faintest star is placed at level 2, even though its level 1 octant is empty.
        assert_eq!(
            bucket_ids(&built, OctantId::ROOT.child(0b000).child(0b000)),
            vec![9]
        );
        assert_eq!(built.buckets.len(), 3);
        // Root, two level 1 octants (one materialized as an ancestor), one level 2 octant.
        assert_eq!(built.octree.len(), 4);
        assert_eq!(built.octree.root().num_points(), 9);
        assert_eq!(built.octree.root().num_octants(), 3);
        assert_eq!(built.octree.depth(), 2);
        assert_eq!(built.num_discarded, 0);
    }

    #[test]
    fn center_point_routes_to_child_zero_across_builds() {
        for _ in 0..3 {
            let mut catalog = vec![
                StarPoint::new(0, DVec3::splat(-1.0), 0.0),
                StarPoint::new(1, DVec3::splat(1.0), 1.0),
            ];
            // Exactly on the midpoint of all three axes.
            catalog.push(StarPoint::new(2, DVec3::ZERO, 2.0));

            let built = OctreeBuilder::new(params(2))
                .build(catalog, &BrightnessOrder)
                .unwrap();

            assert_eq!(bucket_ids(&built, OctantId::ROOT), vec![0, 1]);
            assert_eq!(bucket_ids(&built, OctantId::ROOT.child(0)), vec![2]);
        }
    }

    #[test]
    fn random_catalog_invariants() {
        let catalog = random_star_catalog(5000, 1000.0);
        let max = 64;
        let built = OctreeBuilder::new(params(max))
            .build(catalog.clone(), &BrightnessOrder)
            .unwrap();
        let root_box = *built.octree.root_box();

        assert_eq!(built.octree.root().num_points(), catalog.len() - built.num_discarded);

        for bucket in built.buckets.iter() {
            assert!(bucket.len() <= max);

            let node = built.octree.get(bucket.octant).unwrap();
            assert_eq!(node.own_points(), bucket.len());

            // Coordinate-based lookup agrees with ownership.
            for point in bucket.points.iter() {
                assert_eq!(
                    octant_id_at_level(&root_box, point.position, node.level()),
                    bucket.octant
                );
                assert!(node.bounds().contains(point.position));
            }
        }
    }

    #[test]
    fn brighter_points_are_never_deeper_than_the_level_pass_allows() {
        let built = OctreeBuilder::new(params(32))
            .build(random_star_catalog(2000, 50.0), &BrightnessOrder)
            .unwrap();

        // Every point at level L is at least as bright as every point at level L + 1.
        let mut faintest_by_level = vec![f32::MIN; 64];
        let mut brightest_by_level = vec![f32::MAX; 64];
        for bucket in built.buckets.iter() {
            let level = bucket.octant.level() as usize;
            for p in bucket.points.iter() {
                faintest_by_level[level] = faintest_by_level[level].max(p.magnitude);
                brightest_by_level[level] = brightest_by_level[level].min(p.magnitude);
            }
        }
        for level in 0..built.octree.depth() as usize {
            if brightest_by_level[level + 1] != f32::MAX {
                assert!(faintest_by_level[level] <= brightest_by_level[level + 1]);
            }
        }
    }

    #[test]
    fn points_outside_explicit_root_are_discarded() {
        let root_box = OctantBox::new(DVec3::ZERO, 10.0);
        let catalog = vec![
            StarPoint::new(0, DVec3::ZERO, 0.0),
            StarPoint::new(1, DVec3::new(11.0, 0.0, 0.0), 1.0),
            StarPoint::new(2, DVec3::new(-5.0, 5.0, 5.0), 2.0),
        ];
        let built = OctreeBuilder::new(BuildParams {
            max_points_per_node: 8,
            root_box: Some(root_box),
            ..Default::default()
        })
        .build(catalog, &BrightnessOrder)
        .unwrap();

        assert_eq!(built.num_discarded, 1);
        assert_eq!(built.octree.root().num_points(), 2);
    }

    #[test]
    fn too_few_levels_is_a_fatal_error() {
        let built = OctreeBuilder::new(BuildParams {
            max_points_per_node: 1,
            max_levels: 2,
            root_box: None,
        })
        .build(nine_star_fixture(), &BrightnessOrder);

        assert_eq!(built.unwrap_err(), BuildError::Unroutable { remaining: 7 });
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let builder = OctreeBuilder::new(params(0));
        assert!(matches!(
            builder.build(nine_star_fixture(), &BrightnessOrder),
            Err(BuildError::InvalidParams(_))
        ));

        let builder = OctreeBuilder::new(params(4));
        assert_eq!(
            builder
                .build(Vec::<StarPoint>::new(), &BrightnessOrder)
                .unwrap_err(),
            BuildError::EmptyCatalog
        );
    }

    #[test]
    fn custom_comparator_changes_placement_only() {
        let by_id_descending = |a: &StarPoint, b: &StarPoint| b.id.cmp(&a.id);
        let built = OctreeBuilder::new(params(4))
            .build(nine_star_fixture(), &by_id_descending)
            .unwrap();

        assert_eq!(bucket_ids(&built, OctantId::ROOT), vec![6, 7, 8, 9]);
        assert_eq!(built.octree.root().num_points(), 9);
    }
}
