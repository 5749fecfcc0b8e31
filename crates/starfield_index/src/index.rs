use crate::{
    select_octants, BucketLoader, Focus, FocusTarget, IndexConfig, LoadCompletion, Residency,
    ResidencyTable,
};

use starfield_core::{CatalogPoint, OctantId, PointId, ViewState};
use starfield_storage::{Bucket, NodeIndex, Octree, OctreeSource, StorageError};

use futures::executor::ThreadPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum IndexError {
    /// The bucket of this octant is `Unloaded` or `Loading`.
    #[error("octant {0:?} is not resident")]
    NotReady(OctantId),
    #[error("octant {0:?} is not part of the octree")]
    UnknownOctant(OctantId),
    #[error("point {0} is not part of the octree")]
    UnknownPoint(PointId),
    #[error("the index has been disposed")]
    Disposed,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One entry of the per-frame observed list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObservedOctant {
    pub id: OctantId,
    pub level: u8,
    pub view_angle: f64,
    pub opacity: f32,
    /// Number of points owned directly by this octant.
    pub num_points: usize,
    /// Whether the bucket can be read this frame. Octants that are still loading stay in the observed list, they just have
    /// nothing to draw yet.
    pub resident: bool,
}

/// What happened in one call to `OctreeIndex::update`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub tick: u64,
    pub num_octants_observed: usize,
    /// Points in observed, resident octants. This is what the renderer can draw this frame.
    pub num_objects_observed: usize,
    /// Raised whenever `num_objects_observed` differs from the previous frame.
    pub rebuild_point_buffers: bool,
    pub loads_applied: usize,
    pub loads_failed: usize,
    pub loads_requested: usize,
    pub evicted: Vec<OctantId>,
}

/// The runtime side of a point catalog octree.
///
/// The topology is read from an `OctreeSource` once, up front. Then every frame, `update` chooses the observed octants for the
/// current view, requests the buckets that are missing, and lazily evicts buckets that are no longer needed. Bucket reads
/// happen on the loader's thread pool and their results are only applied at the start of the next `update`, so the observed
/// list never changes in the middle of a frame.
///
/// ```
/// use starfield_core::prelude::*;
/// use starfield_index::prelude::*;
/// use starfield_storage::prelude::*;
/// use std::sync::Arc;
///
/// let catalog: Vec<_> = (0..100)
///     .map(|i| StarPoint::new(i, DVec3::new(i as f64, 0.0, 0.0), i as f32))
///     .collect();
/// let built = OctreeBuilder::new(BuildParams { max_points_per_node: 10, ..Default::default() })
///     .build(catalog, &BrightnessOrder)
///     .unwrap();
///
/// let pool = ThreadPool::new().unwrap();
/// let mut index = OctreeIndex::new(Arc::new(MemorySource::new(built)), IndexConfig::default(), Some(pool)).unwrap();
///
/// let camera = ViewState::perspective(
///     DVec3::new(50.0, 0.0, 100.0), DVec3::NEG_Z, DVec3::Y, std::f64::consts::FRAC_PI_4, 1.0, 0.1, 1000.0, 0,
/// );
/// let first = index.update(&camera).unwrap();
/// assert!(first.num_octants_observed > 0);
/// // Nothing is resident before the loads requested by this frame complete.
/// assert_eq!(first.num_objects_observed, 0);
///
/// // Loads finish in the background and are applied by later frames.
/// let mut tick = 1;
/// while index.update(&camera.with_tick(tick)).unwrap().num_objects_observed == 0 {
///     assert!(tick < 10_000);
///     std::thread::sleep(std::time::Duration::from_millis(1));
///     tick += 1;
/// }
/// ```
pub struct OctreeIndex<P> {
    config: IndexConfig,
    octree: Octree,
    residency: ResidencyTable<P>,
    loader: BucketLoader<P>,
    roulette: Vec<ObservedOctant>,
    observed_nodes: Vec<NodeIndex>,
    focus: Option<Focus>,
    last_num_objects_observed: usize,
    tick: u64,
    disposed: bool,
}

impl<P> OctreeIndex<P>
where
    P: 'static + CatalogPoint + Clone + Send + Sync,
{
    /// Reads the whole topology from `source`. Buckets are read later, on `pool`. Passing `None` reads buckets inline, which
    /// blocks `update` on I/O and is only meant for tests and offline tools.
    pub fn new(
        source: Arc<dyn OctreeSource<P>>,
        config: IndexConfig,
        pool: Option<ThreadPool>,
    ) -> Result<Self, IndexError> {
        let octree = source.read_topology()?;
        info!(
            "Loaded octree topology with {} octants and {} points",
            octree.len(),
            octree.root().num_points()
        );

        Ok(Self {
            config,
            residency: ResidencyTable::new(octree.len()),
            loader: BucketLoader::new(source, pool),
            octree,
            roulette: Vec::new(),
            observed_nodes: Vec::new(),
            focus: None,
            last_num_objects_observed: 0,
            tick: 0,
            disposed: false,
        })
    }

    /// Runs one frame for `view`.
    pub fn update(&mut self, view: &ViewState) -> Result<FrameReport, IndexError> {
        if self.disposed {
            return Err(IndexError::Disposed);
        }
        self.tick = view.tick;

        let mut report = FrameReport {
            tick: view.tick,
            ..Default::default()
        };

        self.apply_completions(&mut report);

        // Reset.
        self.roulette.clear();
        self.residency
            .clear_observed(self.observed_nodes.drain(..));

        // Select.
        let mut to_request = Vec::new();
        {
            let Self {
                config,
                octree,
                residency,
                roulette,
                observed_nodes,
                ..
            } = self;
            select_octants(octree, view, config, |selected, node| {
                residency.observe(selected.node, view.tick);
                observed_nodes.push(selected.node);

                let resident = match residency.residency(selected.node) {
                    Residency::Resident => true,
                    Residency::Unloaded => {
                        to_request.push(selected.node);
                        false
                    }
                    Residency::Loading => false,
                };
                roulette.push(ObservedOctant {
                    id: selected.id,
                    level: node.level(),
                    view_angle: selected.view_angle,
                    opacity: selected.opacity,
                    num_points: node.own_points(),
                    resident,
                });
            });
        }
        report.num_octants_observed = self.roulette.len();
        report.num_objects_observed = self
            .roulette
            .iter()
            .filter(|o| o.resident)
            .map(|o| o.num_points)
            .sum();

        // The focus path is refreshed even when it is not observed.
        if let Some(focus) = &self.focus {
            for &node in focus.path() {
                self.residency.access(node, view.tick);
            }
            if self.residency.residency(focus.node()) == Residency::Unloaded {
                to_request.push(focus.node());
            }
        }

        for node in to_request.into_iter() {
            if self.residency.begin_load(node) {
                let octant = self.octree.node(node).id();
                if self.loader.request(node, octant) {
                    report.loads_requested += 1;
                } else {
                    // Only possible after cancellation.
                    self.residency.fail_load(node);
                }
            }
        }

        let focus = &self.focus;
        let is_pinned = |node: NodeIndex| focus.as_ref().map_or(false, |f: &Focus| f.pins(node));
        self.residency.end_frame(is_pinned);

        let evicted = self
            .residency
            .evict_over_budget(self.config.max_resident_points, is_pinned);
        report.evicted = evicted
            .into_iter()
            .map(|node| self.octree.node(node).id())
            .collect();

        report.rebuild_point_buffers =
            report.num_objects_observed != self.last_num_objects_observed;
        self.last_num_objects_observed = report.num_objects_observed;

        debug!(
            "Frame {}: {} octants and {} objects observed, {} loads requested, {} evicted, {} points resident",
            report.tick,
            report.num_octants_observed,
            report.num_objects_observed,
            report.loads_requested,
            report.evicted.len(),
            self.residency.resident_points()
        );

        Ok(report)
    }

    fn apply_completions(&mut self, report: &mut FrameReport) {
        for completion in self.loader.poll(self.config.max_completions_per_frame) {
            let LoadCompletion {
                node,
                octant,
                result,
            } = completion;
            match result {
                Ok(bucket) => {
                    // An octant without points has no bucket, which is the same as an empty one.
                    let bucket = bucket.unwrap_or_else(|| Bucket::new(octant, Vec::new()));
                    if self.residency.complete_load(node, Arc::new(bucket)) {
                        report.loads_applied += 1;
                    }
                }
                Err(e) => {
                    warn!("Failed to load octant {:?}: {}", octant, e);
                    self.residency.fail_load(node);
                    report.loads_failed += 1;
                }
            }
        }
    }

    /// Locks onto `target`. A point target is resolved to its octant through the source right away.
    pub fn set_focus(&mut self, target: FocusTarget) -> Result<(), IndexError> {
        if self.disposed {
            return Err(IndexError::Disposed);
        }

        let octant = match target {
            FocusTarget::Octant(id) => id,
            FocusTarget::Point(id) => self
                .loader
                .source()
                .locate_point(id)?
                .ok_or(IndexError::UnknownPoint(id))?,
        };
        let focus = Focus::new(&self.octree, target, octant)
            .ok_or(IndexError::UnknownOctant(octant))?;
        info!("Focus set to {:?} in octant {:?}", target, octant);
        // Setting the focus again is an explicit request to retry a failed load.
        self.residency.unblock(focus.node());
        self.focus = Some(focus);

        Ok(())
    }

    pub fn clear_focus(&mut self) {
        self.focus = None;
    }

    pub fn focus(&self) -> Option<&Focus> {
        self.focus.as_ref()
    }

    /// The focused point, read from its resident bucket. `Ok(None)` if there is no point focus.
    pub fn focus_point(&self) -> Result<Option<P>, IndexError> {
        let focus = match &self.focus {
            Some(focus) => focus,
            None => return Ok(None),
        };
        let id = match focus.target() {
            FocusTarget::Point(id) => id,
            FocusTarget::Octant(_) => return Ok(None),
        };
        let bucket = self.bucket(focus.octant())?;

        bucket
            .points
            .iter()
            .find(|p| p.id() == id)
            .cloned()
            .map(Some)
            .ok_or(IndexError::UnknownPoint(id))
    }

    /// Stops all loading and forgets all runtime state. Loads that are still running are silently dropped, and every later
    /// `update` fails with `IndexError::Disposed`.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.loader.cancel();
        self.residency.clear();
        self.roulette.clear();
        self.observed_nodes.clear();
        self.focus = None;
        self.last_num_objects_observed = 0;
        self.disposed = true;
        info!("Octree index disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl<P> OctreeIndex<P> {
    /// The octants observed by the last `update`, in traversal order.
    #[inline]
    pub fn observed(&self) -> &[ObservedOctant] {
        &self.roulette
    }

    #[inline]
    pub fn octree(&self) -> &Octree {
        &self.octree
    }

    #[inline]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The tick of the last `update`.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The points of `octant`. Fails with `NotReady` unless the bucket is resident.
    pub fn bucket(&self, octant: OctantId) -> Result<Arc<Bucket<P>>, IndexError> {
        let node = self
            .octree
            .index_of(octant)
            .ok_or(IndexError::UnknownOctant(octant))?;

        self.residency
            .bucket(node)
            .ok_or(IndexError::NotReady(octant))
    }

    pub fn residency(&self, octant: OctantId) -> Option<Residency> {
        self.octree
            .index_of(octant)
            .map(|node| self.residency.residency(node))
    }

    pub fn is_observed(&self, octant: OctantId) -> bool {
        self.octree
            .index_of(octant)
            .map_or(false, |node| self.residency.is_observed(node))
    }

    /// The tick at which `octant` was last observed or refreshed as part of the focus path.
    pub fn last_access(&self, octant: OctantId) -> Option<u64> {
        self.octree
            .index_of(octant)
            .and_then(|node| self.residency.last_access(node))
    }

    pub fn resident_points(&self) -> usize {
        self.residency.resident_points()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
