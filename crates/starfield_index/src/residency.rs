use starfield_storage::{Bucket, NodeIndex, SmallKeyHashSet, SmallKeyLruCache};

use std::sync::Arc;

/// Where the point bucket of an octant lives.
///
/// `Unloaded -> Loading` when an observed octant requests its bucket, `Loading -> Resident` when the load completes,
/// `Loading -> Unloaded` when it fails, and `Resident -> Unloaded` on eviction. Whether the octant is observed is tracked
/// separately.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Residency {
    Unloaded,
    Loading,
    Resident,
}

impl Default for Residency {
    fn default() -> Self {
        Residency::Unloaded
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct OctantState {
    residency: Residency,
    observed: bool,
    last_access: Option<u64>,
}

/// Runtime state for every octant of one octree, indexed in parallel with its arena. Resident buckets are kept in an LRU cache
/// that is touched whenever an octant is observed.
pub struct ResidencyTable<P> {
    states: Vec<OctantState>,
    resident: SmallKeyLruCache<NodeIndex, Arc<Bucket<P>>>,
    resident_points: usize,
    // Octants whose last load failed. They are not requested again until they go unobserved for a frame.
    retry_blocked: SmallKeyHashSet<NodeIndex>,
}

impl<P> ResidencyTable<P> {
    pub fn new(num_octants: usize) -> Self {
        Self {
            states: vec![OctantState::default(); num_octants],
            resident: SmallKeyLruCache::default(),
            resident_points: 0,
            retry_blocked: SmallKeyHashSet::default(),
        }
    }

    #[inline]
    pub fn residency(&self, node: NodeIndex) -> Residency {
        self.states[node.index()].residency
    }

    #[inline]
    pub fn is_observed(&self, node: NodeIndex) -> bool {
        self.states[node.index()].observed
    }

    #[inline]
    pub fn last_access(&self, node: NodeIndex) -> Option<u64> {
        self.states[node.index()].last_access
    }

    /// The bucket of `node`, only if it is `Resident`.
    #[inline]
    pub fn bucket(&self, node: NodeIndex) -> Option<Arc<Bucket<P>>> {
        self.resident.get(&node).cloned()
    }

    /// Number of points held by all resident buckets.
    #[inline]
    pub fn resident_points(&self) -> usize {
        self.resident_points
    }

    #[inline]
    pub fn num_resident(&self) -> usize {
        self.resident.len()
    }

    /// Marks `node` as observed at `tick`, refreshing its position in the eviction order if it is resident.
    pub fn observe(&mut self, node: NodeIndex, tick: u64) {
        let state = &mut self.states[node.index()];
        state.observed = true;
        state.last_access = Some(tick);
        self.resident.touch(&node);
    }

    /// Records an access that is not an observation, like refreshing the focus.
    pub fn access(&mut self, node: NodeIndex, tick: u64) {
        self.states[node.index()].last_access = Some(tick);
        self.resident.touch(&node);
    }

    pub fn clear_observed(&mut self, nodes: impl IntoIterator<Item = NodeIndex>) {
        for node in nodes {
            self.states[node.index()].observed = false;
        }
    }

    /// Moves `node` from `Unloaded` to `Loading`. Returns `false`, and changes nothing, if the node is in any other state or is
    /// waiting to be retried.
    pub fn begin_load(&mut self, node: NodeIndex) -> bool {
        let state = &mut self.states[node.index()];
        if state.residency != Residency::Unloaded || self.retry_blocked.contains(&node) {
            return false;
        }
        state.residency = Residency::Loading;

        true
    }

    /// Moves `node` from `Loading` to `Resident`. A completion for a node that is not `Loading` is dropped.
    pub fn complete_load(&mut self, node: NodeIndex, bucket: Arc<Bucket<P>>) -> bool {
        let state = &mut self.states[node.index()];
        if state.residency != Residency::Loading {
            return false;
        }
        state.residency = Residency::Resident;
        self.resident_points += bucket.len();
        self.resident.insert(node, bucket);

        true
    }

    /// Moves `node` from `Loading` back to `Unloaded`, and blocks retries until it has been unobserved for a frame.
    pub fn fail_load(&mut self, node: NodeIndex) {
        let state = &mut self.states[node.index()];
        if state.residency == Residency::Loading {
            state.residency = Residency::Unloaded;
            self.retry_blocked.insert(node);
        }
    }

    /// Lifts the retry block of every failed octant that is neither observed this frame nor `pinned`.
    pub fn end_frame(&mut self, pinned: impl Fn(NodeIndex) -> bool) {
        let Self {
            states,
            retry_blocked,
            ..
        } = self;
        retry_blocked.retain(|node| states[node.index()].observed || pinned(*node));
    }

    /// Allows `node` to be requested again right away, even if its last load failed.
    pub fn unblock(&mut self, node: NodeIndex) {
        self.retry_blocked.remove(&node);
    }

    /// While more than `max_resident_points` are resident, evicts the least recently used resident bucket that is neither
    /// observed nor `pinned`. Returns the evicted octants, oldest first.
    pub fn evict_over_budget(
        &mut self,
        max_resident_points: usize,
        pinned: impl Fn(NodeIndex) -> bool,
    ) -> Vec<NodeIndex> {
        if self.resident_points <= max_resident_points {
            return Vec::new();
        }

        let mut excess = self.resident_points - max_resident_points;
        let mut victims = Vec::new();
        for (&node, bucket) in self.resident.iter_lru() {
            if excess == 0 {
                break;
            }
            if self.states[node.index()].observed || pinned(node) {
                continue;
            }
            excess = excess.saturating_sub(bucket.len());
            victims.push(node);
        }

        for node in victims.iter() {
            self.evict(*node);
        }

        victims
    }

    fn evict(&mut self, node: NodeIndex) {
        if let Some(bucket) = self.resident.remove(&node) {
            self.resident_points -= bucket.len();
            self.states[node.index()].residency = Residency::Unloaded;
        }
    }

    /// Forgets all runtime state. Every octant becomes `Unloaded` and unobserved.
    pub fn clear(&mut self) {
        for state in self.states.iter_mut() {
            *state = OctantState::default();
        }
        self.resident.clear();
        self.resident_points = 0;
        self.retry_blocked.clear();
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
