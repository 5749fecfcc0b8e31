use starfield_core::{OctantId, PointId};
use starfield_storage::{NodeIndex, Octree};

/// What the camera (or a selection UI) is locked onto.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FocusTarget {
    /// A single point, by id.
    Point(PointId),
    /// A whole octant.
    Octant(OctantId),
}

/// A resolved focus: the target plus the chain of octants from the root down to the one that holds it.
///
/// Every octant on the path is refreshed each frame and protected from eviction, whether or not it is observed.
#[derive(Clone, Debug, PartialEq)]
pub struct Focus {
    target: FocusTarget,
    octant: OctantId,
    path: Vec<NodeIndex>,
}

impl Focus {
    /// Returns `None` if `octant` is not part of `octree`.
    pub fn new(octree: &Octree, target: FocusTarget, octant: OctantId) -> Option<Self> {
        let path = octree.ancestry(octant);
        if path.is_empty() {
            return None;
        }

        Some(Self {
            target,
            octant,
            path,
        })
    }

    #[inline]
    pub fn target(&self) -> FocusTarget {
        self.target
    }

    /// The octant whose bucket holds the target.
    #[inline]
    pub fn octant(&self) -> OctantId {
        self.octant
    }

    /// Root first.
    #[inline]
    pub fn path(&self) -> &[NodeIndex] {
        &self.path
    }

    #[inline]
    pub fn node(&self) -> NodeIndex {
        // A focus always has at least the root on its path.
        self.path[self.path.len() - 1]
    }

    #[inline]
    pub fn pins(&self, node: NodeIndex) -> bool {
        self.path.contains(&node)
    }
}
