use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;

/// The deepest level an `OctantId` can address. One sentinel bit plus 3 bits per level must fit in a `u128`.
pub const MAX_OCTANT_LEVEL: u8 = 42;

/// Uniquely identifies an octant of an octree by its path from the root.
///
/// The code is a sentinel bit followed by one 3-bit child index per level, most significant level first:
/// ```text
/// level 0:
///   id = 0b1
/// level 1:
///   id = 0b1000, 0b1001, 0b1010, 0b1011, 0b1100, 0b1101, 0b1110, 0b1111
/// level 2:
///   id = 0b1000000, ...
/// ```
/// Since the id is a pure function of the path, it can be recomputed from coordinates alone with `octant_id_at_level`.
#[derive(Clone, Copy, Deserialize, Hash, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct OctantId(u128);

impl std::fmt::Debug for OctantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "OctantId(L{}:{:#o})", self.level(), self.0)
    }
}

impl std::fmt::Display for OctantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

impl OctantId {
    pub const ROOT: Self = Self(1);

    /// Reconstructs an id from its raw code. Returns `None` for `0`, which is not a valid code.
    #[inline]
    pub fn from_raw(code: u128) -> Option<Self> {
        if code == 0 {
            None
        } else {
            Some(Self(code))
        }
    }

    #[inline]
    pub fn raw(self) -> u128 {
        self.0
    }

    /// The depth of this octant, where the root is level 0.
    #[inline]
    pub fn level(self) -> u8 {
        let significant_bits = 128 - self.0.leading_zeros();

        ((significant_bits - 1) / 3) as u8
    }

    /// The child of `self` at `child_index`, where `child_index < 8`.
    #[inline]
    pub fn child(self, child_index: u8) -> Self {
        debug_assert!(child_index < 8);
        debug_assert!(self.level() < MAX_OCTANT_LEVEL);

        Self((self.0 << 3) | child_index as u128)
    }

    #[inline]
    pub fn parent(self) -> Option<Self> {
        if self == Self::ROOT {
            None
        } else {
            Some(Self(self.0 >> 3))
        }
    }

    /// The index of this octant within its parent. The root has no index.
    #[inline]
    pub fn child_index(self) -> Option<u8> {
        if self == Self::ROOT {
            None
        } else {
            Some((self.0 & 0b111) as u8)
        }
    }

    /// The child indices from the root down to `self`.
    pub fn path(self) -> Vec<u8> {
        let level = self.level();
        (1..=level)
            .map(|l| ((self.0 >> (3 * (level - l) as u32)) & 0b111) as u8)
            .collect()
    }

    /// Returns `true` iff `self` is a strict ancestor of `other`.
    #[inline]
    pub fn is_ancestor_of(self, other: Self) -> bool {
        let (self_level, other_level) = (self.level(), other.level());

        self_level < other_level && (other.0 >> (3 * (other_level - self_level) as u32)) == self.0
    }

    #[inline]
    pub fn to_be_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    #[inline]
    pub fn from_be_bytes(bytes: [u8; 16]) -> Option<Self> {
        Self::from_raw(u128::from_be_bytes(bytes))
    }
}

/// An axis-aligned cube, the volume covered by one octant.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct OctantBox {
    pub center: DVec3,
    pub half_size: f64,
}

impl OctantBox {
    #[inline]
    pub fn new(center: DVec3, half_size: f64) -> Self {
        Self { center, half_size }
    }

    /// The smallest cube centered on the axis-aligned bounds of `points` that contains all of them. Returns `None` if
    /// `points` is empty. A degenerate (single location) catalog gets a unit cube.
    pub fn bounding_cube(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));

        let half_size = 0.5 * (max - min).max_element();
        let half_size = if half_size > 0.0 { half_size } else { 0.5 };

        Some(Self::new(0.5 * (min + max), half_size))
    }

    #[inline]
    pub fn min(&self) -> DVec3 {
        self.center - DVec3::splat(self.half_size)
    }

    #[inline]
    pub fn max(&self) -> DVec3 {
        self.center + DVec3::splat(self.half_size)
    }

    #[inline]
    pub fn size(&self) -> f64 {
        2.0 * self.half_size
    }

    /// Radius of the bounding sphere.
    #[inline]
    pub fn radius(&self) -> f64 {
        self.half_size * 3f64.sqrt()
    }

    /// Closed containment test.
    #[inline]
    pub fn contains(&self, p: DVec3) -> bool {
        p.cmpge(self.min()).all() && p.cmple(self.max()).all()
    }

    #[inline]
    pub fn contains_box(&self, other: &Self) -> bool {
        self.contains(other.min()) && self.contains(other.max())
    }

    /// Euclidean distance from `p` to the closest point of the box; `0.0` inside.
    #[inline]
    pub fn distance_to(&self, p: DVec3) -> f64 {
        let d = ((p - self.center).abs() - DVec3::splat(self.half_size)).max(DVec3::ZERO);

        d.length()
    }

    /// The child octant at `child_index`.
    #[inline]
    pub fn child(&self, child_index: u8) -> Self {
        debug_assert!(child_index < 8);
        let quarter = 0.5 * self.half_size;
        let sign = |bit: u8| if child_index & bit != 0 { quarter } else { -quarter };

        Self::new(
            self.center + DVec3::new(sign(0b100), sign(0b010), sign(0b001)),
            quarter,
        )
    }

    /// The child octant whose volume receives `p`. See `child_index_containing`.
    #[inline]
    pub fn child_containing(&self, p: DVec3) -> (u8, Self) {
        let child_index = child_index_containing(self, p);

        (child_index, self.child(child_index))
    }
}

/// The one boundary rule shared by every routine that routes a coordinate into a child octant: on each axis, a coordinate
/// less than or equal to the midpoint belongs to the lower half. The resulting index has the binary format `0bXYZ`, so a
/// point exactly at the center always lands in child 0.
#[inline]
pub fn child_index_containing(octant: &OctantBox, p: DVec3) -> u8 {
    let upper = |c: f64, mid: f64| (c > mid) as u8;

    (upper(p.x, octant.center.x) << 2)
        | (upper(p.y, octant.center.y) << 1)
        | upper(p.z, octant.center.z)
}

/// Computes the id of the octant at `level` that receives `p`, walking down from `root_box`. This never consults a tree, so
/// it is reproducible from coordinates alone.
pub fn octant_id_at_level(root_box: &OctantBox, p: DVec3, level: u8) -> OctantId {
    assert!(level <= MAX_OCTANT_LEVEL);

    let mut id = OctantId::ROOT;
    let mut octant = *root_box;
    for _ in 0..level {
        let (child_index, child) = octant.child_containing(p);
        id = id.child(child_index);
        octant = child;
    }

    id
}

/// The box covered by `id` when the root covers `root_box`.
pub fn octant_box(root_box: &OctantBox, id: OctantId) -> OctantBox {
    id.path()
        .into_iter()
        .fold(*root_box, |octant, child_index| octant.child(child_index))
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
