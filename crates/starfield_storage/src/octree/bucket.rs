use starfield_core::OctantId;

use serde::{Deserialize, Serialize};

/// The points owned directly by one octant. A bucket never straddles two octants, and once assigned it never moves.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Bucket<P> {
    pub octant: OctantId,
    pub points: Vec<P>,
}

impl<P> Bucket<P> {
    pub fn new(octant: OctantId, points: Vec<P>) -> Self {
        Self { octant, points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
