use float_ord::FloatOrd;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Identifies a single object of a catalog.
pub type PointId = u64;

/// Anything that can be placed in an octree. Everything besides the id and position is payload that gets carried through
/// unchanged.
pub trait CatalogPoint {
    fn id(&self) -> PointId;
    fn position(&self) -> DVec3;
}

/// The stock catalog record: a star (or particle) with photometry and kinematics.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct StarPoint {
    pub id: PointId,
    pub position: DVec3,
    /// Apparent magnitude. Lower is brighter.
    pub magnitude: f32,
    pub color: [f32; 3],
    pub proper_motion: [f32; 3],
}

impl StarPoint {
    pub fn new(id: PointId, position: DVec3, magnitude: f32) -> Self {
        Self {
            id,
            position,
            magnitude,
            color: [1.0; 3],
            proper_motion: [0.0; 3],
        }
    }
}

impl CatalogPoint for StarPoint {
    #[inline]
    fn id(&self) -> PointId {
        self.id
    }

    #[inline]
    fn position(&self) -> DVec3 {
        self.position
    }
}

/// Decides which points are placed closest to the root of an octree. Points that compare `Less` are more important.
pub trait PriorityOrder<P> {
    fn compare(&self, a: &P, b: &P) -> Ordering;
}

impl<P, F> PriorityOrder<P> for F
where
    F: Fn(&P, &P) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &P, b: &P) -> Ordering {
        (self)(a, b)
    }
}

/// Brightest first. Ties are broken by id so the order is total.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrightnessOrder;

impl PriorityOrder<StarPoint> for BrightnessOrder {
    #[inline]
    fn compare(&self, a: &StarPoint, b: &StarPoint) -> Ordering {
        FloatOrd(a.magnitude)
            .cmp(&FloatOrd(b.magnitude))
            .then(a.id.cmp(&b.id))
    }
}

/// Closest to `origin` first. Ties are broken by id.
#[derive(Clone, Copy, Debug)]
pub struct DistanceOrder {
    pub origin: DVec3,
}

impl<P> PriorityOrder<P> for DistanceOrder
where
    P: CatalogPoint,
{
    #[inline]
    fn compare(&self, a: &P, b: &P) -> Ordering {
        let da = a.position().distance_squared(self.origin);
        let db = b.position().distance_squared(self.origin);

        FloatOrd(da).cmp(&FloatOrd(db)).then(a.id().cmp(&b.id()))
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

    #[test]
    fn brightness_order_puts_bright_stars_first() {
        let mut stars = vec![
            StarPoint::new(0, DVec3::ZERO, 5.0),
            StarPoint::new(1, DVec3::ZERO, -1.5),
            StarPoint::new(2, DVec3::ZERO, 5.0),
            StarPoint::new(3, DVec3::ZERO, 2.0),
        ];
        stars.sort_by(|a, b| BrightnessOrder.compare(a, b));

        let ids: Vec<_> = stars.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3, 0, 2]);
    }

    #[test]
    fn distance_order_puts_near_stars_first() {
        let order = DistanceOrder {
            origin: DVec3::new(10.0, 0.0, 0.0),
        };
        let near = StarPoint::new(0, DVec3::new(9.0, 0.0, 0.0), 10.0);
        let far = StarPoint::new(1, DVec3::ZERO, 0.0);

        assert_eq!(order.compare(&near, &far), Ordering::Less);
    }
}
