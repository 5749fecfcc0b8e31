use crate::OctantBox;

use glam::{DMat4, DVec3, DVec4};
use serde::{Deserialize, Serialize};

/// A plane `normal · p + distance = 0`. Points with a positive signed distance are in front.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Plane {
    pub normal: DVec3,
    pub distance: f64,
}

impl Plane {
    pub const NULL: Self = Self {
        normal: DVec3::ZERO,
        distance: 0.0,
    };

    #[inline]
    pub fn new(normal: DVec3, distance: f64) -> Self {
        Self { normal, distance }
    }

    /// Builds the plane from packed `(a, b, c, d)` coefficients, normalized so that `signed_distance` is Euclidean.
    #[inline]
    pub fn from_coefficients(coefficients: DVec4) -> Self {
        let normal = coefficients.truncate();
        let length = normal.length();
        if length == 0.0 {
            return Self::NULL;
        }

        Self::new(normal / length, coefficients.w / length)
    }

    #[inline]
    pub fn signed_distance(&self, p: DVec3) -> f64 {
        self.normal.dot(p) + self.distance
    }
}

/// A view frustum as six inward-facing planes, ordered left, right, bottom, top, near, far.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the planes of a view-projection matrix whose clip space depth range is `[0, 1]` (the convention of glam's
    /// `perspective_*` constructors). The planes are in whatever space the matrix transforms from, so pass
    /// `projection * view` to get world-space planes.
    pub fn from_view_projection(view_projection: &DMat4) -> Self {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0), // left
                Plane::from_coefficients(r3 - r0), // right
                Plane::from_coefficients(r3 + r1), // bottom
                Plane::from_coefficients(r3 - r1), // top
                Plane::from_coefficients(r2),      // near
                Plane::from_coefficients(r3 - r2), // far
            ],
        }
    }

    #[inline]
    pub fn contains_point(&self, p: DVec3) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) >= 0.0)
    }

    /// Conservative box test: a box is rejected only when it lies entirely behind one plane. Boxes near frustum corners may
    /// be accepted even though they are outside.
    pub fn intersects_box(&self, octant: &OctantBox) -> bool {
        self.planes.iter().all(|plane| {
            // The box corner furthest along the plane normal.
            let positive_vertex = octant.center
                + DVec3::new(
                    octant.half_size.copysign(plane.normal.x),
                    octant.half_size.copysign(plane.normal.y),
                    octant.half_size.copysign(plane.normal.z),
                );

            plane.signed_distance(positive_vertex) >= 0.0
        })
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

    fn looking_down_negative_z() -> Frustum {
        let projection = DMat4::perspective_rh(std::f64::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = DMat4::look_at_rh(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y);

        Frustum::from_view_projection(&(projection * view))
    }

    #[test]
    fn points_in_front_are_inside() {
        let frustum = looking_down_negative_z();

        assert!(frustum.contains_point(DVec3::new(0.0, 0.0, -10.0)));
        assert!(frustum.contains_point(DVec3::new(4.0, -4.0, -10.0)));
        assert!(!frustum.contains_point(DVec3::new(0.0, 0.0, 10.0)));
        assert!(!frustum.contains_point(DVec3::new(20.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(DVec3::new(0.0, 0.0, -200.0)));
    }

    #[test]
    fn planes_are_normalized() {
        let frustum = looking_down_negative_z();
        for plane in frustum.planes.iter() {
            assert!((plane.normal.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn box_intersection() {
        let frustum = looking_down_negative_z();

        // In front.
        assert!(frustum.intersects_box(&OctantBox::new(DVec3::new(0.0, 0.0, -10.0), 1.0)));
        // Straddles the near plane.
        assert!(frustum.intersects_box(&OctantBox::new(DVec3::ZERO, 1.0)));
        // Behind the camera.
        assert!(!frustum.intersects_box(&OctantBox::new(DVec3::new(0.0, 0.0, 10.0), 1.0)));
        // Beyond the far plane.
        assert!(!frustum.intersects_box(&OctantBox::new(DVec3::new(0.0, 0.0, -500.0), 10.0)));
        // Off to the side.
        assert!(!frustum.intersects_box(&OctantBox::new(DVec3::new(50.0, 0.0, -10.0), 5.0)));
    }
}
