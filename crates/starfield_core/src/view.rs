use crate::{Frustum, OctantBox};

use glam::{DMat4, DVec3};

/// The camera state for a single frame, as supplied by whatever owns the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub position: DVec3,
    /// Unit forward vector.
    pub direction: DVec3,
    /// Scales angular sizes so that zooming in (narrower field of view) makes octants look bigger. `1.0` is neutral.
    pub fov_factor: f64,
    pub frustum: Frustum,
    /// Monotonic frame counter, used to timestamp octant accesses.
    pub tick: u64,
}

impl ViewState {
    /// A right-handed perspective camera at `position` looking along `direction`.
    pub fn perspective(
        position: DVec3,
        direction: DVec3,
        up: DVec3,
        fov_y_radians: f64,
        aspect_ratio: f64,
        z_near: f64,
        z_far: f64,
        tick: u64,
    ) -> Self {
        let direction = direction.normalize();
        let view = DMat4::look_at_rh(position, position + direction, up);
        let projection = DMat4::perspective_rh(fov_y_radians, aspect_ratio, z_near, z_far);

        Self {
            position,
            direction,
            fov_factor: fov_y_radians / std::f64::consts::FRAC_PI_4,
            frustum: Frustum::from_view_projection(&(projection * view)),
            tick,
        }
    }

    /// Same camera, next frame.
    #[inline]
    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// The apparent angular size of `octant`: the radius of its bounding sphere over its distance from the camera, scaled by
    /// the field of view. Infinite when the camera is inside the box.
    #[inline]
    pub fn view_angle(&self, octant: &OctantBox) -> f64 {
        let distance = octant.distance_to(self.position);
        if distance <= 0.0 {
            return f64::INFINITY;
        }

        (octant.radius() / distance) / self.fov_factor
    }

    #[inline]
    pub fn sees(&self, octant: &OctantBox) -> bool {
        self.frustum.intersects_box(octant)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
