// camera.rs: perspective camera at the sphere centre

use glam::{Mat4, Vec3};

use crate::config::CameraOptions;

#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    /// vertical field of view, degrees
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub zoom: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    world: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov,
            aspect,
            near,
            far,
            zoom: 1.0,
            position: Vec3::ZERO,
            target: Vec3::NEG_Z,
            up: Vec3::Y,
            world: Mat4::IDENTITY,
        };
        camera.update_world_matrix();
        camera
    }

    pub fn from_options(options: &CameraOptions, aspect: Option<f32>) -> Self {
        Self::new(
            options.fov,
            aspect.unwrap_or(options.aspect),
            options.near,
            options.far,
        )
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
        self.update_world_matrix();
    }

    /// Recomputes the camera-to-world transform from position and target.
    pub fn update_world_matrix(&mut self) {
        // target == position would produce NaNs in look_at
        let target = if (self.target - self.position).length_squared() > f32::EPSILON {
            self.target
        } else {
            self.position + Vec3::NEG_Z
        };
        self.world = Mat4::look_at_rh(self.position, target, self.up).inverse();
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.world.inverse()
    }

    /// Depth range 0..1, as wgpu expects.
    pub fn projection_matrix(&self) -> Mat4 {
        let fov_y = 2.0 * ((self.fov.to_radians() * 0.5).tan() / self.zoom).atan();
        Mat4::perspective_rh(fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// A camera reduced to the two matrices a backend needs for one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeCamera {
    pub world: Mat4,
    pub projection: Mat4,
}

impl EyeCamera {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.world.inverse()
    }
}

impl From<&PerspectiveCamera> for EyeCamera {
    fn from(camera: &PerspectiveCamera) -> Self {
        Self {
            world: camera.world_matrix(),
            projection: camera.projection_matrix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_towards_target() {
        let mut cam = PerspectiveCamera::new(75.0, 16.0 / 9.0, 0.1, 1000.0);
        cam.look_at(Vec3::new(500.0, 0.0, 0.0));
        // camera looks down its local -Z
        let forward = cam.world_matrix().transform_vector3(Vec3::NEG_Z);
        assert!((forward - Vec3::X).length() < 1e-4, "{forward:?}");
    }

    #[test]
    fn degenerate_target_keeps_finite_matrix() {
        let mut cam = PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0);
        cam.look_at(Vec3::ZERO);
        assert!(cam.view_matrix().is_finite());
    }

    #[test]
    fn point_ahead_projects_to_centre() {
        let mut cam = PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0);
        cam.look_at(Vec3::new(0.0, 0.0, 500.0));
        let clip = cam.view_projection().project_point3(Vec3::new(0.0, 0.0, 100.0));
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4, "{clip:?}");
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }
}
