// stereo.rs: side-by-side stereo rendering from two offset eye cameras

use glam::Mat4;

use crate::backend::{Rect, RenderBackend, Scene};
use crate::camera::{EyeCamera, PerspectiveCamera};
use crate::error::RenderError;

/// Average interpupillary distance in scene units.
pub const DEFAULT_EYE_SEPARATION: f32 = 0.064;

/// Each eye gets half of the surface width.
const EYE_ASPECT_SCALE: f32 = 0.5;
/// Distance at which both eye frusta converge.
const FOCUS_DISTANCE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoCameras {
    pub left: EyeCamera,
    pub right: EyeCamera,
}

/// Off-axis eye cameras sharing `camera`'s orientation, shifted by half the
/// eye separation along its local X axis.
pub fn stereo_cameras(camera: &PerspectiveCamera, eye_sep: f32) -> StereoCameras {
    let half = eye_sep / 2.0;
    let shift_on_near = half * camera.near / FOCUS_DISTANCE;
    let ymax = camera.near * (camera.fov.to_radians() * 0.5).tan() / camera.zoom;
    let aspect = camera.aspect * EYE_ASPECT_SCALE;

    let base = camera.projection_matrix();
    let off_axis = |offset: f32| {
        let xmin = -ymax * aspect + offset;
        let xmax = ymax * aspect + offset;
        let mut m = base;
        m.x_axis.x = 2.0 * camera.near / (xmax - xmin);
        m.z_axis.x = (xmax + xmin) / (xmax - xmin);
        m
    };

    let world = camera.world_matrix();
    StereoCameras {
        left: EyeCamera {
            world: world * Mat4::from_translation(glam::Vec3::new(-half, 0.0, 0.0)),
            projection: off_axis(shift_on_near),
        },
        right: EyeCamera {
            world: world * Mat4::from_translation(glam::Vec3::new(half, 0.0, 0.0)),
            projection: off_axis(-shift_on_near),
        },
    }
}

#[derive(Debug, Clone)]
pub struct StereoSplitter {
    eye_sep: f32,
}

impl StereoSplitter {
    pub fn new(eye_sep: f32) -> Self {
        Self { eye_sep }
    }

    pub fn eye_separation(&self) -> f32 {
        self.eye_sep
    }

    pub fn set_eye_separation(&mut self, eye_sep: f32) {
        self.eye_sep = eye_sep;
    }

    pub fn set_size(&self, backend: &mut dyn RenderBackend, width: f32, height: f32) {
        backend.set_size(width, height);
    }

    /// Clears once, then draws the left eye into the left half and the right
    /// eye into the right half. Leaves scissor and viewport at full surface.
    pub fn render(
        &self,
        scene: &mut Scene,
        camera: &mut PerspectiveCamera,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), RenderError> {
        camera.update_world_matrix();
        let eyes = stereo_cameras(camera, self.eye_sep);

        let full = Rect::full(backend.size());
        let (left, right) = full.split_horizontal();

        backend.clear();
        backend.set_scissor_test(true);

        let mut result = Ok(());
        for (rect, eye) in [(left, &eyes.left), (right, &eyes.right)] {
            backend.set_scissor(rect);
            backend.set_viewport(rect);
            if let Err(e) = backend.render(scene, eye) {
                result = Err(e);
                break;
            }
        }

        backend.set_scissor_test(false);
        backend.set_scissor(full);
        backend.set_viewport(full);
        result
    }
}

impl Default for StereoSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_EYE_SEPARATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_scene, BackendCall, RecordingBackend};
    use glam::Vec3;
    use pretty_assertions::assert_eq;

    fn camera() -> PerspectiveCamera {
        let mut cam = PerspectiveCamera::new(75.0, 2.0, 0.1, 1000.0);
        cam.look_at(Vec3::new(0.0, 0.0, -500.0));
        cam
    }

    #[test]
    fn two_draws_each_in_own_half() {
        let (mut backend, log) = RecordingBackend::new(800.0, 400.0);
        let mut scene = test_scene();
        let mut cam = camera();

        StereoSplitter::default()
            .render(&mut scene, &mut cam, &mut backend)
            .unwrap();

        let left = Rect::new(0.0, 0.0, 400.0, 400.0);
        let right = Rect::new(400.0, 0.0, 400.0, 400.0);
        let full = Rect::new(0.0, 0.0, 800.0, 400.0);
        let calls = log.borrow().calls.clone();
        assert_eq!(
            calls,
            vec![
                BackendCall::Clear,
                BackendCall::ScissorTest(true),
                BackendCall::Scissor(left),
                BackendCall::Viewport(left),
                BackendCall::Draw {
                    scissor: Some(left),
                    viewport: left
                },
                BackendCall::Scissor(right),
                BackendCall::Viewport(right),
                BackendCall::Draw {
                    scissor: Some(right),
                    viewport: right
                },
                BackendCall::ScissorTest(false),
                BackendCall::Scissor(full),
                BackendCall::Viewport(full),
            ]
        );
        let state = log.borrow();
        assert!(!state.scissor_test);
        assert_eq!(state.viewport, full);
    }

    #[test]
    fn state_restored_when_a_draw_fails() {
        let (mut backend, log) = RecordingBackend::new(100.0, 50.0);
        log.borrow_mut().fail_draws = true;
        let mut scene = test_scene();

        let result = StereoSplitter::default().render(&mut scene, &mut camera(), &mut backend);
        assert!(result.is_err());
        let state = log.borrow();
        assert!(!state.scissor_test);
        assert_eq!(state.viewport, Rect::new(0.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn eyes_offset_along_camera_x() {
        let cam = camera();
        let eyes = stereo_cameras(&cam, 0.064);
        let l = eyes.left.world.transform_point3(Vec3::ZERO);
        let r = eyes.right.world.transform_point3(Vec3::ZERO);
        let right_axis = cam.world_matrix().transform_vector3(Vec3::X);
        assert!(((r - l) - right_axis * 0.064).length() < 1e-5);

        // frusta converge: both eyes share orientation, mirror skews
        assert!(eyes.left.projection.z_axis.x > 0.0);
        assert!((eyes.left.projection.z_axis.x + eyes.right.projection.z_axis.x).abs() < 1e-6);
    }

    #[test]
    fn setters_take_effect() {
        let (mut backend, log) = RecordingBackend::new(10.0, 10.0);
        let mut splitter = StereoSplitter::default();
        splitter.set_eye_separation(0.1);
        assert_eq!(splitter.eye_separation(), 0.1);
        splitter.set_size(&mut backend, 300.0, 100.0);
        assert_eq!(log.borrow().size, (300.0, 100.0));
    }
}
