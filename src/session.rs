// session.rs: everything that lives from first play to teardown

use crate::backend::{BackendFactory, Rect, RenderBackend, Scene};
use crate::camera::{EyeCamera, PerspectiveCamera};
use crate::config::VrConfig;
use crate::dimensions::Dimensions;
use crate::error::RenderError;
use crate::frame_source::{FrameSource, VideoFrame, VideoTexture};
use crate::mesh::{build_inverted_sphere, SPHERE_RADIUS, SPHERE_SEGMENTS};
use crate::orientation::{look_at_target, ViewAngles, LOOK_AT_RADIUS};
use crate::stereo::StereoSplitter;

pub struct RenderSession {
    backend: Box<dyn RenderBackend>,
    scene: Scene,
    camera: PerspectiveCamera,
    splitter: StereoSplitter,
    attached: bool,
    /// The frame source was built with a known size.
    source_sized: bool,
}

impl RenderSession {
    pub fn new(
        factory: &mut dyn BackendFactory,
        config: &VrConfig,
        dimensions: Option<Dimensions>,
        canvas_copy: bool,
    ) -> Self {
        let mut backend = factory.create(dimensions);
        backend.attach();

        let aspect = dimensions
            .filter(|d| d.width > 0.0 && d.height > 0.0)
            .map(|d| d.aspect() as f32);
        let camera = PerspectiveCamera::from_options(&config.camera_options, aspect);

        let scene = Scene {
            sphere: build_inverted_sphere(SPHERE_RADIUS, SPHERE_SEGMENTS, SPHERE_SEGMENTS),
            texture: VideoTexture::new(FrameSource::select(canvas_copy, dimensions)),
        };

        Self {
            backend,
            scene,
            camera,
            splitter: StereoSplitter::new(config.eye_separation),
            attached: true,
            source_sized: dimensions.is_some(),
        }
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn texture(&self) -> &VideoTexture {
        &self.scene.texture
    }

    pub fn splitter_mut(&mut self) -> &mut StereoSplitter {
        &mut self.splitter
    }

    pub fn refresh_texture(&mut self, frame: &VideoFrame) {
        self.scene.texture.render(frame);
        self.scene.texture.mark_dirty();
    }

    pub fn resize(&mut self, dimensions: Dimensions) {
        self.backend
            .set_size(dimensions.width as f32, dimensions.height as f32);
        if dimensions.width > 0.0 && dimensions.height > 0.0 {
            self.camera.aspect = dimensions.aspect() as f32;
        }
        if !self.source_sized {
            self.resize_canvas_source(dimensions);
        }
    }

    /// Rebuilds a canvas-copy surface at `dimensions`. Native sources have no
    /// surface of their own and are left alone.
    pub fn resize_canvas_source(&mut self, dimensions: Dimensions) {
        self.source_sized = true;
        if self.scene.texture.source().is_canvas_copy() {
            self.scene
                .texture
                .replace_source(FrameSource::select(true, Some(dimensions)));
        }
    }

    /// Points the camera and draws one frame, mono or stereo.
    pub fn render(&mut self, angles: ViewAngles, stereo: bool) -> Result<(), RenderError> {
        self.camera.look_at(look_at_target(angles, LOOK_AT_RADIUS));

        if stereo {
            self.splitter
                .render(&mut self.scene, &mut self.camera, self.backend.as_mut())?;
        } else {
            let full = Rect::full(self.backend.size());
            self.backend.set_viewport(full);
            self.backend.clear();
            self.backend
                .render(&mut self.scene, &EyeCamera::from(&self.camera))?;
        }
        self.backend.present()
    }

    /// Removes the surface from the view. Safe to call more than once.
    pub fn detach(&mut self) {
        if std::mem::take(&mut self.attached) {
            self.backend.detach();
        }
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.detach();
    }
}
