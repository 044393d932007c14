// backend.rs: the drawing surface a render session talks to

use crate::camera::EyeCamera;
use crate::dimensions::Dimensions;
use crate::error::RenderError;
use crate::frame_source::VideoTexture;
use crate::mesh::SphereMesh;

/// Pixel rectangle, origin at the bottom-left like GL viewports.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full(size: (f32, f32)) -> Self {
        Self::new(0.0, 0.0, size.0, size.1)
    }

    /// Left and right halves.
    pub fn split_horizontal(&self) -> (Rect, Rect) {
        let half = self.width / 2.0;
        (
            Rect::new(self.x, self.y, half, self.height),
            Rect::new(self.x + half, self.y, half, self.height),
        )
    }
}

/// The scene graph: a single inward-facing sphere carrying the video texture.
#[derive(Debug)]
pub struct Scene {
    pub sphere: SphereMesh,
    pub texture: VideoTexture,
}

/// Drawing state follows the immediate-mode GL model: scissor and viewport
/// persist until changed and apply to every following `render`.
pub trait RenderBackend {
    fn size(&self) -> (f32, f32);
    fn set_size(&mut self, width: f32, height: f32);

    fn clear(&mut self);
    fn set_scissor_test(&mut self, enabled: bool);
    fn set_scissor(&mut self, rect: Rect);
    fn set_viewport(&mut self, rect: Rect);

    /// One draw call. Uploads the scene texture first if it is dirty.
    fn render(&mut self, scene: &mut Scene, camera: &EyeCamera) -> Result<(), RenderError>;

    /// Shows what was drawn since the last present.
    fn present(&mut self) -> Result<(), RenderError>;

    /// Inserts the surface into the host view.
    fn attach(&mut self);
    /// Removes the surface from the host view and releases GPU resources.
    fn detach(&mut self);
}

/// Builds one backend per render session.
pub trait BackendFactory {
    fn create(&mut self, dimensions: Option<Dimensions>) -> Box<dyn RenderBackend>;
}

impl<F> BackendFactory for F
where
    F: FnMut(Option<Dimensions>) -> Box<dyn RenderBackend>,
{
    fn create(&mut self, dimensions: Option<Dimensions>) -> Box<dyn RenderBackend> {
        self(dimensions)
    }
}
