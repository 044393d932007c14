// frame_source.rs: per-frame video texture, native or canvas-copy

use std::sync::Arc;

use image::{imageops, RgbaImage};

use crate::dimensions::Dimensions;

/// One decoded video frame as handed out by the host player.
pub type VideoFrame = Arc<RgbaImage>;

/// Offscreen 2D surface the canvas-copy variant draws every frame into.
#[derive(Debug, Clone)]
pub struct CanvasSurface {
    image: RgbaImage,
}

impl CanvasSurface {
    pub fn new(dimensions: Option<Dimensions>) -> Self {
        let (w, h) = dimensions.map(|d| d.to_pixels()).unwrap_or((1, 1));
        Self {
            image: RgbaImage::new(w, h),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Scales `frame` into the whole surface. The surface keeps its size.
    pub fn draw(&mut self, frame: &RgbaImage) {
        let (w, h) = self.image.dimensions();
        if frame.dimensions() == (w, h) {
            self.image.copy_from_slice(frame.as_raw());
        } else if frame.width() > 0 && frame.height() > 0 {
            self.image = imageops::resize(frame, w, h, imageops::FilterType::Triangle);
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

#[derive(Debug, Clone)]
pub enum FrameSource {
    /// The backend uploads the host's frame as is.
    Native { frame: Option<VideoFrame> },
    /// Compatibility path for engines whose video textures are broken.
    CanvasCopy(CanvasSurface),
}

impl FrameSource {
    pub fn select(canvas_copy: bool, dimensions: Option<Dimensions>) -> Self {
        if canvas_copy {
            FrameSource::CanvasCopy(CanvasSurface::new(dimensions))
        } else {
            FrameSource::Native { frame: None }
        }
    }

    pub fn is_canvas_copy(&self) -> bool {
        matches!(self, FrameSource::CanvasCopy(_))
    }
}

/// Single-level texture; video frames change too often for mipmaps.
#[derive(Debug, Clone)]
pub struct VideoTexture {
    source: FrameSource,
    needs_update: bool,
}

impl VideoTexture {
    pub fn new(source: FrameSource) -> Self {
        Self {
            source,
            needs_update: false,
        }
    }

    pub fn source(&self) -> &FrameSource {
        &self.source
    }

    /// Swaps the source; the next draw uploads from the new one.
    pub fn replace_source(&mut self, source: FrameSource) {
        self.source = source;
        self.needs_update = true;
    }

    /// Takes in the current video frame. Cannot fail; calling it twice with
    /// the same frame leaves the same texels.
    pub fn render(&mut self, frame: &VideoFrame) {
        match &mut self.source {
            FrameSource::Native { frame: current } => {
                if !current.as_ref().is_some_and(|f| Arc::ptr_eq(f, frame)) {
                    *current = Some(Arc::clone(frame));
                }
            }
            FrameSource::CanvasCopy(surface) => surface.draw(frame),
        }
    }

    pub fn mark_dirty(&mut self) {
        self.needs_update = true;
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Consumes the dirty flag; the backend uploads when this returns `true`.
    pub fn take_update(&mut self) -> bool {
        std::mem::take(&mut self.needs_update)
    }

    /// Texels to upload, if any frame has been seen yet.
    pub fn pixels(&self) -> Option<&RgbaImage> {
        match &self.source {
            FrameSource::Native { frame } => frame.as_deref(),
            FrameSource::CanvasCopy(surface) => Some(surface.image()),
        }
    }
}
