// gpu.rs: wgpu render backend: textured sphere + egui overlay

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use image::RgbaImage;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::{Rect, RenderBackend, Scene};
use crate::camera::EyeCamera;
use crate::error::RenderError;
use crate::mesh::SphereMesh;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 1.0,
};

#[derive(thiserror::Error, Debug)]
pub enum GpuInitError {
    #[error("cannot create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable graphics adapter")]
    NoAdapter,

    #[error("cannot open device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    uv: [f32; 2],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

struct MeshBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct VideoTextureGpu {
    texture: wgpu::Texture,
    size: (u32, u32),
    bind_group: wgpu::BindGroup,
}

struct Frame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

pub type Overlay = Box<dyn FnMut(&egui::Context)>;

pub struct GpuRenderer {
    window: Arc<Window>,
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    render_pipeline: wgpu::RenderPipeline,

    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    camera_buffer: wgpu::Buffer,
    video: VideoTextureGpu,
    mesh: Option<MeshBuffers>,

    // GL-style draw state, in canvas pixels
    canvas: (f32, f32),
    viewport: Rect,
    scissor: Rect,
    scissor_test: bool,
    pending_clear: bool,
    attached: bool,
    frame: Option<Frame>,

    // UI
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    overlay: Option<Overlay>,
}

impl GpuRenderer {
    pub async fn new(window: Arc<Window>) -> Result<Self, GpuInitError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(window.as_ref()) }?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuInitError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: if cfg!(target_arch = "wasm32") {
                        wgpu::Limits::downlevel_webgl2_defaults()
                    } else {
                        wgpu::Limits::default().using_resolution(adapter.limits())
                    },
                    label: None,
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let sampler = create_sampler(&device);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera_buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform {
                view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("video_bind_group_layout"),
        });

        // black until the first frame arrives
        let placeholder = RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255]));
        let video = create_video_texture(
            &device,
            &queue,
            &bind_group_layout,
            &camera_buffer,
            &sampler,
            &placeholder,
        );

        let shader = device.create_shader_module(wgpu::include_wgsl!("shader_sphere.wgsl"));
        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sphere_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sphere_pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // seen from the centre only one layer of the sphere is ever in front
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let egui_ctx = egui::Context::default();
        crate::fonts::install_ui_font(&egui_ctx);
        let mut egui_state = egui_winit::State::new(window.as_ref());
        egui_state.set_pixels_per_point(window.scale_factor() as f32);
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        let canvas = (config.width as f32, config.height as f32);
        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            render_pipeline,
            bind_group_layout,
            sampler,
            camera_buffer,
            video,
            mesh: None,
            canvas,
            viewport: Rect::full(canvas),
            scissor: Rect::full(canvas),
            scissor_test: false,
            pending_clear: false,
            attached: false,
            frame: None,
            egui_ctx,
            egui_state,
            egui_renderer,
            overlay: None,
        })
    }

    pub fn set_overlay(&mut self, overlay: Overlay) {
        self.overlay = Some(overlay);
    }

    /// Window resized; the canvas size is set separately through `set_size`.
    pub fn resize_surface(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.frame = None;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Frame with only the overlay, for when no session is drawing.
    pub fn present_idle(&mut self) -> Result<(), RenderError> {
        if self.frame.is_none() {
            self.acquire()?;
            self.pending_clear = true;
        }
        self.present_frame()
    }

    fn acquire(&mut self) -> Result<(), RenderError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.surface.configure(&self.device, &self.config);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.frame = Some(Frame { output, view });
        Ok(())
    }

    fn to_target(&self, rect: Rect) -> Option<PixelRect> {
        canvas_to_target(
            rect,
            self.canvas,
            (self.config.width as f32, self.config.height as f32),
        )
    }

    fn upload_mesh(&mut self, sphere: &SphereMesh) {
        let vertices: Vec<Vertex> = sphere
            .positions
            .iter()
            .zip(&sphere.uvs)
            .map(|(&position, &uv)| Vertex { position, uv })
            .collect();
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere_vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere_indices"),
            contents: bytemuck::cast_slice(&sphere.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.mesh = Some(MeshBuffers {
            vertices: vertex_buffer,
            indices: index_buffer,
            index_count: sphere.indices.len() as u32,
        });
    }

    fn upload_texture(&mut self, img: &RgbaImage) {
        let max = self.device.limits().max_texture_dimension_2d;
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return;
        }
        let scaled;
        let img = if w > max || h > max {
            let scale = max as f32 / w.max(h) as f32;
            let (nw, nh) = (
                ((w as f32 * scale) as u32).max(1),
                ((h as f32 * scale) as u32).max(1),
            );
            log::warn!("frame {w}x{h} exceeds texture limit {max}, scaled to {nw}x{nh}");
            scaled = image::imageops::resize(img, nw, nh, image::imageops::FilterType::Triangle);
            &scaled
        } else {
            img
        };

        if self.video.size != img.dimensions() {
            self.video = create_video_texture(
                &self.device,
                &self.queue,
                &self.bind_group_layout,
                &self.camera_buffer,
                &self.sampler,
                img,
            );
        } else {
            write_texture(&self.queue, &self.video.texture, img);
        }
    }

    fn present_frame(&mut self) -> Result<(), RenderError> {
        let Some(frame) = self.frame.take() else {
            return Ok(());
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("overlay_encoder"),
            });

        let raw_input = self.egui_state.take_egui_input(&self.window);
        let mut overlay = self.overlay.take();
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if let Some(ui) = overlay.as_mut() {
                ui(ctx);
            }
        });
        self.overlay = overlay;

        self.egui_state
            .handle_platform_output(&self.window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);
        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let load = if std::mem::take(&mut self.pending_clear) {
                wgpu::LoadOp::Clear(CLEAR_COLOR)
            } else {
                wgpu::LoadOp::Load
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("overlay_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations { load, store: true },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer
                .render(&mut render_pass, &clipped_primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.output.present();
        Ok(())
    }
}

/// x, y, width, height in target pixels, origin top-left.
type PixelRect = (f32, f32, f32, f32);

/// Maps a canvas rect (bottom-left origin) into a target where the canvas
/// is centred, clipped to the target. `None` when nothing is left.
fn canvas_to_target(rect: Rect, canvas: (f32, f32), target: (f32, f32)) -> Option<PixelRect> {
    let ox = ((target.0 - canvas.0) / 2.0).max(0.0);
    let oy = ((target.1 - canvas.1) / 2.0).max(0.0);
    let x0 = (ox + rect.x).max(0.0);
    let y0 = (oy + canvas.1 - rect.y - rect.height).max(0.0);
    let x1 = (ox + rect.x + rect.width).min(target.0);
    let y1 = (oy + canvas.1 - rect.y).min(target.1);
    (x1 > x0 && y1 > y0).then_some((x0, y0, x1 - x0, y1 - y0))
}

fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn write_texture(queue: &wgpu::Queue, texture: &wgpu::Texture, img: &RgbaImage) {
    let (width, height) = img.dimensions();
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        img,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

fn create_video_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    camera_buffer: &wgpu::Buffer,
    sampler: &wgpu::Sampler,
    img: &RgbaImage,
) -> VideoTextureGpu {
    let (width, height) = img.dimensions();
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        label: Some("video_texture"),
        view_formats: &[],
    });
    write_texture(queue, &texture, img);

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("video_bind_group"),
    });

    VideoTextureGpu {
        texture,
        size: (width, height),
        bind_group,
    }
}

impl RenderBackend for GpuRenderer {
    fn size(&self) -> (f32, f32) {
        self.canvas
    }

    fn set_size(&mut self, width: f32, height: f32) {
        self.canvas = (width.max(1.0), height.max(1.0));
        self.viewport = Rect::full(self.canvas);
        self.scissor = Rect::full(self.canvas);
    }

    fn clear(&mut self) {
        self.pending_clear = true;
    }

    fn set_scissor_test(&mut self, enabled: bool) {
        self.scissor_test = enabled;
    }

    fn set_scissor(&mut self, rect: Rect) {
        self.scissor = rect;
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.viewport = rect;
    }

    fn render(&mut self, scene: &mut Scene, camera: &EyeCamera) -> Result<(), RenderError> {
        if !self.attached {
            return Err(RenderError::Detached);
        }
        if self.mesh.is_none() {
            self.upload_mesh(&scene.sphere);
        }
        if scene.texture.take_update() {
            if let Some(img) = scene.texture.pixels() {
                self.upload_texture(img);
            }
        }
        if self.frame.is_none() {
            self.acquire()?;
        }

        let clip = if self.scissor_test {
            self.scissor
        } else {
            Rect::full(self.canvas)
        };
        let (Some(viewport), Some(scissor)) = (self.to_target(self.viewport), self.to_target(clip))
        else {
            return Ok(());
        };

        let uniform = CameraUniform {
            view_proj: camera.view_projection().to_cols_array_2d(),
        };
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniform]));

        let (Some(frame), Some(mesh)) = (self.frame.as_ref(), self.mesh.as_ref()) else {
            return Ok(());
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sphere_encoder"),
            });
        {
            let load = if std::mem::take(&mut self.pending_clear) {
                wgpu::LoadOp::Clear(CLEAR_COLOR)
            } else {
                wgpu::LoadOp::Load
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sphere_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations { load, store: true },
                })],
                depth_stencil_attachment: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.video.bind_group, &[]);
            render_pass.set_viewport(viewport.0, viewport.1, viewport.2, viewport.3, 0.0, 1.0);
            render_pass.set_scissor_rect(
                scissor.0 as u32,
                scissor.1 as u32,
                scissor.2 as u32,
                scissor.3 as u32,
            );
            render_pass.set_vertex_buffer(0, mesh.vertices.slice(..));
            render_pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.present_frame()
    }

    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
        self.mesh = None;
        self.frame = None;
        self.pending_clear = true;
    }
}

/// Handle that lets a render session and the demo host share one renderer.
#[derive(Clone)]
pub struct SharedGpu(pub Rc<RefCell<GpuRenderer>>);

impl RenderBackend for SharedGpu {
    fn size(&self) -> (f32, f32) {
        self.0.borrow().size()
    }
    fn set_size(&mut self, width: f32, height: f32) {
        self.0.borrow_mut().set_size(width, height);
    }
    fn clear(&mut self) {
        self.0.borrow_mut().clear();
    }
    fn set_scissor_test(&mut self, enabled: bool) {
        self.0.borrow_mut().set_scissor_test(enabled);
    }
    fn set_scissor(&mut self, rect: Rect) {
        self.0.borrow_mut().set_scissor(rect);
    }
    fn set_viewport(&mut self, rect: Rect) {
        self.0.borrow_mut().set_viewport(rect);
    }
    fn render(&mut self, scene: &mut Scene, camera: &EyeCamera) -> Result<(), RenderError> {
        self.0.borrow_mut().render(scene, camera)
    }
    fn present(&mut self) -> Result<(), RenderError> {
        self.0.borrow_mut().present()
    }
    fn attach(&mut self) {
        self.0.borrow_mut().attach();
    }
    fn detach(&mut self) {
        self.0.borrow_mut().detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_is_centred_in_the_window() {
        let full = Rect::full((800.0, 400.0));
        assert_eq!(
            canvas_to_target(full, (800.0, 400.0), (1000.0, 600.0)),
            Some((100.0, 100.0, 800.0, 400.0))
        );
    }

    #[test]
    fn bottom_left_origin_is_flipped() {
        // lower half of the canvas lands in the lower half of the target
        let lower = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(
            canvas_to_target(lower, (100.0, 100.0), (100.0, 100.0)),
            Some((0.0, 50.0, 100.0, 50.0))
        );
    }

    #[test]
    fn stereo_halves_split_the_target() {
        let (left, right) = Rect::full((640.0, 360.0)).split_horizontal();
        let target = (640.0, 360.0);
        assert_eq!(
            canvas_to_target(left, (640.0, 360.0), target),
            Some((0.0, 0.0, 320.0, 360.0))
        );
        assert_eq!(
            canvas_to_target(right, (640.0, 360.0), target),
            Some((320.0, 0.0, 320.0, 360.0))
        );
    }

    #[test]
    fn clipped_away_rect_is_none() {
        let outside = Rect::new(500.0, 0.0, 10.0, 10.0);
        assert_eq!(canvas_to_target(outside, (100.0, 100.0), (100.0, 100.0)), None);
    }
}
