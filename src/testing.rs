//! Recording doubles for the host collaborators and the render backend.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};

use crate::backend::{BackendFactory, Rect, RenderBackend, Scene};
use crate::camera::EyeCamera;
use crate::config::VrConfig;
use crate::dimensions::Dimensions;
use crate::error::RenderError;
use crate::frame_source::{FrameSource, VideoFrame, VideoTexture};
use crate::host::{
    Env, FrameHandle, InputKind, PlatformInput, Player, PluginEvent, ReadyState, Scheduler,
    TimerHandle, VideoInfo,
};
use crate::mesh::build_inverted_sphere;
use crate::plugin::VrPlugin;

pub fn test_scene() -> Scene {
    Scene {
        sphere: build_inverted_sphere(1.0, 4, 2),
        texture: VideoTexture::new(FrameSource::select(false, None)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Clear,
    ScissorTest(bool),
    Scissor(Rect),
    Viewport(Rect),
    Draw {
        scissor: Option<Rect>,
        viewport: Rect,
    },
}

#[derive(Debug, Default)]
pub struct BackendLog {
    pub calls: Vec<BackendCall>,
    pub size: (f32, f32),
    pub scissor_test: bool,
    pub scissor: Rect,
    pub viewport: Rect,
    pub fail_draws: bool,
    pub uploads: usize,
    pub presents: usize,
    pub attached: usize,
    pub detached: usize,
    pub created_with: Vec<Option<Dimensions>>,
}

impl BackendLog {
    pub fn draws(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, BackendCall::Draw { .. }))
            .count()
    }
}

pub struct RecordingBackend {
    log: Rc<RefCell<BackendLog>>,
}

impl RecordingBackend {
    pub fn new(width: f32, height: f32) -> (Self, Rc<RefCell<BackendLog>>) {
        let log = Rc::new(RefCell::new(BackendLog::default()));
        let mut backend = Self::with_log(log.clone());
        backend.set_size(width, height);
        (backend, log)
    }

    pub fn with_log(log: Rc<RefCell<BackendLog>>) -> Self {
        Self { log }
    }
}

impl RenderBackend for RecordingBackend {
    fn size(&self) -> (f32, f32) {
        self.log.borrow().size
    }

    fn set_size(&mut self, width: f32, height: f32) {
        let mut log = self.log.borrow_mut();
        log.size = (width, height);
        log.viewport = Rect::full((width, height));
        log.scissor = Rect::full((width, height));
    }

    fn clear(&mut self) {
        self.log.borrow_mut().calls.push(BackendCall::Clear);
    }

    fn set_scissor_test(&mut self, enabled: bool) {
        let mut log = self.log.borrow_mut();
        log.scissor_test = enabled;
        log.calls.push(BackendCall::ScissorTest(enabled));
    }

    fn set_scissor(&mut self, rect: Rect) {
        let mut log = self.log.borrow_mut();
        log.scissor = rect;
        log.calls.push(BackendCall::Scissor(rect));
    }

    fn set_viewport(&mut self, rect: Rect) {
        let mut log = self.log.borrow_mut();
        log.viewport = rect;
        log.calls.push(BackendCall::Viewport(rect));
    }

    fn render(&mut self, scene: &mut Scene, _camera: &EyeCamera) -> Result<(), RenderError> {
        let mut log = self.log.borrow_mut();
        if log.fail_draws {
            return Err(RenderError::Detached);
        }
        if scene.texture.take_update() {
            log.uploads += 1;
        }
        let call = BackendCall::Draw {
            scissor: log.scissor_test.then_some(log.scissor),
            viewport: log.viewport,
        };
        log.calls.push(call);
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.log.borrow_mut().presents += 1;
        Ok(())
    }

    fn attach(&mut self) {
        self.log.borrow_mut().attached += 1;
    }

    fn detach(&mut self) {
        self.log.borrow_mut().detached += 1;
    }
}

pub struct RecordingFactory {
    log: Rc<RefCell<BackendLog>>,
}

impl BackendFactory for RecordingFactory {
    fn create(&mut self, dimensions: Option<Dimensions>) -> Box<dyn RenderBackend> {
        self.log.borrow_mut().created_with.push(dimensions);
        let mut backend = RecordingBackend::with_log(self.log.clone());
        let (w, h) = dimensions.map(|d| d.to_pixels()).unwrap_or((300, 150));
        backend.set_size(w as f32, h as f32);
        Box::new(backend)
    }
}

#[derive(Debug)]
pub struct PlayerState {
    pub is_vr: bool,
    pub env: Env,
    pub playsinline: bool,
    pub video: VideoInfo,
    pub frame: Option<VideoFrame>,
    pub view_size: (f64, f64),
    pub pauses: usize,
    pub dispatched: Vec<PluginEvent>,
    pub cross_origin: Option<String>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            is_vr: true,
            env: Env {
                browser_name: "Chrome".into(),
                browser_major: "120".into(),
                os_version: "10".into(),
                device_type: None,
            },
            playsinline: true,
            video: VideoInfo {
                ready_state: ReadyState::HaveEnoughData,
                intrinsic_size: (1920.0, 1080.0),
            },
            frame: Some(Arc::new(RgbaImage::from_pixel(8, 4, Rgba([9, 9, 9, 255])))),
            view_size: (640.0, 360.0),
            pauses: 0,
            dispatched: Vec::new(),
            cross_origin: None,
        }
    }
}

pub struct MockPlayer(Rc<RefCell<PlayerState>>);

impl Player for MockPlayer {
    fn is_vr(&self) -> bool {
        self.0.borrow().is_vr
    }
    fn env(&self) -> Env {
        self.0.borrow().env.clone()
    }
    fn playsinline(&self) -> bool {
        self.0.borrow().playsinline
    }
    fn video(&self) -> VideoInfo {
        self.0.borrow().video
    }
    fn current_frame(&self) -> Option<VideoFrame> {
        self.0.borrow().frame.clone()
    }
    fn view_size(&self) -> (f64, f64) {
        self.0.borrow().view_size
    }
    fn pause(&mut self) {
        self.0.borrow_mut().pauses += 1;
    }
    fn dispatch(&mut self, event: PluginEvent) {
        self.0.borrow_mut().dispatched.push(event);
    }
    fn cross_origin(&self) -> Option<String> {
        self.0.borrow().cross_origin.clone()
    }
    fn set_cross_origin(&mut self, value: Option<String>) {
        self.0.borrow_mut().cross_origin = value;
    }
}

#[derive(Debug, Default)]
pub struct SchedulerState {
    next_id: u64,
    pub frames: HashSet<FrameHandle>,
    pub intervals: HashSet<TimerHandle>,
    pub frames_requested: usize,
    pub periods: Vec<Duration>,
}

pub struct MockScheduler(Rc<RefCell<SchedulerState>>);

impl Scheduler for MockScheduler {
    fn request_animation_frame(&mut self) -> FrameHandle {
        let mut s = self.0.borrow_mut();
        s.next_id += 1;
        let h = FrameHandle(s.next_id);
        s.frames.insert(h);
        s.frames_requested += 1;
        h
    }
    fn cancel_animation_frame(&mut self, handle: FrameHandle) {
        self.0.borrow_mut().frames.remove(&handle);
    }
    fn set_interval(&mut self, period: Duration) -> TimerHandle {
        let mut s = self.0.borrow_mut();
        s.next_id += 1;
        let h = TimerHandle(s.next_id);
        s.intervals.insert(h);
        s.periods.push(period);
        h
    }
    fn clear_interval(&mut self, handle: TimerHandle) {
        self.0.borrow_mut().intervals.remove(&handle);
    }
}

#[derive(Debug, Default)]
pub struct InputState {
    pub subscribed: BTreeSet<InputKind>,
    pub device_motion: bool,
}

pub struct MockInput(Rc<RefCell<InputState>>);

impl PlatformInput for MockInput {
    fn subscribe(&mut self, kind: InputKind) {
        self.0.borrow_mut().subscribed.insert(kind);
    }
    fn unsubscribe(&mut self, kind: InputKind) {
        self.0.borrow_mut().subscribed.remove(&kind);
    }
    fn supports_device_motion(&self) -> bool {
        self.0.borrow().device_motion
    }
}

/// Shared views into every double handed to a plugin.
pub struct TestHost {
    pub player: Rc<RefCell<PlayerState>>,
    pub scheduler: Rc<RefCell<SchedulerState>>,
    pub input: Rc<RefCell<InputState>>,
    pub backend: Rc<RefCell<BackendLog>>,
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            player: Rc::default(),
            scheduler: Rc::default(),
            input: Rc::new(RefCell::new(InputState {
                device_motion: true,
                ..Default::default()
            })),
            backend: Rc::default(),
        }
    }

    pub fn plugin(&self, config: VrConfig) -> VrPlugin {
        VrPlugin::new(
            config,
            Box::new(MockPlayer(self.player.clone())),
            Box::new(MockScheduler(self.scheduler.clone())),
            Box::new(MockInput(self.input.clone())),
            Box::new(RecordingFactory {
                log: self.backend.clone(),
            }),
        )
    }

    pub fn pending_frames(&self) -> usize {
        self.scheduler.borrow().frames.len()
    }

    pub fn pending_intervals(&self) -> usize {
        self.scheduler.borrow().intervals.len()
    }

    pub fn errors(&self) -> Vec<crate::error::VrErrorKind> {
        self.player
            .borrow()
            .dispatched
            .iter()
            .filter_map(|e| match e {
                PluginEvent::Error(err) => Some(err.kind),
                _ => None,
            })
            .collect()
    }
}
