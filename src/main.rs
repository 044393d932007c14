// main.rs: desktop host: a window plays the role of the media player

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::io::Reader as ImageReader;
use winit::{
    dpi::LogicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, WindowBuilder},
};

use vr_video_viewer::backend::RenderBackend;
use vr_video_viewer::dimensions::Dimensions;
use vr_video_viewer::error::RenderError;
use vr_video_viewer::frame_source::VideoFrame;
use vr_video_viewer::gpu::{GpuRenderer, SharedGpu};
use vr_video_viewer::host::{
    Env, FrameHandle, InputEvent, InputKind, PlatformInput, Player, PlayerEvent, PluginEvent,
    ReadyState, Scheduler, SourceInfo, TimerHandle, VideoInfo,
};
use vr_video_viewer::i18n;
use vr_video_viewer::{Plugin, VrConfig, VrPlugin};

const CONFIG_FILE: &str = "vr_config.json";

/// Everything the plugin can observe about the "player".
#[derive(Default)]
struct HostState {
    frame: Option<VideoFrame>,
    source: Option<PathBuf>,
    view_size: (f64, f64),
    paused: bool,
    cross_origin: Option<String>,

    next_handle: u64,
    pending_frame: Option<FrameHandle>,
    intervals: Vec<Interval>,
    subscribed: BTreeSet<InputKind>,

    last_error: Option<String>,
}

struct Interval {
    handle: TimerHandle,
    period: Duration,
    due: Instant,
}

impl HostState {
    fn next_id(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Pops the intervals that are due and reschedules them.
    fn due_intervals(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        for interval in self.intervals.iter_mut().filter(|i| i.due <= now) {
            interval.due = now + interval.period;
            fired += 1;
        }
        fired
    }
}

type Shared = Rc<RefCell<HostState>>;

struct WindowPlayer(Shared);

impl Player for WindowPlayer {
    fn is_vr(&self) -> bool {
        true
    }

    fn env(&self) -> Env {
        Env {
            browser_name: "Desktop".into(),
            browser_major: env!("CARGO_PKG_VERSION_MAJOR").into(),
            os_version: std::env::consts::OS.into(),
            device_type: None,
        }
    }

    fn playsinline(&self) -> bool {
        true
    }

    fn video(&self) -> VideoInfo {
        match &self.0.borrow().frame {
            Some(frame) => VideoInfo {
                ready_state: ReadyState::HaveEnoughData,
                intrinsic_size: (frame.width() as f64, frame.height() as f64),
            },
            None => VideoInfo {
                ready_state: ReadyState::HaveNothing,
                intrinsic_size: (0.0, 0.0),
            },
        }
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        self.0.borrow().frame.clone()
    }

    fn view_size(&self) -> (f64, f64) {
        self.0.borrow().view_size
    }

    fn pause(&mut self) {
        self.0.borrow_mut().paused = true;
    }

    fn dispatch(&mut self, event: PluginEvent) {
        match event {
            PluginEvent::StereoModeChanged { mode } => log::info!("stereo mode: {mode}"),
            PluginEvent::Error(err) => {
                log::error!("{:?}/{:?}: {}", err.category, err.code, err.message);
                self.0.borrow_mut().last_error = Some(err.message);
            }
        }
    }

    fn cross_origin(&self) -> Option<String> {
        self.0.borrow().cross_origin.clone()
    }

    fn set_cross_origin(&mut self, value: Option<String>) {
        self.0.borrow_mut().cross_origin = value;
    }
}

struct WindowScheduler(Shared);

impl Scheduler for WindowScheduler {
    fn request_animation_frame(&mut self) -> FrameHandle {
        let mut host = self.0.borrow_mut();
        let handle = FrameHandle(host.next_id());
        host.pending_frame = Some(handle);
        handle
    }

    fn cancel_animation_frame(&mut self, handle: FrameHandle) {
        let mut host = self.0.borrow_mut();
        if host.pending_frame == Some(handle) {
            host.pending_frame = None;
        }
    }

    fn set_interval(&mut self, period: Duration) -> TimerHandle {
        let mut host = self.0.borrow_mut();
        let handle = TimerHandle(host.next_id());
        host.intervals.push(Interval {
            handle,
            period,
            due: Instant::now() + period,
        });
        handle
    }

    fn clear_interval(&mut self, handle: TimerHandle) {
        self.0.borrow_mut().intervals.retain(|i| i.handle != handle);
    }
}

struct WindowInput(Shared);

impl PlatformInput for WindowInput {
    fn subscribe(&mut self, kind: InputKind) {
        self.0.borrow_mut().subscribed.insert(kind);
    }

    fn unsubscribe(&mut self, kind: InputKind) {
        self.0.borrow_mut().subscribed.remove(&kind);
    }

    fn supports_device_motion(&self) -> bool {
        false
    }
}

enum UiCommand {
    Open(PathBuf),
    ToggleStereo,
    Restart,
    EyeSeparation(f32),
    Language(String),
}

struct UiState {
    stereo: bool,
    latitude: f32,
    longitude: f32,
    eye_separation: f32,
    fps: f32,
    show_fps: bool,
    loading: bool,
    has_video: bool,
    polling: bool,
    paused: bool,
    error: Option<String>,
    lang: String,
    commands: Vec<UiCommand>,
}

fn load_config() -> VrConfig {
    let mut args = std::env::args();
    let mut path = PathBuf::from(CONFIG_FILE);
    while let Some(a) = args.next() {
        if a == "--config" {
            if let Some(p) = args.next() {
                path = PathBuf::from(p);
            }
        }
    }
    let Ok(text) = std::fs::read_to_string(&path) else {
        return VrConfig::default();
    };
    match VrConfig::from_json_str(&text) {
        Ok(config) => {
            log::info!("config loaded from {}", path.display());
            config
        }
        Err(e) => {
            log::warn!("{}", i18n::tr_with("error.config", &[("err", e.to_string())]));
            VrConfig::default()
        }
    }
}

/// A new file is a new source: replay the player's event sequence for it.
fn start_source(plugin: &mut VrPlugin, host: &Shared) {
    let url = host
        .borrow()
        .source
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    host.borrow_mut().paused = false;
    for event in [
        PlayerEvent::SourceSelected(SourceInfo {
            url,
            drm_protected: false,
        }),
        PlayerEvent::LoadStart,
        PlayerEvent::FirstPlay,
        PlayerEvent::Play,
        PlayerEvent::Playing,
    ] {
        plugin.handle_event(event);
    }
}

fn main() {
    env_logger::init();

    let lang = i18n::resolve_lang_from_args();
    i18n::init(lang.clone());
    let config = load_config();

    let event_loop = EventLoop::new();
    let window = match WindowBuilder::new()
        .with_title(i18n::tr("app.title"))
        .with_inner_size(LogicalSize::new(1280, 720))
        .build(&event_loop)
    {
        Ok(w) => Arc::new(w),
        Err(e) => {
            log::error!("cannot create window: {e}");
            return;
        }
    };

    let gpu = match pollster::block_on(GpuRenderer::new(window.clone())) {
        Ok(gpu) => Rc::new(RefCell::new(gpu)),
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };

    let host: Shared = Rc::new(RefCell::new(HostState::default()));
    {
        let size = window.inner_size();
        host.borrow_mut().view_size = (size.width as f64, size.height as f64);
    }

    let ui = Rc::new(RefCell::new(UiState {
        stereo: config.start_in_stereo,
        latitude: 0.0,
        longitude: 0.0,
        eye_separation: config.eye_separation,
        fps: 0.0,
        show_fps: false,
        loading: false,
        has_video: false,
        polling: false,
        paused: false,
        error: None,
        lang,
        commands: Vec::new(),
    }));
    {
        let ui = ui.clone();
        gpu.borrow_mut()
            .set_overlay(Box::new(move |ctx| draw_ui(ctx, &mut ui.borrow_mut())));
    }

    let factory = {
        let gpu = gpu.clone();
        move |dimensions: Option<Dimensions>| -> Box<dyn RenderBackend> {
            let mut backend = SharedGpu(gpu.clone());
            if let Some(d) = dimensions.map(|d| d.to_pixels()) {
                backend.set_size(d.0 as f32, d.1 as f32);
            }
            Box::new(backend)
        }
    };

    let mut plugin = VrPlugin::new(
        config,
        Box::new(WindowPlayer(host.clone())),
        Box::new(WindowScheduler(host.clone())),
        Box::new(WindowInput(host.clone())),
        Box::new(factory),
    );
    plugin.activate();
    // nothing loaded yet: the session waits for the video size
    start_source(&mut plugin, &host);

    let mut cursor: Option<(f32, f32)> = None;
    let mut last_fps_time = Instant::now();
    let mut frame_count = 0u32;
    let (tx, rx): (Sender<(PathBuf, image::RgbaImage)>, Receiver<_>) = channel();

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        if let Ok((path, rgba)) = rx.try_recv() {
            {
                let mut h = host.borrow_mut();
                h.frame = Some(Arc::new(rgba));
                h.source = Some(path);
                h.last_error = None;
            }
            ui.borrow_mut().loading = false;
            // a running poll picks the new size up by itself
            if !plugin.is_polling_dimensions() {
                start_source(&mut plugin, &host);
            }
        }

        let commands = std::mem::take(&mut ui.borrow_mut().commands);
        for command in commands {
            match command {
                UiCommand::Open(path) => {
                    ui.borrow_mut().loading = true;
                    start_load_image(path, tx.clone());
                }
                UiCommand::ToggleStereo => plugin.toggle_stereo_mode(),
                UiCommand::Restart => start_source(&mut plugin, &host),
                UiCommand::EyeSeparation(eye_sep) => plugin.set_eye_separation(eye_sep),
                UiCommand::Language(lang) => {
                    i18n::init(lang);
                    window.set_title(&i18n::tr("app.title"));
                }
            }
        }

        match event {
            Event::WindowEvent { event, .. } => {
                let consumed = {
                    let mut g = gpu.borrow_mut();
                    let g = &mut *g;
                    g.egui_state.on_event(&g.egui_ctx, &event).consumed
                };
                if consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        plugin.destroy();
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        gpu.borrow_mut().resize_surface(new_size);
                        host.borrow_mut().view_size =
                            (new_size.width as f64, new_size.height as f64);
                        plugin.handle_input(InputEvent::Resize);
                    }

                    WindowEvent::KeyboardInput { input, .. }
                        if input.state == ElementState::Pressed =>
                    {
                        match input.virtual_keycode {
                            Some(VirtualKeyCode::O) => {
                                if let Some(path) = pick_file() {
                                    ui.borrow_mut().commands.push(UiCommand::Open(path));
                                }
                            }
                            Some(VirtualKeyCode::S) => plugin.toggle_stereo_mode(),
                            Some(VirtualKeyCode::F11) => {
                                if window.fullscreen().is_some() {
                                    window.set_fullscreen(None);
                                } else {
                                    window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                                }
                            }
                            _ => {}
                        }
                    }

                    WindowEvent::MouseInput {
                        state,
                        button: MouseButton::Left,
                        ..
                    } => {
                        let event = match (state, cursor) {
                            (ElementState::Pressed, Some((x, y))) => InputEvent::PointerDown { x, y },
                            (ElementState::Pressed, None) => return,
                            (ElementState::Released, _) => InputEvent::PointerUp,
                        };
                        plugin.handle_input(event);
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        let p = (position.x as f32, position.y as f32);
                        cursor = Some(p);
                        plugin.handle_input(InputEvent::PointerMove { position: Some(p) });
                    }

                    WindowEvent::Touch(touch) => {
                        let p = (touch.location.x as f32, touch.location.y as f32);
                        let event = match touch.phase {
                            TouchPhase::Started => InputEvent::PointerDown { x: p.0, y: p.1 },
                            TouchPhase::Moved => InputEvent::PointerMove { position: Some(p) },
                            TouchPhase::Ended | TouchPhase::Cancelled => InputEvent::PointerUp,
                        };
                        plugin.handle_input(event);
                    }

                    WindowEvent::DroppedFile(path) => {
                        ui.borrow_mut().commands.push(UiCommand::Open(path));
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                frame_count += 1;
                let now = Instant::now();
                let elapsed = now.duration_since(last_fps_time).as_secs_f32();
                if elapsed >= 1.0 {
                    ui.borrow_mut().fps = frame_count as f32 / elapsed;
                    frame_count = 0;
                    last_fps_time = now;
                }

                {
                    let h = host.borrow();
                    let mut u = ui.borrow_mut();
                    let angles = plugin.orientation();
                    u.stereo = plugin.stereo_mode();
                    u.latitude = angles.latitude();
                    u.longitude = angles.longitude();
                    u.has_video = h.frame.is_some();
                    u.polling = plugin.is_polling_dimensions();
                    u.paused = h.paused;
                    u.error = h.last_error.clone();
                }

                let tick_due = host.borrow_mut().pending_frame.take().is_some();
                if tick_due {
                    plugin.tick();
                } else {
                    // no session drawing: keep the menus alive
                    match gpu.borrow_mut().present_idle() {
                        Ok(()) => {}
                        Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                            *control_flow = ControlFlow::Exit
                        }
                        Err(e) => log::debug!("idle frame dropped: {e}"),
                    }
                }
            }

            Event::MainEventsCleared => {
                let fired = host.borrow_mut().due_intervals(Instant::now());
                for _ in 0..fired {
                    plugin.on_dimension_poll();
                }
                window.request_redraw();
            }

            _ => {}
        }
    });
}

fn pick_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter(&i18n::tr("file.filter.images"), &["jpg", "jpeg", "png", "bmp"])
        .pick_file()
}

fn start_load_image(path: PathBuf, tx: Sender<(PathBuf, image::RgbaImage)>) {
    thread::spawn(move || {
        log::info!(
            "{}",
            i18n::tr_with("log.loading_frame", &[("path", format!("{path:?}"))])
        );
        match decode(&path) {
            Ok(rgba) => {
                if tx.send((path, rgba)).is_err() {
                    log::warn!("event loop gone, dropping frame");
                }
            }
            Err(msg) => log::error!("{msg}"),
        }
    });
}

fn decode(path: &Path) -> Result<image::RgbaImage, String> {
    let file = File::open(path)
        .map_err(|e| i18n::tr_with("error.open_file", &[("err", e.to_string())]))?;
    ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)
        .and_then(|mut r| {
            r.no_limits();
            r.decode()
        })
        .map(|img| img.to_rgba8())
        .map_err(|e| i18n::tr_with("error.decode_image", &[("err", e.to_string())]))
}

fn draw_ui(ctx: &egui::Context, state: &mut UiState) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button(i18n::tr("menu.file"), |ui| {
                if ui.button(i18n::tr("menu.open_video")).clicked() {
                    ui.close_menu();
                    if let Some(path) = pick_file() {
                        state.commands.push(UiCommand::Open(path));
                    }
                }
                if ui.button(i18n::tr("menu.exit")).clicked() {
                    std::process::exit(0);
                }
            });

            ui.menu_button(i18n::tr("menu.view"), |ui| {
                let mut stereo = state.stereo;
                if ui.checkbox(&mut stereo, i18n::tr("view.stereo")).clicked() {
                    state.commands.push(UiCommand::ToggleStereo);
                    ui.close_menu();
                }
                if ui
                    .add(
                        egui::Slider::new(&mut state.eye_separation, 0.0..=0.2)
                            .text(i18n::tr("view.eye_separation")),
                    )
                    .changed()
                {
                    state
                        .commands
                        .push(UiCommand::EyeSeparation(state.eye_separation));
                }
                ui.separator();
                if ui.button(i18n::tr("view.reset")).clicked() {
                    state.commands.push(UiCommand::Restart);
                    ui.close_menu();
                }
                ui.checkbox(&mut state.show_fps, i18n::tr("view.show_fps"));
            });

            ui.menu_button(i18n::tr("menu.language"), |ui| {
                for (code, name) in [("en", "English"), ("zh-Hans", "简体中文")] {
                    if ui
                        .radio_value(&mut state.lang, code.to_string(), name)
                        .clicked()
                    {
                        state.commands.push(UiCommand::Language(code.to_string()));
                        ui.close_menu();
                    }
                }
            });
        });
    });

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if let Some(err) = &state.error {
                ui.label(
                    egui::RichText::new(format!("{} {err}", i18n::tr("status.error_prefix")))
                        .color(egui::Color32::RED),
                );
                ui.label("|");
            } else if state.loading || state.polling {
                ui.label(
                    egui::RichText::new(i18n::tr("status.waiting_for_size"))
                        .color(egui::Color32::YELLOW),
                );
                ui.label("|");
            } else if !state.has_video {
                ui.label(i18n::tr("status.no_video"));
                ui.label("|");
            } else if state.paused {
                ui.label(i18n::tr("status.paused"));
                ui.label("|");
            }

            ui.label(if state.stereo {
                i18n::tr("status.stereo")
            } else {
                i18n::tr("status.mono")
            });
            ui.label("|");
            ui.label(format!("Lat: {:.1}°", state.latitude));
            ui.label("|");
            ui.label(format!("Lon: {:.1}°", state.longitude));

            if state.show_fps {
                ui.label("|");
                ui.label(
                    egui::RichText::new(format!("FPS: {:.1}", state.fps))
                        .color(egui::Color32::GREEN),
                );
            }
        });
    });
}
