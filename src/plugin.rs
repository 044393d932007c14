// plugin.rs: VR plugin lifecycle and the render loop controller

use std::collections::BTreeSet;

use crate::backend::BackendFactory;
use crate::config::VrConfig;
use crate::dimensions::{letterbox_fit, DimensionPoll, Dimensions, PollStep};
use crate::error::{PlayerError, VrErrorKind};
use crate::host::{
    FrameHandle, InputEvent, InputKind, InputResponse, PlatformInput, Player, PlayerEvent,
    PlayerEventKind, PluginEvent, ReadyState, Scheduler, SourceInfo, TimerHandle,
};
use crate::orientation::{OrientationState, ScreenOrientation};
use crate::session::RenderSession;

pub const PLUGIN_NAME: &str = "vr";

/// Lifecycle capabilities the host player drives.
pub trait Plugin {
    fn name(&self) -> &str;
    fn activate(&mut self);
    fn reset(&mut self);
    fn destroy(&mut self);
}

/// Bookkeeping of everything the plugin listens to, so it can all be dropped at once.
#[derive(Debug, Default)]
struct EventManager {
    player: BTreeSet<PlayerEventKind>,
    input: BTreeSet<InputKind>,
}

impl EventManager {
    fn listen(&mut self, kind: PlayerEventKind) {
        self.player.insert(kind);
    }

    fn unlisten(&mut self, kind: PlayerEventKind) {
        self.player.remove(&kind);
    }

    fn is_listening(&self, kind: PlayerEventKind) -> bool {
        self.player.contains(&kind)
    }

    fn subscribe(&mut self, input: &mut dyn PlatformInput, kind: InputKind) {
        if self.input.insert(kind) {
            input.subscribe(kind);
        }
    }

    fn is_subscribed(&self, kind: InputKind) -> bool {
        self.input.contains(&kind)
    }

    fn remove_all(&mut self, input: &mut dyn PlatformInput) {
        self.player.clear();
        for kind in std::mem::take(&mut self.input) {
            input.unsubscribe(kind);
        }
    }
}

struct PendingPoll {
    timer: TimerHandle,
    budget: DimensionPoll,
}

pub struct VrPlugin {
    config: VrConfig,
    player: Box<dyn Player>,
    scheduler: Box<dyn Scheduler>,
    input: Box<dyn PlatformInput>,
    backends: Box<dyn BackendFactory>,

    events: EventManager,
    session: Option<RenderSession>,
    orientation: OrientationState,
    stereo_mode: bool,
    raf: Option<FrameHandle>,
    poll: Option<PendingPoll>,

    source: Option<SourceInfo>,
    unsupported: Option<VrErrorKind>,
    size_error_reported: bool,
    /// Value to put back on the video element when we changed its cross-origin attribute.
    cross_origin_restore: Option<Option<String>>,
}

impl VrPlugin {
    pub fn new(
        config: VrConfig,
        player: Box<dyn Player>,
        scheduler: Box<dyn Scheduler>,
        input: Box<dyn PlatformInput>,
        backends: Box<dyn BackendFactory>,
    ) -> Self {
        let stereo_mode = config.start_in_stereo;
        Self {
            config,
            player,
            scheduler,
            input,
            backends,
            events: EventManager::default(),
            session: None,
            orientation: OrientationState::new(),
            stereo_mode,
            raf: None,
            poll: None,
            source: None,
            unsupported: None,
            size_error_reported: false,
            cross_origin_restore: None,
        }
    }

    pub fn config(&self) -> &VrConfig {
        &self.config
    }

    pub fn orientation(&self) -> &OrientationState {
        &self.orientation
    }

    pub fn session(&self) -> Option<&RenderSession> {
        self.session.as_ref()
    }

    /// A tick is scheduled.
    pub fn is_active(&self) -> bool {
        self.raf.is_some()
    }

    pub fn is_polling_dimensions(&self) -> bool {
        self.poll.is_some()
    }

    pub fn stereo_mode(&self) -> bool {
        self.stereo_mode
    }

    pub fn toggle_stereo_mode(&mut self) {
        self.stereo_mode = !self.stereo_mode;
        self.player.dispatch(PluginEvent::StereoModeChanged {
            mode: self.stereo_mode,
        });
        self.update_canvas_size();
    }

    pub fn set_eye_separation(&mut self, eye_sep: f32) {
        self.config.eye_separation = eye_sep;
        if let Some(session) = self.session.as_mut() {
            session.splitter_mut().set_eye_separation(eye_sep);
        }
    }

    pub fn handle_event(&mut self, event: PlayerEvent) {
        if !self.events.is_listening(event.kind()) {
            return;
        }
        match event {
            PlayerEvent::SourceSelected(source) => self.on_source_selected(source),
            PlayerEvent::LoadStart => self.on_load_start(),
            PlayerEvent::FirstPlay => self.init_session(),
            PlayerEvent::Play => self.on_play(),
            PlayerEvent::Playing => self.on_playing(),
            PlayerEvent::Ended => self.on_ended(),
        }
    }

    pub fn handle_input(&mut self, event: InputEvent) -> InputResponse {
        let mut response = InputResponse::default();
        if !self.events.is_subscribed(event.kind()) {
            return response;
        }
        match event {
            InputEvent::PointerDown { x, y } => self.orientation.pointer_down(x, y),
            InputEvent::PointerMove { position } => {
                response.prevent_default = self
                    .orientation
                    .pointer_move(position, self.config.move_multiplier);
            }
            InputEvent::PointerUp => self.orientation.pointer_up(),
            InputEvent::DeviceMotion {
                rotation_rate,
                inner_size,
                screen_angle,
            } => {
                if let Some(rate) = rotation_rate {
                    let orientation =
                        ScreenOrientation::from_viewport(inner_size.0, inner_size.1, screen_angle);
                    self.orientation.device_rotation(
                        rate,
                        orientation,
                        self.config.mobile_vibration_value,
                    );
                }
            }
            InputEvent::Resize => self.update_canvas_size(),
        }
        response
    }

    /// The scheduled frame fired.
    pub fn tick(&mut self) {
        if self.raf.take().is_none() {
            // cancelled before it fired
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if self.player.video().ready_state >= ReadyState::HaveCurrentData {
            if let Some(frame) = self.player.current_frame() {
                session.refresh_texture(&frame);
            }
        }

        self.raf = Some(self.scheduler.request_animation_frame());

        let angles = self.orientation.snapshot();
        if let Err(e) = session.render(angles, self.stereo_mode) {
            log::trace!("frame dropped: {e}");
        }
    }

    /// The dimension poll interval fired.
    pub fn on_dimension_poll(&mut self) {
        if self.poll.is_none() {
            return;
        }
        if let Some(dimensions) = self.canvas_dimensions() {
            self.clear_dimension_poll();
            self.apply_dimensions(dimensions);
            return;
        }
        let exhausted = self
            .poll
            .as_mut()
            .is_some_and(|p| p.budget.attempt() == PollStep::Exhausted);
        if exhausted {
            self.on_video_size_unavailable();
        }
    }

    fn add_bindings(&mut self) {
        self.events.listen(PlayerEventKind::SourceSelected);
    }

    fn add_motion_bindings(&mut self) {
        let input = self.input.as_mut();
        for kind in [
            InputKind::PointerDown,
            InputKind::PointerMove,
            InputKind::PointerUp,
            InputKind::Resize,
        ] {
            self.events.subscribe(input, kind);
        }
        if input.supports_device_motion() {
            self.events.subscribe(input, InputKind::DeviceMotion);
        }
    }

    fn on_source_selected(&mut self, source: SourceInfo) {
        // a new source starts detection from scratch
        self.clean();
        self.init_members();
        self.add_bindings();

        if self.player.is_vr() {
            log::debug!("VR entry detected: {}", source.url);
            self.source = Some(source);
            self.events.listen(PlayerEventKind::LoadStart);
        }
    }

    fn on_load_start(&mut self) {
        self.events.unlisten(PlayerEventKind::LoadStart);
        let source = self.source.clone().unwrap_or_default();

        if let Some(kind) = self.detect_unsupported(&source) {
            self.unsupported = Some(kind);
            // pause as soon as playback starts instead of silently playing flat video
            self.events.listen(PlayerEventKind::Playing);
            self.player.dispatch(PluginEvent::Error(PlayerError::from(kind)));
            return;
        }

        for kind in [
            PlayerEventKind::FirstPlay,
            PlayerEventKind::Play,
            PlayerEventKind::Playing,
            PlayerEventKind::Ended,
        ] {
            self.events.listen(kind);
        }
        self.add_motion_bindings();
        self.apply_cross_origin();
    }

    fn detect_unsupported(&self, source: &SourceInfo) -> Option<VrErrorKind> {
        let env = self.player.env();
        if !env.is_supported_browser() {
            Some(VrErrorKind::UnsupportedBrowser)
        } else if source.drm_protected {
            Some(VrErrorKind::DrmUnsupported)
        } else if !self.player.playsinline() && env.is_mobile_safari() {
            Some(VrErrorKind::PlaysinlineRequired)
        } else {
            None
        }
    }

    fn apply_cross_origin(&mut self) {
        let Some(wanted) = self.config.cross_origin.clone() else {
            return;
        };
        let previous = self.player.cross_origin();
        if previous.as_deref() != Some(wanted.as_str()) {
            self.player.set_cross_origin(Some(wanted));
            self.cross_origin_restore = Some(previous);
        }
    }

    fn on_play(&mut self) {
        if self.raf.is_none() {
            // first play or replay after end
            if self.session.is_some() {
                self.update_canvas_size();
            } else {
                self.init_session();
            }
            self.raf = Some(self.scheduler.request_animation_frame());
        }
    }

    /// Stops the loop and the size poll; view angles and stereo mode stay.
    fn on_ended(&mut self) {
        self.cancel_animation_frame();
        self.clear_dimension_poll();
    }

    fn on_playing(&mut self) {
        if self.unsupported.is_some() {
            log::warn!("The playback paused due to VR experience not supported");
            self.player.pause();
        } else {
            self.update_canvas_size();
        }
    }

    fn init_session(&mut self) {
        if self.session.is_some() || self.unsupported.is_some() {
            return;
        }
        log::debug!("Init VR components");
        let env = self.player.env();
        let canvas_copy = self.config.force_canvas_copy || env.needs_canvas_copy();
        let dimensions = self.canvas_dimensions();
        self.session = Some(RenderSession::new(
            self.backends.as_mut(),
            &self.config,
            dimensions,
            canvas_copy,
        ));
        self.update_canvas_size();
    }

    fn canvas_dimensions(&self) -> Option<Dimensions> {
        letterbox_fit(self.player.video().intrinsic_size, self.player.view_size())
    }

    fn update_canvas_size(&mut self) {
        if self.session.is_none() {
            return;
        }
        match self.canvas_dimensions() {
            Some(dimensions) => {
                self.clear_dimension_poll();
                self.apply_dimensions(dimensions);
            }
            None => self.start_dimension_poll(),
        }
    }

    fn apply_dimensions(&mut self, dimensions: Dimensions) {
        if let Some(session) = self.session.as_mut() {
            session.resize(dimensions);
        }
    }

    fn start_dimension_poll(&mut self) {
        if self.poll.is_some() {
            return;
        }
        let budget = DimensionPoll::new(
            self.config.dimension_poll_interval(),
            self.config.dimension_poll_attempts,
        );
        log::debug!("video size unknown, polling every {:?}", budget.interval());
        let timer = self.scheduler.set_interval(budget.interval());
        self.poll = Some(PendingPoll { timer, budget });
    }

    fn clear_dimension_poll(&mut self) {
        if let Some(poll) = self.poll.take() {
            self.scheduler.clear_interval(poll.timer);
        }
    }

    fn on_video_size_unavailable(&mut self) {
        let kind = VrErrorKind::VideoSizeUnavailable;
        log::warn!("{kind}");
        self.clean();
        // stay reachable for the next source only
        self.add_bindings();
        self.player.pause();
        if !std::mem::replace(&mut self.size_error_reported, true) {
            self.player.dispatch(PluginEvent::Error(PlayerError::from(kind)));
        }
    }

    fn cancel_animation_frame(&mut self) {
        if let Some(handle) = self.raf.take() {
            self.scheduler.cancel_animation_frame(handle);
        }
    }

    fn clean(&mut self) {
        self.cancel_animation_frame();
        self.clear_dimension_poll();
        self.events.remove_all(self.input.as_mut());
        if let Some(mut session) = self.session.take() {
            log::debug!("Tear down VR components");
            session.detach();
        }
        if let Some(previous) = self.cross_origin_restore.take() {
            self.player.set_cross_origin(previous);
        }
    }

    fn init_members(&mut self) {
        self.orientation = OrientationState::new();
        self.stereo_mode = self.config.start_in_stereo;
        self.source = None;
        self.unsupported = None;
        self.size_error_reported = false;
    }
}

impl Plugin for VrPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn activate(&mut self) {
        self.add_bindings();
    }

    fn reset(&mut self) {
        self.clean();
        self.init_members();
        self.add_bindings();
    }

    fn destroy(&mut self) {
        self.clean();
    }
}
