// host.rs: collaborators supplied by the host player
//
// The plugin never touches a window, document or timer directly. Everything
// it needs from the outside arrives through these traits, and everything the
// outside tells it arrives through `PlayerEvent` / `InputEvent`.

use std::time::Duration;

use crate::error::PlayerError;
use crate::frame_source::VideoFrame;
use crate::orientation::RotationRate;

/// Readiness of the video element, ordered like the media element states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub ready_state: ReadyState,
    /// Intrinsic pixel size, `(0, 0)` while unknown.
    pub intrinsic_size: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Env {
    pub browser_name: String,
    pub browser_major: String,
    pub os_version: String,
    pub device_type: Option<String>,
}

impl Env {
    fn is_ie(&self) -> bool {
        self.browser_name == "IE"
    }

    /// Only IE 11 on Windows 8.1 / 10 can run the renderer among IE versions.
    pub fn is_supported_browser(&self) -> bool {
        !self.is_ie()
            || (self.browser_major == "11"
                && (self.os_version == "8.1" || self.os_version == "10"))
    }

    /// Engines with broken video textures take the canvas-copy path.
    pub fn needs_canvas_copy(&self) -> bool {
        self.is_ie()
    }

    pub fn is_mobile_safari(&self) -> bool {
        self.browser_name == "Mobile Safari" && self.device_type.as_deref() == Some("mobile")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceInfo {
    pub url: String,
    pub drm_protected: bool,
}

/// Lifecycle events the host player emits.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    SourceSelected(SourceInfo),
    LoadStart,
    FirstPlay,
    Play,
    Playing,
    Ended,
}

impl PlayerEvent {
    pub fn kind(&self) -> PlayerEventKind {
        match self {
            PlayerEvent::SourceSelected(_) => PlayerEventKind::SourceSelected,
            PlayerEvent::LoadStart => PlayerEventKind::LoadStart,
            PlayerEvent::FirstPlay => PlayerEventKind::FirstPlay,
            PlayerEvent::Play => PlayerEventKind::Play,
            PlayerEvent::Playing => PlayerEventKind::Playing,
            PlayerEvent::Ended => PlayerEventKind::Ended,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlayerEventKind {
    SourceSelected,
    LoadStart,
    FirstPlay,
    Play,
    Playing,
    Ended,
}

/// Events the plugin sends back to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginEvent {
    StereoModeChanged { mode: bool },
    Error(PlayerError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Press on the overlay above the video.
    PointerDown { x: f32, y: f32 },
    /// `position` is `None` for touch moves with more than one finger.
    PointerMove { position: Option<(f32, f32)> },
    PointerUp,
    DeviceMotion {
        rotation_rate: Option<RotationRate>,
        inner_size: (f64, f64),
        screen_angle: Option<i32>,
    },
    Resize,
}

impl InputEvent {
    pub fn kind(&self) -> InputKind {
        match self {
            InputEvent::PointerDown { .. } => InputKind::PointerDown,
            InputEvent::PointerMove { .. } => InputKind::PointerMove,
            InputEvent::PointerUp => InputKind::PointerUp,
            InputEvent::DeviceMotion { .. } => InputKind::DeviceMotion,
            InputEvent::Resize => InputKind::Resize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputKind {
    PointerDown,
    PointerMove,
    PointerUp,
    DeviceMotion,
    Resize,
}

/// What the host should do with the native event after the plugin saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputResponse {
    pub prevent_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

pub trait Player {
    /// Whether the selected entry is a 360° video.
    fn is_vr(&self) -> bool;
    fn env(&self) -> Env;
    fn playsinline(&self) -> bool;

    fn video(&self) -> VideoInfo;
    fn current_frame(&self) -> Option<VideoFrame>;
    /// Size of the container view the surface is mounted in.
    fn view_size(&self) -> (f64, f64);

    fn pause(&mut self);
    fn dispatch(&mut self, event: PluginEvent);

    fn cross_origin(&self) -> Option<String>;
    fn set_cross_origin(&mut self, value: Option<String>);
}

/// Callback scheduling. Fired callbacks come back as `VrPlugin::tick` and
/// `VrPlugin::on_dimension_poll`.
pub trait Scheduler {
    /// Run a tick before the next repaint.
    fn request_animation_frame(&mut self) -> FrameHandle;
    fn cancel_animation_frame(&mut self, handle: FrameHandle);
    fn set_interval(&mut self, period: Duration) -> TimerHandle;
    fn clear_interval(&mut self, handle: TimerHandle);
}

/// Window-level input taps. Events for unsubscribed kinds must not be delivered.
pub trait PlatformInput {
    fn subscribe(&mut self, kind: InputKind);
    fn unsubscribe(&mut self, kind: InputKind);
    fn supports_device_motion(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn env(name: &str, major: &str, os: &str) -> Env {
        Env {
            browser_name: name.into(),
            browser_major: major.into(),
            os_version: os.into(),
            device_type: None,
        }
    }

    #[rstest]
    #[case(env("Chrome", "120", "10"), true)]
    #[case(env("IE", "11", "10"), true)]
    #[case(env("IE", "11", "8.1"), true)]
    #[case(env("IE", "11", "7"), false)]
    #[case(env("IE", "10", "10"), false)]
    fn browser_support(#[case] env: Env, #[case] supported: bool) {
        assert_eq!(env.is_supported_browser(), supported);
    }

    #[test]
    fn ready_states_are_ordered() {
        assert!(ReadyState::HaveEnoughData >= ReadyState::HaveCurrentData);
        assert!(ReadyState::HaveMetadata < ReadyState::HaveCurrentData);
    }
}
