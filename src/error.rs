// error.rs: error taxonomy and the error payload reported to the host player

/// Conditions that stop VR playback for the current source.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrErrorKind {
    #[error("Your browser doesn't support features to enable VR experience")]
    UnsupportedBrowser,

    /// Inline playback is off on a phone browser that would go fullscreen.
    #[error("Configuration playsinline must be true for VR experience on iPhone device.")]
    PlaysinlineRequired,

    #[error("Cannot apply VR experience for DRM content")]
    DrmUnsupported,

    /// The intrinsic video size never showed up within the poll budget.
    #[error("Unable to obtain the video size for VR canvas")]
    VideoSizeUnavailable,
}

impl VrErrorKind {
    /// Localization key for [`crate::i18n::tr`].
    pub fn message_id(&self) -> &'static str {
        match self {
            VrErrorKind::UnsupportedBrowser => "vr.unsupported_browser_error_message",
            VrErrorKind::PlaysinlineRequired => "vr.playsinline_error_message",
            VrErrorKind::DrmUnsupported => "vr.drm_error_message",
            VrErrorKind::VideoSizeUnavailable => "vr.video_size_error_message",
        }
    }

    pub fn localized_message(&self) -> String {
        crate::i18n::tr_or(self.message_id(), &self.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Vr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    VrNotSupported,
}

/// Payload of the error event dispatched to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerError {
    pub severity: Severity,
    pub category: Category,
    pub code: Code,
    pub kind: VrErrorKind,
    pub message: String,
}

impl From<VrErrorKind> for PlayerError {
    fn from(kind: VrErrorKind) -> Self {
        Self {
            severity: Severity::Critical,
            category: Category::Vr,
            code: Code::VrNotSupported,
            kind,
            message: kind.localized_message(),
        }
    }
}

/// Failure of a single draw. Logged by the render loop, never fatal.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("render surface is detached")]
    Detached,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
