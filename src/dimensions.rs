// dimensions.rs: canvas sizing from intrinsic video size and container box

use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_POLL_ATTEMPTS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    /// Whole-pixel size for surfaces; never returns a zero extent.
    pub fn to_pixels(&self) -> (u32, u32) {
        (
            (self.width.round() as u32).max(1),
            (self.height.round() as u32).max(1),
        )
    }
}

/// Largest rectangle with the video's aspect ratio that fits inside the container.
///
/// Returns `None` while the intrinsic size is still unknown (zero, or not a
/// finite number), which happens right after playback starts on some engines.
pub fn letterbox_fit(video: (f64, f64), container: (f64, f64)) -> Option<Dimensions> {
    let (video_w, video_h) = video;
    let (container_w, container_h) = container;

    if !(video_w.is_finite() && video_h.is_finite()) || video_w <= 0.0 || video_h <= 0.0 {
        return None;
    }

    let projected_w = (video_w / video_h) * container_h;
    let dims = if container_w < projected_w {
        // width binds
        Dimensions::new(container_w, (video_h / video_w) * container_w)
    } else {
        Dimensions::new((video_w / video_h) * container_h, container_h)
    };
    Some(dims)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    Retry,
    Exhausted,
}

/// Retry budget for waiting on the intrinsic video size.
///
/// The poll itself is driven by a host timer, not by render ticks, so it keeps
/// counting even before the first frame is scheduled.
#[derive(Debug, Clone)]
pub struct DimensionPoll {
    interval: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl DimensionPoll {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records one failed lookup.
    pub fn attempt(&mut self) -> PollStep {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= self.max_attempts {
            PollStep::Exhausted
        } else {
            PollStep::Retry
        }
    }
}

impl Default for DimensionPoll {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn full_hd_into_matching_container() {
        let d = letterbox_fit((1920.0, 1080.0), (640.0, 360.0)).unwrap();
        assert!(approx(d.width, 640.0), "{d:?}");
        assert!(approx(d.height, 360.0), "{d:?}");
    }

    #[rstest]
    #[case((1920.0, 1080.0), (400.0, 600.0))]
    #[case((1920.0, 1080.0), (1000.0, 300.0))]
    #[case((4096.0, 2048.0), (1280.0, 720.0))]
    #[case((1000.0, 1000.0), (333.0, 777.0))]
    #[case((3840.0, 1920.0), (1.0, 1.0))]
    fn preserves_aspect_and_fits(#[case] video: (f64, f64), #[case] container: (f64, f64)) {
        let d = letterbox_fit(video, container).unwrap();
        assert!(approx(d.aspect(), video.0 / video.1), "{d:?}");
        assert!(d.width <= container.0 + 1e-9, "{d:?}");
        assert!(d.height <= container.1 + 1e-9, "{d:?}");
        // one side touches the container
        assert!(approx(d.width, container.0) || approx(d.height, container.1));
    }

    #[test]
    fn width_binds_for_narrow_container() {
        let d = letterbox_fit((1920.0, 1080.0), (320.0, 720.0)).unwrap();
        assert_eq!(d.width, 320.0);
        assert!(approx(d.height, 180.0));
    }

    #[test]
    fn height_binds_for_wide_container() {
        let d = letterbox_fit((1920.0, 1080.0), (1920.0, 540.0)).unwrap();
        assert_eq!(d.height, 540.0);
        assert!(approx(d.width, 960.0));
    }

    #[test]
    fn idempotent() {
        let a = letterbox_fit((1280.0, 536.0), (811.0, 457.0));
        let b = letterbox_fit((1280.0, 536.0), (811.0, 457.0));
        assert_eq!(a, b);
    }

    #[rstest]
    #[case((0.0, 0.0))]
    #[case((1920.0, 0.0))]
    #[case((0.0, 1080.0))]
    #[case((f64::NAN, 1080.0))]
    fn unknown_size(#[case] video: (f64, f64)) {
        assert_eq!(letterbox_fit(video, (640.0, 360.0)), None);
    }

    #[test]
    fn poll_exhausts_after_budget() {
        let mut poll = DimensionPoll::new(Duration::from_millis(100), 600);
        for _ in 0..599 {
            assert_eq!(poll.attempt(), PollStep::Retry);
        }
        assert_eq!(poll.attempt(), PollStep::Exhausted);
        assert_eq!(poll.attempts(), 600);
    }

    #[test]
    fn pixel_size_never_zero() {
        assert_eq!(Dimensions::new(0.2, 0.0).to_pixels(), (1, 1));
        assert_eq!(Dimensions::new(639.6, 359.5).to_pixels(), (640, 360));
    }
}
