// orientation.rs: view angles accumulated from pointer drag and device rotation

use glam::Vec3;

/// Latitude limit in degrees; the camera never reaches the poles.
pub const MAX_LATITUDE: f32 = 89.0;

/// Distance of the look-at point from the origin. Independent of the sphere mesh radius.
pub const LOOK_AT_RADIUS: f32 = 500.0;

/// Screen angle reported by landscape devices rotated counter-clockwise.
const LANDSCAPE_A_ANGLE: i32 = -90;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewAngles {
    pub latitude: f32,
    pub longitude: f32,
}

/// Angular rates from a gyroscope, degrees per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationRate {
    /// around the vertical axis
    pub alpha: f32,
    /// around the lateral axis
    pub beta: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOrientation {
    Portrait,
    /// landscape with screen angle -90 (or unreported)
    LandscapeA,
    LandscapeB,
}

impl ScreenOrientation {
    /// Portrait when the viewport is taller than wide, otherwise picks the
    /// landscape variant from the screen angle.
    pub fn from_viewport(inner_width: f64, inner_height: f64, angle: Option<i32>) -> Self {
        if inner_height > inner_width {
            return ScreenOrientation::Portrait;
        }
        match angle {
            None | Some(0) | Some(LANDSCAPE_A_ANGLE) => ScreenOrientation::LandscapeA,
            Some(_) => ScreenOrientation::LandscapeB,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrientationState {
    latitude: f32,
    longitude: f32,
    pointer_down: bool,
    previous: Option<(f32, f32)>,
}

impl OrientationState {
    pub fn new() -> Self {
        Self {
            latitude: 0.0,
            longitude: 180.0,
            pointer_down: false,
            previous: None,
        }
    }

    pub fn latitude(&self) -> f32 {
        self.latitude
    }

    pub fn longitude(&self) -> f32 {
        self.longitude
    }

    pub fn is_pointer_down(&self) -> bool {
        self.pointer_down
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.pointer_down = true;
        self.previous = Some((x, y));
    }

    /// Applies one drag step. Returns `true` when the default scroll/selection
    /// behaviour has to be suppressed, which is whenever the pointer is pressed.
    ///
    /// `position` is `None` for multi-touch moves: those are not applied as a
    /// pan but still count as a drag.
    pub fn pointer_move(&mut self, position: Option<(f32, f32)>, multiplier: f32) -> bool {
        if !self.pointer_down {
            return false;
        }
        if let (Some((x, y)), Some((prev_x, prev_y))) = (position, self.previous) {
            self.longitude += (prev_x - x) * multiplier;
            self.latitude += (y - prev_y) * multiplier;
            self.previous = Some((x, y));
        }
        true
    }

    pub fn pointer_up(&mut self) {
        self.pointer_down = false;
    }

    pub fn device_rotation(
        &mut self,
        rate: RotationRate,
        orientation: ScreenOrientation,
        multiplier: f32,
    ) {
        let RotationRate { alpha, beta } = rate;
        match orientation {
            ScreenOrientation::Portrait => {
                self.longitude -= beta * multiplier;
                self.latitude += alpha * multiplier;
            }
            ScreenOrientation::LandscapeA => {
                self.longitude += alpha * multiplier;
                self.latitude += beta * multiplier;
            }
            ScreenOrientation::LandscapeB => {
                self.longitude -= alpha * multiplier;
                self.latitude -= beta * multiplier;
            }
        }
    }

    /// Clamps latitude in place and returns the pair to use for one whole tick.
    pub fn snapshot(&mut self) -> ViewAngles {
        self.latitude = self.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        ViewAngles {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

impl Default for OrientationState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn look_at_target(angles: ViewAngles, radius: f32) -> Vec3 {
    let phi = (90.0 - angles.latitude).to_radians();
    let theta = angles.longitude.to_radians();
    Vec3::new(
        radius * phi.sin() * theta.cos(),
        radius * phi.cos(),
        radius * phi.sin() * theta.sin(),
    )
}
