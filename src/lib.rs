//! 360° video rendering for a host media player.
//!
//! The video is projected onto the inside of a sphere, the viewer pans with
//! pointer drag or device rotation, and the view can be split into a
//! side-by-side stereo pair for headsets. The host player, its input and its
//! frame scheduling are reached through the traits in [`host`]; drawing goes
//! through [`backend::RenderBackend`], with a wgpu implementation in [`gpu`].

pub mod backend;
pub mod camera;
pub mod config;
pub mod dimensions;
pub mod error;
pub mod fonts;
pub mod frame_source;
pub mod gpu;
pub mod host;
pub mod i18n;
pub mod mesh;
pub mod orientation;
pub mod plugin;
pub mod session;
pub mod stereo;

#[cfg(test)]
mod testing;

pub use config::VrConfig;
pub use error::VrErrorKind;
pub use plugin::{Plugin, VrPlugin};
