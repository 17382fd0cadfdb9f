//! Drift Services Layer
//!
//! Settings loaded from JSON for the window, simulation, camera and frame
//! pacing.

pub mod settings;

pub use settings::{Settings, SettingsError};
