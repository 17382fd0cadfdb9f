//! Drift Core
//!
//! The renderer-independent half of the demo:
//! - Matrix math and seeded randomness
//! - Simulated planes (quad geometry + bouncing motion)
//! - Simulation clock

pub mod math;
pub mod plane;
pub mod time;

pub use glam;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
