//! ---
//! incline_section: "11-simulation"
//! incline_subsection: "01-bootstrap"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Simulation module exports and shared types."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
//! Synthetic tilt data for the inclination angle monitor.
//!
//! Samples are produced either by a motion model driven through a
//! [`GenerationSession`] or by replaying serial bridge captures. Every
//! sample passes through the raw-count codec in [`codec`].

pub mod codec;
pub mod generator;
pub mod replay;

pub use codec::{AngleSample, AngleTriple, RawCount, RawCountOutOfRange};
pub use generator::{
    CircularMotion, GenerationSession, MotionModel, RandomNoise, SimulationError,
};
pub use replay::{parse_bridge_line, BridgeReading, BridgeReplay, ReplayError};
