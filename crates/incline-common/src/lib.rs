//! ---
//! incline_section: "01-core-functionality"
//! incline_subsection: "module"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Shared primitives for the feeder workspace."
//! incline_version: "v0.0.0-prealpha"
//! incline_owner: "tbd"
//! ---
//! Shared primitives for the inclination monitor test feeder.
//! This crate exposes configuration loading and tracing initialisation
//! consumed across the workspace.

pub mod config;
pub mod logging;

pub use config::{
    FeederConfig, GenerationConfig, HealthConfig, LoadedFeederConfig, LoggingConfig, RestConfig,
    SingleSampleConfig, StreamConfig, TargetConfig,
};
pub use logging::{init_tracing, LogFormat};
