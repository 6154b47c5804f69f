//! ---
//! incline_section: "01-core-functionality"
//! incline_subsection: "module"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Feeder configuration model and loader."
//! incline_version: "v0.0.0-prealpha"
//! incline_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use tracing::{debug, warn};

use crate::logging::LogFormat;

fn default_host() -> String {
    "localhost".to_owned()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_stream_pacing() -> Duration {
    Duration::from_millis(500)
}

fn default_duration() -> Duration {
    Duration::from_secs(10)
}

fn default_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_max_angle() -> f64 {
    30.0
}

fn default_theta() -> f64 {
    15.5
}

fn default_psi() -> f64 {
    -22.3
}

fn default_phi() -> f64 {
    45.0
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Complete configuration handed to every feeder operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeederConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub rest: RestConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub single: SingleSampleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`FeederConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedFeederConfig {
    pub config: FeederConfig,
    /// `None` when no file was found and built-in defaults are in effect.
    pub source: Option<PathBuf>,
}

impl FeederConfig {
    pub const ENV_CONFIG_PATH: &'static str = "INCLINE_CONFIG";
    pub const DEFAULT_FILE: &'static str = "incline.toml";

    /// Resolve configuration from `INCLINE_CONFIG`, the explicit path, then `incline.toml`.
    ///
    /// Falls back to defaults when none of the candidates exist. A candidate
    /// that exists but fails to parse or validate is an error.
    pub fn load(explicit: Option<&Path>) -> Result<LoadedFeederConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedFeederConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        let mut candidates = Vec::new();
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(anyhow!("config file {} does not exist", path.display()));
            }
            candidates.push(path.to_path_buf());
        }
        candidates.push(PathBuf::from(Self::DEFAULT_FILE));
        Self::load_from_candidates(&candidates)
    }

    /// Load the first existing candidate, or defaults when none exist.
    pub fn load_from_candidates<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedFeederConfig> {
        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedFeederConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }
        debug!("no configuration file found; using defaults");
        Ok(LoadedFeederConfig {
            config: FeederConfig::default(),
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<FeederConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.target.validate()?;
        if self.rest.timeout.is_zero() {
            return Err(anyhow!("rest.timeout must be greater than zero"));
        }
        if self.health.timeout.is_zero() {
            return Err(anyhow!("health.timeout must be greater than zero"));
        }
        self.generation.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for FeederConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: FeederConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Address of the monitoring service under test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl TargetConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` form used when building endpoint URLs.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("target.host must not be empty"));
        }
        if self.port == 0 {
            return Err(anyhow!("target.port must be non-zero"));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestConfig {
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub timeout: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            timeout: default_request_timeout(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    /// Delay after every streamed message.
    #[serde(default = "default_stream_pacing")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub pacing: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            pacing: default_stream_pacing(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthConfig {
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout: default_request_timeout(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_duration")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
    #[serde(default = "default_interval")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub interval: Duration,
    #[serde(default = "default_max_angle")]
    pub max_angle: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            interval: default_interval(),
            max_angle: default_max_angle(),
            seed: None,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.duration.is_zero() {
            return Err(anyhow!("generation.duration must be greater than zero"));
        }
        if self.interval.is_zero() {
            return Err(anyhow!("generation.interval must be greater than zero"));
        }
        if !self.max_angle.is_finite() || self.max_angle <= 0.0 {
            return Err(anyhow!(
                "generation.max_angle must be a positive number, got {}",
                self.max_angle
            ));
        }
        if self.interval >= self.duration {
            warn!(
                interval = ?self.interval,
                duration = ?self.duration,
                "interval is not shorter than duration; a run will emit a single sample"
            );
        }
        Ok(())
    }
}

/// Angles used when a single literal sample is sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SingleSampleConfig {
    #[serde(default = "default_theta")]
    pub theta: f64,
    #[serde(default = "default_psi")]
    pub psi: f64,
    #[serde(default = "default_phi")]
    pub phi: f64,
}

impl Default for SingleSampleConfig {
    fn default() -> Self {
        Self {
            theta: default_theta(),
            psi: default_psi(),
            phi: default_phi(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Optional directory for a daily rolling JSON log file.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            directory: None,
        }
    }
}
