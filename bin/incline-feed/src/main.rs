//! ---
//! incline_section: "05-networking-external-interfaces"
//! incline_subsection: "binary"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Command line feeder for the inclination monitor."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};
use incline_common::{init_tracing, FeederConfig, LogFormat};
use incline_net::{
    generate_circular, generate_random, replay, DeliveryReceipt, FeedReport, HealthProbe,
    RestSender, SampleSink, StreamSender, TransportError,
};
use incline_sim::{AngleSample, AngleTriple, BridgeReplay};
use tracing::{info, warn};

mod render;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Send one sample over REST
    Single,
    /// Stream circular motion for the configured duration
    Circular,
    /// Stream uniform random noise for the configured duration
    Random,
    /// Query the monitor's health endpoint
    Health,
    /// Send one sample `--count` times over a WebSocket
    Websocket,
    /// Replay a serial bridge capture file
    Replay,
}

impl Mode {
    fn heading(self) -> &'static str {
        match self {
            Mode::Single => "Sending single data point via REST API...",
            Mode::Circular => "Generating circular motion data...",
            Mode::Random => "Generating random noise data...",
            Mode::Health => "Checking server health...",
            Mode::Websocket => "Sending via WebSocket...",
            Mode::Replay => "Replaying bridge capture...",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum Transport {
    #[default]
    Rest,
    Websocket,
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Send synthetic tilt data to the inclination angle monitor",
    long_about = None,
    allow_negative_numbers = true
)]
struct Cli {
    /// What to send
    #[arg(value_enum)]
    mode: Mode,

    /// Monitor host
    #[arg(long, env = "INCLINE_HOST")]
    host: Option<String>,

    /// Monitor port
    #[arg(long, env = "INCLINE_PORT")]
    port: Option<u16>,

    /// Theta angle in degrees for single and websocket modes
    #[arg(long)]
    theta: Option<f64>,

    /// Psi angle in degrees for single and websocket modes
    #[arg(long)]
    psi: Option<f64>,

    /// Phi angle in degrees for single and websocket modes
    #[arg(long)]
    phi: Option<f64>,

    /// Run duration in seconds for generated modes
    #[arg(long)]
    duration: Option<f64>,

    /// Seconds between samples for generated and replay modes
    #[arg(long)]
    interval: Option<f64>,

    /// Largest absolute angle drawn in random mode
    #[arg(long)]
    max_angle: Option<f64>,

    /// Seed for reproducible random runs
    #[arg(long)]
    seed: Option<u64>,

    /// Number of WebSocket messages to send
    #[arg(long, default_value = "1")]
    count: NonZeroUsize,

    /// Transport used by generated and replay modes
    #[arg(long, value_enum, default_value_t = Transport::Rest)]
    transport: Transport,

    /// Bridge capture to replay
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Console log format (pretty or structured-json)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = FeederConfig::load(cli.config.as_deref())?;
    let mut config = loaded.config;
    apply_overrides(&cli, &mut config)?;
    init_tracing("incline-feed", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(config = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults"),
    }

    println!("{}", render::banner());
    println!("\n{}\n", cli.mode.heading());
    run(&cli, &config).await?;
    println!("{}", render::footer());
    Ok(())
}

/// Fold command line flags into the loaded configuration.
fn apply_overrides(cli: &Cli, config: &mut FeederConfig) -> Result<()> {
    if let Some(host) = &cli.host {
        config.target.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.target.port = port;
    }
    if let Some(theta) = cli.theta {
        config.single.theta = theta;
    }
    if let Some(psi) = cli.psi {
        config.single.psi = psi;
    }
    if let Some(phi) = cli.phi {
        config.single.phi = phi;
    }
    if let Some(duration) = cli.duration {
        config.generation.duration = seconds("duration", duration)?;
    }
    if let Some(interval) = cli.interval {
        config.generation.interval = seconds("interval", interval)?;
    }
    if let Some(max_angle) = cli.max_angle {
        config.generation.max_angle = max_angle;
    }
    if cli.seed.is_some() {
        config.generation.seed = cli.seed;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    config.validate().context("invalid feeder configuration")
}

fn seconds(flag: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| anyhow!("--{flag} must be a non-negative number of seconds, got {value}"))
}

fn single_sample(config: &FeederConfig) -> AngleSample {
    let single = &config.single;
    AngleSample::from_angles(AngleTriple::new(single.theta, single.psi, single.phi))
}

async fn run(cli: &Cli, config: &FeederConfig) -> Result<()> {
    match cli.mode {
        Mode::Health => {
            let probe = HealthProbe::new(&config.target, &config.health)?;
            let status = probe.check().await;
            println!("{}", render::health(probe.url().as_str(), &status));
        }
        Mode::Single => {
            let sender = RestSender::new(&config.target, &config.rest)?;
            let sample = single_sample(config);
            println!("Sending: {}", describe_sample(&sample));
            let outcome = sender.send_single(&sample).await;
            println!("{}", render::rest_outcome(&outcome));
        }
        Mode::Websocket => {
            let sender = StreamSender::new(&config.target, &config.stream)?;
            let sample = single_sample(config);
            println!("Sending {} x {}", cli.count, describe_sample(&sample));
            let outcome = sender.send_stream(&sample, cli.count).await;
            println!("{}", render::stream_outcome(sender.url().as_str(), &outcome));
        }
        Mode::Circular | Mode::Random | Mode::Replay => {
            let report = match cli.transport {
                Transport::Rest => {
                    let mut sender = RestSender::new(&config.target, &config.rest)?;
                    drive(cli, config, &mut sender).await?
                }
                Transport::Websocket => {
                    let sender = StreamSender::new(&config.target, &config.stream)?;
                    let mut session = match sender.open().await {
                        Ok(session) => session,
                        Err(err) => {
                            println!("✗ WebSocket error: {err}");
                            return Ok(());
                        }
                    };
                    let report = drive(cli, config, &mut session).await?;
                    if let Err(err) = session.close().await {
                        warn!(error = %err, "stream session did not close cleanly");
                    }
                    report
                }
            };
            println!("{}", render::report(&report));
        }
    }
    Ok(())
}

/// Run a generated or replay mode against `sink`, printing every sample.
async fn drive<K>(cli: &Cli, config: &FeederConfig, sink: &mut K) -> Result<FeedReport>
where
    K: SampleSink + ?Sized,
{
    let generation = &config.generation;
    let print = |sample: &AngleSample, outcome: &Result<DeliveryReceipt, TransportError>| {
        println!("{}", render::sample_line(Local::now().time(), sample, outcome));
    };
    let report = match cli.mode {
        Mode::Circular => {
            generate_circular(sink, generation.duration, generation.interval, print).await?
        }
        Mode::Random => {
            generate_random(
                sink,
                generation.duration,
                generation.interval,
                generation.max_angle,
                generation.seed,
                print,
            )
            .await?
        }
        Mode::Replay => {
            let path = cli
                .file
                .as_deref()
                .context("--file is required for replay mode")?;
            let capture = BridgeReplay::from_path(path)?;
            if capture.is_empty() {
                return Err(anyhow!("{} contains no bridge readings", path.display()));
            }
            replay(sink, capture, generation.interval, print).await?
        }
        other => return Err(anyhow!("{other:?} is not a feed mode")),
    };
    Ok(report)
}

fn describe_sample(sample: &AngleSample) -> String {
    format!(
        "theta={} psi={} phi={} axraw={} ayraw={} azraw={}",
        sample.theta, sample.psi, sample.phi, sample.axraw, sample.ayraw, sample.azraw
    )
}
