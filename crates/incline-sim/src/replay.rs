//! ---
//! incline_section: "11-simulation"
//! incline_subsection: "module"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Replay of serial bridge captures."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
//! The sensor bridge prints one CSV line per reading:
//! `theta,psi,phi,axraw,ayraw,azraw,axvolt,ayvolt,azvolt`. Captures may also
//! contain `START` banners and a `Theta,Psi,...` header, which are skipped.
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use csv::{ReaderBuilder, StringRecord, Trim};
use futures_util::stream::{self, Stream};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::codec::{AngleSample, AngleTriple, RawCount};

/// Errors while reading a bridge capture.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("unable to open bridge capture {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid bridge capture: {0}")]
    Csv(#[from] csv::Error),
}

/// One reading from the bridge. Voltages are logged during replay but are
/// not part of the monitor payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeReading {
    pub sample: AngleSample,
    pub volts: Option<[f64; 3]>,
}

/// Why a record was not turned into a reading.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Skip {
    Banner,
    Malformed(String),
}

/// Readings loaded from a capture, in file order.
#[derive(Debug, Default, Clone)]
pub struct BridgeReplay {
    readings: Vec<BridgeReading>,
    skipped: usize,
}

impl BridgeReplay {
    pub fn from_path(path: &Path) -> Result<Self, ReplayError> {
        let file = File::open(path).map_err(|source| ReplayError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let replay = Self::from_reader(file)?;
        debug!(
            path = %path.display(),
            readings = replay.readings.len(),
            skipped = replay.skipped,
            "bridge capture loaded"
        );
        Ok(replay)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ReplayError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);
        let mut replay = Self::default();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            match parse_record(&record) {
                Ok(reading) => replay.readings.push(reading),
                Err(Skip::Banner) => {}
                Err(Skip::Malformed(reason)) => {
                    warn!(line = index + 1, %reason, "skipping malformed bridge line");
                    replay.skipped += 1;
                }
            }
        }
        Ok(replay)
    }

    pub fn readings(&self) -> &[BridgeReading] {
        &self.readings
    }

    /// Number of malformed lines dropped while loading.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Samples in file order, `interval` apart. The first one is immediate.
    pub fn into_stream(self, interval: Duration) -> impl Stream<Item = AngleSample> + Send {
        let samples = self.readings.into_iter().map(|reading| {
            if let Some([ax, ay, az]) = reading.volts {
                debug!(ax, ay, az, "bridge reading voltages");
            }
            reading.sample
        });
        stream::unfold((samples, true), move |(mut samples, first)| async move {
            let sample = samples.next()?;
            if !first {
                sleep(interval).await;
            }
            Some((sample, (samples, false)))
        })
    }
}

/// Parse one bridge line. Returns `None` for banners, headers and
/// unusable lines.
pub fn parse_bridge_line(line: &str) -> Option<BridgeReading> {
    let record = StringRecord::from(line.split(',').map(str::trim).collect::<Vec<_>>());
    parse_record(&record).ok()
}

fn parse_record(record: &StringRecord) -> Result<BridgeReading, Skip> {
    let first = record.get(0).unwrap_or_default();
    if first.is_empty() && record.len() <= 1 {
        return Err(Skip::Banner);
    }
    if first.starts_with("START") || record.iter().any(|field| field.eq_ignore_ascii_case("theta"))
    {
        return Err(Skip::Banner);
    }
    if record.len() != 6 && record.len() != 9 {
        return Err(Skip::Malformed(format!(
            "expected 6 or 9 fields, found {}",
            record.len()
        )));
    }

    let angle = |idx: usize| -> Result<f64, Skip> {
        let field = &record[idx];
        match field.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(Skip::Malformed(format!("field {} is not a number: {:?}", idx + 1, field))),
        }
    };
    let raw = |idx: usize| -> Result<RawCount, Skip> {
        let field = &record[idx];
        field
            .parse::<i64>()
            .map(RawCount::saturating)
            .map_err(|_| Skip::Malformed(format!("field {} is not an integer: {:?}", idx + 1, field)))
    };

    let angles = AngleTriple::new(angle(0)?, angle(1)?, angle(2)?);
    let sample = AngleSample::literal(angles, [raw(3)?, raw(4)?, raw(5)?]);
    let volts = if record.len() == 9 {
        Some([angle(6)?, angle(7)?, angle(8)?])
    } else {
        None
    };
    Ok(BridgeReading { sample, volts })
}
