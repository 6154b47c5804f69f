//! ---
//! incline_section: "11-simulation"
//! incline_subsection: "module"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Motion models and the time-paced generation session."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
use std::f64::consts::PI;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::codec::{AngleSample, AngleTriple};

const CIRCULAR_TILT_AMPLITUDE: f64 = 45.0;
const CIRCULAR_ROLL_AMPLITUDE: f64 = 30.0;

/// Invalid generator parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("duration must be greater than zero")]
    ZeroDuration,
    #[error("interval must be greater than zero")]
    ZeroInterval,
    #[error("max angle must be a positive finite number, got {0}")]
    InvalidMaxAngle(f64),
}

/// Produces the next simulated orientation.
pub trait MotionModel: Send {
    fn next_angles(&mut self) -> AngleTriple;

    /// Short name used in logs.
    fn label(&self) -> &'static str;
}

/// Elliptical tilt completing one full phase cycle per run duration.
#[derive(Debug, Clone)]
pub struct CircularMotion {
    phase: f64,
    step: f64,
}

impl CircularMotion {
    pub fn new(duration: Duration, interval: Duration) -> Result<Self, SimulationError> {
        check_timing(duration, interval)?;
        Ok(Self {
            phase: 0.0,
            step: interval.as_secs_f64() * 2.0 * PI / duration.as_secs_f64(),
        })
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Angles for an arbitrary phase, in radians.
    pub fn angles_at(phase: f64) -> AngleTriple {
        AngleTriple::new(
            CIRCULAR_TILT_AMPLITUDE * phase.sin(),
            CIRCULAR_TILT_AMPLITUDE * phase.cos(),
            CIRCULAR_ROLL_AMPLITUDE * (phase * 0.5).sin(),
        )
    }
}

impl MotionModel for CircularMotion {
    fn next_angles(&mut self) -> AngleTriple {
        let angles = Self::angles_at(self.phase);
        self.phase += self.step;
        angles
    }

    fn label(&self) -> &'static str {
        "circular"
    }
}

/// Independent uniform draws in `[-max_angle, max_angle]` on every axis.
///
/// Draws are taken from `[-1, 1]` and scaled, so any finite positive
/// `max_angle` is accepted.
#[derive(Debug, Clone)]
pub struct RandomNoise {
    rng: StdRng,
    unit: Uniform<f64>,
    max_angle: f64,
}

impl RandomNoise {
    pub const DEFAULT_MAX_ANGLE: f64 = 30.0;

    /// Seeded generators are reproducible; `None` seeds from OS entropy.
    pub fn new(max_angle: f64, seed: Option<u64>) -> Result<Self, SimulationError> {
        if !max_angle.is_finite() || max_angle <= 0.0 {
            return Err(SimulationError::InvalidMaxAngle(max_angle));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            unit: Uniform::new_inclusive(-1.0, 1.0),
            max_angle,
        })
    }

    pub fn max_angle(&self) -> f64 {
        self.max_angle
    }

    fn draw(&mut self) -> f64 {
        (self.unit.sample(&mut self.rng) * self.max_angle).clamp(-self.max_angle, self.max_angle)
    }
}

impl MotionModel for RandomNoise {
    fn next_angles(&mut self) -> AngleTriple {
        AngleTriple::new(self.draw(), self.draw(), self.draw())
    }

    fn label(&self) -> &'static str {
        "random"
    }
}

fn check_timing(duration: Duration, interval: Duration) -> Result<(), SimulationError> {
    if duration.is_zero() {
        return Err(SimulationError::ZeroDuration);
    }
    if interval.is_zero() {
        return Err(SimulationError::ZeroInterval);
    }
    Ok(())
}

/// One run of a motion model, paced by wall-clock time.
///
/// The first sample is produced immediately. Every later call to
/// [`GenerationSession::next`] first sleeps `interval`, then checks the
/// deadline: once `duration` has elapsed since the first sample the session
/// ends and keeps returning `None`. Time spent by the caller between calls
/// (e.g. a slow delivery) is not compensated.
#[derive(Debug)]
pub struct GenerationSession<M> {
    model: M,
    duration: Duration,
    interval: Duration,
    started: Option<Instant>,
    emitted: u64,
    finished: bool,
}

impl<M: MotionModel> GenerationSession<M> {
    pub fn new(model: M, duration: Duration, interval: Duration) -> Result<Self, SimulationError> {
        check_timing(duration, interval)?;
        Ok(Self {
            model,
            duration,
            interval,
            started: None,
            emitted: 0,
            finished: false,
        })
    }

    /// Next sample, or `None` once the run duration has elapsed.
    pub async fn next(&mut self) -> Option<AngleSample> {
        if self.finished {
            return None;
        }
        let started = match self.started {
            Some(started) => {
                sleep(self.interval).await;
                started
            }
            None => *self.started.insert(Instant::now()),
        };
        if started.elapsed() >= self.duration {
            self.finished = true;
            debug!(
                model = self.model.label(),
                emitted = self.emitted,
                "generation session finished"
            );
            return None;
        }
        self.emitted += 1;
        Some(AngleSample::from_simulated(self.model.next_angles()))
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consume the session as a lazy, non-restartable stream.
    pub fn into_stream(self) -> impl Stream<Item = AngleSample> + Send {
        stream::unfold(self, |mut session| async move {
            session.next().await.map(|sample| (sample, session))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value)
    }

    #[test]
    fn circular_starts_at_zero_phase() {
        let mut motion = CircularMotion::new(secs(1.0), secs(0.2)).unwrap();
        let sample = AngleSample::from_simulated(motion.next_angles());
        assert_eq!(sample.theta, 0.0);
        assert_eq!(sample.psi, 45.0);
        assert_eq!(sample.phi, 0.0);
        assert_eq!(sample.axraw.get(), 512);
        assert_eq!(sample.ayraw.get(), 638);
        assert_eq!(sample.azraw.get(), 512);
    }

    #[test]
    fn circular_completes_one_cycle_per_duration() {
        let mut motion = CircularMotion::new(secs(1.0), secs(0.25)).unwrap();
        let first = motion.next_angles();
        let quarter = AngleSample::from_simulated(motion.next_angles());
        assert_eq!(first, CircularMotion::angles_at(0.0));
        assert_eq!(quarter.theta, 45.0);
        assert_eq!(quarter.psi, 0.0);
        assert_eq!(quarter.phi, 21.21);
        motion.next_angles();
        motion.next_angles();
        assert!((motion.phase() - 2.0 * PI).abs() < 1e-9);
    }

    #[test]
    fn circular_raw_counts_stay_in_range() {
        let mut motion = CircularMotion::new(secs(10.0), secs(0.1)).unwrap();
        for _ in 0..200 {
            let sample = AngleSample::from_simulated(motion.next_angles());
            for raw in sample.raw() {
                assert!((382..=642).contains(&raw.get()), "raw {raw} out of expected swing");
            }
        }
    }

    #[test]
    fn random_noise_is_bounded_by_max_angle() {
        let mut noise = RandomNoise::new(30.0, None).unwrap();
        for _ in 0..1000 {
            let sample = AngleSample::from_simulated(noise.next_angles());
            for angle in [sample.theta, sample.psi, sample.phi] {
                assert!((-30.0..=30.0).contains(&angle), "angle {angle} escaped bounds");
            }
        }
    }

    #[test]
    fn random_noise_with_seed_is_reproducible() {
        let mut a = RandomNoise::new(12.5, Some(42)).unwrap();
        let mut b = RandomNoise::new(12.5, Some(42)).unwrap();
        for _ in 0..16 {
            assert_eq!(a.next_angles(), b.next_angles());
        }
    }

    #[test]
    fn wide_random_noise_clamps_raw_counts() {
        let mut noise = RandomNoise::new(500.0, Some(7)).unwrap();
        let mut saw_clamp = false;
        for _ in 0..500 {
            let sample = AngleSample::from_simulated(noise.next_angles());
            for raw in sample.raw() {
                assert!(raw.get() <= 1023);
                saw_clamp |= raw.get() == 0 || raw.get() == 1023;
            }
        }
        assert!(saw_clamp);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert_eq!(
            CircularMotion::new(Duration::ZERO, secs(0.1)).unwrap_err(),
            SimulationError::ZeroDuration
        );
        assert_eq!(
            CircularMotion::new(secs(1.0), Duration::ZERO).unwrap_err(),
            SimulationError::ZeroInterval
        );
        assert!(matches!(
            RandomNoise::new(0.0, None),
            Err(SimulationError::InvalidMaxAngle(_))
        ));
        assert!(matches!(
            RandomNoise::new(f64::NAN, None),
            Err(SimulationError::InvalidMaxAngle(_))
        ));
    }

    #[test]
    fn huge_max_angle_stays_finite_and_bounded() {
        let mut noise = RandomNoise::new(1e308, Some(1)).unwrap();
        for _ in 0..100 {
            let angles = noise.next_angles();
            for angle in [angles.theta, angles.psi, angles.phi] {
                assert!(angle.is_finite());
                assert!(angle.abs() <= 1e308);
            }
            let sample = AngleSample::from_simulated(angles);
            assert!(sample.theta.is_finite() && sample.psi.is_finite() && sample.phi.is_finite());
            assert!(sample.raw().iter().all(|raw| raw.get() <= 1023));
        }
        assert!(RandomNoise::new(f64::MAX, None).is_ok());
    }

    #[tokio::test]
    async fn session_stops_after_duration() {
        let motion = CircularMotion::new(secs(0.3), secs(0.1)).unwrap();
        let mut session = GenerationSession::new(motion, secs(0.3), secs(0.1)).unwrap();
        let started = std::time::Instant::now();
        let mut count = 0;
        while session.next().await.is_some() {
            count += 1;
        }
        assert!((2..=4).contains(&count), "unexpected sample count {count}");
        assert_eq!(session.emitted(), count);
        assert!(session.is_finished());
        assert!(started.elapsed() >= secs(0.3));
        assert!(session.next().await.is_none());
    }

    #[tokio::test]
    async fn session_stream_yields_first_sample_immediately() {
        let motion = CircularMotion::new(secs(1.0), secs(0.2)).unwrap();
        let session = GenerationSession::new(motion, secs(1.0), secs(0.2)).unwrap();
        let mut stream = Box::pin(session.into_stream());
        let started = std::time::Instant::now();
        let first = stream.next().await.expect("first sample");
        assert!(started.elapsed() < secs(0.1));
        assert_eq!(first.psi, 45.0);
        let rest = stream.count().await;
        assert!((3..=5).contains(&rest), "unexpected remaining count {rest}");
    }

    #[tokio::test]
    async fn slow_consumer_does_not_shorten_run() {
        let noise = RandomNoise::new(30.0, Some(1)).unwrap();
        let mut session = GenerationSession::new(noise, secs(0.25), secs(0.05)).unwrap();
        let started = std::time::Instant::now();
        while session.next().await.is_some() {
            sleep(secs(0.08)).await;
        }
        assert!(started.elapsed() >= secs(0.25));
        assert!(session.emitted() < 5);
    }
}
