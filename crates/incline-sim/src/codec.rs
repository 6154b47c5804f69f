//! ---
//! incline_section: "11-simulation"
//! incline_subsection: "module"
//! incline_type: "source"
//! incline_scope: "code"
//! incline_description: "Angle to raw ADC count transform and the sample payload."
//! incline_version: "v0.1.0"
//! incline_owner: "tbd"
//! ---
//! Raw-count encoding shared by every sample.
//!
//! The monitor expects analog-sensor style readings alongside the angles:
//! `raw = clamp(round(512 + angle * 2.8), 0, 1023)` per axis.

use serde::{Deserialize, Serialize};

/// Raw reading at zero tilt.
pub const RAW_MIDPOINT: f64 = 512.0;
/// Raw counts per degree of tilt.
pub const RAW_PER_DEGREE: f64 = 2.8;

/// A 10-bit ADC reading, always within `[0, 1023]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct RawCount(u16);

/// Returned when a literal raw value does not fit in 10 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("raw count {0} outside [0, 1023]")]
pub struct RawCountOutOfRange(pub i64);

impl RawCount {
    pub const MIN: RawCount = RawCount(0);
    pub const MAX: RawCount = RawCount(1023);
    pub const MIDPOINT: RawCount = RawCount(512);

    /// Encode an angle in degrees. Total over all inputs; NaN maps to 0.
    pub fn from_angle(degrees: f64) -> Self {
        let raw = (RAW_MIDPOINT + degrees * RAW_PER_DEGREE).round();
        // `as` saturates, and NaN becomes 0.
        RawCount(raw.clamp(0.0, Self::MAX.0 as f64) as u16)
    }

    /// Clamp an arbitrary integer reading into range.
    pub fn saturating(value: i64) -> Self {
        RawCount(value.clamp(0, Self::MAX.0 as i64) as u16)
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<i64> for RawCount {
    type Error = RawCountOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (0..=Self::MAX.0 as i64).contains(&value) {
            Ok(RawCount(value as u16))
        } else {
            Err(RawCountOutOfRange(value))
        }
    }
}

impl From<RawCount> for u16 {
    fn from(value: RawCount) -> Self {
        value.0
    }
}

impl std::fmt::Display for RawCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Orientation about three axes, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleTriple {
    pub theta: f64,
    pub psi: f64,
    pub phi: f64,
}

impl AngleTriple {
    pub fn new(theta: f64, psi: f64, phi: f64) -> Self {
        Self { theta, psi, phi }
    }

    /// Encode every axis independently.
    pub fn encode(&self) -> [RawCount; 3] {
        [
            RawCount::from_angle(self.theta),
            RawCount::from_angle(self.psi),
            RawCount::from_angle(self.phi),
        ]
    }

    /// Round every axis to two decimal places for reporting.
    pub fn rounded(&self) -> Self {
        Self {
            theta: round_centi(self.theta),
            psi: round_centi(self.psi),
            phi: round_centi(self.phi),
        }
    }
}

fn round_centi(value: f64) -> f64 {
    let scaled = value * 100.0;
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        value
    }
}

/// The payload accepted by the monitor on `POST /api/angles` and the stream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleSample {
    pub theta: f64,
    pub psi: f64,
    pub phi: f64,
    pub axraw: RawCount,
    pub ayraw: RawCount,
    pub azraw: RawCount,
}

impl AngleSample {
    /// Build a sample whose raw counts are derived from the given angles.
    pub fn from_angles(angles: AngleTriple) -> Self {
        let [axraw, ayraw, azraw] = angles.encode();
        Self {
            theta: angles.theta,
            psi: angles.psi,
            phi: angles.phi,
            axraw,
            ayraw,
            azraw,
        }
    }

    /// Encode simulated angles at full precision, then report them rounded
    /// to two decimals.
    pub fn from_simulated(angles: AngleTriple) -> Self {
        let [axraw, ayraw, azraw] = angles.encode();
        let reported = angles.rounded();
        Self {
            theta: reported.theta,
            psi: reported.psi,
            phi: reported.phi,
            axraw,
            ayraw,
            azraw,
        }
    }

    /// A caller-supplied literal sample.
    pub fn literal(angles: AngleTriple, raw: [RawCount; 3]) -> Self {
        let [axraw, ayraw, azraw] = raw;
        Self {
            theta: angles.theta,
            psi: angles.psi,
            phi: angles.phi,
            axraw,
            ayraw,
            azraw,
        }
    }

    pub fn angles(&self) -> AngleTriple {
        AngleTriple::new(self.theta, self.psi, self.phi)
    }

    pub fn raw(&self) -> [RawCount; 3] {
        [self.axraw, self.ayraw, self.azraw]
    }
}

impl Default for AngleSample {
    /// The level rest position.
    fn default() -> Self {
        Self::from_angles(AngleTriple::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_tilt_encodes_to_midpoint() {
        assert_eq!(RawCount::from_angle(0.0), RawCount::MIDPOINT);
        assert_eq!(RawCount::from_angle(0.0).get(), 512);
    }

    #[test]
    fn extremes_clamp_to_bounds() {
        assert_eq!(RawCount::from_angle(200.0), RawCount::MAX);
        assert_eq!(RawCount::from_angle(-200.0), RawCount::MIN);
        assert_eq!(RawCount::from_angle(f64::INFINITY), RawCount::MAX);
        assert_eq!(RawCount::from_angle(f64::NEG_INFINITY), RawCount::MIN);
        assert_eq!(RawCount::from_angle(f64::NAN), RawCount::MIN);
    }

    #[test]
    fn encoding_rounds_to_nearest() {
        // 512 + 15.5 * 2.8 = 555.4
        assert_eq!(RawCount::from_angle(15.5).get(), 555);
        // 512 + 45 * 2.8 = 638
        assert_eq!(RawCount::from_angle(45.0).get(), 638);
        // 512 - 22.3 * 2.8 = 449.56
        assert_eq!(RawCount::from_angle(-22.3).get(), 450);
    }

    #[test]
    fn every_encoded_value_is_in_range() {
        let mut angle = -400.0;
        while angle <= 400.0 {
            let raw = RawCount::from_angle(angle).get();
            assert!(raw <= 1023, "angle {angle} produced {raw}");
            angle += 0.37;
        }
    }

    #[test]
    fn saturating_and_try_from_respect_bounds() {
        assert_eq!(RawCount::saturating(-5), RawCount::MIN);
        assert_eq!(RawCount::saturating(4096), RawCount::MAX);
        assert_eq!(RawCount::saturating(600).get(), 600);
        assert_eq!(RawCount::try_from(1023).unwrap(), RawCount::MAX);
        assert_eq!(RawCount::try_from(1024), Err(RawCountOutOfRange(1024)));
        assert!(RawCount::try_from(-1).is_err());
    }

    #[test]
    fn simulated_samples_round_angles_but_not_raw_inputs() {
        let sample = AngleSample::from_simulated(AngleTriple::new(10.004_9, -0.126, 29.996));
        assert_eq!(sample.theta, 10.0);
        assert_eq!(sample.psi, -0.13);
        assert_eq!(sample.phi, 30.0);
        // raw derived from 10.0049 -> 540.01 -> 540
        assert_eq!(sample.axraw.get(), 540);
    }

    #[test]
    fn rounding_keeps_huge_angles_finite() {
        let sample = AngleSample::from_simulated(AngleTriple::new(1e308, -1e308, 0.005));
        assert_eq!(sample.theta, 1e308);
        assert_eq!(sample.psi, -1e308);
        assert_eq!(sample.axraw, RawCount::MAX);
        assert_eq!(sample.ayraw, RawCount::MIN);
    }

    #[test]
    fn sample_serializes_to_monitor_payload() {
        let sample = AngleSample::from_angles(AngleTriple::new(15.5, -22.3, 45.0));
        let value = serde_json::to_value(sample).unwrap();
        assert_eq!(
            value,
            json!({
                "theta": 15.5,
                "psi": -22.3,
                "phi": 45.0,
                "axraw": 555,
                "ayraw": 450,
                "azraw": 638
            })
        );
    }

    #[test]
    fn deserialization_rejects_out_of_range_raw() {
        let err = serde_json::from_value::<AngleSample>(json!({
            "theta": 0.0, "psi": 0.0, "phi": 0.0,
            "axraw": 2048, "ayraw": 512, "azraw": 512
        }))
        .unwrap_err();
        assert!(err.to_string().contains("2048"));
    }

    #[test]
    fn default_sample_is_level() {
        let sample = AngleSample::default();
        assert_eq!(sample.angles(), AngleTriple::default());
        assert_eq!(sample.raw(), [RawCount::MIDPOINT; 3]);
    }
}
