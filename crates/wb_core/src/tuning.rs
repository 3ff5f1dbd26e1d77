//! # Motion Tuning
//!
//! All knobs that shape a play in one parameter bag.
//!
//! Policy is sanitize-on-entry: out-of-range values are clamped into the
//! documented range and NaN falls back to the field default. Nothing here is
//! ever rejected, so the engine can assume sane numbers.
//!
//! ## Presets
//! ```rust
//! use wb_core::WhiteboardMotionTuning;
//!
//! let tuning = WhiteboardMotionTuning::default();
//! let smooth = WhiteboardMotionTuning::smooth();
//! assert!(smooth.cruise_speed < tuning.cruise_speed);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Documented ranges (inclusive) for every tuning field.
pub mod ranges {
    pub const CRUISE_SPEED: (f32, f32) = (0.05, 2.0);
    pub const ACCELERATION: (f32, f32) = (0.1, 10.0);
    pub const BRAKING: (f32, f32) = (0.1, 10.0);
    pub const LOOK_AHEAD_TIME: (f32, f32) = (0.0, 2.0);
    pub const MAX_LATERAL_ACCEL: (f32, f32) = (0.05, 20.0);
    pub const CURVE_STRENGTH: (f32, f32) = (0.0, 0.6);
    pub const TOKEN_RADIUS: (f32, f32) = (0.005, 0.15);
    pub const MIN_SPACING_RADII: (f32, f32) = (0.0, 3.0);
    pub const AVOIDANCE_BLEND: (f32, f32) = (0.0, 1.0);
    pub const DEFLECTION_STRENGTH: (f32, f32) = (0.0, 3.0);
    pub const MAX_LATERAL_OFFSET_RADII: (f32, f32) = (0.0, 4.0);
    pub const DEFLECTION_SPRING: (f32, f32) = (0.0, 30.0);
    pub const DEFLECTION_DAMPING: (f32, f32) = (0.0, 30.0);
    pub const CLAMP_MARGIN: (f32, f32) = (0.0, 0.2);
}

/// Soft (speed/lateral response) radius as a multiple of the hard distance.
pub const SOFT_DISTANCE_FACTOR: f32 = 2.2;

/// Speed, collision geometry and deflection response for one play.
///
/// Speeds are in court units per second (the court is 1.0 wide).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhiteboardMotionTuning {
    /// Free-running speed on straight sections
    pub cruise_speed: f32,
    /// Speed-up rate (units/s²)
    pub acceleration: f32,
    /// Slow-down rate (units/s²), also used by the stopping cap
    pub braking: f32,
    /// Seconds of travel used for curvature and conflict look-ahead
    pub look_ahead_time: f32,
    /// Corner cap: v = sqrt(max_lateral_accel / curvature)
    pub max_lateral_accel: f32,
    /// Bend of synthesized curves, as a fraction of the chord length
    pub curve_strength: f32,
    /// Token radius on the diagram
    pub token_radius: f32,
    /// Extra gap between tokens, in token radii
    pub min_spacing_radii: f32,
    /// 0 = avoid by slowing down only, 1 = avoid by deflecting only
    pub avoidance_blend: f32,
    pub deflection_strength: f32,
    /// Lateral offset cap, in token radii
    pub max_lateral_offset_radii: f32,
    pub deflection_spring: f32,
    pub deflection_damping: f32,
    /// How far outside the court a deflected token may go
    pub clamp_margin: f32,
}

impl Default for WhiteboardMotionTuning {
    fn default() -> Self {
        Self {
            cruise_speed: 0.35,
            acceleration: 1.2,
            braking: 1.6,
            look_ahead_time: 0.35,
            max_lateral_accel: 1.5,
            curve_strength: 0.18,
            token_radius: 0.035,
            min_spacing_radii: 0.25,
            avoidance_blend: 0.55,
            deflection_strength: 1.0,
            max_lateral_offset_radii: 1.5,
            deflection_spring: 14.0,
            deflection_damping: 6.0,
            clamp_margin: 0.02,
        }
    }
}

/// Clamp into `range`; NaN becomes `fallback`.
#[inline]
fn clamp_field(value: f32, range: (f32, f32), fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(range.0, range.1)
    }
}

impl WhiteboardMotionTuning {
    /// Calm walk-through: slower runs, more lateral give.
    pub fn smooth() -> Self {
        let mut cfg = Self::default();
        cfg.cruise_speed = 0.25;
        cfg.acceleration = 0.8;
        cfg.braking = 1.2;
        cfg.avoidance_blend = 0.75;
        cfg.deflection_damping = 8.0;
        cfg.sanitize()
    }

    /// Game-speed playback: quick runs, firm braking.
    pub fn snappy() -> Self {
        let mut cfg = Self::default();
        cfg.cruise_speed = 0.6;
        cfg.acceleration = 2.5;
        cfg.braking = 3.0;
        cfg.look_ahead_time = 0.25;
        cfg.max_lateral_accel = 3.0;
        cfg.avoidance_blend = 0.4;
        cfg.deflection_spring = 20.0;
        cfg.sanitize()
    }

    /// Clamp every field into its documented range.
    pub fn sanitize(&self) -> Self {
        use ranges::*;
        let d = Self::default();
        Self {
            cruise_speed: clamp_field(self.cruise_speed, CRUISE_SPEED, d.cruise_speed),
            acceleration: clamp_field(self.acceleration, ACCELERATION, d.acceleration),
            braking: clamp_field(self.braking, BRAKING, d.braking),
            look_ahead_time: clamp_field(self.look_ahead_time, LOOK_AHEAD_TIME, d.look_ahead_time),
            max_lateral_accel: clamp_field(
                self.max_lateral_accel,
                MAX_LATERAL_ACCEL,
                d.max_lateral_accel,
            ),
            curve_strength: clamp_field(self.curve_strength, CURVE_STRENGTH, d.curve_strength),
            token_radius: clamp_field(self.token_radius, TOKEN_RADIUS, d.token_radius),
            min_spacing_radii: clamp_field(
                self.min_spacing_radii,
                MIN_SPACING_RADII,
                d.min_spacing_radii,
            ),
            avoidance_blend: clamp_field(self.avoidance_blend, AVOIDANCE_BLEND, d.avoidance_blend),
            deflection_strength: clamp_field(
                self.deflection_strength,
                DEFLECTION_STRENGTH,
                d.deflection_strength,
            ),
            max_lateral_offset_radii: clamp_field(
                self.max_lateral_offset_radii,
                MAX_LATERAL_OFFSET_RADII,
                d.max_lateral_offset_radii,
            ),
            deflection_spring: clamp_field(
                self.deflection_spring,
                DEFLECTION_SPRING,
                d.deflection_spring,
            ),
            deflection_damping: clamp_field(
                self.deflection_damping,
                DEFLECTION_DAMPING,
                d.deflection_damping,
            ),
            clamp_margin: clamp_field(self.clamp_margin, CLAMP_MARGIN, d.clamp_margin),
        }
    }

    /// Closest two token centers may ever be after a step.
    #[inline]
    pub fn hard_distance(&self) -> f32 {
        self.token_radius * (2.0 + self.min_spacing_radii)
    }

    /// Range at which slowing and deflection start.
    #[inline]
    pub fn soft_distance(&self) -> f32 {
        self.hard_distance() * SOFT_DISTANCE_FACTOR
    }

    #[inline]
    pub fn max_lateral_offset(&self) -> f32 {
        self.token_radius * self.max_lateral_offset_radii
    }

    /// Parse a (possibly partial) tuning object; missing fields use defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Self = serde_json::from_str(json)?;
        Ok(raw.sanitize())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ========== Tests ==========

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_already_sane() {
        let cfg = WhiteboardMotionTuning::default();
        assert_eq!(cfg.sanitize(), cfg);
    }

    #[test]
    fn test_sanitize_clamps_out_of_range() {
        let mut cfg = WhiteboardMotionTuning::default();
        cfg.cruise_speed = 50.0;
        cfg.braking = -3.0;
        cfg.deflection_spring = 1000.0;
        cfg.avoidance_blend = 1.7;
        cfg.token_radius = 0.0;

        let s = cfg.sanitize();
        assert_eq!(s.cruise_speed, ranges::CRUISE_SPEED.1);
        assert_eq!(s.braking, ranges::BRAKING.0);
        assert_eq!(s.deflection_spring, ranges::DEFLECTION_SPRING.1);
        assert_eq!(s.avoidance_blend, 1.0);
        assert_eq!(s.token_radius, ranges::TOKEN_RADIUS.0);
    }

    #[test]
    fn test_sanitize_replaces_nan_and_clamps_infinity() {
        let mut cfg = WhiteboardMotionTuning::default();
        cfg.acceleration = f32::NAN;
        cfg.look_ahead_time = f32::INFINITY;
        cfg.clamp_margin = f32::NEG_INFINITY;

        let s = cfg.sanitize();
        assert_eq!(s.acceleration, WhiteboardMotionTuning::default().acceleration);
        assert_eq!(s.look_ahead_time, ranges::LOOK_AHEAD_TIME.1);
        assert_eq!(s.clamp_margin, ranges::CLAMP_MARGIN.0);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let mut cfg = WhiteboardMotionTuning::default();
        cfg.min_spacing_radii = 9.0;
        cfg.curve_strength = -1.0;
        let once = cfg.sanitize();
        assert_eq!(once.sanitize(), once);
    }

    #[test]
    fn test_derived_distances() {
        let cfg = WhiteboardMotionTuning::default();
        let hard = 0.035 * 2.25;
        assert!((cfg.hard_distance() - hard).abs() < 1e-6);
        assert!((cfg.soft_distance() - hard * 2.2).abs() < 1e-6);
        assert!((cfg.max_lateral_offset() - 0.035 * 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_presets_are_sane_and_ordered() {
        let base = WhiteboardMotionTuning::default();
        let smooth = WhiteboardMotionTuning::smooth();
        let snappy = WhiteboardMotionTuning::snappy();

        assert_eq!(smooth.sanitize(), smooth);
        assert_eq!(snappy.sanitize(), snappy);
        assert!(smooth.cruise_speed < base.cruise_speed);
        assert!(snappy.cruise_speed > base.cruise_speed);
        assert!(snappy.braking > base.braking);
    }

    #[test]
    fn test_partial_json_fills_defaults_and_sanitizes() {
        let cfg = WhiteboardMotionTuning::from_json(r#"{"cruise_speed": 9.0, "braking": 2.0}"#)
            .unwrap();
        assert_eq!(cfg.cruise_speed, ranges::CRUISE_SPEED.1);
        assert_eq!(cfg.braking, 2.0);
        assert_eq!(cfg.token_radius, WhiteboardMotionTuning::default().token_radius);
    }

    #[test]
    fn test_json_round_trip() {
        let cfg = WhiteboardMotionTuning::snappy();
        let json = cfg.to_json_pretty().unwrap();
        let parsed = WhiteboardMotionTuning::from_json(&json).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(WhiteboardMotionTuning::from_json("{ not json").is_err());
    }
}
