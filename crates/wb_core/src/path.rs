//! Path geometry: quadratic Bézier evaluation and arc-length tables.
//!
//! The engine only ever queries a [`MotionPath`] by distance travelled. The
//! table is built once per play; each query is a binary search over the
//! cumulative lengths followed by one analytic re-evaluation at the
//! interpolated curve parameter.

use crate::contracts::{LockedPathDefinition, PathCurve, Position};

/// Default number of subdivisions for the arc-length table.
pub const DEFAULT_SAMPLE_COUNT: usize = 120;

/// Floor for the curvature denominator.
const CURVATURE_EPSILON: f32 = 1e-6;

/// Below this a path (or chord) is treated as zero-length.
const DEGENERATE_LENGTH: f32 = 1e-6;

/// Minimum chord for a synthesized bend.
const MIN_CURVE_CHORD: f32 = 1e-4;

// ============================================================================
// Analytic Curve
// ============================================================================

/// Point on the path at curve parameter `t` in `[0, 1]`.
pub fn evaluate(start: Position, end: Position, curve: PathCurve, t: f32) -> Position {
    match curve {
        PathCurve::Straight => start.lerp(end, t),
        PathCurve::Quadratic { control } => {
            let u = 1.0 - t;
            start * (u * u) + control * (2.0 * u * t) + end * (t * t)
        }
    }
}

/// First derivative with respect to `t`.
pub fn derivative(start: Position, end: Position, curve: PathCurve, t: f32) -> Position {
    match curve {
        PathCurve::Straight => end - start,
        PathCurve::Quadratic { control } => {
            (control - start) * (2.0 * (1.0 - t)) + (end - control) * (2.0 * t)
        }
    }
}

/// Second derivative (constant for a quadratic).
pub fn second_derivative(start: Position, end: Position, curve: PathCurve) -> Position {
    match curve {
        PathCurve::Straight => Position::ZERO,
        PathCurve::Quadratic { control } => (start - control * 2.0 + end) * 2.0,
    }
}

/// Unsigned curvature `|x'y'' - y'x''| / (x'^2 + y'^2)^1.5`.
pub fn curvature(start: Position, end: Position, curve: PathCurve, t: f32) -> f32 {
    if matches!(curve, PathCurve::Straight) {
        return 0.0;
    }
    let d1 = derivative(start, end, curve, t);
    let d2 = second_derivative(start, end, curve);
    let denom = d1.dot(d1).powf(1.5).max(CURVATURE_EPSILON);
    d1.cross(d2).abs() / denom
}

/// Unit tangent; falls back to the chord, then +x, when the derivative vanishes.
fn unit_tangent(start: Position, end: Position, curve: PathCurve, t: f32) -> Position {
    let d = derivative(start, end, curve, t);
    if d.length() > DEGENERATE_LENGTH {
        return d.normalized();
    }
    let chord = end - start;
    if chord.length() > DEGENERATE_LENGTH {
        chord.normalized()
    } else {
        Position::new(1.0, 0.0)
    }
}

// ============================================================================
// Default Curve Synthesis
// ============================================================================

/// Control point for a run the user drew without bending.
///
/// The bend is `curve_strength × chord` perpendicular to the chord, on the
/// side facing the court center. Returns `None` (straight line) when
/// `curve_strength <= 0` or start and end coincide.
pub fn compute_default_control_point(
    start: Position,
    end: Position,
    curve_strength: f32,
) -> Option<Position> {
    if curve_strength.is_nan() || curve_strength <= 0.0 {
        return None;
    }
    let chord = end - start;
    let chord_len = chord.length();
    if chord_len < MIN_CURVE_CHORD {
        return None;
    }

    let dir = chord * (1.0 / chord_len);
    let mid = start.lerp(end, 0.5);
    let side = if dir.cross(Position::COURT_CENTER - mid) < 0.0 { -1.0 } else { 1.0 };
    Some(mid + dir.perp() * (side * curve_strength * chord_len))
}

impl LockedPathDefinition {
    /// Same path, with a synthesized bend if it was authored straight.
    pub fn with_default_curve(&self, curve_strength: f32) -> Self {
        match self.curve {
            PathCurve::Quadratic { .. } => *self,
            PathCurve::Straight => {
                match compute_default_control_point(self.start, self.end, curve_strength) {
                    Some(control) => {
                        Self { curve: PathCurve::Quadratic { control }, ..*self }
                    }
                    None => *self,
                }
            }
        }
    }
}

// ============================================================================
// Arc-Length Table
// ============================================================================

/// One row of the arc-length table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSample {
    pub t: f32,
    /// Cumulative arc length up to this sample
    pub length: f32,
    pub position: Position,
    pub tangent: Position,
    /// Tangent rotated +90 degrees
    pub normal: Position,
    pub curvature: f32,
}

/// Result of a distance query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    /// Clamped query distance
    pub distance: f32,
    pub t: f32,
    pub position: Position,
    pub tangent: Position,
    pub normal: Position,
    pub curvature: f32,
}

/// A locked path with its precomputed arc-length table.
#[derive(Debug, Clone)]
pub struct MotionPath {
    definition: LockedPathDefinition,
    samples: Vec<PathSample>,
    length: f32,
}

impl MotionPath {
    /// Build with [`DEFAULT_SAMPLE_COUNT`] subdivisions.
    pub fn new(definition: LockedPathDefinition) -> Self {
        Self::build(definition, DEFAULT_SAMPLE_COUNT)
    }

    /// Sample `t` uniformly over `sample_count` subdivisions.
    ///
    /// `sample_count == 0` yields a single-sample (degenerate) table.
    pub fn build(definition: LockedPathDefinition, sample_count: usize) -> Self {
        let mut samples = Vec::with_capacity(sample_count + 1);
        let mut length = 0.0_f32;
        let mut prev: Option<Position> = None;

        for i in 0..=sample_count {
            let t = if sample_count == 0 { 0.0 } else { i as f32 / sample_count as f32 };
            let sample = sample_at(&definition, t, 0.0);
            if let Some(p) = prev {
                length += p.distance(sample.position);
            }
            prev = Some(sample.position);
            samples.push(PathSample { length, ..sample });
        }

        Self { definition, samples, length }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    #[inline]
    pub fn samples(&self) -> &[PathSample] {
        &self.samples
    }

    pub fn start(&self) -> Position {
        self.definition.start
    }

    pub fn end(&self) -> Position {
        self.definition.end
    }

    /// Position/tangent/normal/curvature at arc length `s`.
    pub fn point_at_distance(&self, s: f32) -> PathPoint {
        let first = &self.samples[0];
        if self.samples.len() < 2 || self.length <= DEGENERATE_LENGTH {
            return point_from_sample(first, 0.0);
        }

        let s = if s.is_finite() { s.clamp(0.0, self.length) } else { 0.0 };
        if s <= 0.0 {
            return point_from_sample(first, 0.0);
        }
        let last = &self.samples[self.samples.len() - 1];
        if s >= self.length {
            return point_from_sample(last, self.length);
        }

        // First sample strictly beyond s; s is interior so hi is in 1..len
        let hi = self.samples.partition_point(|sample| sample.length <= s);
        let hi = hi.clamp(1, self.samples.len() - 1);
        let lo = &self.samples[hi - 1];
        let hi = &self.samples[hi];

        let span = hi.length - lo.length;
        let frac = if span > DEGENERATE_LENGTH { (s - lo.length) / span } else { 0.0 };
        let t = lo.t + (hi.t - lo.t) * frac;

        let sample = sample_at(&self.definition, t, s);
        point_from_sample(&sample, s)
    }

    /// Largest curvature over `[from, to]`, checking both ends and the table rows between.
    ///
    /// The rows strictly inside the window are located by binary search.
    pub fn max_curvature_between(&self, from: f32, to: f32) -> f32 {
        if matches!(self.definition.curve, PathCurve::Straight) {
            return 0.0;
        }
        let a = self.point_at_distance(from);
        let b = self.point_at_distance(to);
        let lo = self.samples.partition_point(|sample| sample.length <= a.distance);
        let hi = self.samples.partition_point(|sample| sample.length < b.distance);
        self.samples
            .get(lo..hi)
            .unwrap_or_default()
            .iter()
            .fold(a.curvature.max(b.curvature), |best, sample| best.max(sample.curvature))
    }
}

fn sample_at(def: &LockedPathDefinition, t: f32, length: f32) -> PathSample {
    let tangent = unit_tangent(def.start, def.end, def.curve, t);
    PathSample {
        t,
        length,
        position: evaluate(def.start, def.end, def.curve, t),
        tangent,
        normal: tangent.perp(),
        curvature: curvature(def.start, def.end, def.curve, t),
    }
}

#[inline]
fn point_from_sample(sample: &PathSample, distance: f32) -> PathPoint {
    PathPoint {
        distance,
        t: sample.t,
        position: sample.position,
        tangent: sample.tangent,
        normal: sample.normal,
        curvature: sample.curvature,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
