//! Hard separation and anchor restoration.
//!
//! Both operate on the step's working buffer only; the committed positions
//! are untouched until the step finishes.

use crate::contracts::{Position, Role, RoleMap};

use super::constants::*;

/// Who absorbs the correction when two tokens overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relation {
    /// First role of the pair moves the whole overlap
    FirstYields,
    /// Second role of the pair moves the whole overlap
    SecondYields,
    /// Split 50/50
    Mutual,
}

/// Deterministic push axis for coincident tokens (no usable connecting line).
fn fallback_axis(i: usize, j: usize) -> Position {
    // golden angle spread keeps different pairs from sharing an axis
    let angle = (i * Role::COUNT + j) as f32 * 2.399_963;
    Position::new(angle.cos(), angle.sin())
}

/// One sweep over every unordered pair in `order`.
///
/// Returns how many pairs were corrected.
pub(crate) fn separate_once<F>(
    positions: &mut RoleMap<Position>,
    order: &[Role],
    hard_distance: f32,
    relation: &F,
) -> usize
where
    F: Fn(Role, Role) -> Relation,
{
    let mut corrected = 0;
    for i in 0..order.len() {
        for j in (i + 1)..order.len() {
            let (a, b) = (order[i], order[j]);
            let (Some(&pa), Some(&pb)) = (positions.get(a), positions.get(b)) else {
                continue;
            };

            let delta = pb - pa;
            let d = delta.length();
            if d >= hard_distance {
                continue;
            }
            let dir = if d > COINCIDENT_DISTANCE { delta * (1.0 / d) } else { fallback_axis(i, j) };
            let overlap = hard_distance - d + SEPARATION_SLOP;

            let (shift_a, shift_b) = match relation(a, b) {
                Relation::FirstYields => (overlap, 0.0),
                Relation::SecondYields => (0.0, overlap),
                Relation::Mutual => (overlap * 0.5, overlap * 0.5),
            };
            positions.set(a, pa - dir * shift_a);
            positions.set(b, pb + dir * shift_b);
            corrected += 1;
        }
    }
    corrected
}

/// Sweep until no pair overlaps.
///
/// Priority splits get up to `MAX_SEPARATION_SWEEPS` sweeps. Overlaps still
/// left after that (a mover hemmed in by settled roles) are split evenly for
/// up to as many again. Returns false if overlaps remain.
pub(crate) fn hard_separation<F>(
    positions: &mut RoleMap<Position>,
    order: &[Role],
    hard_distance: f32,
    relation: &F,
) -> bool
where
    F: Fn(Role, Role) -> Relation,
{
    for _ in 0..MAX_SEPARATION_SWEEPS {
        if separate_once(positions, order, hard_distance, relation) == 0 {
            return true;
        }
    }
    let even = |_: Role, _: Role| Relation::Mutual;
    for _ in 0..MAX_SEPARATION_SWEEPS {
        if separate_once(positions, order, hard_distance, &even) == 0 {
            return true;
        }
    }
    false
}

/// Exponential ease toward `anchor`, snapping once close enough.
#[inline]
pub(crate) fn ease_to_anchor(position: Position, anchor: Position, dt: f32) -> Position {
    let gain = 1.0 - (-ANCHOR_RESTORE_RATE * dt).exp();
    let next = position.lerp(anchor, gain);
    if next.distance(anchor) < ANCHOR_SNAP_DISTANCE {
        anchor
    } else {
        next
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
