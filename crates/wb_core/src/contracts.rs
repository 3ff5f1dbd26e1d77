//! Data contracts shared by the engine and its collaborators.
//!
//! ## Coordinate System
//! All positions live in normalized court space: `x` and `y` in `0.0..=1.0`.
//! No unit conversion happens inside the core; the editor and the renderer
//! own the mapping to pixels or meters.
//!
//! ## Role Storage
//! Per-role data is kept in [`RoleMap`], a fixed array indexed by [`Role`]
//! with an explicit unset slot, so the per-frame loop never touches a hash map.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::PlayError;

// ============================================================================
// Position
// ============================================================================

/// A point (or vector) in normalized court coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ZERO: Position = Position { x: 0.0, y: 0.0 };

    /// Court center; default curves bend toward it.
    pub const COURT_CENTER: Position = Position { x: 0.5, y: 0.5 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[inline]
    pub fn distance(self, other: Position) -> f32 {
        (other - self).length()
    }

    #[inline]
    pub fn dot(self, other: Position) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// 2D cross product (z component of the 3D cross).
    #[inline]
    pub fn cross(self, other: Position) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Rotated +90 degrees.
    #[inline]
    pub fn perp(self) -> Position {
        Position::new(-self.y, self.x)
    }

    /// Unit vector, or zero when the length is ~0.
    #[inline]
    pub fn normalized(self) -> Position {
        let len = self.length();
        if len < 1e-6 {
            Position::ZERO
        } else {
            Position::new(self.x / len, self.y / len)
        }
    }

    #[inline]
    pub fn lerp(self, other: Position, t: f32) -> Position {
        self + (other - self) * t
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Clamp both axes into `[min, max]`.
    #[inline]
    pub fn clamped(self, min: f32, max: f32) -> Position {
        Position::new(self.x.clamp(min, max), self.y.clamp(min, max))
    }
}

impl Add for Position {
    type Output = Position;
    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;
    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Position {
    type Output = Position;
    fn mul(self, rhs: f32) -> Position {
        Position::new(self.x * rhs, self.y * rhs)
    }
}

// ============================================================================
// Role
// ============================================================================

/// Volleyball roster slot shown on the rotation diagram.
///
/// Serialized as its diagram code; codes parse case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Role {
    Setter,
    OutsideHitter1,
    OutsideHitter2,
    MiddleBlocker1,
    MiddleBlocker2,
    Opposite,
    Libero,
    DefensiveSpecialist,
}

impl Role {
    pub const COUNT: usize = 8;

    pub const ALL: [Role; Role::COUNT] = [
        Role::Setter,
        Role::OutsideHitter1,
        Role::OutsideHitter2,
        Role::MiddleBlocker1,
        Role::MiddleBlocker2,
        Role::Opposite,
        Role::Libero,
        Role::DefensiveSpecialist,
    ];

    /// Slot index into a [`RoleMap`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short code used on the diagram and in JSON.
    pub const fn code(self) -> &'static str {
        match self {
            Role::Setter => "S",
            Role::OutsideHitter1 => "OH1",
            Role::OutsideHitter2 => "OH2",
            Role::MiddleBlocker1 => "MB1",
            Role::MiddleBlocker2 => "MB2",
            Role::Opposite => "OPP",
            Role::Libero => "L",
            Role::DefensiveSpecialist => "DS",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Role {
    type Err = PlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| PlayError::UnknownRole(code.to_string()))
    }
}

impl TryFrom<String> for Role {
    type Error = PlayError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        code.parse()
    }
}

impl From<Role> for &'static str {
    fn from(role: Role) -> Self {
        role.code()
    }
}

// ============================================================================
// RoleMap
// ============================================================================

/// Fixed-size per-role storage. Unset slots are `None`.
///
/// Iteration follows `Role::ALL` declaration order; the engine never relies
/// on it for conflict resolution (that is `role_order`'s job).
#[derive(Debug, Clone, PartialEq)]
pub struct RoleMap<T> {
    slots: [Option<T>; Role::COUNT],
}

impl<T> RoleMap<T> {
    pub fn new() -> Self {
        Self { slots: std::array::from_fn(|_| None) }
    }

    #[inline]
    pub fn get(&self, role: Role) -> Option<&T> {
        self.slots[role.index()].as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, role: Role) -> Option<&mut T> {
        self.slots[role.index()].as_mut()
    }

    /// Store a value, returning the previous one.
    #[inline]
    pub fn set(&mut self, role: Role, value: T) -> Option<T> {
        self.slots[role.index()].replace(value)
    }

    #[inline]
    pub fn contains(&self, role: Role) -> bool {
        self.slots[role.index()].is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
        Role::ALL
            .iter()
            .zip(self.slots.iter())
            .filter_map(|(role, slot)| slot.as_ref().map(|value| (*role, value)))
    }
}

impl<T> Default for RoleMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(Role, T)> for RoleMap<T> {
    fn from_iter<I: IntoIterator<Item = (Role, T)>>(iter: I) -> Self {
        let mut map = RoleMap::new();
        for (role, value) in iter {
            map.set(role, value);
        }
        map
    }
}

impl<T: Serialize> Serialize for RoleMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (role, value) in self.iter() {
            map.serialize_entry(&role, value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for RoleMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<Role, T>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

// ============================================================================
// Path Definitions
// ============================================================================

/// Shape of an authored path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCurve {
    /// Straight segment from start to end.
    Straight,
    /// Quadratic Bézier through the given control point.
    Quadratic { control: Position },
}

impl PathCurve {
    pub fn control(self) -> Option<Position> {
        match self {
            PathCurve::Straight => None,
            PathCurve::Quadratic { control } => Some(control),
        }
    }
}

/// A movement arrow as locked in by the editor.
///
/// JSON form: `{"role": "OH1", "start": {..}, "end": {..}, "control": {..} | null}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PathDefinitionRepr", into = "PathDefinitionRepr")]
pub struct LockedPathDefinition {
    pub role: Role,
    pub start: Position,
    pub end: Position,
    pub curve: PathCurve,
}

impl LockedPathDefinition {
    pub fn straight(role: Role, start: Position, end: Position) -> Self {
        Self { role, start, end, curve: PathCurve::Straight }
    }

    pub fn quadratic(role: Role, start: Position, control: Position, end: Position) -> Self {
        Self { role, start, end, curve: PathCurve::Quadratic { control } }
    }
}

#[derive(Serialize, Deserialize)]
struct PathDefinitionRepr {
    role: Role,
    start: Position,
    end: Position,
    #[serde(default)]
    control: Option<Position>,
}

impl From<PathDefinitionRepr> for LockedPathDefinition {
    fn from(repr: PathDefinitionRepr) -> Self {
        let curve = match repr.control {
            Some(control) => PathCurve::Quadratic { control },
            None => PathCurve::Straight,
        };
        Self { role: repr.role, start: repr.start, end: repr.end, curve }
    }
}

impl From<LockedPathDefinition> for PathDefinitionRepr {
    fn from(def: LockedPathDefinition) -> Self {
        Self { role: def.role, start: def.start, end: def.end, control: def.curve.control() }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Per-agent telemetry for a moving role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTelemetry {
    pub role: Role,
    /// Arc length travelled along the path
    pub distance: f32,
    /// Total arc length of the path
    pub length: f32,
    /// distance / length (1.0 for zero-length paths)
    pub progress: f32,
    pub speed: f32,
    pub target_speed: f32,
    pub done: bool,
    /// Signed offset along the path normal
    pub lateral_offset: f32,
}

/// Engine output for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteboardPlaySnapshot {
    pub positions: RoleMap<Position>,
    /// Moving agents, in role order
    pub agents: Vec<AgentTelemetry>,
    pub done: bool,
    /// Simulated seconds since the play started
    pub elapsed: f32,
}

impl WhiteboardPlaySnapshot {
    pub fn agent(&self, role: Role) -> Option<&AgentTelemetry> {
        self.agents.iter().find(|agent| agent.role == role)
    }

    /// Smallest pairwise distance between any two placed roles.
    pub fn min_pair_distance(&self) -> Option<f32> {
        let placed: Vec<Position> = self.positions.iter().map(|(_, p)| *p).collect();
        let mut best: Option<f32> = None;
        for i in 0..placed.len() {
            for j in (i + 1)..placed.len() {
                let d = placed[i].distance(placed[j]);
                best = Some(best.map_or(d, |b| b.min(d)));
            }
        }
        best
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
