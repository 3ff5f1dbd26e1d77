//! Play setup documents.
//!
//! A `PlaySetup` is what the diagram editor hands over when the user presses
//! play: the roster, where each token starts, the locked arrows and the
//! tuning in effect.
//!
//! ```json
//! {
//!   "roles": ["S", "OH1", "L"],
//!   "positions": { "S": {"x": 0.8, "y": 0.7}, "L": {"x": 0.5, "y": 0.2} },
//!   "paths": [
//!     { "role": "OH1", "start": {"x": 0.2, "y": 0.7}, "end": {"x": 0.1, "y": 0.3} }
//!   ],
//!   "tuning": { "cruise_speed": 0.4 },
//!   "auto_curve": true
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::contracts::{LockedPathDefinition, PathCurve, Position, Role, RoleMap};
use crate::engine::MotionEngine;
use crate::error::{PlayError, Result};
use crate::priority::YieldPolicy;
use crate::tuning::WhiteboardMotionTuning;

/// Everything needed to construct a [`MotionEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaySetup {
    pub roles: Vec<Role>,
    #[serde(default)]
    pub positions: RoleMap<Position>,
    #[serde(default)]
    pub paths: Vec<LockedPathDefinition>,
    #[serde(default)]
    pub tuning: WhiteboardMotionTuning,
    /// Bend straight arrows toward the court center (`tuning.curve_strength`)
    #[serde(default)]
    pub auto_curve: bool,
}

impl PlaySetup {
    pub fn new(roles: Vec<Role>) -> Self {
        Self {
            roles,
            positions: RoleMap::new(),
            paths: Vec::new(),
            tuning: WhiteboardMotionTuning::default(),
            auto_curve: false,
        }
    }

    pub fn with_position(mut self, role: Role, position: Position) -> Self {
        self.positions.set(role, position);
        self
    }

    pub fn with_path(mut self, path: LockedPathDefinition) -> Self {
        self.paths.push(path);
        self
    }

    pub fn with_tuning(mut self, tuning: WhiteboardMotionTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Parse and sanitize a setup document. Rejects an empty roster.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut setup: PlaySetup = serde_json::from_str(json)?;
        if setup.roles.is_empty() {
            return Err(PlayError::EmptyRoster);
        }
        setup.tuning = setup.tuning.sanitize();
        Ok(setup)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Paths as the engine will see them.
    pub fn resolved_paths(&self) -> Vec<LockedPathDefinition> {
        if !self.auto_curve {
            return self.paths.clone();
        }
        let strength = self.tuning.sanitize().curve_strength;
        self.paths
            .iter()
            .map(|path| match path.curve {
                PathCurve::Straight => path.with_default_curve(strength),
                PathCurve::Quadratic { .. } => *path,
            })
            .collect()
    }

    pub fn build_engine(&self, policy: YieldPolicy) -> MotionEngine {
        MotionEngine::with_policy(
            &self.roles,
            &self.positions,
            &self.resolved_paths(),
            &self.tuning,
            policy,
        )
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
