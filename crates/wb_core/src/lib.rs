//! # wb_core - Rotation Whiteboard Motion Engine
//!
//! Animates player tokens along user-authored paths on a rotation diagram.
//!
//! ## Features
//! - Arc-length parameterized paths (straight or quadratic), O(log n) lookups
//! - Corner / stopping / proximity speed planning per agent
//! - Priority-based yielding with spring-damped lateral deflection
//! - Hard separation pass: no two tokens overlap after a step
//! - 100% deterministic stepping (same inputs + same dt sequence = same frames)
//!
//! The engine is driven by an external render loop:
//!
//! ```rust
//! use wb_core::{
//!     LockedPathDefinition, MotionEngine, Position, Role, RoleMap, WhiteboardMotionTuning,
//! };
//!
//! let roles = [Role::Setter, Role::Libero];
//! let mut starts = RoleMap::new();
//! starts.set(Role::Setter, Position::new(0.2, 0.8));
//! starts.set(Role::Libero, Position::new(0.5, 0.2));
//! let paths = [LockedPathDefinition::straight(
//!     Role::Setter,
//!     Position::new(0.2, 0.8),
//!     Position::new(0.6, 0.6),
//! )];
//!
//! let mut engine = MotionEngine::new(&roles, &starts, &paths, &WhiteboardMotionTuning::default());
//! while !engine.is_done() {
//!     let frame = engine.step(1.0 / 60.0);
//!     assert!(frame.positions.get(Role::Setter).is_some());
//! }
//! ```

// Engine APIs often take several parameter bags
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod contracts;
pub mod driver;
pub mod engine;
pub mod error;
pub mod path;
pub mod priority;
pub mod setup;
pub mod tuning;

pub use contracts::{
    AgentTelemetry, LockedPathDefinition, PathCurve, Position, Role, RoleMap,
    WhiteboardPlaySnapshot,
};
pub use driver::{run_to_completion, PlayRun, DEFAULT_FRAME_DT};
pub use engine::MotionEngine;
pub use error::{PlayError, Result};
pub use path::{compute_default_control_point, MotionPath, PathPoint, DEFAULT_SAMPLE_COUNT};
pub use priority::{role_order, role_priority, should_yield_to, YieldPolicy};
pub use setup::PlaySetup;
pub use tuning::WhiteboardMotionTuning;
