//! # Motion Engine
//!
//! Per-frame stepper for one play (one animated rotation transition).
//!
//! ## Step phases
//! Every phase reads the frame-start snapshot and writes a working buffer;
//! the buffer is committed only at the end of the step.
//!
//! 1. Predict look-ahead positions for every role
//! 2. Speed planning (corner / proximity / stopping caps) + integration
//! 3. Lateral deflection (spring-damper along the path normal)
//! 4. Hard separation (sweeps until no pair overlaps)
//! 5. Anchor restoration for stationary and finished roles, then separation again
//! 6. Re-sync lateral offsets, commit
//!
//! Iteration always follows `role_order`; that order is what makes conflict
//! resolution deterministic.

mod agent;
mod separation;


use log::{debug, info, trace, warn};

use crate::contracts::{
    LockedPathDefinition, PathCurve, Position, Role, RoleMap, WhiteboardPlaySnapshot,
};
use crate::path::MotionPath;
use crate::priority::{role_order, role_priority, should_yield_to, YieldPolicy};
use crate::tuning::WhiteboardMotionTuning;

use agent::{AgentState, Conflict};
use separation::{ease_to_anchor, hard_separation, Relation};

// ============================================================================
// Constants
// ============================================================================

pub mod constants {
    /// dt clamp (seconds)
    pub const MIN_DT: f32 = 0.001;
    pub const MAX_DT: f32 = 0.2;

    /// Look-ahead scans at least this fraction of cruise speed
    pub const LOOK_AHEAD_MIN_SPEED_FRACTION: f32 = 0.35;

    /// Curvature below this is treated as straight
    pub const CORNER_CURVATURE_EPSILON: f32 = 1e-4;

    /// Corner cap never drops below this fraction of cruise speed
    pub const MIN_CORNER_SPEED_FRACTION: f32 = 0.2;

    /// Yielding never slows below this fraction of cruise speed
    pub const MIN_YIELD_SPEED_FRACTION: f32 = 0.15;

    /// Remaining distance at which an agent counts as arrived
    pub const ARRIVAL_EPSILON: f32 = 1e-5;

    /// Sweep cap per separation phase (and again for the even-split fallback)
    pub const MAX_SEPARATION_SWEEPS: usize = 16;

    /// Extra push so corrected pairs land just outside the hard distance
    pub const SEPARATION_SLOP: f32 = 1e-6;

    /// Below this two tokens have no usable connecting line
    pub const COINCIDENT_DISTANCE: f32 = 1e-6;

    /// Anchor restoration rate k in `1 - e^(-k·dt)` (1/s)
    pub const ANCHOR_RESTORE_RATE: f32 = 10.0;

    pub const ANCHOR_SNAP_DISTANCE: f32 = 1e-4;

    /// Completion tolerances
    pub const DONE_POSITION_EPSILON: f32 = 1e-3;
    pub const DONE_SEPARATION_SLACK: f32 = 1e-4;

    /// Settled roles blocked short of their anchors count as home once no
    /// token moves faster than this (court units/s)
    pub const REST_SPEED: f32 = 1e-3;
}

use constants::*;

#[inline]
fn clamp_dt(dt: f32) -> f32 {
    if dt.is_nan() {
        MIN_DT
    } else {
        dt.clamp(MIN_DT, MAX_DT)
    }
}

/// Drop non-finite geometry: bad endpoints make the role stationary,
/// a bad control point makes the path straight.
fn sanitize_definition(def: &LockedPathDefinition) -> Option<LockedPathDefinition> {
    if !def.start.is_finite() || !def.end.is_finite() {
        return None;
    }
    let mut def = *def;
    if let PathCurve::Quadratic { control } = def.curve {
        if !control.is_finite() {
            def.curve = PathCurve::Straight;
        }
    }
    Some(def)
}

// ============================================================================
// Engine
// ============================================================================

/// Path-following motion engine for one play.
///
/// `step` takes `&mut self`: one caller drives one engine.
#[derive(Debug, Clone)]
pub struct MotionEngine {
    tuning: WhiteboardMotionTuning,
    policy: YieldPolicy,
    role_order: Vec<Role>,
    order_index: RoleMap<usize>,
    agents: RoleMap<AgentState>,
    /// Reference position per role: path end for movers, start for stationary roles
    anchors: RoleMap<Position>,
    positions: RoleMap<Position>,
    elapsed: f32,
    /// Fastest token displacement rate in the last step, if any step ran
    last_motion: Option<f32>,
    done: bool,
}

impl MotionEngine {
    /// Build with the default yield policy (lower priority value leads).
    pub fn new(
        roles: &[Role],
        start_positions: &RoleMap<Position>,
        paths: &[LockedPathDefinition],
        tuning: &WhiteboardMotionTuning,
    ) -> Self {
        Self::with_policy(roles, start_positions, paths, tuning, YieldPolicy::default())
    }

    pub fn with_policy(
        roles: &[Role],
        start_positions: &RoleMap<Position>,
        paths: &[LockedPathDefinition],
        tuning: &WhiteboardMotionTuning,
        policy: YieldPolicy,
    ) -> Self {
        let tuning = tuning.sanitize();
        let role_order = role_order(roles);
        let order_index: RoleMap<usize> =
            role_order.iter().enumerate().map(|(i, role)| (*role, i)).collect();

        let mut agents: RoleMap<AgentState> = RoleMap::new();
        for def in paths {
            if !order_index.contains(def.role) {
                warn!("Ignoring path for {}: role is not in the active roster", def.role);
                continue;
            }
            let Some(def) = sanitize_definition(def) else {
                warn!("Ignoring path for {}: non-finite endpoints", def.role);
                continue;
            };
            let state = AgentState::new(def.role, MotionPath::new(def));
            if agents.set(def.role, state).is_some() {
                warn!("Duplicate path for {}; keeping the last one", def.role);
            }
        }

        let mut positions = RoleMap::new();
        let mut anchors = RoleMap::new();
        for &role in &role_order {
            let start = start_positions
                .get(role)
                .copied()
                .filter(|p| p.is_finite())
                .or_else(|| agents.get(role).map(|a| a.path.start()))
                .unwrap_or(Position::COURT_CENTER);
            positions.set(role, start);
            anchors.set(role, agents.get(role).map_or(start, |a| a.path.end()));
        }

        let mut engine = Self {
            tuning,
            policy,
            role_order,
            order_index,
            agents,
            anchors,
            positions,
            elapsed: 0.0,
            last_motion: None,
            done: false,
        };
        engine.done = engine.compute_done();

        debug!(
            "MotionEngine: {} roles ({} moving), order={:?}, hard_distance={:.4}, policy={:?}",
            engine.role_order.len(),
            engine.agents.len(),
            engine.role_order.iter().map(|r| r.code()).collect::<Vec<_>>(),
            engine.hard_distance(),
            policy,
        );
        engine
    }

    // ========== Accessors ==========

    pub fn tuning(&self) -> &WhiteboardMotionTuning {
        &self.tuning
    }

    pub fn role_order(&self) -> &[Role] {
        &self.role_order
    }

    pub fn hard_distance(&self) -> f32 {
        self.tuning.hard_distance()
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn position(&self, role: Role) -> Option<Position> {
        self.positions.get(role).copied()
    }

    pub fn anchor(&self, role: Role) -> Option<Position> {
        self.anchors.get(role).copied()
    }

    pub fn path(&self, role: Role) -> Option<&MotionPath> {
        self.agents.get(role).map(|a| &a.path)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Current frame without advancing time.
    pub fn snapshot(&self) -> WhiteboardPlaySnapshot {
        WhiteboardPlaySnapshot {
            positions: self.positions.clone(),
            agents: self
                .role_order
                .iter()
                .filter_map(|role| self.agents.get(*role))
                .map(AgentState::telemetry)
                .collect(),
            done: self.done,
            elapsed: self.elapsed,
        }
    }

    // ========== Yield Relation ==========

    fn is_moving(&self, role: Role) -> bool {
        self.agents.get(role).is_some_and(|a| !a.done)
    }

    /// Does `a` give way to `b` right now?
    ///
    /// Movers give way to settled roles; settled roles never yield; two movers
    /// go through the priority policy.
    fn yields_to(&self, a: Role, b: Role) -> bool {
        if a == b {
            return false;
        }
        match (self.is_moving(a), self.is_moving(b)) {
            (true, false) => true,
            (false, _) => false,
            (true, true) => {
                let (Some(&ia), Some(&ib)) = (self.order_index.get(a), self.order_index.get(b))
                else {
                    return false;
                };
                should_yield_to(self.policy, role_priority(a), ia, role_priority(b), ib)
            }
        }
    }

    fn relation(&self, a: Role, b: Role) -> Relation {
        if self.yields_to(a, b) {
            Relation::FirstYields
        } else if self.yields_to(b, a) {
            Relation::SecondYields
        } else {
            Relation::Mutual
        }
    }

    // ========== Stepping ==========

    /// Advance the play by `dt` seconds (clamped to [1ms, 200ms]).
    ///
    /// Once the play is done this returns the same snapshot forever.
    pub fn step(&mut self, dt: f32) -> WhiteboardPlaySnapshot {
        if self.done {
            return self.snapshot();
        }
        let dt = clamp_dt(dt);
        self.elapsed += dt;

        // ========== Phase 1: frame-start snapshot ==========
        let current = self.positions.clone();
        let predicted = self.predict_positions(&current);
        let mut working = current.clone();

        // Who yields to whom is fixed for the whole movement phase
        let mut conflict_roles: RoleMap<Vec<Role>> = RoleMap::new();
        for &role in &self.role_order {
            if !self.is_moving(role) {
                continue;
            }
            let targets: Vec<Role> = self
                .role_order
                .iter()
                .copied()
                .filter(|other| self.yields_to(role, *other))
                .collect();
            conflict_roles.set(role, targets);
        }

        // ========== Phase 2: speed planning, integration, deflection ==========
        let hard = self.hard_distance();
        for i in 0..self.role_order.len() {
            let role = self.role_order[i];
            let Some(targets) = conflict_roles.get(role) else {
                continue;
            };
            let (Some(&own_current), Some(&own_predicted)) =
                (current.get(role), predicted.get(role))
            else {
                continue;
            };
            let conflicts: Vec<Conflict> = targets
                .iter()
                .filter_map(|other| {
                    let now = *current.get(*other)?;
                    let ahead = predicted.get(*other).copied().unwrap_or(now);
                    Some(Conflict { current: now, predicted: ahead })
                })
                .collect();

            let tuning = &self.tuning;
            let Some(agent) = self.agents.get_mut(role) else {
                continue;
            };
            agent.plan_speed(tuning, own_current, own_predicted, &conflicts);
            agent.integrate(tuning, dt);
            let mut placed = agent.deflect(tuning, dt, own_current, own_predicted, &conflicts);

            // Still inside a yielded-to token: step back out along the line between them
            for conflict in &conflicts {
                let away = placed - conflict.current;
                let d = away.length();
                if d < hard && d > COINCIDENT_DISTANCE {
                    placed = conflict.current + away * ((hard + SEPARATION_SLOP) / d);
                }
            }

            trace!(
                "{} d={:.4}/{:.4} v={:.3} target={:.3} lat={:.4}",
                role,
                agent.distance,
                agent.path.length(),
                agent.speed,
                agent.target_speed,
                agent.lateral_offset,
            );
            working.set(role, placed);
        }

        // ========== Phase 3: hard separation ==========
        let relation = |a: Role, b: Role| self.relation(a, b);
        if !hard_separation(&mut working, &self.role_order, hard, &relation) {
            debug!("Separation left overlaps after movement at t={:.3}", self.elapsed);
        }

        // ========== Phase 4: anchor restoration ==========
        for &role in &self.role_order {
            if self.is_moving(role) {
                continue;
            }
            let (Some(&pos), Some(&anchor)) = (working.get(role), self.anchors.get(role)) else {
                continue;
            };
            working.set(role, ease_to_anchor(pos, anchor, dt));
        }
        if !hard_separation(&mut working, &self.role_order, hard, &relation) {
            debug!("Separation left overlaps after restoration at t={:.3}", self.elapsed);
        }

        // ========== Phase 5: sync offsets, commit ==========
        for &role in &self.role_order {
            let Some(&pos) = working.get(role) else {
                continue;
            };
            if let Some(agent) = self.agents.get_mut(role) {
                agent.sync_offset(&self.tuning, pos);
            }
        }
        let moved = self
            .role_order
            .iter()
            .filter_map(|role| Some(working.get(*role)?.distance(*current.get(*role)?)))
            .fold(0.0_f32, f32::max);
        self.last_motion = Some(moved / dt);
        self.positions = working;
        self.done = self.compute_done();
        if self.done {
            info!("Play complete after {:.3}s", self.elapsed);
        }

        self.snapshot()
    }

    /// Look-ahead position per role; settled roles stay where they are.
    fn predict_positions(&self, current: &RoleMap<Position>) -> RoleMap<Position> {
        let mut predicted = RoleMap::new();
        for &role in &self.role_order {
            let Some(&now) = current.get(role) else {
                continue;
            };
            let ahead = match self.agents.get(role) {
                Some(agent) if !agent.done => agent.predicted_position(&self.tuning),
                _ => now,
            };
            predicted.set(role, ahead);
        }
        predicted
    }

    /// All movers arrived, nobody overlapping, and everyone home (or held
    /// off their anchor by a neighbor and no longer moving).
    fn compute_done(&self) -> bool {
        if self.agents.iter().any(|(_, agent)| !agent.done) {
            return false;
        }

        let limit = self.hard_distance() - DONE_SEPARATION_SLACK;
        for i in 0..self.role_order.len() {
            for j in (i + 1)..self.role_order.len() {
                let (Some(&a), Some(&b)) = (
                    self.positions.get(self.role_order[i]),
                    self.positions.get(self.role_order[j]),
                ) else {
                    continue;
                };
                if a.distance(b) < limit {
                    return false;
                }
            }
        }

        let home = self.role_order.iter().all(|role| {
            match (self.positions.get(*role), self.anchors.get(*role)) {
                (Some(pos), Some(anchor)) => pos.distance(*anchor) <= DONE_POSITION_EPSILON,
                _ => true,
            }
        });
        home || self.last_motion.is_some_and(|speed| speed < REST_SPEED)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> Position {
        Position::new(x, y)
    }

    fn starts(entries: &[(Role, Position)]) -> RoleMap<Position> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_clamp_dt() {
        assert_eq!(clamp_dt(0.0), MIN_DT);
        assert_eq!(clamp_dt(-1.0), MIN_DT);
        assert_eq!(clamp_dt(f32::NAN), MIN_DT);
        assert_eq!(clamp_dt(f32::INFINITY), MAX_DT);
        assert_eq!(clamp_dt(1.0), MAX_DT);
        assert_eq!(clamp_dt(0.016), 0.016);
    }

    #[test]
    fn test_only_anchors_is_done_immediately() {
        let roles = [Role::Setter, Role::Libero];
        let engine = MotionEngine::new(
            &roles,
            &starts(&[(Role::Setter, p(0.2, 0.2)), (Role::Libero, p(0.8, 0.8))]),
            &[],
            &WhiteboardMotionTuning::default(),
        );
        assert!(engine.is_done());
        assert!(engine.snapshot().agents.is_empty());
    }

    #[test]
    fn test_path_for_unknown_role_is_ignored() {
        let roles = [Role::Setter];
        let paths = [LockedPathDefinition::straight(Role::Opposite, p(0.1, 0.1), p(0.5, 0.5))];
        let engine = MotionEngine::new(
            &roles,
            &starts(&[(Role::Setter, p(0.2, 0.2))]),
            &paths,
            &WhiteboardMotionTuning::default(),
        );
        assert!(engine.path(Role::Opposite).is_none());
        assert!(engine.position(Role::Opposite).is_none());
    }

    #[test]
    fn test_duplicate_path_keeps_last() {
        let roles = [Role::Setter];
        let paths = [
            LockedPathDefinition::straight(Role::Setter, p(0.1, 0.1), p(0.5, 0.5)),
            LockedPathDefinition::straight(Role::Setter, p(0.1, 0.1), p(0.9, 0.1)),
        ];
        let engine =
            MotionEngine::new(&roles, &RoleMap::new(), &paths, &WhiteboardMotionTuning::default());
        assert_eq!(engine.path(Role::Setter).unwrap().end(), p(0.9, 0.1));
        assert_eq!(engine.anchor(Role::Setter), Some(p(0.9, 0.1)));
        // No explicit start: begins at the path start
        assert_eq!(engine.position(Role::Setter), Some(p(0.1, 0.1)));
    }

    #[test]
    fn test_non_finite_path_makes_role_stationary() {
        let roles = [Role::Setter];
        let paths = [LockedPathDefinition::straight(Role::Setter, p(f32::NAN, 0.1), p(0.5, 0.5))];
        let engine = MotionEngine::new(
            &roles,
            &starts(&[(Role::Setter, p(0.3, 0.3))]),
            &paths,
            &WhiteboardMotionTuning::default(),
        );
        assert!(engine.path(Role::Setter).is_none());
        assert!(engine.is_done());
    }

    #[test]
    fn test_tuning_is_resanitized() {
        let mut tuning = WhiteboardMotionTuning::default();
        tuning.cruise_speed = 100.0;
        let engine = MotionEngine::new(&[Role::Setter], &RoleMap::new(), &[], &tuning);
        assert_eq!(engine.tuning().cruise_speed, 2.0);
    }

    #[test]
    fn test_step_advances_elapsed_by_clamped_dt() {
        let roles = [Role::Setter];
        let paths = [LockedPathDefinition::straight(Role::Setter, p(0.1, 0.5), p(0.9, 0.5))];
        let mut engine =
            MotionEngine::new(&roles, &RoleMap::new(), &paths, &WhiteboardMotionTuning::default());
        engine.step(5.0);
        assert!((engine.elapsed() - MAX_DT).abs() < 1e-6);
        engine.step(-3.0);
        assert!((engine.elapsed() - MAX_DT - MIN_DT).abs() < 1e-6);
    }

    #[test]
    fn test_overlapping_anchors_are_split_evenly() {
        let roles = [Role::Setter, Role::Libero];
        let engine_start = starts(&[(Role::Setter, p(0.5, 0.5)), (Role::Libero, p(0.52, 0.5))]);
        let mut engine =
            MotionEngine::new(&roles, &engine_start, &[], &WhiteboardMotionTuning::default());
        assert!(!engine.is_done());

        let snap = engine.step(1.0 / 60.0);
        let s = *snap.positions.get(Role::Setter).unwrap();
        let l = *snap.positions.get(Role::Libero).unwrap();
        assert!(s.distance(l) >= engine.hard_distance() - 1e-5);
        assert!(((0.5 - s.x) - (l.x - 0.52)).abs() < 1e-4);
    }

    #[test]
    fn test_mover_yields_to_anchor_in_relation() {
        let roles = [Role::Setter, Role::DefensiveSpecialist];
        let paths =
            [LockedPathDefinition::straight(Role::DefensiveSpecialist, p(0.1, 0.5), p(0.9, 0.5))];
        let engine = MotionEngine::new(
            &roles,
            &starts(&[(Role::Setter, p(0.5, 0.2))]),
            &paths,
            &WhiteboardMotionTuning::default(),
        );
        assert!(engine.yields_to(Role::DefensiveSpecialist, Role::Setter));
        assert!(!engine.yields_to(Role::Setter, Role::DefensiveSpecialist));
        assert_eq!(
            engine.relation(Role::Setter, Role::DefensiveSpecialist),
            Relation::SecondYields
        );
    }

    #[test]
    fn test_policy_flips_mover_yield() {
        let roles = [Role::Setter, Role::MiddleBlocker1];
        let paths = [
            LockedPathDefinition::straight(Role::Setter, p(0.1, 0.5), p(0.9, 0.5)),
            LockedPathDefinition::straight(Role::MiddleBlocker1, p(0.5, 0.1), p(0.5, 0.9)),
        ];
        let tuning = WhiteboardMotionTuning::default();
        let lower = MotionEngine::new(&roles, &RoleMap::new(), &paths, &tuning);
        assert!(lower.yields_to(Role::MiddleBlocker1, Role::Setter));

        let higher = MotionEngine::with_policy(
            &roles,
            &RoleMap::new(),
            &paths,
            &tuning,
            YieldPolicy::HigherValueLeads,
        );
        assert!(higher.yields_to(Role::Setter, Role::MiddleBlocker1));
    }
}
