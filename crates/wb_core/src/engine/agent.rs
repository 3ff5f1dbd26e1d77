//! Per-agent state and the single-agent phases of a step:
//! speed planning, speed/distance integration and lateral deflection.

use crate::contracts::{AgentTelemetry, Position, Role};
use crate::path::MotionPath;
use crate::tuning::WhiteboardMotionTuning;

use super::constants::*;

/// Another role this agent gives way to, as seen at the start of the step.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Conflict {
    pub current: Position,
    pub predicted: Position,
}

/// Closest approach to a conflict (now vs look-ahead) and the away vector at that moment.
fn closest_approach(
    own_current: Position,
    own_predicted: Position,
    c: &Conflict,
) -> (f32, Position) {
    let now = own_current.distance(c.current);
    let ahead = own_predicted.distance(c.predicted);
    if ahead < now {
        (ahead, own_predicted - c.predicted)
    } else {
        (now, own_current - c.current)
    }
}

/// Fastest speed from which braking `braking·dt` per frame still stops
/// within `remaining`: solves `v·(v + braking·dt) = 2·braking·remaining`.
///
/// At this speed the next frame's bound is exactly one braking step lower,
/// so an agent riding it arrives slower than `2·braking·dt`.
#[inline]
fn stopping_speed(braking: f32, dt: f32, remaining: f32) -> f32 {
    let step = braking * dt;
    0.5 * ((step * step + 8.0 * braking * remaining).sqrt() - step)
}

#[inline]
fn urgency(soft: f32, distance: f32) -> f32 {
    if soft <= 0.0 {
        return 0.0;
    }
    ((soft - distance) / soft).clamp(0.0, 1.0)
}

/// Moving agent. `distance` only grows while `done` is false.
#[derive(Debug, Clone)]
pub(crate) struct AgentState {
    pub role: Role,
    pub path: MotionPath,
    pub distance: f32,
    pub speed: f32,
    pub target_speed: f32,
    pub lateral_offset: f32,
    pub lateral_velocity: f32,
    pub done: bool,
}

impl AgentState {
    pub fn new(role: Role, path: MotionPath) -> Self {
        Self {
            role,
            path,
            distance: 0.0,
            speed: 0.0,
            target_speed: 0.0,
            lateral_offset: 0.0,
            lateral_velocity: 0.0,
            done: false,
        }
    }

    #[inline]
    pub fn remaining(&self) -> f32 {
        (self.path.length() - self.distance).max(0.0)
    }

    pub fn look_ahead_distance(&self, tuning: &WhiteboardMotionTuning) -> f32 {
        let scan_speed = self.speed.max(tuning.cruise_speed * LOOK_AHEAD_MIN_SPEED_FRACTION);
        self.distance + scan_speed * tuning.look_ahead_time
    }

    /// Where this agent expects to be after `look_ahead_time`.
    pub fn predicted_position(&self, tuning: &WhiteboardMotionTuning) -> Position {
        let point = self.path.point_at_distance(self.look_ahead_distance(tuning));
        point.position + point.normal * self.lateral_offset
    }

    /// Target speed from the corner, proximity and stopping caps.
    pub fn plan_speed(
        &mut self,
        tuning: &WhiteboardMotionTuning,
        own_current: Position,
        own_predicted: Position,
        conflicts: &[Conflict],
    ) {
        let cruise = tuning.cruise_speed;
        let mut target = cruise;

        // Corner cap over [now, look-ahead]
        let kappa = self
            .path
            .max_curvature_between(self.distance, self.look_ahead_distance(tuning));
        if kappa > CORNER_CURVATURE_EPSILON {
            let cap = (tuning.max_lateral_accel / kappa).sqrt();
            target = target.min(cap.max(cruise * MIN_CORNER_SPEED_FRACTION));
        }

        // Proximity cap against everyone we yield to
        let soft = tuning.soft_distance();
        let floor = cruise * MIN_YIELD_SPEED_FRACTION;
        for conflict in conflicts {
            let (d, _) = closest_approach(own_current, own_predicted, conflict);
            if d >= soft {
                continue;
            }
            let u = urgency(soft, d);
            let reduced = target * (1.0 - u * (1.0 - tuning.avoidance_blend));
            target = target.min(reduced.max(floor));
        }

        // Stopping cap last: always able to brake to 0 at the path end
        let stop_cap = (2.0 * tuning.braking * self.remaining()).sqrt();
        target = target.min(stop_cap);

        self.target_speed = target.max(0.0);
    }

    /// Asymmetric first-order speed response, then distance integration.
    pub fn integrate(&mut self, tuning: &WhiteboardMotionTuning, dt: f32) {
        if self.speed < self.target_speed {
            self.speed = (self.speed + tuning.acceleration * dt).min(self.target_speed);
        } else {
            self.speed = (self.speed - tuning.braking * dt).max(self.target_speed);
        }
        self.speed = self.speed.min(stopping_speed(tuning.braking, dt, self.remaining()));

        let length = self.path.length();
        self.distance = (self.distance + self.speed * dt).min(length);
        if length - self.distance <= ARRIVAL_EPSILON {
            self.distance = length;
            self.done = true;
            self.speed = 0.0;
            self.target_speed = 0.0;
        }
    }

    /// Spring-damped lateral offset; returns the placed position.
    pub fn deflect(
        &mut self,
        tuning: &WhiteboardMotionTuning,
        dt: f32,
        own_current: Position,
        own_predicted: Position,
        conflicts: &[Conflict],
    ) -> Position {
        let point = self.path.point_at_distance(self.distance);
        let max_offset = tuning.max_lateral_offset();
        let soft = tuning.soft_distance();

        let mut desired = 0.0;
        if !self.done {
            for conflict in conflicts {
                let (d, away) = closest_approach(own_current, own_predicted, conflict);
                if d >= soft {
                    continue;
                }
                let side = if away.dot(point.normal) < 0.0 { -1.0 } else { 1.0 };
                desired += side
                    * urgency(soft, d)
                    * tuning.deflection_strength
                    * max_offset
                    * tuning.avoidance_blend;
            }
        }
        let desired = desired.clamp(-max_offset, max_offset);

        self.lateral_velocity += (desired - self.lateral_offset) * tuning.deflection_spring * dt;
        self.lateral_velocity *= (1.0 - tuning.deflection_damping * dt).max(0.0);
        self.lateral_offset += self.lateral_velocity * dt;
        if self.lateral_offset.abs() > max_offset {
            self.lateral_offset = self.lateral_offset.clamp(-max_offset, max_offset);
            self.lateral_velocity = 0.0;
        }

        let margin = tuning.clamp_margin;
        (point.position + point.normal * self.lateral_offset).clamped(-margin, 1.0 + margin)
    }

    /// Re-derive the offset from a corrected position so the next step
    /// starts where the token actually is.
    pub fn sync_offset(&mut self, tuning: &WhiteboardMotionTuning, position: Position) {
        let point = self.path.point_at_distance(self.distance);
        let max_offset = tuning.max_lateral_offset();
        self.lateral_offset =
            (position - point.position).dot(point.normal).clamp(-max_offset, max_offset);
        if self.done {
            self.lateral_velocity = 0.0;
        }
    }

    pub fn telemetry(&self) -> AgentTelemetry {
        let length = self.path.length();
        let progress = if length > ARRIVAL_EPSILON {
            (self.distance / length).clamp(0.0, 1.0)
        } else if self.done {
            1.0
        } else {
            0.0
        };
        AgentTelemetry {
            role: self.role,
            distance: self.distance,
            length,
            progress,
            speed: self.speed,
            target_speed: self.target_speed,
            done: self.done,
            lateral_offset: self.lateral_offset,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::LockedPathDefinition;

    fn straight_agent(from: (f32, f32), to: (f32, f32)) -> AgentState {
        let def = LockedPathDefinition::straight(
            Role::OutsideHitter1,
            Position::new(from.0, from.1),
            Position::new(to.0, to.1),
        );
        AgentState::new(Role::OutsideHitter1, MotionPath::new(def))
    }

    #[test]
    fn test_free_run_targets_cruise() {
        let tuning = WhiteboardMotionTuning::default();
        let mut agent = straight_agent((0.1, 0.5), (0.9, 0.5));
        let here = Position::new(0.1, 0.5);
        agent.plan_speed(&tuning, here, here, &[]);
        assert_eq!(agent.target_speed, tuning.cruise_speed);
    }

    #[test]
    fn test_stopping_cap_near_end() {
        let tuning = WhiteboardMotionTuning::default();
        let mut agent = straight_agent((0.1, 0.5), (0.9, 0.5));
        agent.distance = agent.path.length() - 0.001;
        let here = agent.path.point_at_distance(agent.distance).position;
        agent.plan_speed(&tuning, here, here, &[]);
        let expected = (2.0 * tuning.braking * 0.001f32).sqrt();
        assert!((agent.target_speed - expected).abs() < 1e-3);
    }

    #[test]
    fn test_corner_cap_slows_on_tight_curve() {
        let mut tuning = WhiteboardMotionTuning::default();
        tuning.max_lateral_accel = 0.1;
        let def = LockedPathDefinition::quadratic(
            Role::Setter,
            Position::new(0.3, 0.3),
            Position::new(0.5, 0.9),
            Position::new(0.7, 0.3),
        );
        let mut agent = AgentState::new(Role::Setter, MotionPath::new(def));
        agent.distance = agent.path.length() * 0.45;
        let here = agent.path.point_at_distance(agent.distance).position;
        agent.plan_speed(&tuning, here, here, &[]);
        assert!(agent.target_speed < tuning.cruise_speed);
        assert!(agent.target_speed >= tuning.cruise_speed * MIN_CORNER_SPEED_FRACTION);
    }

    #[test]
    fn test_proximity_cap_has_floor() {
        let mut tuning = WhiteboardMotionTuning::default();
        tuning.avoidance_blend = 0.0;
        let mut agent = straight_agent((0.1, 0.5), (0.9, 0.5));
        let here = Position::new(0.1, 0.5);
        let blocker = Conflict { current: here, predicted: here };
        agent.plan_speed(&tuning, here, here, &[blocker]);
        let floor = tuning.cruise_speed * MIN_YIELD_SPEED_FRACTION;
        assert!((agent.target_speed - floor).abs() < 1e-6);
    }

    #[test]
    fn test_integrate_is_asymmetric() {
        let tuning = WhiteboardMotionTuning::default();
        let mut agent = straight_agent((0.1, 0.5), (0.9, 0.5));
        agent.target_speed = 0.3;
        agent.integrate(&tuning, 0.1);
        assert!((agent.speed - tuning.acceleration * 0.1).abs() < 1e-6);

        agent.speed = 0.3;
        agent.target_speed = 0.0;
        agent.integrate(&tuning, 0.1);
        assert!((agent.speed - (0.3 - tuning.braking * 0.1)).abs() < 1e-6);
    }

    #[test]
    fn test_stopping_speed_steps_down_one_braking_step() {
        let (braking, dt) = (1.6_f32, 1.0 / 60.0);
        let v = stopping_speed(braking, dt, 0.01);
        assert!(v > 0.0 && v < (2.0 * braking * 0.01).sqrt());
        let next = stopping_speed(braking, dt, 0.01 - v * dt);
        assert!((next - (v - braking * dt)).abs() < 1e-4);
        assert!(stopping_speed(braking, dt, 0.0).abs() < 1e-7);
    }

    #[test]
    fn test_integrate_clamps_speed_to_stopping_bound() {
        let tuning = WhiteboardMotionTuning::default();
        let dt = 1.0 / 60.0;
        let mut agent = straight_agent((0.1, 0.5), (0.9, 0.5));
        agent.distance = agent.path.length() - 0.001;
        // Arriving hot: target already dropped but speed still at cruise
        agent.speed = tuning.cruise_speed;
        agent.target_speed = 0.0;
        agent.integrate(&tuning, dt);
        assert!(!agent.done);
        assert!(agent.speed <= stopping_speed(tuning.braking, dt, 0.001) + 1e-4);
        assert!(agent.speed < 2.0 * tuning.braking * dt);
    }

    #[test]
    fn test_integrate_arrival_sets_done() {
        let tuning = WhiteboardMotionTuning::default();
        let mut agent = straight_agent((0.1, 0.5), (0.2, 0.5));
        agent.distance = agent.path.length() - 0.0005;
        agent.speed = 0.2;
        agent.target_speed = 0.2;
        agent.integrate(&tuning, 0.05);
        assert!(agent.done);
        assert_eq!(agent.distance, agent.path.length());
        assert_eq!(agent.speed, 0.0);
        assert_eq!(agent.target_speed, 0.0);
    }

    #[test]
    fn test_deflect_moves_away_from_conflict() {
        let tuning = WhiteboardMotionTuning::default();
        let mut agent = straight_agent((0.1, 0.5), (0.9, 0.5));
        agent.distance = 0.3;
        let here = agent.path.point_at_distance(agent.distance).position;
        // Blocker slightly above the path: push below (negative normal side)
        let above = here + Position::new(0.0, 0.02);
        let c = Conflict { current: above, predicted: above };
        for _ in 0..20 {
            agent.deflect(&tuning, 1.0 / 60.0, here, here, &[c]);
        }
        assert!(agent.lateral_offset < 0.0);
        assert!(agent.lateral_offset.abs() <= tuning.max_lateral_offset() + 1e-6);
    }

    #[test]
    fn test_sync_offset_projects_on_normal() {
        let tuning = WhiteboardMotionTuning::default();
        let mut agent = straight_agent((0.1, 0.5), (0.9, 0.5));
        agent.distance = 0.2;
        agent.sync_offset(&tuning, Position::new(0.35, 0.52));
        assert!((agent.lateral_offset - 0.02).abs() < 1e-5);
    }

    #[test]
    fn test_zero_length_telemetry() {
        let tuning = WhiteboardMotionTuning::default();
        let mut agent = straight_agent((0.4, 0.4), (0.4, 0.4));
        assert_eq!(agent.telemetry().progress, 0.0);
        agent.plan_speed(&tuning, Position::new(0.4, 0.4), Position::new(0.4, 0.4), &[]);
        agent.integrate(&tuning, 0.016);
        assert!(agent.done);
        assert_eq!(agent.telemetry().progress, 1.0);
    }
}
