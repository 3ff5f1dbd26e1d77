//! Role priority and the yield rule.
//!
//! Two independent comparisons decide who gives way:
//! 1. The role priority table (which direction "leads" is a [`YieldPolicy`])
//! 2. The stable `role_order` index, used only when priorities tie
//!
//! Together they form a strict total order over distinct roles, so there are
//! no cycles and no negotiation between agents.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::contracts::Role;

/// Priority table value per role.
pub const fn role_priority(role: Role) -> u8 {
    match role {
        Role::Setter => 0,
        Role::Libero => 1,
        Role::Opposite => 2,
        Role::OutsideHitter1 => 3,
        Role::OutsideHitter2 => 3,
        Role::MiddleBlocker1 => 4,
        Role::MiddleBlocker2 => 4,
        Role::DefensiveSpecialist => 5,
    }
}

/// Which end of the priority table takes precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldPolicy {
    /// Smaller table value leads; larger values yield.
    #[default]
    LowerValueLeads,
    /// Larger table value leads; smaller values yield.
    HigherValueLeads,
}

/// Stable conflict-resolution order: by priority value, then by role code.
///
/// Duplicates are dropped.
pub fn role_order(roles: &[Role]) -> Vec<Role> {
    let mut order: Vec<Role> = Vec::with_capacity(roles.len());
    for role in roles {
        if !order.contains(role) {
            order.push(*role);
        }
    }
    order.sort_by(|a, b| match role_priority(*a).cmp(&role_priority(*b)) {
        Ordering::Equal => a.code().cmp(b.code()),
        other => other,
    });
    order
}

/// Does `self` give way to `other`?
///
/// Priorities decide first. On a tie the role with the smaller order index
/// yields, so the later role keeps its line.
#[inline]
pub fn should_yield_to(
    policy: YieldPolicy,
    self_priority: u8,
    self_index: usize,
    other_priority: u8,
    other_index: usize,
) -> bool {
    if self_priority != other_priority {
        return match policy {
            YieldPolicy::LowerValueLeads => self_priority > other_priority,
            YieldPolicy::HigherValueLeads => self_priority < other_priority,
        };
    }
    self_index < other_index
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_order_sorted_by_priority_then_code() {
        let order = role_order(&[
            Role::DefensiveSpecialist,
            Role::MiddleBlocker2,
            Role::OutsideHitter2,
            Role::Setter,
            Role::OutsideHitter1,
            Role::MiddleBlocker1,
        ]);
        assert_eq!(
            order,
            vec![
                Role::Setter,
                Role::OutsideHitter1,
                Role::OutsideHitter2,
                Role::MiddleBlocker1,
                Role::MiddleBlocker2,
                Role::DefensiveSpecialist,
            ]
        );
    }

    #[test]
    fn test_role_order_drops_duplicates() {
        let order = role_order(&[Role::Libero, Role::Libero, Role::Setter]);
        assert_eq!(order, vec![Role::Setter, Role::Libero]);
    }

    #[test]
    fn test_lower_value_leads() {
        // Setter (0) vs MB1 (4): MB1 yields
        let p = YieldPolicy::LowerValueLeads;
        assert!(should_yield_to(p, 4, 3, 0, 0));
        assert!(!should_yield_to(p, 0, 0, 4, 3));
    }

    #[test]
    fn test_higher_value_leads() {
        let p = YieldPolicy::HigherValueLeads;
        assert!(should_yield_to(p, 0, 0, 4, 3));
        assert!(!should_yield_to(p, 4, 3, 0, 0));
    }

    #[test]
    fn test_tie_break_smaller_index_yields_under_both_policies() {
        for p in [YieldPolicy::LowerValueLeads, YieldPolicy::HigherValueLeads] {
            assert!(should_yield_to(p, 3, 1, 3, 2));
            assert!(!should_yield_to(p, 3, 2, 3, 1));
        }
    }

    #[test]
    fn test_strict_total_order_over_roster() {
        let order = role_order(&Role::ALL);
        for p in [YieldPolicy::LowerValueLeads, YieldPolicy::HigherValueLeads] {
            for (i, a) in order.iter().enumerate() {
                for (j, b) in order.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    let ab = should_yield_to(p, role_priority(*a), i, role_priority(*b), j);
                    let ba = should_yield_to(p, role_priority(*b), j, role_priority(*a), i);
                    assert!(ab != ba, "{a} vs {b} under {p:?}");
                }
            }
        }
    }

    #[test]
    fn test_policy_json_names() {
        let json = serde_json::to_string(&YieldPolicy::HigherValueLeads).unwrap();
        assert_eq!(json, "\"higher_value_leads\"");
    }
}
