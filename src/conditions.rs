/// Condition evaluator — pure predicates over a `StateSnapshot`.
///
/// Requirement clauses are a closed set: a clause kind that is not listed in
/// `Requirement` fails to deserialise, so misconfigured rules never reach the
/// loop. All clauses of an action are ANDed together, and the resource check
/// (`resource_cost <= current mana`) always applies on top of them.
use crate::{config::ActionDefinition, error::ConfigError, state::StateSnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Requirement {
    MinHpPercent   { value: f64 },
    MaxHpPercent   { value: f64 },
    MinManaPercent { value: f64 },
    MaxManaPercent { value: f64 },
    /// `value = false` makes the action usable only without a target (e.g. buffs).
    HasTarget {
        #[serde(default = "default_true")]
        value: bool,
    },
    /// Absolute mana units; needs `mana_pool`.
    MinMana        { value: f64 },
}

fn default_true() -> bool { true }

impl Requirement {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MinHpPercent   { .. } => "min_hp_percent",
            Self::MaxHpPercent   { .. } => "max_hp_percent",
            Self::MinManaPercent { .. } => "min_mana_percent",
            Self::MaxManaPercent { .. } => "max_mana_percent",
            Self::HasTarget      { .. } => "has_target",
            Self::MinMana        { .. } => "min_mana",
        }
    }
}

// ---------------------------------------------------------------------------
// Startup validation
// ---------------------------------------------------------------------------

/// Range-checks every clause of `action` and rejects min/max pairs that can
/// never both hold.
pub fn validate_requirements(action: &ActionDefinition, has_mana_pool: bool) -> Result<(), ConfigError> {
    let mut min_hp:   Option<f64> = None;
    let mut max_hp:   Option<f64> = None;
    let mut min_mana: Option<f64> = None;
    let mut max_mana: Option<f64> = None;

    for req in &action.requirements {
        let percent = match *req {
            Requirement::MinHpPercent   { value } => { min_hp   = Some(value); Some(value) }
            Requirement::MaxHpPercent   { value } => { max_hp   = Some(value); Some(value) }
            Requirement::MinManaPercent { value } => { min_mana = Some(value); Some(value) }
            Requirement::MaxManaPercent { value } => { max_mana = Some(value); Some(value) }
            Requirement::HasTarget { .. } => None,
            Requirement::MinMana { value } => {
                if !has_mana_pool {
                    return Err(ConfigError::AbsoluteManaWithoutPool(action.id.clone()));
                }
                if !(value.is_finite() && value >= 0.0) {
                    return Err(ConfigError::InvalidCost { id: action.id.clone(), value });
                }
                None
            }
        };

        if let Some(value) = percent {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::PercentOutOfRange {
                    id:     action.id.clone(),
                    clause: req.name(),
                    value,
                });
            }
        }
    }

    for (min_clause, min, max_clause, max) in [
        ("min_hp_percent",   min_hp,   "max_hp_percent",   max_hp),
        ("min_mana_percent", min_mana, "max_mana_percent", max_mana),
    ] {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(ConfigError::ContradictoryClauses {
                    id: action.id.clone(),
                    min_clause,
                    min,
                    max_clause,
                    max,
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ConditionEvaluator {
    /// Absolute mana at 100%. Without it costs are compared as percent.
    mana_pool: Option<f64>,
}

impl ConditionEvaluator {
    pub fn new(mana_pool: Option<f64>) -> Self {
        Self { mana_pool }
    }

    /// Mana available in the same unit as `resource_cost`.
    pub fn current_resource(&self, snapshot: &StateSnapshot) -> f64 {
        match self.mana_pool {
            Some(pool) => snapshot.mana_percent / 100.0 * pool,
            None       => snapshot.mana_percent,
        }
    }

    pub fn can_afford(&self, action: &ActionDefinition, snapshot: &StateSnapshot) -> bool {
        action.resource_cost <= self.current_resource(snapshot)
    }

    pub fn is_eligible(&self, action: &ActionDefinition, snapshot: &StateSnapshot) -> bool {
        self.can_afford(action, snapshot)
            && action.requirements.iter().all(|req| self.holds(req, snapshot))
    }

    fn holds(&self, req: &Requirement, s: &StateSnapshot) -> bool {
        match *req {
            Requirement::MinHpPercent   { value } => s.hp_percent   >= value,
            Requirement::MaxHpPercent   { value } => s.hp_percent   <= value,
            Requirement::MinManaPercent { value } => s.mana_percent >= value,
            Requirement::MaxManaPercent { value } => s.mana_percent <= value,
            Requirement::HasTarget      { value } => s.has_target == value,
            // Validation forbids this without a pool; fail closed if it slips through.
            Requirement::MinMana { value } => match self.mana_pool {
                Some(pool) => s.mana_percent / 100.0 * pool >= value,
                None       => false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionKind;

    fn action(cost: f64, requirements: Vec<Requirement>) -> ActionDefinition {
        ActionDefinition {
            id:               "a".to_owned(),
            hotkey:           "F1".to_owned(),
            priority:         10,
            cooldown_seconds: 0.0,
            resource_cost:    cost,
            kind:             ActionKind::Damage,
            requirements,
        }
    }

    fn snap(hp: f64, mana: f64, target: bool) -> StateSnapshot {
        StateSnapshot::new(hp, mana, target, 0)
    }

    #[test]
    fn no_requirements_is_always_eligible() {
        let eval = ConditionEvaluator::default();
        assert!(eval.is_eligible(&action(0.0, vec![]), &snap(1.0, 0.0, false)));
    }

    #[test]
    fn clauses_are_anded() {
        let eval = ConditionEvaluator::default();
        let a = action(0.0, vec![
            Requirement::MaxHpPercent { value: 70.0 },
            Requirement::MinManaPercent { value: 20.0 },
        ]);
        assert!(eval.is_eligible(&a, &snap(50.0, 40.0, false)));
        assert!(!eval.is_eligible(&a, &snap(80.0, 40.0, false)));
        assert!(!eval.is_eligible(&a, &snap(50.0, 10.0, false)));
    }

    #[test]
    fn target_clause_excludes_without_target() {
        let eval = ConditionEvaluator::default();
        let a = action(0.0, vec![Requirement::HasTarget { value: true }]);
        assert!(!eval.is_eligible(&a, &snap(100.0, 100.0, false)));
        assert!(eval.is_eligible(&a, &snap(100.0, 100.0, true)));

        let buff = action(0.0, vec![Requirement::HasTarget { value: false }]);
        assert!(!eval.is_eligible(&buff, &snap(100.0, 100.0, true)));
    }

    #[test]
    fn cost_compared_as_percent_without_pool() {
        let eval = ConditionEvaluator::default();
        let a = action(30.0, vec![]);
        assert!(!eval.is_eligible(&a, &snap(100.0, 29.0, true)));
        assert!(eval.is_eligible(&a, &snap(100.0, 30.0, true)));
    }

    #[test]
    fn cost_compared_in_units_with_pool() {
        // 25% of 400 = 100 mana
        let eval = ConditionEvaluator::new(Some(400.0));
        assert!(eval.is_eligible(&action(100.0, vec![]), &snap(100.0, 25.0, true)));
        assert!(!eval.is_eligible(&action(101.0, vec![]), &snap(100.0, 25.0, true)));
    }

    #[test]
    fn absolute_mana_clause_fails_closed_without_pool() {
        let a = action(0.0, vec![Requirement::MinMana { value: 10.0 }]);
        assert!(!ConditionEvaluator::default().is_eligible(&a, &snap(100.0, 100.0, true)));
        assert!(ConditionEvaluator::new(Some(100.0)).is_eligible(&a, &snap(100.0, 10.0, true)));
    }

    #[test]
    fn validation_rejects_out_of_range_percent() {
        let a = action(0.0, vec![Requirement::MinHpPercent { value: 120.0 }]);
        assert!(matches!(
            validate_requirements(&a, false),
            Err(ConfigError::PercentOutOfRange { clause: "min_hp_percent", .. })
        ));
    }

    #[test]
    fn validation_rejects_contradictory_pair() {
        let a = action(0.0, vec![
            Requirement::MinManaPercent { value: 60.0 },
            Requirement::MaxManaPercent { value: 40.0 },
        ]);
        assert!(matches!(
            validate_requirements(&a, false),
            Err(ConfigError::ContradictoryClauses { .. })
        ));
    }

    #[test]
    fn validation_requires_pool_for_absolute_mana() {
        let a = action(0.0, vec![Requirement::MinMana { value: 50.0 }]);
        assert_eq!(
            validate_requirements(&a, false),
            Err(ConfigError::AbsoluteManaWithoutPool("a".to_owned()))
        );
        assert!(validate_requirements(&a, true).is_ok());
    }
}
