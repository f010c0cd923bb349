/// Rotation engine — greedy highest-priority selector, re-evaluated every cycle.
///
/// `decide` is pure over in-memory state: it borrows the cooldown tracker
/// immutably, so calling it any number of times without a dispatch leaves
/// cooldowns untouched.
///
/// Order of evaluation:
///   1. safety verdict (stop returns immediately; pause narrows candidates
///      to `priority >= emergency_priority`, or to nothing when unset)
///   2. candidates = ready (cooldown) AND eligible (conditions + cost)
///   3. priority descending, declaration order ascending
use crate::{
    conditions::ConditionEvaluator,
    config::{ActionDefinition, ActionKind, RotationConfig},
    safety::{SafetyMonitor, SafetyVerdict},
    state::{CooldownTracker, StateSnapshot},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChosenAction {
    pub action_id: String,
    pub hotkey:    String,
    pub priority:  i64,
    pub kind:      ActionKind,
    /// Selected while the safety monitor reported a pause.
    pub emergency: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RotationDecision {
    NoEligibleAction,
    SafetyPause,
    SafetyStop,
    Act {
        action:   ChosenAction,
        snapshot: StateSnapshot,
    },
}

#[derive(Debug, Clone)]
pub struct RotationEngine {
    /// Declaration order — index is the tie-break.
    actions:            Vec<ActionDefinition>,
    safety:             SafetyMonitor,
    evaluator:          ConditionEvaluator,
    emergency_priority: Option<i64>,
}

impl RotationEngine {
    pub fn new(
        actions:            Vec<ActionDefinition>,
        safety:             SafetyMonitor,
        evaluator:          ConditionEvaluator,
        emergency_priority: Option<i64>,
    ) -> Self {
        Self { actions, safety, evaluator, emergency_priority }
    }

    pub fn from_config(config: &RotationConfig) -> Self {
        Self::new(
            config.actions.clone(),
            SafetyMonitor::new(config.safety.clone()),
            ConditionEvaluator::new(config.mana_pool),
            config.emergency_priority,
        )
    }

    pub fn actions(&self) -> &[ActionDefinition] {
        &self.actions
    }

    pub fn safety(&self) -> &SafetyMonitor {
        &self.safety
    }

    /// Ready and eligible actions, best first.
    pub fn candidates(
        &self,
        snapshot:  &StateSnapshot,
        cooldowns: &CooldownTracker,
        now_ms:    u64,
    ) -> Vec<&ActionDefinition> {
        let mut ranked: Vec<(usize, &ActionDefinition)> = self
            .actions
            .iter()
            .enumerate()
            .filter(|(_, a)| cooldowns.is_ready(&a.id, now_ms))
            .filter(|(_, a)| self.evaluator.is_eligible(a, snapshot))
            .collect();

        ranked.sort_by(|(ia, a), (ib, b)| b.priority.cmp(&a.priority).then(ia.cmp(ib)));
        ranked.into_iter().map(|(_, a)| a).collect()
    }

    pub fn decide(
        &self,
        snapshot:  &StateSnapshot,
        cooldowns: &CooldownTracker,
        now_ms:    u64,
    ) -> RotationDecision {
        let verdict = self.safety.check(snapshot);
        let floor = match verdict {
            SafetyVerdict::Stop  => return RotationDecision::SafetyStop,
            SafetyVerdict::Pause => match self.emergency_priority {
                Some(p) => Some(p),
                None    => return RotationDecision::SafetyPause,
            },
            SafetyVerdict::Clear => None,
        };

        let best = self
            .candidates(snapshot, cooldowns, now_ms)
            .into_iter()
            .find(|a| floor.map_or(true, |min| a.priority >= min));

        match (best, verdict) {
            (Some(a), _) => RotationDecision::Act {
                action: ChosenAction {
                    action_id: a.id.clone(),
                    hotkey:    a.hotkey.clone(),
                    priority:  a.priority,
                    kind:      a.kind,
                    emergency: verdict == SafetyVerdict::Pause,
                },
                snapshot: *snapshot,
            },
            (None, SafetyVerdict::Pause) => RotationDecision::SafetyPause,
            (None, _)                    => RotationDecision::NoEligibleAction,
        }
    }
}
