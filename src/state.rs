/// Per-cycle vitals and the state that outlives a cycle.
///
/// `StateSnapshot` is created fresh every cycle and discarded after dispatch.
/// `CooldownTracker` and `SessionStats` live for the whole run and are owned
/// by the cycle controller. No locking: exactly one cycle runs at a time.
use crate::config::ActionDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// StateSnapshot
// ---------------------------------------------------------------------------

/// One self-consistent reading of the character's vitals.
///
/// Percentages are clamped to 0..=100 on construction (and on deserialisation).
/// A non-finite reading is treated as 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSnapshot")]
pub struct StateSnapshot {
    pub hp_percent:   f64,
    pub mana_percent: f64,
    pub has_target:   bool,
    pub timestamp_ms: u64,
}

#[derive(Deserialize)]
struct RawSnapshot {
    hp_percent:   f64,
    mana_percent: f64,
    #[serde(default)]
    has_target:   bool,
    #[serde(default)]
    timestamp_ms: u64,
}

impl From<RawSnapshot> for StateSnapshot {
    fn from(raw: RawSnapshot) -> Self {
        Self::new(raw.hp_percent, raw.mana_percent, raw.has_target, raw.timestamp_ms)
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 100.0) } else { 0.0 }
}

impl StateSnapshot {
    pub fn new(hp_percent: f64, mana_percent: f64, has_target: bool, timestamp_ms: u64) -> Self {
        Self {
            hp_percent:   clamp_percent(hp_percent),
            mana_percent: clamp_percent(mana_percent),
            has_target,
            timestamp_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Cooldown tracker
// ---------------------------------------------------------------------------

/// Per-action cooldown bookkeeping.
///
/// Reads never mutate. `mark_used` is the only writer and the controller
/// calls it once per successful dispatch — never on selection.
#[derive(Debug, Default, Clone)]
pub struct CooldownTracker {
    /// action id -> cooldown length
    cooldown_ms: HashMap<String, u64>,
    /// action id -> last dispatch timestamp
    last_used:   HashMap<String, u64>,
}

impl CooldownTracker {
    pub fn new(actions: &[ActionDefinition]) -> Self {
        Self {
            cooldown_ms: actions.iter().map(|a| (a.id.clone(), a.cooldown_ms())).collect(),
            last_used:   HashMap::new(),
        }
    }

    /// True iff never used, or at least `cooldown` has elapsed since the last use.
    /// Unknown ids are never ready.
    pub fn is_ready(&self, action_id: &str, now_ms: u64) -> bool {
        let Some(&cooldown) = self.cooldown_ms.get(action_id) else {
            return false;
        };
        match self.last_used.get(action_id) {
            None        => true,
            Some(&last) => now_ms.saturating_sub(last) >= cooldown && now_ms >= last,
        }
    }

    pub fn mark_used(&mut self, action_id: &str, now_ms: u64) {
        if !self.cooldown_ms.contains_key(action_id) {
            tracing::warn!("mark_used for unknown action '{}' ignored", action_id);
            return;
        }
        self.last_used.insert(action_id.to_owned(), now_ms);
    }

    pub fn last_used_ms(&self, action_id: &str) -> Option<u64> {
        self.last_used.get(action_id).copied()
    }

    /// Milliseconds until the action is ready again; 0 when ready.
    pub fn remaining_ms(&self, action_id: &str, now_ms: u64) -> u64 {
        match (self.cooldown_ms.get(action_id), self.last_used.get(action_id)) {
            (Some(&cd), Some(&last)) => (last + cd).saturating_sub(now_ms),
            _ => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Session statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub cycles:             u64,
    pub snapshots:          u64,
    pub snapshot_failures:  u64,
    pub actions_dispatched: u64,
    pub dispatch_failures:  u64,
    hp_sum:                 f64,
    mana_sum:               f64,
}

impl SessionStats {
    pub fn record_snapshot(&mut self, snapshot: &StateSnapshot) {
        self.snapshots += 1;
        self.hp_sum   += snapshot.hp_percent;
        self.mana_sum += snapshot.mana_percent;
    }

    pub fn avg_hp_percent(&self) -> Option<f64> {
        (self.snapshots > 0).then(|| self.hp_sum / self.snapshots as f64)
    }

    pub fn avg_mana_percent(&self) -> Option<f64> {
        (self.snapshots > 0).then(|| self.mana_sum / self.snapshots as f64)
    }

    /// Percentage of dispatch attempts the executor delivered. None before any attempt.
    pub fn dispatch_success_rate(&self) -> Option<f64> {
        let attempts = self.actions_dispatched + self.dispatch_failures;
        (attempts > 0).then(|| self.actions_dispatched as f64 / attempts as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionKind;

    fn def(id: &str, cooldown_seconds: f64) -> ActionDefinition {
        ActionDefinition {
            id:               id.to_owned(),
            hotkey:           "F1".to_owned(),
            priority:         1,
            cooldown_seconds,
            resource_cost:    0.0,
            kind:             ActionKind::Damage,
            requirements:     vec![],
        }
    }

    #[test]
    fn snapshot_clamps_percentages() {
        let s = StateSnapshot::new(130.0, -5.0, true, 7);
        assert_eq!(s.hp_percent, 100.0);
        assert_eq!(s.mana_percent, 0.0);
        assert_eq!(StateSnapshot::new(f64::NAN, 50.0, false, 0).hp_percent, 0.0);
    }

    #[test]
    fn snapshot_deserialises_with_clamp() {
        let s: StateSnapshot =
            serde_json::from_str(r#"{"hp_percent":150,"mana_percent":40}"#).unwrap();
        assert_eq!(s.hp_percent, 100.0);
        assert!(!s.has_target);
        assert_eq!(s.timestamp_ms, 0);
    }

    #[test]
    fn cooldown_boundary() {
        let mut cd = CooldownTracker::new(&[def("nuke", 2.0)]);
        assert!(cd.is_ready("nuke", 0), "never used = ready");

        cd.mark_used("nuke", 1_000);
        for t in [1_000, 1_500, 2_999] {
            assert!(!cd.is_ready("nuke", t), "not ready at {}", t);
        }
        assert!(cd.is_ready("nuke", 3_000));
        assert!(cd.is_ready("nuke", 10_000));
        assert_eq!(cd.remaining_ms("nuke", 2_500), 500);
    }

    #[test]
    fn zero_cooldown_is_immediately_ready() {
        let mut cd = CooldownTracker::new(&[def("auto", 0.0)]);
        cd.mark_used("auto", 500);
        assert!(cd.is_ready("auto", 500));
    }

    #[test]
    fn reads_do_not_mutate() {
        let cd = CooldownTracker::new(&[def("nuke", 2.0)]);
        for t in 0..10 {
            let _ = cd.is_ready("nuke", t);
        }
        assert_eq!(cd.last_used_ms("nuke"), None);
    }

    #[test]
    fn unknown_action_is_never_ready() {
        let mut cd = CooldownTracker::new(&[def("nuke", 0.0)]);
        assert!(!cd.is_ready("ghost", 0));
        cd.mark_used("ghost", 0);
        assert_eq!(cd.last_used_ms("ghost"), None);
    }

    #[test]
    fn session_averages() {
        let mut stats = SessionStats::default();
        assert_eq!(stats.avg_hp_percent(), None);
        stats.record_snapshot(&StateSnapshot::new(80.0, 20.0, false, 0));
        stats.record_snapshot(&StateSnapshot::new(60.0, 40.0, false, 0));
        assert_eq!(stats.avg_hp_percent(), Some(70.0));
        assert_eq!(stats.avg_mana_percent(), Some(30.0));

        stats.actions_dispatched = 3;
        stats.dispatch_failures  = 1;
        assert_eq!(stats.dispatch_success_rate(), Some(75.0));
    }
}
