/// Safety monitor — vital thresholds that override the rotation.
///
/// Precedence: death (stop) beats critical HP (pause) beats clear.
/// The low-mana alert is advisory and never changes the verdict.
use crate::{config::SafetyPolicy, state::StateSnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyVerdict {
    Clear,
    /// Keep sampling; only emergency actions may be dispatched.
    Pause,
    /// Terminal for the run.
    Stop,
}

#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    policy: SafetyPolicy,
}

impl SafetyMonitor {
    pub fn new(policy: SafetyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    pub fn check(&self, snapshot: &StateSnapshot) -> SafetyVerdict {
        if snapshot.hp_percent <= self.policy.death_hp_percent {
            SafetyVerdict::Stop
        } else if snapshot.hp_percent <= self.policy.critical_hp_percent {
            SafetyVerdict::Pause
        } else {
            SafetyVerdict::Clear
        }
    }

    pub fn low_mana(&self, snapshot: &StateSnapshot) -> bool {
        snapshot.mana_percent <= self.policy.low_mana_alert_percent
    }
}
