/// Error taxonomy for the rotation pilot.
///
/// `ConfigError` is the only fatal class: every variant is a refusal to start
/// and names the offending action or setting. Snapshot and dispatch failures
/// are per-cycle conditions surfaced as events, never as crashes.
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no actions configured (set [[actions]] or a valid `profile`)")]
    NoActions,

    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("action #{index} has an empty id")]
    EmptyId { index: usize },

    #[error("action '{0}' is declared more than once")]
    DuplicateId(String),

    #[error("action '{0}' has an empty hotkey")]
    EmptyHotkey(String),

    #[error("action '{id}': cooldown_seconds must be a finite value >= 0 (got {value})")]
    InvalidCooldown { id: String, value: f64 },

    #[error("action '{id}': resource_cost must be a finite value >= 0 (got {value})")]
    InvalidCost { id: String, value: f64 },

    #[error("action '{id}': resource_cost {value} is a percentage without mana_pool and must be <= 100")]
    CostExceedsBar { id: String, value: f64 },

    #[error("action '{id}': {clause} must be within 0..=100 (got {value})")]
    PercentOutOfRange { id: String, clause: &'static str, value: f64 },

    #[error("action '{id}': {min_clause} ({min}) exceeds {max_clause} ({max})")]
    ContradictoryClauses {
        id:         String,
        min_clause: &'static str,
        min:        f64,
        max_clause: &'static str,
        max:        f64,
    },

    #[error("action '{0}': min_mana requires `mana_pool` to be configured")]
    AbsoluteManaWithoutPool(String),

    #[error("mana_pool must be > 0 (got {0})")]
    InvalidManaPool(f64),

    #[error("safety.{field} must be within 0..=100 (got {value})")]
    SafetyOutOfRange { field: &'static str, value: f64 },

    #[error("safety.death_hp_percent ({death}) must be below safety.critical_hp_percent ({critical})")]
    SafetyOrdering { death: f64, critical: f64 },

    #[error("behavior.micro_pause_chance_percent must be within 0..=100 (got {0})")]
    MicroPauseChance(f64),

    #[error("behavior micro-pause range {min}..={max} ms must be ordered and start above base_delay_ms ({base})")]
    MicroPauseRange { min: u64, max: u64, base: u64 },

    #[error("cycle.poll_interval_ms must be > 0")]
    ZeroPollInterval,
}

/// Failure to obtain a vitals reading for this cycle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    /// Transient: this cycle is skipped, the loop continues.
    #[error("snapshot unavailable: {0}")]
    Unavailable(String),

    /// The source will never produce another reading (e.g. a replay ran out).
    #[error("snapshot source closed")]
    Closed,
}

/// The input executor could not deliver the key press.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("dispatch of '{action_id}' failed: {reason}")]
pub struct DispatchError {
    pub action_id: String,
    pub reason:    String,
}
