/// Rotation configuration — read once from TOML at startup, read-only afterwards.
///
/// Layout of `rotation.toml`:
///
///   profile            = "knight/melee"   # optional: embedded action list
///   mana_pool          = 820.0            # optional: absolute mana at 100%
///   emergency_priority = 200              # optional: actions allowed during a pause
///
///   [safety]   critical / death / low-mana thresholds
///   [behavior] humanised timing profile
///   [cycle]    polling cadence
///
///   [[actions]]                           # declaration order is the tie-break
///   id = "heal" ...
///
/// `load` refuses to hand back a config that fails `validate`; the caller
/// never enters the loop with ambiguous rules.
use crate::{conditions::Requirement, error::ConfigError, profiles};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const CONFIG_FILE: &str = "rotation.toml";

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Informational category carried through to events. Selection never looks at it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[default]
    Damage,
    Healing,
    Mana,
    Utility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionDefinition {
    pub id:               String,
    /// Opaque identifier handed to the input executor (e.g. "F1", "alt+q").
    pub hotkey:           String,
    /// Higher = more urgent.
    pub priority:         i64,
    #[serde(default)]
    pub cooldown_seconds: f64,
    /// Mana units when `mana_pool` is set, otherwise percent of the bar.
    #[serde(default)]
    pub resource_cost:    f64,
    #[serde(default)]
    pub kind:             ActionKind,
    #[serde(default)]
    pub requirements:     Vec<Requirement>,
}

impl ActionDefinition {
    /// Rounded up to the next millisecond, so a sub-millisecond cooldown still
    /// blocks the instant it was used. Float noise below 1µs is ignored.
    pub fn cooldown_ms(&self) -> u64 {
        let micros = (self.cooldown_seconds * 1_000_000.0).round() as u64;
        (micros + 999) / 1_000
    }
}

// ---------------------------------------------------------------------------
// Safety / behaviour / cadence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyPolicy {
    #[serde(default = "default_critical_hp")]
    pub critical_hp_percent:    f64,
    #[serde(default)]
    pub death_hp_percent:       f64,
    /// Advisory only — produces an event, never changes control flow.
    #[serde(default = "default_low_mana_alert")]
    pub low_mana_alert_percent: f64,
}

fn default_critical_hp() -> f64 { 30.0 }
fn default_low_mana_alert() -> f64 { 20.0 }

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            critical_hp_percent:    default_critical_hp(),
            death_hp_percent:       0.0,
            low_mana_alert_percent: default_low_mana_alert(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviorProfile {
    #[serde(default = "default_base_delay")]
    pub base_delay_ms:              u64,
    /// Roughly the ±3σ spread around `base_delay_ms`.
    #[serde(default = "default_variance")]
    pub random_variance_ms:         u64,
    #[serde(default = "default_micro_chance")]
    pub micro_pause_chance_percent: f64,
    #[serde(default = "default_micro_min")]
    pub micro_pause_min_ms:         u64,
    #[serde(default = "default_micro_max")]
    pub micro_pause_max_ms:         u64,
}

fn default_base_delay()   -> u64 { 150 }
fn default_variance()     -> u64 { 50 }
fn default_micro_chance() -> f64 { 2.0 }
fn default_micro_min()    -> u64 { 200 }
fn default_micro_max()    -> u64 { 500 }

impl Default for BehaviorProfile {
    fn default() -> Self {
        Self {
            base_delay_ms:              default_base_delay(),
            random_variance_ms:         default_variance(),
            micro_pause_chance_percent: default_micro_chance(),
            micro_pause_min_ms:         default_micro_min(),
            micro_pause_max_ms:         default_micro_max(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CycleSettings {
    /// Target time between cycle starts (100ms = 10 samples/s).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms:   u64,
    /// How often a vitals status event is emitted. 0 disables it.
    #[serde(default = "default_status_interval")]
    pub status_interval_ms: u64,
}

fn default_poll_interval()   -> u64 { 100 }
fn default_status_interval() -> u64 { 3_000 }

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms:   default_poll_interval(),
            status_interval_ms: default_status_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// RotationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotationConfig {
    /// Embedded profile key ("class/style") used when `actions` is empty.
    #[serde(default)]
    pub profile:            Option<String>,
    #[serde(default)]
    pub mana_pool:          Option<f64>,
    /// Actions at or above this priority stay usable during a safety pause.
    /// Unset = a pause suppresses everything.
    #[serde(default)]
    pub emergency_priority: Option<i64>,
    #[serde(default)]
    pub safety:             SafetyPolicy,
    #[serde(default)]
    pub behavior:           BehaviorProfile,
    #[serde(default)]
    pub cycle:              CycleSettings,
    #[serde(default)]
    pub actions:            Vec<ActionDefinition>,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            profile:            Some("knight/melee".to_owned()),
            mana_pool:          None,
            emergency_priority: Some(200),
            safety:             SafetyPolicy::default(),
            behavior:           BehaviorProfile::default(),
            cycle:              CycleSettings::default(),
            actions:            Vec::new(),
        }
    }
}

impl RotationConfig {
    /// Fill `actions` from the embedded profile when none are declared inline.
    pub fn resolve_profile(mut self) -> Result<Self, ConfigError> {
        if self.actions.is_empty() {
            if let Some(key) = &self.profile {
                let profile = profiles::load_by_key(key)
                    .ok_or_else(|| ConfigError::UnknownProfile(key.clone()))?;
                tracing::info!("Using embedded profile {} ({} actions)", profile.key(), profile.actions.len());
                self.actions = profile.actions;
            }
        }
        Ok(self)
    }

    /// Startup gate. The first invalid rule found is reported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actions.is_empty() {
            return Err(ConfigError::NoActions);
        }

        if let Some(pool) = self.mana_pool {
            if !(pool.is_finite() && pool > 0.0) {
                return Err(ConfigError::InvalidManaPool(pool));
            }
        }

        let mut seen = HashSet::new();
        for (index, action) in self.actions.iter().enumerate() {
            if action.id.trim().is_empty() {
                return Err(ConfigError::EmptyId { index });
            }
            if !seen.insert(action.id.as_str()) {
                return Err(ConfigError::DuplicateId(action.id.clone()));
            }
            if action.hotkey.trim().is_empty() {
                return Err(ConfigError::EmptyHotkey(action.id.clone()));
            }
            if !(action.cooldown_seconds.is_finite() && action.cooldown_seconds >= 0.0) {
                return Err(ConfigError::InvalidCooldown {
                    id:    action.id.clone(),
                    value: action.cooldown_seconds,
                });
            }
            if !(action.resource_cost.is_finite() && action.resource_cost >= 0.0) {
                return Err(ConfigError::InvalidCost {
                    id:    action.id.clone(),
                    value: action.resource_cost,
                });
            }
            if self.mana_pool.is_none() && action.resource_cost > 100.0 {
                return Err(ConfigError::CostExceedsBar {
                    id:    action.id.clone(),
                    value: action.resource_cost,
                });
            }
            crate::conditions::validate_requirements(action, self.mana_pool.is_some())?;
        }

        self.validate_safety()?;
        self.validate_behavior()?;

        if self.cycle.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    fn validate_safety(&self) -> Result<(), ConfigError> {
        let s = &self.safety;
        for (field, value) in [
            ("critical_hp_percent",    s.critical_hp_percent),
            ("death_hp_percent",       s.death_hp_percent),
            ("low_mana_alert_percent", s.low_mana_alert_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::SafetyOutOfRange { field, value });
            }
        }
        if s.death_hp_percent >= s.critical_hp_percent {
            return Err(ConfigError::SafetyOrdering {
                death:    s.death_hp_percent,
                critical: s.critical_hp_percent,
            });
        }
        Ok(())
    }

    fn validate_behavior(&self) -> Result<(), ConfigError> {
        let b = &self.behavior;
        if !(0.0..=100.0).contains(&b.micro_pause_chance_percent) {
            return Err(ConfigError::MicroPauseChance(b.micro_pause_chance_percent));
        }
        if b.micro_pause_min_ms <= b.base_delay_ms || b.micro_pause_min_ms > b.micro_pause_max_ms {
            return Err(ConfigError::MicroPauseRange {
                min:  b.micro_pause_min_ms,
                max:  b.micro_pause_max_ms,
                base: b.base_delay_ms,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Parse, resolve the profile, and validate. Unknown condition kinds surface
/// here as TOML errors ("unknown variant").
pub fn parse(raw: &str) -> Result<RotationConfig> {
    let cfg: RotationConfig = toml::from_str(raw)
        .map_err(|e| anyhow::anyhow!("Config parse error: {}", e))?;
    let cfg = cfg.resolve_profile()?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load(path: &Path) -> Result<RotationConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse(&raw).with_context(|| format!("invalid configuration in {}", path.display()))
}

/// `<config_dir>/rotation.toml`, or the defaults when the file does not exist.
pub fn load_or_default(config_dir: &Path) -> Result<RotationConfig> {
    let path = config_dir.join(CONFIG_FILE);
    if path.exists() {
        load(&path)
    } else {
        tracing::info!("No {} in {:?} — using defaults", CONFIG_FILE, config_dir);
        let cfg = RotationConfig::default().resolve_profile()?;
        cfg.validate()?;
        Ok(cfg)
    }
}

pub fn save(config: &RotationConfig, config_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(config_dir)?;
    let raw = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("Config serialize error: {}", e))?;
    std::fs::write(config_dir.join(CONFIG_FILE), raw)?;
    Ok(())
}
