use rotation_pilot_lib::{
    config::{self, RotationConfig},
    controller::{CycleController, InputExecutor, OperatorCommand, SnapshotProvider},
    error::{DispatchError, SnapshotError},
    events::{BotEvent, StopReason},
    rotation::{RotationDecision, RotationEngine},
    state::{CooldownTracker, StateSnapshot},
};
use rand::{rngs::StdRng, SeedableRng};
use std::collections::VecDeque;
use tokio::sync::{mpsc, watch};

const CONFIG: &str = r#"
    emergency_priority = 200

    [safety]
    critical_hp_percent    = 15
    death_hp_percent       = 0
    low_mana_alert_percent = 20

    [behavior]
    base_delay_ms              = 40
    random_variance_ms         = 15
    micro_pause_chance_percent = 5
    micro_pause_min_ms         = 60
    micro_pause_max_ms         = 120

    [cycle]
    poll_interval_ms   = 100
    status_interval_ms = 0

    [[actions]]
    id               = "heal"
    hotkey           = "F1"
    priority         = 250
    cooldown_seconds = 1.0
    kind             = "healing"
    requirements     = [{ kind = "max_hp_percent", value = 60 }]

    [[actions]]
    id               = "fireball"
    hotkey           = "F2"
    priority         = 100
    cooldown_seconds = 2.0
    resource_cost    = 20
    requirements     = [{ kind = "has_target" }]

    [[actions]]
    id               = "frostbolt"
    hotkey           = "F3"
    priority         = 100
    cooldown_seconds = 2.0
    resource_cost    = 10
    requirements     = [{ kind = "has_target" }]

    [[actions]]
    id               = "wand"
    hotkey           = "F4"
    priority         = 90
    requirements     = [{ kind = "has_target" }]
"#;

struct Scripted(VecDeque<StateSnapshot>);

impl SnapshotProvider for Scripted {
    fn read(&mut self) -> Result<StateSnapshot, SnapshotError> {
        self.0.pop_front().ok_or(SnapshotError::Closed)
    }
}

#[derive(Default)]
struct Keyboard(Vec<String>);

impl InputExecutor for Keyboard {
    fn dispatch(&mut self, action_id: &str, _hotkey: &str) -> Result<(), DispatchError> {
        self.0.push(action_id.to_owned());
        Ok(())
    }
}

fn cfg() -> RotationConfig {
    config::parse(CONFIG).unwrap()
}

fn vitals(hp: f64, mana: f64, target: bool) -> StateSnapshot {
    StateSnapshot::new(hp, mana, target, 0)
}

fn chosen(d: RotationDecision) -> Option<String> {
    match d {
        RotationDecision::Act { action, .. } => Some(action.action_id),
        _ => None,
    }
}

#[test]
fn equal_priority_tie_goes_to_first_declared() {
    let cfg = cfg();
    let engine = RotationEngine::from_config(&cfg);
    let cd = CooldownTracker::new(&cfg.actions);
    assert_eq!(chosen(engine.decide(&vitals(100.0, 100.0, true), &cd, 0)).as_deref(), Some("fireball"));
}

#[test]
fn cost_gates_the_tie() {
    // 15% mana: fireball (20) unaffordable, frostbolt (10) fine
    let cfg = cfg();
    let engine = RotationEngine::from_config(&cfg);
    let cd = CooldownTracker::new(&cfg.actions);
    assert_eq!(chosen(engine.decide(&vitals(100.0, 15.0, true), &cd, 0)).as_deref(), Some("frostbolt"));
}

#[test]
fn no_target_means_no_offense() {
    let cfg = cfg();
    let engine = RotationEngine::from_config(&cfg);
    let cd = CooldownTracker::new(&cfg.actions);
    assert_eq!(engine.decide(&vitals(100.0, 100.0, false), &cd, 0), RotationDecision::NoEligibleAction);
}

#[test]
fn death_beats_everything() {
    let cfg = cfg();
    let engine = RotationEngine::from_config(&cfg);
    let cd = CooldownTracker::new(&cfg.actions);
    for mana in [0.0, 50.0, 100.0] {
        for target in [false, true] {
            assert_eq!(engine.decide(&vitals(0.0, mana, target), &cd, 0), RotationDecision::SafetyStop);
        }
    }
}

#[test]
fn pause_never_selects_non_emergency() {
    let cfg = cfg();
    let engine = RotationEngine::from_config(&cfg);
    let mut cd = CooldownTracker::new(&cfg.actions);
    // heal on cooldown: nothing else may fire under critical HP
    cd.mark_used("heal", 0);
    for hp in [1.0, 5.0, 10.0, 15.0] {
        assert_eq!(engine.decide(&vitals(hp, 100.0, true), &cd, 500), RotationDecision::SafetyPause);
    }
}

#[tokio::test(start_paused = true)]
async fn full_run_cycles_attacks_and_stops_on_death() {
    let cfg = cfg();
    let (tx, mut rx) = mpsc::channel(4096);
    let mut ctl = CycleController::from_config(&cfg, StdRng::seed_from_u64(2024), tx);
    let (_control_tx, control) = watch::channel(OperatorCommand::Run);

    let mut script: VecDeque<StateSnapshot> = VecDeque::new();
    script.extend((0..6).map(|_| vitals(100.0, 100.0, true)));
    script.push_back(vitals(10.0, 100.0, true)); // critical → heal
    script.push_back(vitals(0.0, 100.0, true));  // death
    script.push_back(vitals(100.0, 100.0, true)); // must never be read
    let mut provider = Scripted(script);
    let mut keyboard = Keyboard::default();

    let summary = ctl.run(&mut provider, &mut keyboard, control).await;

    assert_eq!(summary.reason, StopReason::Death);
    assert_eq!(provider.0.len(), 1);
    assert_eq!(keyboard.0.first().map(String::as_str), Some("fireball"));
    assert_eq!(keyboard.0.last().map(String::as_str), Some("heal"));
    assert!(keyboard.0.contains(&"frostbolt".to_owned()));
    assert_eq!(summary.actions_dispatched, keyboard.0.len() as u64);

    let mut dispatched = 0;
    let mut stopped = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            BotEvent::ActionDispatched { timing, .. } => {
                dispatched += 1;
                assert!(timing.pre_delay_ms >= rotation_pilot_lib::timing::MIN_DELAY_MS);
                assert!(timing.post_delay_ms >= rotation_pilot_lib::timing::MIN_DELAY_MS);
            }
            BotEvent::LoopStopped { summary } => {
                stopped += 1;
                assert_eq!(summary.reason, StopReason::Death);
            }
            _ => {}
        }
    }
    assert_eq!(dispatched, keyboard.0.len());
    assert_eq!(stopped, 1);
}
