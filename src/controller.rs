/// Cycle controller — drives sample → decide → wait → dispatch → wait.
///
/// Single-threaded and non-reentrant: one cycle is in flight at a time and the
/// loop sleeps through every delay. The only suspension points are those
/// waits; each one also watches the operator channel, so a shutdown is
/// observed between waits and never in the middle of a dispatch.
///
/// States:
///   Running — normal rotation
///   Paused  — critical HP; only emergency actions are dispatched
///   Stopped — terminal (death, shutdown, or closed source); `step` does nothing
///
/// Cooldowns are written only after the executor confirms the key press.
use crate::{
    config::RotationConfig,
    error::{DispatchError, SnapshotError},
    events::{BotEvent, SessionSummary, StopReason},
    rotation::{RotationDecision, RotationEngine},
    safety::SafetyVerdict,
    state::{CooldownTracker, SessionStats, StateSnapshot},
    timing::HumanTiming,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc::{error::TrySendError, Sender}, watch};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Produces one vitals reading per call.
pub trait SnapshotProvider {
    fn read(&mut self) -> Result<StateSnapshot, SnapshotError>;
}

/// Turns an action into an actual input event.
pub trait InputExecutor {
    fn dispatch(&mut self, action_id: &str, hotkey: &str) -> Result<(), DispatchError>;
}

// ---------------------------------------------------------------------------
// Control types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Running,
    Paused,
    Stopped,
}

/// Sent by the operator through a `watch` channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorCommand {
    #[default]
    Run,
    /// Keep sampling and checking safety, but dispatch nothing.
    Hold,
    /// Leave the loop at the next wait boundary.
    Shutdown,
}

/// Sleep for `ms`, returning false if a shutdown arrives first (or was
/// already pending).
async fn wait(ms: u64, control: &mut watch::Receiver<OperatorCommand>) -> bool {
    if *control.borrow() == OperatorCommand::Shutdown {
        return false;
    }
    if ms == 0 {
        return true;
    }

    let sleep = tokio::time::sleep(Duration::from_millis(ms));
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return *control.borrow() != OperatorCommand::Shutdown,
            changed = control.changed() => {
                if changed.is_err() {
                    // Operator handle dropped: nothing can cancel us any more.
                    (&mut sleep).await;
                    return true;
                }
                if *control.borrow_and_update() == OperatorCommand::Shutdown {
                    return false;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct CycleController<R> {
    engine:               RotationEngine,
    cooldowns:            CooldownTracker,
    timing:               HumanTiming,
    rng:                  R,
    poll_interval_ms:     u64,
    status_interval_ms:   u64,
    events:               Sender<BotEvent>,

    state:                LoopState,
    stop_reason:          Option<StopReason>,
    stats:                SessionStats,
    consecutive_failures: u32,
    low_mana_active:      bool,
    last_command:         OperatorCommand,
    last_status:          Option<Instant>,
    started:              Instant,
}

impl<R: Rng> CycleController<R> {
    /// Parts are taken as given; build them from a config that passed
    /// `RotationConfig::validate` (or use `from_config`).
    pub fn new(
        engine:             RotationEngine,
        cooldowns:          CooldownTracker,
        timing:             HumanTiming,
        rng:                R,
        poll_interval_ms:   u64,
        status_interval_ms: u64,
        events:             Sender<BotEvent>,
    ) -> Self {
        Self {
            engine,
            cooldowns,
            timing,
            rng,
            poll_interval_ms,
            status_interval_ms,
            events,
            state:                LoopState::Running,
            stop_reason:          None,
            stats:                SessionStats::default(),
            consecutive_failures: 0,
            low_mana_active:      false,
            last_command:         OperatorCommand::Run,
            last_status:          None,
            started:              Instant::now(),
        }
    }

    /// Wire everything from a validated config.
    pub fn from_config(config: &RotationConfig, rng: R, events: Sender<BotEvent>) -> Self {
        Self::new(
            RotationEngine::from_config(config),
            CooldownTracker::new(&config.actions),
            HumanTiming::new(config.behavior.clone()),
            rng,
            config.cycle.poll_interval_ms,
            config.cycle.status_interval_ms,
            events,
        )
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Snapshot failures since the last good reading; the loop never stops on this alone.
    pub fn consecutive_snapshot_failures(&self) -> u32 {
        self.consecutive_failures
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn emit(&self, event: BotEvent) {
        if let Err(TrySendError::Full(event)) = self.events.try_send(event) {
            tracing::warn!("Event channel full — dropped {:?}", event);
        }
    }

    /// Loop until death, shutdown, or a closed source.
    pub async fn run<P, E>(
        &mut self,
        provider:    &mut P,
        executor:    &mut E,
        mut control: watch::Receiver<OperatorCommand>,
    ) -> SessionSummary
    where
        P: SnapshotProvider,
        E: InputExecutor,
    {
        tracing::info!(
            "Rotation loop starting: {} actions, poll every {}ms",
            self.engine.actions().len(),
            self.poll_interval_ms
        );
        loop {
            let cycle_start = Instant::now();
            if let Some(reason) = self.step(provider, executor, &mut control).await {
                return self.stop(reason);
            }
            let elapsed = cycle_start.elapsed().as_millis() as u64;
            let remaining = self.poll_interval_ms.saturating_sub(elapsed);
            if !wait(remaining, &mut control).await {
                return self.stop(StopReason::Shutdown);
            }
        }
    }

    /// One decision cycle. Returns the reason when the loop must end.
    pub async fn step<P, E>(
        &mut self,
        provider: &mut P,
        executor: &mut E,
        control:  &mut watch::Receiver<OperatorCommand>,
    ) -> Option<StopReason>
    where
        P: SnapshotProvider,
        E: InputExecutor,
    {
        if let Some(reason) = self.stop_reason {
            return Some(reason);
        }

        let command = *control.borrow();
        if command != self.last_command {
            self.last_command = command;
            self.emit(BotEvent::OperatorChanged { command });
        }
        if command == OperatorCommand::Shutdown {
            return Some(StopReason::Shutdown);
        }

        self.stats.cycles += 1;

        let snapshot = match provider.read() {
            Ok(s) => {
                self.consecutive_failures = 0;
                s
            }
            Err(SnapshotError::Closed) => return Some(StopReason::SourceClosed),
            Err(SnapshotError::Unavailable(reason)) => {
                self.consecutive_failures += 1;
                self.stats.snapshot_failures += 1;
                self.emit(BotEvent::SnapshotFailed { consecutive: self.consecutive_failures, reason });
                return None;
            }
        };
        self.stats.record_snapshot(&snapshot);

        let now = self.now_ms();
        self.observe_mana(&snapshot, now);

        let decision = self.engine.decide(&snapshot, &self.cooldowns, now);
        self.track_safety(&decision, &snapshot, now);
        self.maybe_status(&snapshot, now);

        let action = match decision {
            RotationDecision::SafetyStop => return Some(StopReason::Death),
            RotationDecision::SafetyPause | RotationDecision::NoEligibleAction => return None,
            RotationDecision::Act { action, .. } => action,
        };

        self.emit(BotEvent::DecisionMade {
            timestamp_ms: now,
            action_id:    action.action_id.clone(),
            priority:     action.priority,
            emergency:    action.emergency,
        });

        if command == OperatorCommand::Hold {
            tracing::debug!("Hold active — {} not dispatched", action.action_id);
            return None;
        }

        let plan = self.timing.plan(&mut self.rng);
        if !wait(plan.pre_delay_ms, control).await {
            return Some(StopReason::Shutdown);
        }
        // Hold may have arrived during the pre-delay.
        if *control.borrow() == OperatorCommand::Hold {
            tracing::debug!("Hold arrived before dispatch — {} dropped", action.action_id);
            return None;
        }

        match executor.dispatch(&action.action_id, &action.hotkey) {
            Ok(()) => {
                let at = self.now_ms();
                self.cooldowns.mark_used(&action.action_id, at);
                self.stats.actions_dispatched += 1;
                self.emit(BotEvent::ActionDispatched {
                    timestamp_ms: at,
                    action_id:    action.action_id,
                    hotkey:       action.hotkey,
                    kind:         action.kind,
                    timing:       plan,
                });
            }
            Err(e) => {
                self.stats.dispatch_failures += 1;
                self.emit(BotEvent::DispatchFailed {
                    timestamp_ms: self.now_ms(),
                    action_id:    e.action_id,
                    reason:       e.reason,
                });
            }
        }

        if !wait(plan.after_dispatch_ms(), control).await {
            return Some(StopReason::Shutdown);
        }
        None
    }

    fn track_safety(&mut self, decision: &RotationDecision, snapshot: &StateSnapshot, now: u64) {
        let verdict = self.engine.safety().check(snapshot);
        let next = match (decision, verdict) {
            (RotationDecision::SafetyStop, _) => LoopState::Stopped,
            (_, SafetyVerdict::Pause)         => LoopState::Paused,
            _                                 => LoopState::Running,
        };
        if next == self.state {
            return;
        }

        match next {
            LoopState::Stopped => self.emit(BotEvent::SafetyTriggered {
                timestamp_ms: now,
                verdict:      SafetyVerdict::Stop,
                hp_percent:   snapshot.hp_percent,
            }),
            LoopState::Paused => self.emit(BotEvent::SafetyTriggered {
                timestamp_ms: now,
                verdict:      SafetyVerdict::Pause,
                hp_percent:   snapshot.hp_percent,
            }),
            LoopState::Running => self.emit(BotEvent::SafetyCleared {
                timestamp_ms: now,
                hp_percent:   snapshot.hp_percent,
            }),
        }
        self.state = next;
    }

    fn observe_mana(&mut self, snapshot: &StateSnapshot, now: u64) {
        let low = self.engine.safety().low_mana(snapshot);
        if low && !self.low_mana_active {
            self.emit(BotEvent::LowMana { timestamp_ms: now, mana_percent: snapshot.mana_percent });
        }
        self.low_mana_active = low;
    }

    fn maybe_status(&mut self, snapshot: &StateSnapshot, now: u64) {
        if self.status_interval_ms == 0 {
            return;
        }
        let due = self
            .last_status
            .map_or(true, |t| t.elapsed() >= Duration::from_millis(self.status_interval_ms));
        if due {
            self.last_status = Some(Instant::now());
            self.emit(BotEvent::Status {
                timestamp_ms: now,
                state:        self.state,
                hp_percent:   snapshot.hp_percent,
                mana_percent: snapshot.mana_percent,
                has_target:   snapshot.has_target,
            });
        }
    }

    fn stop(&mut self, reason: StopReason) -> SessionSummary {
        self.state = LoopState::Stopped;
        self.stop_reason = Some(reason);

        let summary = SessionSummary {
            reason,
            uptime_ms:             self.now_ms(),
            cycles:                self.stats.cycles,
            actions_dispatched:    self.stats.actions_dispatched,
            dispatch_failures:     self.stats.dispatch_failures,
            dispatch_success_rate: self.stats.dispatch_success_rate(),
            snapshot_failures:     self.stats.snapshot_failures,
            avg_hp_percent:        self.stats.avg_hp_percent(),
            avg_mana_percent:      self.stats.avg_mana_percent(),
        };
        self.emit(BotEvent::LoopStopped { summary: summary.clone() });
        summary
    }
}
