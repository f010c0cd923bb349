/// Discrete events emitted by the cycle controller.
///
/// The core only produces these; `run` is the logger side that drains the
/// channel and formats each event through `tracing`. Death is reported as a
/// `LoopStopped` with `StopReason::Death`, distinct from any failure event.
use crate::{
    config::ActionKind,
    controller::{LoopState, OperatorCommand},
    safety::SafetyVerdict,
    timing::TimingPlan,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Receiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// HP reached the death threshold.
    Death,
    /// Operator or signal asked the loop to exit.
    Shutdown,
    /// The snapshot provider will not produce any more readings.
    SourceClosed,
}

/// End-of-run statistics, attached to `LoopStopped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub reason:                StopReason,
    pub uptime_ms:             u64,
    pub cycles:                u64,
    pub actions_dispatched:    u64,
    pub dispatch_failures:     u64,
    pub dispatch_success_rate: Option<f64>,
    pub snapshot_failures:     u64,
    pub avg_hp_percent:        Option<f64>,
    pub avg_mana_percent:      Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotEvent {
    DecisionMade {
        timestamp_ms: u64,
        action_id:    String,
        priority:     i64,
        emergency:    bool,
    },
    SafetyTriggered {
        timestamp_ms: u64,
        verdict:      SafetyVerdict,
        hp_percent:   f64,
    },
    SafetyCleared {
        timestamp_ms: u64,
        hp_percent:   f64,
    },
    /// Advisory; emitted once when mana drops to the alert threshold.
    LowMana {
        timestamp_ms: u64,
        mana_percent: f64,
    },
    ActionDispatched {
        timestamp_ms: u64,
        action_id:    String,
        hotkey:       String,
        kind:         ActionKind,
        timing:       TimingPlan,
    },
    DispatchFailed {
        timestamp_ms: u64,
        action_id:    String,
        reason:       String,
    },
    SnapshotFailed {
        consecutive: u32,
        reason:      String,
    },
    OperatorChanged {
        command: OperatorCommand,
    },
    Status {
        timestamp_ms: u64,
        state:        LoopState,
        hp_percent:   f64,
        mana_percent: f64,
        has_target:   bool,
    },
    LoopStopped {
        summary: SessionSummary,
    },
}

fn opt_pct(v: Option<f64>) -> String {
    v.map(|v| format!("{:.0}%", v)).unwrap_or_else(|| "n/a".to_owned())
}

/// Format a single event through `tracing` at a level matching its weight.
pub fn log_event(event: &BotEvent) {
    match event {
        BotEvent::DecisionMade { action_id, priority, emergency, .. } => {
            tracing::debug!("Decision: {} (priority {}{})", action_id, priority, if *emergency { ", emergency" } else { "" });
        }
        BotEvent::SafetyTriggered { verdict: SafetyVerdict::Stop, hp_percent, .. } => {
            tracing::error!("Death detected (HP {:.0}%) — stopping", hp_percent);
        }
        BotEvent::SafetyTriggered { verdict, hp_percent, .. } => {
            tracing::warn!("Critical HP {:.0}% — safety {:?}", hp_percent, verdict);
        }
        BotEvent::SafetyCleared { hp_percent, .. } => {
            tracing::info!("HP recovered to {:.0}% — rotation resumed", hp_percent);
        }
        BotEvent::LowMana { mana_percent, .. } => {
            tracing::warn!("Low mana: {:.0}%", mana_percent);
        }
        BotEvent::ActionDispatched { action_id, hotkey, kind, timing, .. } => {
            tracing::info!(
                "{:?} {} ({}) pre={}ms post={}ms{}",
                kind, action_id, hotkey, timing.pre_delay_ms, timing.post_delay_ms,
                timing.micro_pause_ms.map(|m| format!(" +pause {}ms", m)).unwrap_or_default()
            );
        }
        BotEvent::DispatchFailed { action_id, reason, .. } => {
            tracing::warn!("Dispatch of {} failed: {}", action_id, reason);
        }
        BotEvent::SnapshotFailed { consecutive, reason } => {
            tracing::warn!("Snapshot failed ({} in a row): {}", consecutive, reason);
        }
        BotEvent::OperatorChanged { command } => {
            tracing::info!("Operator command: {:?}", command);
        }
        BotEvent::Status { state, hp_percent, mana_percent, has_target, .. } => {
            tracing::info!(
                "{:?} | HP {:.0}% | Mana {:.0}% | target={}",
                state, hp_percent, mana_percent, has_target
            );
        }
        BotEvent::LoopStopped { summary } => {
            tracing::info!(
                "Loop stopped ({:?}) after {:.1}s: {} cycles, {} actions, {} dispatch failures (success {}), avg HP {}, avg mana {}",
                summary.reason,
                summary.uptime_ms as f64 / 1_000.0,
                summary.cycles,
                summary.actions_dispatched,
                summary.dispatch_failures,
                opt_pct(summary.dispatch_success_rate),
                opt_pct(summary.avg_hp_percent),
                opt_pct(summary.avg_mana_percent),
            );
        }
    }
}

/// Logger task: drain events until every sender is gone. Returns the final
/// summary if one was seen.
pub async fn run(mut rx: Receiver<BotEvent>) -> Result<Option<SessionSummary>> {
    let mut last_summary = None;
    while let Some(event) = rx.recv().await {
        log_event(&event);
        if let BotEvent::LoopStopped { summary } = event {
            last_summary = Some(summary);
        }
    }
    Ok(last_summary)
}
