pub mod conditions;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod profiles;
pub mod replay;
pub mod rotation;
pub mod safety;
pub mod state;
pub mod timing;

use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};

const USAGE: &str = "usage: rotation-pilot <rotation.toml> <snapshots.jsonl> [seed]";

/// Command-line arguments, positional only.
#[derive(Debug, PartialEq)]
struct Args {
    config:    PathBuf,
    snapshots: PathBuf,
    seed:      Option<u64>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let config = args.first().context(USAGE)?;
    let snapshots = args.get(1).context(USAGE)?;
    let seed = args
        .get(2)
        .map(|raw| raw.parse::<u64>().with_context(|| format!("invalid seed: {}", raw)))
        .transpose()?;
    Ok(Args { config: config.into(), snapshots: snapshots.into(), seed })
}

fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    // -----------------------------------------------------------------------
    // Logging — rolling log file, one per day.
    // Directory: $ROTATION_PILOT_LOG_DIR, else <temp>/rotation-pilot/logs
    // -----------------------------------------------------------------------
    let log_dir = std::env::var("ROTATION_PILOT_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("rotation-pilot").join("logs"));
    let _ = std::fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::daily(&log_dir, "pilot.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rotation_pilot_lib=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false) // log files should not contain ANSI colour codes
        .init();

    // Panic hook — route panics through tracing before the process dies.
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        tracing::error!("PANIC at {}: {}", location, message);
    }));

    tracing::info!("Rotation pilot starting — logs → {}", log_dir.display());
    guard
}

/// Binary entry point. Configuration errors are returned before the loop is
/// entered; everything after that is reported through events.
pub fn run() -> Result<()> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&argv)?;

    // Keep the guard alive for the process lifetime — drop = flush
    let _guard = init_logging();

    let cfg = config::load(&args.config)?;
    let mut provider = replay::ReplayProvider::open(&args.snapshots)?;
    let mut executor = replay::LoggingExecutor::default();

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None       => StdRng::from_entropy(),
    };

    // Single cycle in flight — a current-thread runtime is all the loop needs.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let (summary, keys_sent) = runtime.block_on(async move {
        let (event_tx, event_rx)     = mpsc::channel::<events::BotEvent>(256);
        let (control_tx, control_rx) = watch::channel(controller::OperatorCommand::Run);

        let logger = tokio::spawn(events::run(event_rx));

        // Ctrl+C → cooperative shutdown at the next wait boundary
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received — shutting down");
                let _ = control_tx.send(controller::OperatorCommand::Shutdown);
            }
        });

        let mut ctl = controller::CycleController::from_config(&cfg, rng, event_tx);
        let summary = ctl.run(&mut provider, &mut executor, control_rx).await;
        drop(ctl); // closes the event channel so the logger drains and exits

        match logger.await {
            Ok(Err(e)) => tracing::warn!("Event logger failed: {}", e),
            Err(e)     => tracing::warn!("Event logger task failed: {}", e),
            Ok(Ok(_))  => {}
        }
        (summary, executor.keys_sent)
    });

    tracing::info!(
        "Session over: {:?}, {} keys sent",
        summary.reason,
        keys_sent
    );
    Ok(())
}
