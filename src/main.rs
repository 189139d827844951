mod auth;
mod config;
mod error;
mod execution;
mod monitors;
mod notifier;
mod opportunity;
mod solana;
mod store;
mod tpsl;
mod types;
mod utils;
mod wallet;

use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppContext;
use crate::monitors::events::LaunchEvent;
use crate::monitors::tx_decode::CreateLayout;

/// Which of the four logical roles (spec.md §5 process model) this
/// instance runs. `All` runs every role in one process, the default for
/// local/dev; production deployments that want real OS-process isolation
/// run one instance per role instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Role {
    Hunter,
    Executor,
    Tpsl,
    Notifier,
    All,
}

#[derive(Debug, Parser)]
#[command(name = "raptor", about = "Solana launch-sniping trading bot")]
struct Cli {
    #[arg(long, value_enum, default_value_t = Role::All)]
    role: Role,
}

/// Spins up the tasks for the selected role (or every role, under `All`):
/// launchpad monitor, opportunity consumer, candidate consumer, execution
/// workers, TP/SL engine + exit queue, notification outbox. Grounded on the
/// teacher's `main.rs` collector/aggregator wiring, flattened to a
/// `JoinSet` of `tokio::spawn`s since there is no shared event-bus `Engine`
/// here (spec.md §5 "every process is single-threaded cooperative on a
/// parallel task runtime").
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let ctx = match AppContext::new("config").await {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            eprintln!("fatal configuration error: {e}");
            std::process::exit(1);
        }
    };
    info!(?ctx, role = ?cli.role, "raptor starting");

    let mut tasks = JoinSet::new();
    let runs_hunter = matches!(cli.role, Role::Hunter | Role::All);
    let runs_executor = matches!(cli.role, Role::Executor | Role::All);
    let runs_tpsl = matches!(cli.role, Role::Tpsl | Role::All);
    let runs_notifier = matches!(cli.role, Role::Notifier | Role::All);

    if runs_hunter {
        spawn_launchpad_monitor(&ctx, &mut tasks);
        tasks.spawn(opportunity::candidates::run(ctx.clone()));
    }

    if runs_executor {
        for i in 0..ctx.settings.executor.worker_count {
            tasks.spawn(execution::run_worker(ctx.clone(), format!("executor-{i}")));
        }
    }

    let exit_queue = Arc::new(tpsl::ExitQueue::new(ctx.settings.tpsl.exit_queue_capacity));
    if runs_tpsl {
        tasks.spawn(tpsl::run(ctx.clone(), exit_queue.clone()));
        tasks.spawn(exit_queue.run(ctx.clone()));
    }

    if runs_notifier {
        tasks.spawn(notifier::run(ctx.clone(), format!("notifier-{}", Uuid::new_v4())));
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
        }
        _ = wait_for_sigterm() => {
            info!("received sigterm, shutting down");
        }
        Some(result) = tasks.join_next() => {
            error!(?result, "a task exited unexpectedly, shutting down");
            std::process::exit(1);
        }
    }

    if runs_tpsl {
        info!("draining in-flight exits");
        exit_queue.drain().await;
    }

    tasks.shutdown().await;
    std::process::exit(0);
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install sigterm handler");
    term.recv().await;
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}

/// One monitor connection per configured websocket, subscribed to every
/// launchpad program whose `source` has a known account layout. Unknown
/// sources are logged and skipped rather than failing startup — new
/// launchpads get onboarded by adding a `CreateLayout`, not by touching
/// this wiring.
fn spawn_launchpad_monitor(ctx: &Arc<AppContext>, tasks: &mut JoinSet<()>) {
    let layouts: Vec<CreateLayout> = ctx
        .settings
        .launchpads
        .iter()
        .filter_map(|lp| {
            let program_id = match Pubkey::from_str(&lp.program_id) {
                Ok(p) => p,
                Err(e) => {
                    warn!(source = %lp.source, error = %e, "unparseable launchpad program id, skipping");
                    return None;
                }
            };
            match lp.source.as_str() {
                "pumpfun" => Some(CreateLayout::pumpfun(program_id)),
                other => {
                    warn!(source = other, "no known account layout for this launchpad, skipping");
                    None
                }
            }
        })
        .collect();

    let Some(ws) = ctx.settings.websockets.values().next() else {
        warn!("no websocket endpoints configured, launchpad monitor disabled");
        return;
    };
    let ws_uri = ws.uri.clone();

    let (tx, mut rx) = mpsc::unbounded_channel::<LaunchEvent>();
    tasks.spawn(monitors::launchpad_monitor::run(ctx.clone(), ws_uri, layouts, tx));

    let ctx = ctx.clone();
    tasks.spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(e) = opportunity::process_launch_event(&ctx, event).await {
                error!(error = %e, "failed to process launch event");
            }
        }
    });
}
