use std::time::Duration;

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::config::AppContext;
use crate::monitors::events::LaunchEvent;
use crate::opportunity::engine::process_launch_event;
use crate::types::launch_candidate::LaunchCandidateStatus;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Turns externally fed `launch_candidates` rows into opportunities via the
/// same matching rules as the monitor-driven path, for sources that don't
/// have a WS feed of their own — e.g. a partner's webhook or a manual
/// watchlist (spec.md §4.7). Polls rather than subscribes; stale rows
/// (past `expires_at`) are rejected without ever reaching the opportunity
/// engine.
pub async fn run(ctx: std::sync::Arc<AppContext>) {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = poll_once(&ctx).await {
            warn!(error = %e, "candidate consumer poll failed");
        }
    }
}

async fn poll_once(ctx: &AppContext) -> anyhow::Result<()> {
    let now = Utc::now();
    let candidates = ctx.store.pending_launch_candidates(now).await?;

    for candidate in candidates {
        if candidate.is_stale(now) {
            ctx.store
                .mark_launch_candidate_status(
                    candidate.id,
                    LaunchCandidateStatus::Expired,
                    Some("past expires_at before being consumed"),
                )
                .await?;
            continue;
        }

        let Ok(mint) = candidate.mint.parse::<Pubkey>() else {
            ctx.store
                .mark_launch_candidate_status(
                    candidate.id,
                    LaunchCandidateStatus::Rejected,
                    Some("unparseable mint"),
                )
                .await?;
            continue;
        };

        let event = LaunchEvent {
            source: candidate.source.clone(),
            signature: String::new(),
            mint,
            bonding_curve: None,
            creator: Pubkey::default(),
            name: String::new(),
            symbol: String::new(),
            uri: String::new(),
        };

        match process_launch_event(ctx, event).await {
            Ok(()) => {
                ctx.store
                    .mark_launch_candidate_status(candidate.id, LaunchCandidateStatus::Accepted, None)
                    .await?;
            }
            Err(e) => {
                debug!(candidate_id = %candidate.id, error = %e, "candidate processing failed");
                ctx.store
                    .mark_launch_candidate_status(
                        candidate.id,
                        LaunchCandidateStatus::Rejected,
                        Some(&e.to_string()),
                    )
                    .await?;
            }
        }
    }

    Ok(())
}
