use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tracing::{debug, error, warn};

use crate::config::AppContext;
use crate::types::notification::Notification;

use super::panels::{self, ButtonRow};

/// Single poller, claim→render→send→settle, one tick at a time (spec.md
/// §4.5). Grounded on the execution worker's claim-loop shape
/// (`execution/engine.rs::run_worker`), with `notify_user`'s
/// `bot.send_message(...).parse_mode(...)` call reused from the teacher's
/// `tg_bot/notifications.rs`.
pub async fn run(ctx: Arc<AppContext>, worker_id: String) {
    let poll_interval = Duration::from_millis(ctx.settings.notifier.poll_interval_ms);
    let batch = ctx.settings.notifier.batch;

    loop {
        match ctx.store.claim_notifications(&worker_id, batch).await {
            Ok(rows) if rows.is_empty() => tokio::time::sleep(poll_interval).await,
            Ok(rows) => {
                // claim_notifications returns oldest-claimed-first; deliver
                // in that order to preserve per-user ordering (spec.md §4.5
                // "Ordering").
                for row in rows {
                    deliver(&ctx, row).await;
                }
            }
            Err(e) => {
                warn!(worker_id, error = %e, "claim_notifications failed");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

async fn deliver(ctx: &AppContext, row: Notification) {
    let Some(bot) = ctx.tg_bot.as_ref() else {
        debug!(notification_id = %row.id, "no bot configured, dropping notification");
        return;
    };

    let user = match ctx.store.get_user(row.user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            error!(notification_id = %row.id, user_id = %row.user_id, "notification references unknown user");
            mark_failed(ctx, row.id, "unknown user").await;
            return;
        }
        Err(e) => {
            warn!(notification_id = %row.id, error = %e, "get_user failed, will retry next tick");
            return;
        }
    };

    let panel = panels::render(row.notif_type(), &row.payload());
    let keyboard = to_keyboard(&panel.keyboard);

    let send = bot
        .send_message(ChatId(user.chat_id), panel.html)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await;

    match send {
        Ok(_) => {
            if let Err(e) = ctx.store.mark_notification_delivered(row.id).await {
                error!(notification_id = %row.id, error = %e, "mark_notification_delivered failed");
            }
        }
        Err(e) => {
            warn!(notification_id = %row.id, error = %e, "send_message failed");
            mark_failed(ctx, row.id, &e.to_string()).await;
        }
    }
}

async fn mark_failed(ctx: &AppContext, id: uuid::Uuid, err: &str) {
    if let Err(e) = ctx.store.mark_notification_failed(id, err).await {
        error!(notification_id = %id, error = %e, "mark_notification_failed failed");
    }
}

fn to_keyboard(rows: &[ButtonRow]) -> InlineKeyboardMarkup {
    let keyboard = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|(label, callback)| InlineKeyboardButton::callback(label.clone(), callback.clone()))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(keyboard)
}
