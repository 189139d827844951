use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::store::schema::notifications;

/// Every terminal state produces exactly one of these (spec.md §7
/// "User-visible behavior").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum NotificationType {
    BuyConfirmed,
    BuyFailed,
    TpHit,
    SlHit,
    TrailingStopHit,
    PositionClosed,
    ExecutionFailed,
    HuntSkipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationPayload {
    pub mint: Option<String>,
    pub token_symbol: Option<String>,
    pub amount_sol: Option<f64>,
    pub token_amount: Option<f64>,
    pub tx_hash: Option<String>,
    pub entry_market_cap_sol: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub sol_received: Option<f64>,
    pub trigger: Option<String>,
    pub position_id: Option<Uuid>,
    pub needed_sol: Option<f64>,
    pub have_sol: Option<f64>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Identifiable)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notif_type: String,
    pub payload: serde_json::Value,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub failed: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn notif_type(&self) -> NotificationType {
        self.notif_type
            .parse()
            .expect("store invariant: notification.notif_type is always valid")
    }

    pub fn payload(&self) -> NotificationPayload {
        serde_json::from_value(self.payload.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notif_type: String,
    pub payload: serde_json::Value,
}

impl NewNotification {
    pub fn new(user_id: Uuid, notif_type: NotificationType, payload: NotificationPayload) -> Self {
        Self {
            user_id,
            notif_type: notif_type.to_string(),
            payload: serde_json::to_value(payload).expect("NotificationPayload always serializes"),
        }
    }
}
