use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::store::schema::users;

/// Keyed by telegram id per spec.md §3; `id` is the opaque store key callers
/// actually use once the user row exists.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub telegram_id: i64,
    pub chat_id: i64,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub telegram_id: i64,
    pub chat_id: i64,
}

impl NewUser {
    pub fn new(telegram_id: i64, chat_id: i64) -> Self {
        Self {
            telegram_id,
            chat_id,
        }
    }
}
