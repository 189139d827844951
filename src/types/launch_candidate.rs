use chrono::{DateTime, Utc};
use diesel::prelude::*;
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::store::schema::launch_candidates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum LaunchCandidateStatus {
    New,
    Accepted,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = launch_candidates)]
pub struct LaunchCandidate {
    pub id: Uuid,
    pub mint: String,
    pub source: String,
    pub status: String,
    pub reason: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl LaunchCandidate {
    pub fn status(&self) -> LaunchCandidateStatus {
        self.status
            .parse()
            .expect("store invariant: launch_candidate.status is always valid")
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = launch_candidates)]
pub struct NewLaunchCandidate {
    pub mint: String,
    pub source: String,
    pub reason: Option<String>,
    pub expires_at: DateTime<Utc>,
}
