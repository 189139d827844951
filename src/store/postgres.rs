use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Nullable, Text, Uuid as SqlUuid};
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::error::RaptorError;
use crate::store::schema::*;
use crate::store::{Store, StoreResult};
use crate::types::*;

/// Mirrors `storage::persistent::DbPool` in the teacher: a deadpool handle
/// shared across every task that touches the store.
pub type DbPool = std::sync::Arc<Pool<AsyncPgConnection>>;

pub fn connect(database_url: &str) -> DbPool {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    std::sync::Arc::new(
        Pool::builder(manager)
            .build()
            .expect("failed to build postgres pool"),
    )
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn load_or_create_user(&self, telegram_id: i64, chat_id: i64) -> StoreResult<User> {
        let mut conn = self.pool.get().await?;
        let existing = users::table
            .filter(users::telegram_id.eq(telegram_id))
            .first::<User>(&mut conn)
            .await
            .optional()?;
        if let Some(user) = existing {
            return Ok(user);
        }
        diesel::insert_into(users::table)
            .values(NewUser::new(telegram_id, chat_id))
            .get_result::<User>(&mut conn)
            .await
            .map_err(RaptorError::from)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut conn = self.pool.get().await?;
        users::table
            .filter(users::id.eq(id))
            .first::<User>(&mut conn)
            .await
            .optional()
            .map_err(RaptorError::from)
    }

    async fn get_wallet(&self, user_id: Uuid, chain: Chain) -> StoreResult<Option<Wallet>> {
        let mut conn = self.pool.get().await?;
        wallets::table
            .filter(wallets::user_id.eq(user_id))
            .filter(wallets::chain.eq(chain.to_string()))
            .first::<Wallet>(&mut conn)
            .await
            .optional()
            .map_err(RaptorError::from)
    }

    async fn insert_wallet(&self, wallet: NewWallet) -> StoreResult<Wallet> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(wallets::table)
            .values(wallet)
            .get_result::<Wallet>(&mut conn)
            .await
            .map_err(RaptorError::from)
    }

    async fn enabled_strategies(&self, chain: Chain) -> StoreResult<Vec<Strategy>> {
        let mut conn = self.pool.get().await?;
        strategies::table
            .filter(strategies::chain.eq(chain.to_string()))
            .filter(strategies::enabled.eq(true))
            .load::<Strategy>(&mut conn)
            .await
            .map_err(RaptorError::from)
    }

    async fn get_strategy(&self, id: Uuid) -> StoreResult<Option<Strategy>> {
        let mut conn = self.pool.get().await?;
        strategies::table
            .find(id)
            .first::<Strategy>(&mut conn)
            .await
            .optional()
            .map_err(RaptorError::from)
    }

    async fn upsert_opportunity(&self, new: NewOpportunity) -> StoreResult<Opportunity> {
        let mut conn = self.pool.get().await?;
        let existing = opportunities::table
            .filter(opportunities::source.eq(&new.source))
            .filter(opportunities::token_mint.eq(&new.token_mint))
            .first::<Opportunity>(&mut conn)
            .await
            .optional()?;
        if let Some(opp) = existing {
            return Ok(opp);
        }
        diesel::insert_into(opportunities::table)
            .values(&new)
            .get_result::<Opportunity>(&mut conn)
            .await
            // a concurrent insert can still race us between the select and
            // the insert; treat the unique-violation as a fetch-and-return.
            .or_else(|_| Err(RaptorError::DbTransient("opportunity upsert race".into())))
            .map_err(RaptorError::from)
    }

    async fn get_opportunity(&self, id: Uuid) -> StoreResult<Option<Opportunity>> {
        let mut conn = self.pool.get().await?;
        opportunities::table
            .find(id)
            .first::<Opportunity>(&mut conn)
            .await
            .optional()
            .map_err(RaptorError::from)
    }

    async fn set_opportunity_score(
        &self,
        id: Uuid,
        score: i32,
        reasons: Vec<ScoreReason>,
    ) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        diesel::update(opportunities::table.find(id))
            .set((
                opportunities::score.eq(score),
                opportunities::reasons.eq(serde_json::to_value(reasons).unwrap()),
                opportunities::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn advance_opportunity_status(
        &self,
        id: Uuid,
        next: OpportunityStatus,
    ) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let current = opportunities::table
            .find(id)
            .select(opportunities::status)
            .first::<String>(&mut conn)
            .await?;
        let current: OpportunityStatus = current
            .parse()
            .map_err(|_| RaptorError::Other("corrupt opportunity status".into()))?;
        if !current.can_advance_to(next) {
            return Ok(false);
        }
        let rows = diesel::update(
            opportunities::table
                .filter(opportunities::id.eq(id))
                .filter(opportunities::status.eq(current.to_string())),
        )
        .set((
            opportunities::status.eq(next.to_string()),
            opportunities::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await?;
        Ok(rows == 1)
    }

    async fn insert_trade_job(&self, new: NewTradeJob) -> StoreResult<Option<TradeJob>> {
        let mut conn = self.pool.get().await?;
        match diesel::insert_into(trade_jobs::table)
            .values(&new)
            .get_result::<TradeJob>(&mut conn)
            .await
        {
            Ok(job) => Ok(Some(job)),
            Err(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            )) => Ok(None),
            Err(e) => Err(RaptorError::from(e)),
        }
    }

    async fn claim_next_job(&self, worker_id: &str, limit: i64) -> StoreResult<Vec<TradeJob>> {
        let mut conn = self.pool.get().await?;
        diesel::sql_query("select * from claim_next_job($1, $2)")
            .bind::<Text, _>(worker_id)
            .bind::<BigInt, _>(limit)
            .get_results::<TradeJob>(&mut conn)
            .await
            .map_err(RaptorError::from)
    }

    async fn mark_job_status(
        &self,
        id: Uuid,
        status: TradeJobStatus,
        attempts: i32,
        last_error: Option<String>,
    ) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        diesel::update(trade_jobs::table.find(id))
            .set((
                trade_jobs::status.eq(status.to_string()),
                trade_jobs::attempts.eq(attempts),
                trade_jobs::last_error.eq(last_error),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn insert_position(&self, new: NewPosition) -> StoreResult<Position> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(positions::table)
            .values(&new)
            .get_result::<Position>(&mut conn)
            .await
            .map_err(RaptorError::from)
    }

    async fn get_position(&self, id: Uuid) -> StoreResult<Option<Position>> {
        let mut conn = self.pool.get().await?;
        positions::table
            .find(id)
            .first::<Position>(&mut conn)
            .await
            .optional()
            .map_err(RaptorError::from)
    }

    async fn open_positions(&self, chain: Chain) -> StoreResult<Vec<Position>> {
        let mut conn = self.pool.get().await?;
        positions::table
            .filter(positions::chain.eq(chain.to_string()))
            .filter(positions::trigger_state.eq("MONITORING"))
            .load::<Position>(&mut conn)
            .await
            .map_err(RaptorError::from)
    }

    async fn trigger_exit_atomically(
        &self,
        position_id: Uuid,
        trigger: TriggerKind,
        price: f64,
    ) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        #[derive(QueryableByName)]
        struct Outcome {
            #[diesel(sql_type = diesel::sql_types::Bool)]
            trigger_exit_atomically: bool,
        }
        let outcome = diesel::sql_query("select trigger_exit_atomically($1, $2, $3) as trigger_exit_atomically")
            .bind::<SqlUuid, _>(position_id)
            .bind::<Text, _>(trigger.to_string())
            .bind::<Double, _>(price)
            .get_result::<Outcome>(&mut conn)
            .await?;
        Ok(outcome.trigger_exit_atomically)
    }

    async fn mark_position_executing(&self, position_id: Uuid) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        #[derive(QueryableByName)]
        struct Outcome {
            #[diesel(sql_type = diesel::sql_types::Bool)]
            mark_position_executing: bool,
        }
        let outcome = diesel::sql_query("select mark_position_executing($1) as mark_position_executing")
            .bind::<SqlUuid, _>(position_id)
            .get_result::<Outcome>(&mut conn)
            .await?;
        Ok(outcome.mark_position_executing)
    }

    async fn mark_trigger_completed(
        &self,
        position_id: Uuid,
        realized_pnl_sol: f64,
        remaining_size_tokens: f64,
    ) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let closed = remaining_size_tokens <= 0.0;
        diesel::sql_query("select mark_trigger_completed($1)")
            .bind::<SqlUuid, _>(position_id)
            .execute(&mut conn)
            .await?;
        diesel::update(positions::table.find(position_id))
            .set((
                positions::size_tokens.eq(remaining_size_tokens),
                positions::realized_pnl_sol.eq(realized_pnl_sol),
                positions::lifecycle_state.eq(if closed { "CLOSED" } else { "POST_GRADUATION" }),
                positions::closed_at.eq(if closed { Some(Utc::now()) } else { None }),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn mark_trigger_failed(&self, position_id: Uuid, _reason: &str) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        diesel::sql_query("select mark_trigger_failed($1, $2)")
            .bind::<SqlUuid, _>(position_id)
            .bind::<Text, _>(_reason)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn graduate_position_atomically(
        &self,
        position_id: Uuid,
        _pool: Option<&str>,
    ) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        #[derive(QueryableByName)]
        struct Outcome {
            #[diesel(sql_type = diesel::sql_types::Bool)]
            graduate_position_atomically: bool,
        }
        let outcome = diesel::sql_query(
            "select graduate_position_atomically($1, $2) as graduate_position_atomically",
        )
        .bind::<SqlUuid, _>(position_id)
        .bind::<Nullable<Text>, _>(_pool)
        .get_result::<Outcome>(&mut conn)
        .await?;
        Ok(outcome.graduate_position_atomically)
    }

    async fn update_trailing(
        &self,
        position_id: Uuid,
        peak_price: f64,
        trailing_stop_price: f64,
    ) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        diesel::update(positions::table.find(position_id))
            .set((
                positions::peak_price.eq(peak_price),
                positions::trailing_stop_price.eq(trailing_stop_price),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn reopen_for_moon_bag(
        &self,
        position_id: Uuid,
        remaining_size_tokens: f64,
        exit_level: usize,
    ) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let current = positions::table
            .find(position_id)
            .select(positions::exit_levels_hit)
            .first::<serde_json::Value>(&mut conn)
            .await?;
        let mut levels: Vec<usize> = serde_json::from_value(current).unwrap_or_default();
        levels.push(exit_level);
        diesel::update(positions::table.find(position_id))
            .set((
                positions::size_tokens.eq(remaining_size_tokens),
                positions::trigger_state.eq("MONITORING"),
                positions::partial_exit_taken.eq(true),
                positions::exit_levels_hit.eq(serde_json::to_value(levels).unwrap()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn insert_notification(&self, new: NewNotification) -> StoreResult<Notification> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(notifications::table)
            .values(new)
            .get_result::<Notification>(&mut conn)
            .await
            .map_err(RaptorError::from)
    }

    async fn claim_notifications(&self, worker_id: &str, limit: i64) -> StoreResult<Vec<Notification>> {
        let mut conn = self.pool.get().await?;
        diesel::sql_query("select * from claim_notifications($1, $2)")
            .bind::<Text, _>(worker_id)
            .bind::<BigInt, _>(limit)
            .get_results::<Notification>(&mut conn)
            .await
            .map_err(RaptorError::from)
    }

    async fn mark_notification_delivered(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        diesel::sql_query("select mark_notification_delivered($1)")
            .bind::<SqlUuid, _>(id)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn mark_notification_failed(&self, id: Uuid, err: &str) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        diesel::sql_query("select mark_notification_failed($1, $2)")
            .bind::<SqlUuid, _>(id)
            .bind::<Text, _>(err)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn upsert_launch_candidate(&self, new: NewLaunchCandidate) -> StoreResult<LaunchCandidate> {
        let mut conn = self.pool.get().await?;
        let existing = launch_candidates::table
            .filter(launch_candidates::mint.eq(&new.mint))
            .filter(launch_candidates::source.eq(&new.source))
            .first::<LaunchCandidate>(&mut conn)
            .await
            .optional()?;
        if let Some(candidate) = existing {
            return Ok(candidate);
        }
        diesel::insert_into(launch_candidates::table)
            .values(&new)
            .get_result::<LaunchCandidate>(&mut conn)
            .await
            .map_err(RaptorError::from)
    }

    async fn pending_launch_candidates(&self, now: DateTime<Utc>) -> StoreResult<Vec<LaunchCandidate>> {
        let mut conn = self.pool.get().await?;
        launch_candidates::table
            .filter(launch_candidates::status.eq("new"))
            .filter(launch_candidates::expires_at.gt(now))
            .load::<LaunchCandidate>(&mut conn)
            .await
            .map_err(RaptorError::from)
    }

    async fn mark_launch_candidate_status(
        &self,
        id: Uuid,
        status: LaunchCandidateStatus,
        reason: Option<&str>,
    ) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        diesel::update(launch_candidates::table.find(id))
            .set((
                launch_candidates::status.eq(status.to_string()),
                launch_candidates::reason.eq(reason),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}
