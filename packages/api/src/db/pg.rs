//! PostgreSQL record store.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres};
use store::{NewTip, NewUser, RecordStore, StoreError, StoreResult, Tip, Transaction, User, VoteKind};

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    handle: String,
    password_hash: String,
    points: i64,
    checkin_streak: i32,
    last_checkin_day: Option<NaiveDate>,
    last_submit_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            handle: row.handle,
            password_hash: row.password_hash,
            points: row.points,
            checkin_streak: row.checkin_streak,
            last_checkin_day: row.last_checkin_day,
            last_submit_at: row.last_submit_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct TipRow {
    id: i64,
    author_id: i64,
    title: String,
    link_url: String,
    image_url: String,
    attachment: Option<String>,
    tags: String,
    note: String,
    likes_count: i64,
    dislikes_count: i64,
    created_at: DateTime<Utc>,
}

impl From<TipRow> for Tip {
    fn from(row: TipRow) -> Self {
        Tip {
            id: row.id,
            author_id: row.author_id,
            title: row.title,
            link_url: row.link_url,
            image_url: row.image_url,
            attachment: row.attachment,
            tags: row.tags,
            note: row.note,
            likes_count: row.likes_count,
            dislikes_count: row.dislikes_count,
            created_at: row.created_at,
        }
    }
}

fn db(e: sqlx::Error) -> StoreError {
    StoreError::backend(e)
}

fn parse_kind(s: String) -> StoreResult<VoteKind> {
    s.parse().map_err(StoreError::backend)
}

/// Record store backed by a PostgreSQL pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// An open PostgreSQL transaction. Rolled back when dropped uncommitted.
pub struct PgTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl RecordStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> StoreResult<PgTx> {
        let tx = self.pool.begin().await.map_err(db)?;
        Ok(PgTx { tx })
    }

    async fn user(&self, id: i64) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        Ok(row.map(User::from))
    }

    async fn tip(&self, id: i64) -> StoreResult<Option<Tip>> {
        let row: Option<TipRow> = sqlx::query_as("SELECT * FROM tips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        Ok(row.map(Tip::from))
    }

    async fn recent_tips(&self, limit: usize) -> StoreResult<Vec<Tip>> {
        let rows: Vec<TipRow> =
            sqlx::query_as("SELECT * FROM tips ORDER BY created_at DESC, id DESC LIMIT $1")
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;
        Ok(rows.into_iter().map(Tip::from).collect())
    }

    async fn reactions_of(&self, user_id: i64, tip_ids: &[i64]) -> StoreResult<HashMap<i64, VoteKind>> {
        if tip_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT tip_id, kind FROM votes WHERE user_id = $1 AND tip_id = ANY($2)")
                .bind(user_id)
                .bind(tip_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;
        rows.into_iter()
            .map(|(tip_id, kind)| Ok((tip_id, parse_kind(kind)?)))
            .collect()
    }

    async fn count_votes(&self, tip_id: i64, kind: VoteKind) -> StoreResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE tip_id = $1 AND kind = $2")
            .bind(tip_id)
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db)
    }

    async fn has_reward_grant(&self, user_id: i64, tip_id: i64, kind: VoteKind) -> StoreResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reward_grants WHERE user_id = $1 AND tip_id = $2 AND kind = $3)",
        )
        .bind(user_id)
        .bind(tip_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db)
    }

    async fn record_visit(&self, day: NaiveDate, visitor: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO visits (day, visitor) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(day)
            .bind(visitor)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(())
    }

    async fn visitor_counts(&self, day: NaiveDate) -> StoreResult<(i64, i64)> {
        sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM visits WHERE day = $1), \
                    (SELECT COUNT(DISTINCT visitor) FROM visits)",
        )
        .bind(day)
        .fetch_one(&self.pool)
        .await
        .map_err(db)
    }
}

impl Transaction for PgTx {
    // User rows are locked FOR NO KEY UPDATE: it conflicts with writers but
    // not with the FOR KEY SHARE locks taken by foreign-key checks on
    // votes.user_id and reward_grants.user_id.
    async fn user_for_update(&mut self, id: i64) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT * FROM users WHERE id = $1 FOR NO KEY UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db)?;
        Ok(row.map(User::from))
    }

    async fn points(&mut self, user_id: i64) -> StoreResult<Option<i64>> {
        sqlx::query_scalar("SELECT points FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)
    }

    async fn user_by_handle_for_update(&mut self, handle: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT * FROM users WHERE handle = $1 FOR NO KEY UPDATE")
                .bind(handle)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db)?;
        Ok(row.map(User::from))
    }

    async fn insert_user(&mut self, user: NewUser) -> StoreResult<User> {
        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (handle, password_hash, points) VALUES ($1, $2, GREATEST($3, 0)) RETURNING *",
        )
        .bind(&user.handle)
        .bind(&user.password_hash)
        .bind(user.points)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                StoreError::UniqueViolation {
                    constraint: "users_handle_key",
                }
            } else {
                db(e)
            }
        })?;
        Ok(row.into())
    }

    async fn set_password_hash(&mut self, user_id: i64, hash: &str) -> StoreResult<()> {
        let done = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(hash)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        if done.rows_affected() == 0 {
            return Err(StoreError::Missing { entity: "user", id: user_id });
        }
        Ok(())
    }

    async fn credit_points(&mut self, user_id: i64, delta: i64) -> StoreResult<i64> {
        let points: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET points = GREATEST(points + $2, 0) WHERE id = $1 RETURNING points",
        )
        .bind(user_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        points.ok_or(StoreError::Missing { entity: "user", id: user_id })
    }

    async fn record_checkin(
        &mut self,
        user_id: i64,
        day: NaiveDate,
        streak: i32,
        reward: i64,
    ) -> StoreResult<Option<i64>> {
        sqlx::query_scalar(
            "UPDATE users \
             SET checkin_streak = $3, last_checkin_day = $2, points = GREATEST(points + $4, 0) \
             WHERE id = $1 AND last_checkin_day IS DISTINCT FROM $2 \
             RETURNING points",
        )
        .bind(user_id)
        .bind(day)
        .bind(streak)
        .bind(reward)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)
    }

    async fn set_last_submit_at(&mut self, user_id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_submit_at = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        Ok(())
    }

    async fn tip_for_update(&mut self, id: i64) -> StoreResult<Option<Tip>> {
        let row: Option<TipRow> = sqlx::query_as("SELECT * FROM tips WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?;
        Ok(row.map(Tip::from))
    }

    async fn insert_tip(&mut self, tip: NewTip, created_at: DateTime<Utc>) -> StoreResult<Tip> {
        let row: TipRow = sqlx::query_as(
            "INSERT INTO tips (author_id, title, link_url, image_url, attachment, tags, note, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(tip.author_id)
        .bind(&tip.title)
        .bind(&tip.link_url)
        .bind(&tip.image_url)
        .bind(&tip.attachment)
        .bind(&tip.tags)
        .bind(&tip.note)
        .bind(created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(row.into())
    }

    async fn delete_tip(&mut self, id: i64) -> StoreResult<bool> {
        // votes and reward_grants go with it through ON DELETE CASCADE.
        let done = sqlx::query("DELETE FROM tips WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        Ok(done.rows_affected() > 0)
    }

    async fn vote(&mut self, user_id: i64, tip_id: i64) -> StoreResult<Option<VoteKind>> {
        let kind: Option<String> =
            sqlx::query_scalar("SELECT kind FROM votes WHERE user_id = $1 AND tip_id = $2")
                .bind(user_id)
                .bind(tip_id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db)?;
        kind.map(parse_kind).transpose()
    }

    async fn insert_vote(&mut self, user_id: i64, tip_id: i64, kind: VoteKind) -> StoreResult<bool> {
        let done = sqlx::query(
            "INSERT INTO votes (tip_id, user_id, kind) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(tip_id)
        .bind(user_id)
        .bind(kind.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(done.rows_affected() == 1)
    }

    async fn delete_vote(&mut self, user_id: i64, tip_id: i64, kind: VoteKind) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM votes WHERE tip_id = $1 AND user_id = $2 AND kind = $3")
            .bind(tip_id)
            .bind(user_id)
            .bind(kind.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        Ok(done.rows_affected() > 0)
    }

    async fn adjust_tip_counts(
        &mut self,
        tip_id: i64,
        likes_delta: i64,
        dislikes_delta: i64,
    ) -> StoreResult<(i64, i64)> {
        let counts: Option<(i64, i64)> = sqlx::query_as(
            "UPDATE tips \
             SET likes_count = GREATEST(likes_count + $2, 0), \
                 dislikes_count = GREATEST(dislikes_count + $3, 0) \
             WHERE id = $1 \
             RETURNING likes_count, dislikes_count",
        )
        .bind(tip_id)
        .bind(likes_delta)
        .bind(dislikes_delta)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        counts.ok_or(StoreError::Missing { entity: "tip", id: tip_id })
    }

    async fn insert_reward_grant(&mut self, user_id: i64, tip_id: i64, kind: VoteKind) -> StoreResult<bool> {
        let done = sqlx::query(
            "INSERT INTO reward_grants (tip_id, user_id, kind) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(tip_id)
        .bind(user_id)
        .bind(kind.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(done.rows_affected() == 1)
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(db)
    }
}
