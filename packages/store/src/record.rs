//! # Record store: the transactional seam every engine runs against
//!
//! The engines in the `api` crate never talk to a database directly. They
//! open a [`Transaction`] from a [`RecordStore`], read and write rows through
//! it, and either [`commit`](Transaction::commit) or drop it. Dropping an
//! uncommitted transaction discards every write it made, so an early `?`
//! return can never leave a vote recorded without its counter update or a
//! reward credited without its grant marker.
//!
//! ## Guarantees a backend must give
//!
//! - **Atomicity**: writes of one transaction become visible together or not at all.
//! - **Row locking**: `*_for_update` reads hold the row until commit, so two
//!   transactions touching the same tip or user are serialised.
//! - **Uniqueness**: at most one vote per `(user, tip)`, at most one reward
//!   grant per `(user, tip, kind)`, one user per handle. Vote and grant
//!   inserts report a lost race as `Ok(false)` instead of failing, which lets
//!   the caller treat the race as "already applied".
//! - **Clamping**: balances and counters never go below zero.
//! - **Cascade**: deleting a tip removes its votes and reward grants.
//!
//! Implementations: [`crate::MemoryStore`] here, and the PostgreSQL store in
//! the `api` crate.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreResult;
use crate::models::{NewTip, NewUser, Tip, User, VoteKind};

/// Non-transactional reads plus the entry point for transactions.
pub trait RecordStore: Clone + Send + Sync + 'static {
    type Tx: Transaction;

    /// Open a transaction.
    fn begin(&self) -> impl Future<Output = StoreResult<Self::Tx>> + Send;

    fn user(&self, id: i64) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    fn tip(&self, id: i64) -> impl Future<Output = StoreResult<Option<Tip>>> + Send;

    /// The `limit` most recently created tips, newest first.
    fn recent_tips(&self, limit: usize) -> impl Future<Output = StoreResult<Vec<Tip>>> + Send;

    /// The caller's current reaction on each of `tip_ids` that has one.
    fn reactions_of(
        &self,
        user_id: i64,
        tip_ids: &[i64],
    ) -> impl Future<Output = StoreResult<HashMap<i64, VoteKind>>> + Send;

    /// Number of persisted votes of `kind` on a tip.
    fn count_votes(
        &self,
        tip_id: i64,
        kind: VoteKind,
    ) -> impl Future<Output = StoreResult<i64>> + Send;

    fn has_reward_grant(
        &self,
        user_id: i64,
        tip_id: i64,
        kind: VoteKind,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Remember that `visitor` was seen on `day`. Repeat visits are ignored.
    fn record_visit(
        &self,
        day: NaiveDate,
        visitor: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// `(distinct visitors on day, distinct visitors ever)`.
    fn visitor_counts(&self, day: NaiveDate) -> impl Future<Output = StoreResult<(i64, i64)>> + Send;
}

/// A unit of work. Nothing is visible to other transactions until
/// [`commit`](Transaction::commit).
pub trait Transaction: Send {
    /// Read and lock a user row. The lock leaves foreign-key references to
    /// the row free, so other transactions may still insert votes by it.
    fn user_for_update(&mut self, id: i64)
        -> impl Future<Output = StoreResult<Option<User>>> + Send;

    /// Current balance as seen by this transaction, without locking the row.
    fn points(&mut self, user_id: i64) -> impl Future<Output = StoreResult<Option<i64>>> + Send;

    fn user_by_handle_for_update(
        &mut self,
        handle: &str,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    /// Fails with `UniqueViolation` when the handle is taken.
    fn insert_user(&mut self, user: NewUser) -> impl Future<Output = StoreResult<User>> + Send;

    fn set_password_hash(
        &mut self,
        user_id: i64,
        hash: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Add `delta` to the balance, clamping at zero. Returns the new balance.
    fn credit_points(
        &mut self,
        user_id: i64,
        delta: i64,
    ) -> impl Future<Output = StoreResult<i64>> + Send;

    /// Set the streak and check-in day and credit `reward`, unless the user
    /// already checked in on `day`. Returns the new balance, or `None` when
    /// nothing was written.
    fn record_checkin(
        &mut self,
        user_id: i64,
        day: NaiveDate,
        streak: i32,
        reward: i64,
    ) -> impl Future<Output = StoreResult<Option<i64>>> + Send;

    fn set_last_submit_at(
        &mut self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn tip_for_update(&mut self, id: i64) -> impl Future<Output = StoreResult<Option<Tip>>> + Send;

    fn insert_tip(
        &mut self,
        tip: NewTip,
        created_at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Tip>> + Send;

    /// Delete a tip with its votes and reward grants. `false` if it did not exist.
    fn delete_tip(&mut self, id: i64) -> impl Future<Output = StoreResult<bool>> + Send;

    fn vote(
        &mut self,
        user_id: i64,
        tip_id: i64,
    ) -> impl Future<Output = StoreResult<Option<VoteKind>>> + Send;

    /// `false` when a vote for the pair already exists.
    fn insert_vote(
        &mut self,
        user_id: i64,
        tip_id: i64,
        kind: VoteKind,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// `false` when no vote of that kind existed.
    fn delete_vote(
        &mut self,
        user_id: i64,
        tip_id: i64,
        kind: VoteKind,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Apply counter deltas, clamping each at zero. Returns `(likes, dislikes)`.
    fn adjust_tip_counts(
        &mut self,
        tip_id: i64,
        likes_delta: i64,
        dislikes_delta: i64,
    ) -> impl Future<Output = StoreResult<(i64, i64)>> + Send;

    /// `true` if the grant was created now, `false` if it already existed.
    fn insert_reward_grant(
        &mut self,
        user_id: i64,
        tip_id: i64,
        kind: VoteKind,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    fn commit(self) -> impl Future<Output = StoreResult<()>> + Send;
}
