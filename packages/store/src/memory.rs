use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{StoreError, StoreResult};
use crate::models::{clamped_add, NewTip, NewUser, Tip, User, VoteKind};
use crate::record::{RecordStore, Transaction};

#[derive(Clone, Debug, Default)]
struct Tables {
    last_user_id: i64,
    last_tip_id: i64,
    users: BTreeMap<i64, User>,
    tips: BTreeMap<i64, Tip>,
    /// Keyed by `(tip_id, user_id)`.
    votes: BTreeMap<(i64, i64), VoteKind>,
    /// `(tip_id, user_id, kind)`.
    grants: BTreeSet<(i64, i64, VoteKind)>,
    visits: BTreeSet<(NaiveDate, String)>,
}

impl Tables {
    fn user_mut(&mut self, id: i64) -> StoreResult<&mut User> {
        self.users
            .get_mut(&id)
            .ok_or(StoreError::Missing { entity: "user", id })
    }

    fn tip_mut(&mut self, id: i64) -> StoreResult<&mut Tip> {
        self.tips
            .get_mut(&id)
            .ok_or(StoreError::Missing { entity: "tip", id })
    }
}

/// In-memory record store for tests and local development.
///
/// One async mutex guards all tables, so transactions are fully serialised.
/// A transaction edits a staged copy and swaps it in on commit.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Transaction over a [`MemoryStore`]. Holds the store lock until dropped.
#[derive(Debug)]
pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

impl RecordStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryTx { guard, staged })
    }

    async fn user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn tip(&self, id: i64) -> StoreResult<Option<Tip>> {
        Ok(self.tables.lock().await.tips.get(&id).cloned())
    }

    async fn recent_tips(&self, limit: usize) -> StoreResult<Vec<Tip>> {
        let tables = self.tables.lock().await;
        let mut tips: Vec<Tip> = tables.tips.values().cloned().collect();
        tips.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        tips.truncate(limit);
        Ok(tips)
    }

    async fn reactions_of(&self, user_id: i64, tip_ids: &[i64]) -> StoreResult<HashMap<i64, VoteKind>> {
        let tables = self.tables.lock().await;
        Ok(tip_ids
            .iter()
            .filter_map(|tip_id| {
                tables
                    .votes
                    .get(&(*tip_id, user_id))
                    .map(|kind| (*tip_id, *kind))
            })
            .collect())
    }

    async fn count_votes(&self, tip_id: i64, kind: VoteKind) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        let n = tables
            .votes
            .iter()
            .filter(|((t, _), k)| *t == tip_id && **k == kind)
            .count();
        Ok(n as i64)
    }

    async fn has_reward_grant(&self, user_id: i64, tip_id: i64, kind: VoteKind) -> StoreResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .grants
            .contains(&(tip_id, user_id, kind)))
    }

    async fn record_visit(&self, day: NaiveDate, visitor: &str) -> StoreResult<()> {
        self.tables
            .lock()
            .await
            .visits
            .insert((day, visitor.to_string()));
        Ok(())
    }

    async fn visitor_counts(&self, day: NaiveDate) -> StoreResult<(i64, i64)> {
        let tables = self.tables.lock().await;
        let daily = tables.visits.iter().filter(|(d, _)| *d == day).count();
        let total: BTreeSet<&str> = tables.visits.iter().map(|(_, v)| v.as_str()).collect();
        Ok((daily as i64, total.len() as i64))
    }
}

impl Transaction for MemoryTx {
    async fn user_for_update(&mut self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn points(&mut self, user_id: i64) -> StoreResult<Option<i64>> {
        Ok(self.staged.users.get(&user_id).map(|u| u.points))
    }

    async fn user_by_handle_for_update(&mut self, handle: &str) -> StoreResult<Option<User>> {
        Ok(self
            .staged
            .users
            .values()
            .find(|u| u.handle == handle)
            .cloned())
    }

    async fn insert_user(&mut self, user: NewUser) -> StoreResult<User> {
        if self.staged.users.values().any(|u| u.handle == user.handle) {
            return Err(StoreError::UniqueViolation {
                constraint: "users_handle_key",
            });
        }
        self.staged.last_user_id += 1;
        let row = User {
            id: self.staged.last_user_id,
            handle: user.handle,
            password_hash: user.password_hash,
            points: user.points.max(0),
            checkin_streak: 0,
            last_checkin_day: None,
            last_submit_at: None,
            created_at: Utc::now(),
        };
        self.staged.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn set_password_hash(&mut self, user_id: i64, hash: &str) -> StoreResult<()> {
        self.staged.user_mut(user_id)?.password_hash = hash.to_string();
        Ok(())
    }

    async fn credit_points(&mut self, user_id: i64, delta: i64) -> StoreResult<i64> {
        let user = self.staged.user_mut(user_id)?;
        user.points = clamped_add(user.points, delta);
        Ok(user.points)
    }

    async fn record_checkin(
        &mut self,
        user_id: i64,
        day: NaiveDate,
        streak: i32,
        reward: i64,
    ) -> StoreResult<Option<i64>> {
        let user = self.staged.user_mut(user_id)?;
        if user.last_checkin_day == Some(day) {
            return Ok(None);
        }
        user.checkin_streak = streak.max(0);
        user.last_checkin_day = Some(day);
        user.points = clamped_add(user.points, reward);
        Ok(Some(user.points))
    }

    async fn set_last_submit_at(&mut self, user_id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        self.staged.user_mut(user_id)?.last_submit_at = Some(at);
        Ok(())
    }

    async fn tip_for_update(&mut self, id: i64) -> StoreResult<Option<Tip>> {
        Ok(self.staged.tips.get(&id).cloned())
    }

    async fn insert_tip(&mut self, tip: NewTip, created_at: DateTime<Utc>) -> StoreResult<Tip> {
        if !self.staged.users.contains_key(&tip.author_id) {
            return Err(StoreError::Missing {
                entity: "user",
                id: tip.author_id,
            });
        }
        self.staged.last_tip_id += 1;
        let row = Tip {
            id: self.staged.last_tip_id,
            author_id: tip.author_id,
            title: tip.title,
            link_url: tip.link_url,
            image_url: tip.image_url,
            attachment: tip.attachment,
            tags: tip.tags,
            note: tip.note,
            likes_count: 0,
            dislikes_count: 0,
            created_at,
        };
        self.staged.tips.insert(row.id, row.clone());
        Ok(row)
    }

    async fn delete_tip(&mut self, id: i64) -> StoreResult<bool> {
        if self.staged.tips.remove(&id).is_none() {
            return Ok(false);
        }
        self.staged.votes.retain(|(tip_id, _), _| *tip_id != id);
        self.staged.grants.retain(|(tip_id, _, _)| *tip_id != id);
        Ok(true)
    }

    async fn vote(&mut self, user_id: i64, tip_id: i64) -> StoreResult<Option<VoteKind>> {
        Ok(self.staged.votes.get(&(tip_id, user_id)).copied())
    }

    async fn insert_vote(&mut self, user_id: i64, tip_id: i64, kind: VoteKind) -> StoreResult<bool> {
        if !self.staged.tips.contains_key(&tip_id) {
            return Err(StoreError::Missing {
                entity: "tip",
                id: tip_id,
            });
        }
        if self.staged.votes.contains_key(&(tip_id, user_id)) {
            return Ok(false);
        }
        self.staged.votes.insert((tip_id, user_id), kind);
        Ok(true)
    }

    async fn delete_vote(&mut self, user_id: i64, tip_id: i64, kind: VoteKind) -> StoreResult<bool> {
        let key = (tip_id, user_id);
        if self.staged.votes.get(&key) != Some(&kind) {
            return Ok(false);
        }
        self.staged.votes.remove(&key);
        Ok(true)
    }

    async fn adjust_tip_counts(
        &mut self,
        tip_id: i64,
        likes_delta: i64,
        dislikes_delta: i64,
    ) -> StoreResult<(i64, i64)> {
        let tip = self.staged.tip_mut(tip_id)?;
        tip.likes_count = clamped_add(tip.likes_count, likes_delta);
        tip.dislikes_count = clamped_add(tip.dislikes_count, dislikes_delta);
        Ok((tip.likes_count, tip.dislikes_count))
    }

    async fn insert_reward_grant(&mut self, user_id: i64, tip_id: i64, kind: VoteKind) -> StoreResult<bool> {
        Ok(self.staged.grants.insert((tip_id, user_id, kind)))
    }

    async fn commit(self) -> StoreResult<()> {
        let MemoryTx { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }
}
