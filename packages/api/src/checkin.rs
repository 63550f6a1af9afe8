//! Daily check-in with a streak counter and a random reward.
//!
//! Days are UTC calendar days. Checking in on the day after the previous
//! check-in extends the streak up to the configured cap; any gap, or a first
//! check-in, starts over at 1. A second check-in on the same day changes
//! nothing.

use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;
use store::{RecordStore, Transaction};
use tracing::info;

use crate::error::{Error, Result};
use crate::policy::CheckinPolicy;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CheckinOutcome {
    Already,
    Done { reward: i64, streak: i32, me_points: i64 },
}

/// Streak after checking in on `today`, or `None` if already checked in.
pub fn next_streak(
    last_day: Option<NaiveDate>,
    streak: i32,
    today: NaiveDate,
    max_streak: i32,
) -> Option<i32> {
    match last_day {
        Some(last) if last == today => None,
        Some(last) if last.succ_opt() == Some(today) => {
            Some(streak.saturating_add(1).clamp(1, max_streak.max(1)))
        }
        _ => Some(1),
    }
}

pub async fn check_in<S, R>(
    store: &S,
    policy: &CheckinPolicy,
    user_id: i64,
    today: NaiveDate,
    rng: &mut R,
) -> Result<CheckinOutcome>
where
    S: RecordStore,
    R: Rng + Send + ?Sized,
{
    let mut tx = store.begin().await?;
    let Some(user) = tx.user_for_update(user_id).await? else {
        return Err(Error::AuthRequired);
    };

    let Some(streak) = next_streak(user.last_checkin_day, user.checkin_streak, today, policy.max_streak)
    else {
        return Ok(CheckinOutcome::Already);
    };

    let reward = policy.draw_reward(rng);
    // The write is conditional on the day, so a racing check-in that got
    // here first turns this one into `Already`.
    let Some(me_points) = tx.record_checkin(user_id, today, streak, reward).await? else {
        return Ok(CheckinOutcome::Already);
    };
    tx.commit().await?;

    info!(user_id, %today, streak, reward, "checked in");
    Ok(CheckinOutcome::Done {
        reward,
        streak,
        me_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use store::{MemoryStore, NewUser, User};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn add_user(store: &MemoryStore) -> User {
        let mut tx = store.begin().await.unwrap();
        let user = tx
            .insert_user(NewUser {
                handle: "daily".to_string(),
                password_hash: String::new(),
                points: 1000,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        user
    }

    #[test]
    fn test_next_streak_rules() {
        let d = day(2026, 2, 28);
        // First ever.
        assert_eq!(next_streak(None, 0, d, 30), Some(1));
        // Same day.
        assert_eq!(next_streak(Some(d), 4, d, 30), None);
        // Consecutive, across a month boundary.
        assert_eq!(next_streak(Some(d), 4, day(2026, 3, 1), 30), Some(5));
        // Gap.
        assert_eq!(next_streak(Some(d), 4, day(2026, 3, 2), 30), Some(1));
        // Capped.
        assert_eq!(next_streak(Some(d), 30, day(2026, 3, 1), 30), Some(30));
        // A last day in the future is treated as a gap.
        assert_eq!(next_streak(Some(day(2026, 4, 1)), 4, d, 30), Some(1));
    }

    #[tokio::test]
    async fn test_first_checkin() {
        let store = MemoryStore::new();
        let policy = CheckinPolicy::default();
        let user = add_user(&store).await;
        let mut rng = StdRng::seed_from_u64(42);

        let out = check_in(&store, &policy, user.id, day(2026, 1, 10), &mut rng)
            .await
            .unwrap();
        let CheckinOutcome::Done { reward, streak, me_points } = out else {
            panic!("expected a check-in, got {out:?}");
        };
        assert!((1..=50).contains(&reward));
        assert_eq!(streak, 1);
        assert_eq!(me_points, 1000 + reward);
    }

    #[tokio::test]
    async fn test_second_checkin_same_day_changes_nothing() {
        let store = MemoryStore::new();
        let policy = CheckinPolicy::default();
        let user = add_user(&store).await;
        let mut rng = StdRng::seed_from_u64(42);
        let today = day(2026, 1, 10);

        check_in(&store, &policy, user.id, today, &mut rng).await.unwrap();
        let before = store.user(user.id).await.unwrap().unwrap();

        let out = check_in(&store, &policy, user.id, today, &mut rng).await.unwrap();
        assert_eq!(out, CheckinOutcome::Already);

        let after = store.user(user.id).await.unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_streak_over_days() {
        let store = MemoryStore::new();
        let policy = CheckinPolicy {
            max_streak: 3,
            ..CheckinPolicy::default()
        };
        let user = add_user(&store).await;
        let mut rng = StdRng::seed_from_u64(9);

        let mut streaks = Vec::new();
        for d in [1, 2, 3, 4, 6, 7] {
            match check_in(&store, &policy, user.id, day(2026, 1, d), &mut rng)
                .await
                .unwrap()
            {
                CheckinOutcome::Done { streak, .. } => streaks.push(streak),
                CheckinOutcome::Already => panic!("unexpected Already on day {d}"),
            }
        }
        assert_eq!(streaks, vec![1, 2, 3, 3, 1, 2]);
    }

    #[tokio::test]
    async fn test_rewards_accumulate() {
        let store = MemoryStore::new();
        let policy = CheckinPolicy {
            min_reward: 7,
            max_reward: 7,
            max_streak: 30,
        };
        let user = add_user(&store).await;
        let mut rng = StdRng::seed_from_u64(1);

        for d in 1..=3 {
            check_in(&store, &policy, user.id, day(2026, 1, d), &mut rng)
                .await
                .unwrap();
        }
        assert_eq!(store.user(user.id).await.unwrap().unwrap().points, 1021);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let store = MemoryStore::new();
        let mut rng = StdRng::seed_from_u64(1);

        let err = check_in(&store, &CheckinPolicy::default(), 77, day(2026, 1, 1), &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthRequired));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkins_succeed_once() {
        let store = MemoryStore::new();
        let policy = CheckinPolicy::default();
        let user = add_user(&store).await;
        let today = day(2026, 1, 10);

        let mut handles = Vec::new();
        for seed in 0..8u64 {
            let store = store.clone();
            let policy = policy.clone();
            handles.push(tokio::spawn(async move {
                let mut rng = StdRng::seed_from_u64(seed);
                check_in(&store, &policy, user.id, today, &mut rng).await
            }));
        }

        let mut done = 0;
        for handle in handles {
            if let CheckinOutcome::Done { .. } = handle.await.unwrap().unwrap() {
                done += 1;
            }
        }
        assert_eq!(done, 1);
        assert_eq!(store.user(user.id).await.unwrap().unwrap().checkin_streak, 1);
    }
}
