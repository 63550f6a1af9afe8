//! # Vote engine
//!
//! A user holds at most one reaction per tip. Pressing a kind toggles it:
//!
//! | Current | Press `like` | Press `dislike` |
//! |---------|--------------|-----------------|
//! | `None` | `Liked` (+like) | `Disliked` (+dislike) |
//! | `Liked` | `None` (−like) | `Disliked` (−like, +dislike) |
//! | `Disliked` | `Liked` (−dislike, +like) | `None` (−dislike) |
//!
//! Every vote row created or deleted is paired with the matching counter
//! change in the same transaction. Rewards are paid the first time a user
//! reaches a kind on a tip and never again: the reward grant marker survives
//! un-voting, so liking, un-liking and re-liking pays once. Removing a vote
//! neither pays nor refunds. A like pays both voter and author; a dislike
//! pays only the voter.
//!
//! Lock order inside the transaction is the tip row first, then user rows in
//! ascending id order. User rows are only locked by crediting them; the
//! voter's balance for the reply comes from that credit or a plain read.

use serde::Serialize;
use store::{RecordStore, Transaction, VoteKind};
use tracing::{debug, info};

use crate::error::{Error, Forbidden, Result};
use crate::policy::RewardPolicy;

/// Current reaction of one user on one tip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    #[default]
    None,
    Liked,
    Disliked,
}

impl Reaction {
    pub fn from_vote(vote: Option<VoteKind>) -> Self {
        match vote {
            None => Reaction::None,
            Some(VoteKind::Like) => Reaction::Liked,
            Some(VoteKind::Dislike) => Reaction::Disliked,
        }
    }

    /// What pressing `kind` does from this state.
    pub fn press(self, kind: VoteKind) -> Transition {
        let (to, removed, added) = match (self, kind) {
            (Reaction::Liked, VoteKind::Like) => (Reaction::None, Some(VoteKind::Like), None),
            (Reaction::Disliked, VoteKind::Dislike) => {
                (Reaction::None, Some(VoteKind::Dislike), None)
            }
            (Reaction::None, VoteKind::Like) => (Reaction::Liked, None, Some(VoteKind::Like)),
            (Reaction::None, VoteKind::Dislike) => {
                (Reaction::Disliked, None, Some(VoteKind::Dislike))
            }
            (Reaction::Disliked, VoteKind::Like) => {
                (Reaction::Liked, Some(VoteKind::Dislike), Some(VoteKind::Like))
            }
            (Reaction::Liked, VoteKind::Dislike) => {
                (Reaction::Disliked, Some(VoteKind::Like), Some(VoteKind::Dislike))
            }
        };
        Transition {
            from: self,
            to,
            removed,
            added,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: Reaction,
    pub to: Reaction,
    pub removed: Option<VoteKind>,
    pub added: Option<VoteKind>,
}

/// Result of [`apply_reaction`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VoteOutcome {
    pub added: Option<VoteKind>,
    pub removed: Option<VoteKind>,
    pub likes: i64,
    pub dislikes: i64,
    /// Voter's balance after the transaction.
    pub me_points: i64,
    /// Whether this press paid a reward.
    pub rewarded: bool,
}

fn counter_delta(kind: VoteKind, step: i64) -> (i64, i64) {
    match kind {
        VoteKind::Like => (step, 0),
        VoteKind::Dislike => (0, step),
    }
}

/// Toggle `kind` for `voter_id` on `tip_id` in one transaction.
///
/// Fails with `NotFound` for an unknown tip and `Forbidden(SelfVote)` when
/// the voter wrote the tip; in both cases nothing is written.
pub async fn apply_reaction<S: RecordStore>(
    store: &S,
    rewards: &RewardPolicy,
    voter_id: i64,
    tip_id: i64,
    kind: VoteKind,
) -> Result<VoteOutcome> {
    let mut tx = store.begin().await?;

    let Some(tip) = tx.tip_for_update(tip_id).await? else {
        return Err(Error::NotFound);
    };
    if tip.author_id == voter_id {
        return Err(Forbidden::SelfVote.into());
    }

    let current = Reaction::from_vote(tx.vote(voter_id, tip_id).await?);
    let transition = current.press(kind);
    let (mut likes, mut dislikes) = (tip.likes_count, tip.dislikes_count);

    if let Some(removed) = transition.removed {
        if tx.delete_vote(voter_id, tip_id, removed).await? {
            let (dl, dd) = counter_delta(removed, -1);
            (likes, dislikes) = tx.adjust_tip_counts(tip_id, dl, dd).await?;
        }
    }

    let mut credits: Vec<(i64, i64)> = Vec::new();
    if let Some(added) = transition.added {
        if tx.insert_vote(voter_id, tip_id, added).await? {
            let (dl, dd) = counter_delta(added, 1);
            (likes, dislikes) = tx.adjust_tip_counts(tip_id, dl, dd).await?;

            if tx.insert_reward_grant(voter_id, tip_id, added).await? {
                match added {
                    VoteKind::Like => {
                        credits.push((voter_id, rewards.like_given));
                        credits.push((tip.author_id, rewards.like_received));
                    }
                    VoteKind::Dislike => credits.push((voter_id, rewards.dislike_given)),
                }
            }
        } else {
            debug!(voter_id, tip_id, %added, "vote already recorded, treating as applied");
        }
    }

    let rewarded = !credits.is_empty();
    credits.sort_by_key(|(user_id, _)| *user_id);
    let mut me_points = None;
    for (user_id, delta) in credits {
        if delta != 0 {
            let balance = tx.credit_points(user_id, delta).await?;
            if user_id == voter_id {
                me_points = Some(balance);
            }
        }
    }

    // The voter row is only read here, never locked: another vote by the same
    // voter holds a key-share lock on it until that transaction ends.
    let me_points = match me_points {
        Some(points) => points,
        None => tx.points(voter_id).await?.ok_or(Error::AuthRequired)?,
    };

    tx.commit().await?;

    info!(
        voter_id,
        tip_id,
        from = ?transition.from,
        to = ?transition.to,
        rewarded,
        "reaction applied"
    );

    Ok(VoteOutcome {
        added: transition.added,
        removed: transition.removed,
        likes,
        dislikes,
        me_points,
        rewarded,
    })
}
