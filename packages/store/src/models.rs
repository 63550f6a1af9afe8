//! # Records kept by the store
//!
//! These are the rows every backend persists. They are `Serialize + Deserialize`
//! so the HTTP layer can project them straight into responses.
//!
//! | Struct | Represents |
//! |--------|-----------|
//! | [`User`] | An identity with a point balance and check-in streak state. |
//! | [`Tip`] | A submitted claim with its denormalised like/dislike counters. |
//! | [`NewUser`] / [`NewTip`] | Insert payloads; ids and timestamps are assigned by the store. |
//! | [`VoteKind`] | The two reactions a user can hold on a tip. |
//!
//! Votes and reward grants have no struct of their own: a vote is fully
//! described by `(user_id, tip_id, VoteKind)` and a reward grant by the same
//! triple, so the store traits pass those around directly.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A registered user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub handle: String,
    /// Argon2 PHC string. Empty until the first password login.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub points: i64,
    pub checkin_streak: i32,
    /// UTC calendar day of the most recent check-in.
    pub last_checkin_day: Option<NaiveDate>,
    /// When this user last submitted a tip; drives the submission cooldown.
    pub last_submit_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`User`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewUser {
    pub handle: String,
    pub password_hash: String,
    pub points: i64,
}

/// A tip in the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub link_url: String,
    pub image_url: String,
    /// Opaque descriptor handed over by the upload collaborator.
    pub attachment: Option<String>,
    pub tags: String,
    pub note: String,
    pub likes_count: i64,
    pub dislikes_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`Tip`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewTip {
    pub author_id: i64,
    pub title: String,
    pub link_url: String,
    pub image_url: String,
    pub attachment: Option<String>,
    pub tags: String,
    pub note: String,
}

/// Reaction kind stored for a `(user, tip)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Like,
    Dislike,
}

impl VoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteKind::Like => "like",
            VoteKind::Dislike => "dislike",
        }
    }
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names neither `like` nor `dislike`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown vote kind: {0:?}")]
pub struct UnknownVoteKind(pub String);

impl FromStr for VoteKind {
    type Err = UnknownVoteKind;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "like" => Ok(VoteKind::Like),
            "dislike" => Ok(VoteKind::Dislike),
            _ => Err(UnknownVoteKind(s.to_string())),
        }
    }
}

/// Clamp a balance or counter adjustment at zero.
pub fn clamped_add(value: i64, delta: i64) -> i64 {
    value.saturating_add(delta).max(0)
}
