//! # Reward and ranking policy
//!
//! Every tunable number of the service lives here. None of them is
//! structural: changing a value changes behaviour, never the schema.
//!
//! ```toml
//! [policy.rewards]
//! points_start = 1000
//! submit = 10
//! like_received = 2
//! like_given = 1
//! dislike_given = 1
//!
//! [policy.checkin]
//! min_reward = 1
//! max_reward = 50
//! max_streak = 30
//!
//! [policy.hot]
//! half_life_hours = 12.0
//! like_weight = 1.0
//! dislike_weight = 1.25
//! base = 1.0
//!
//! [policy.feed]
//! candidates = 200
//! limit = 50
//! submit_cooldown_secs = 30
//!
//! [policy.token]
//! points_per_token = 1000
//! ```
//!
//! | Struct | Purpose |
//! |--------|---------|
//! | [`Policy`] | Top-level bundle carried in the application state. |
//! | [`RewardPolicy`] | Points paid for submissions and votes, and the starting balance. |
//! | [`CheckinPolicy`] | Check-in reward range and streak cap. |
//! | [`HotPolicy`] | Parameters of the hot score. |
//! | [`FeedPolicy`] | Feed working-set size, page size and submission cooldown. |
//! | [`TokenPolicy`] | Informational points-to-token ratio. |
//!
//! All structs implement `Default` with the production values, and every
//! field carries a serde default, so a missing or partial section is valid.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub rewards: RewardPolicy,
    #[serde(default)]
    pub checkin: CheckinPolicy,
    #[serde(default)]
    pub hot: HotPolicy,
    #[serde(default)]
    pub feed: FeedPolicy,
    #[serde(default)]
    pub token: TokenPolicy,
}

impl Policy {
    /// Reject values that would make scores meaningless.
    pub fn validate(&self) -> Result<(), String> {
        self.hot.validate()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardPolicy {
    #[serde(default = "default_points_start")]
    pub points_start: i64,
    /// Paid to the author per submission.
    #[serde(default = "default_submit")]
    pub submit: i64,
    /// Paid to the author the first time a given user likes their tip.
    #[serde(default = "default_like_received")]
    pub like_received: i64,
    #[serde(default = "default_like_given")]
    pub like_given: i64,
    /// Paid to the voter only. Authors receive nothing for dislikes.
    #[serde(default = "default_dislike_given")]
    pub dislike_given: i64,
}

fn default_points_start() -> i64 {
    1000
}

fn default_submit() -> i64 {
    10
}

fn default_like_received() -> i64 {
    2
}

fn default_like_given() -> i64 {
    1
}

fn default_dislike_given() -> i64 {
    1
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            points_start: default_points_start(),
            submit: default_submit(),
            like_received: default_like_received(),
            like_given: default_like_given(),
            dislike_given: default_dislike_given(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckinPolicy {
    #[serde(default = "default_checkin_min")]
    pub min_reward: i64,
    #[serde(default = "default_checkin_max")]
    pub max_reward: i64,
    #[serde(default = "default_max_streak")]
    pub max_streak: i32,
}

fn default_checkin_min() -> i64 {
    1
}

fn default_checkin_max() -> i64 {
    50
}

fn default_max_streak() -> i32 {
    30
}

impl Default for CheckinPolicy {
    fn default() -> Self {
        Self {
            min_reward: default_checkin_min(),
            max_reward: default_checkin_max(),
            max_streak: default_max_streak(),
        }
    }
}

impl CheckinPolicy {
    /// Uniform draw from `min_reward..=max_reward`. A reversed range is read
    /// with its bounds swapped.
    pub fn draw_reward<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let lo = self.min_reward.min(self.max_reward);
        let hi = self.min_reward.max(self.max_reward);
        rng.gen_range(lo..=hi)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotPolicy {
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f64,
    #[serde(default = "default_like_weight")]
    pub like_weight: f64,
    #[serde(default = "default_dislike_weight")]
    pub dislike_weight: f64,
    #[serde(default = "default_base")]
    pub base: f64,
}

fn default_half_life_hours() -> f64 {
    12.0
}

fn default_like_weight() -> f64 {
    1.0
}

fn default_dislike_weight() -> f64 {
    1.25
}

fn default_base() -> f64 {
    1.0
}

impl Default for HotPolicy {
    fn default() -> Self {
        Self {
            half_life_hours: default_half_life_hours(),
            like_weight: default_like_weight(),
            dislike_weight: default_dislike_weight(),
            base: default_base(),
        }
    }
}

impl HotPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.half_life_hours.is_finite() && self.half_life_hours > 0.0) {
            return Err(format!(
                "policy.hot.half_life_hours must be positive, got {}",
                self.half_life_hours
            ));
        }
        for (name, value) in [
            ("like_weight", self.like_weight),
            ("dislike_weight", self.dislike_weight),
            ("base", self.base),
        ] {
            if !value.is_finite() {
                return Err(format!("policy.hot.{name} must be finite, got {value}"));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedPolicy {
    /// How many of the newest tips are considered for ranking.
    #[serde(default = "default_candidates")]
    pub candidates: usize,
    /// How many ranked tips are returned.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum seconds between two submissions by one user. 0 disables.
    #[serde(default = "default_submit_cooldown_secs")]
    pub submit_cooldown_secs: i64,
}

fn default_candidates() -> usize {
    200
}

fn default_limit() -> usize {
    50
}

fn default_submit_cooldown_secs() -> i64 {
    30
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            limit: default_limit(),
            submit_cooldown_secs: default_submit_cooldown_secs(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenPolicy {
    #[serde(default = "default_points_per_token")]
    pub points_per_token: i64,
}

fn default_points_per_token() -> i64 {
    1000
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            points_per_token: default_points_per_token(),
        }
    }
}

impl TokenPolicy {
    /// Display-only conversion of a point balance into tokens.
    pub fn tokens_for(&self, points: i64) -> f64 {
        if self.points_per_token <= 0 {
            return 0.0;
        }
        points as f64 / self.points_per_token as f64
    }
}
