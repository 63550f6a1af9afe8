//! Time-decayed popularity score.

use chrono::{DateTime, Utc};
use store::Tip;

use crate::policy::HotPolicy;

/// Score of a tip at `now`.
///
/// `(base + likes * like_weight - dislikes * dislike_weight) * 0.5^(age_hours / half_life)`,
/// where a creation time in the future counts as age zero.
pub fn hot_score(tip: &Tip, now: DateTime<Utc>, policy: &HotPolicy) -> f64 {
    let age_secs = (now - tip.created_at).num_milliseconds().max(0) as f64 / 1000.0;
    let age_hours = age_secs / 3600.0;
    let decay = 0.5_f64.powf(age_hours / policy.half_life_hours);
    let votes = tip.likes_count as f64 * policy.like_weight
        - tip.dislikes_count as f64 * policy.dislike_weight;
    (policy.base + votes) * decay
}
