//! Feed ordering over a bounded working set of recent tips.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use store::{RecordStore, Tip};

use crate::error::Result;
use crate::models::TipView;
use crate::policy::{FeedPolicy, HotPolicy};
use crate::score::hot_score;
use crate::vote::Reaction;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Hot,
    New,
}

impl Tab {
    /// Lenient parse used for query strings: anything unrecognised is `Hot`.
    pub fn parse_or_default(s: Option<&str>) -> Self {
        match s.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("new") => Tab::New,
            _ => Tab::Hot,
        }
    }
}

/// A tip together with the score it was ranked by.
#[derive(Clone, Debug, PartialEq)]
pub struct Ranked {
    pub tip: Tip,
    pub score: f64,
}

/// Order `candidates` for `tab` and keep the first `limit`.
///
/// `New` sorts by creation time, newest first. `Hot` sorts by score, highest
/// first. Both break ties by ascending id, so one render is fully
/// deterministic whatever order the candidates arrive in.
pub fn rank(
    candidates: Vec<Tip>,
    tab: Tab,
    now: DateTime<Utc>,
    policy: &HotPolicy,
    limit: usize,
) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = candidates
        .into_iter()
        .map(|tip| {
            let score = hot_score(&tip, now, policy);
            Ranked { tip, score }
        })
        .collect();

    ranked.sort_by(|a, b| {
        let primary = match tab {
            Tab::New => b.tip.created_at.cmp(&a.tip.created_at),
            Tab::Hot => b.score.total_cmp(&a.score),
        };
        primary.then_with(|| a.tip.id.cmp(&b.tip.id))
    });
    ranked.truncate(limit);
    ranked
}

/// Rank the most recent tips for `tab` and attach the viewer's reactions.
pub async fn load_feed<S: RecordStore>(
    store: &S,
    feed: &FeedPolicy,
    hot: &HotPolicy,
    viewer: Option<i64>,
    tab: Tab,
    now: DateTime<Utc>,
) -> Result<Vec<TipView>> {
    let candidates = store.recent_tips(feed.candidates).await?;
    let ranked = rank(candidates, tab, now, hot, feed.limit);

    let reactions = match viewer {
        Some(user_id) => {
            let ids: Vec<i64> = ranked.iter().map(|r| r.tip.id).collect();
            store.reactions_of(user_id, &ids).await?
        }
        None => Default::default(),
    };

    Ok(ranked
        .into_iter()
        .map(|r| {
            let reaction = Reaction::from_vote(reactions.get(&r.tip.id).copied());
            TipView::new(r, reaction)
        })
        .collect())
}
