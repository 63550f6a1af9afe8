//! Submitting and deleting tips.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use store::{NewTip, RecordStore, Tip, Transaction};
use tracing::info;

use crate::error::{Error, Forbidden, InvalidInput, Result};
use crate::policy::Policy;

pub const MAX_TITLE_CHARS: usize = 140;

/// Raw submission as it arrives from the form.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TipDraft {
    pub title: String,
    pub link_url: String,
    pub image_url: String,
    pub attachment: String,
    pub tags: String,
    pub note: String,
}

impl TipDraft {
    fn validate(self, author_id: i64) -> Result<NewTip> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(InvalidInput::MissingTitle.into());
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(InvalidInput::TitleTooLong.into());
        }

        let link_url = self.link_url.trim().to_string();
        let image_url = self.image_url.trim().to_string();
        let attachment = Some(self.attachment.trim().to_string()).filter(|a| !a.is_empty());
        if link_url.is_empty() && image_url.is_empty() && attachment.is_none() {
            return Err(InvalidInput::MissingEvidence.into());
        }

        Ok(NewTip {
            author_id,
            title: title.to_string(),
            link_url,
            image_url,
            attachment,
            tags: self.tags.trim().to_string(),
            note: self.note.trim().to_string(),
        })
    }
}

#[derive(Clone, Debug)]
pub struct Submitted {
    pub tip: Tip,
    pub me_points: i64,
}

/// Seconds left before `last` stops blocking a new submission at `now`.
fn cooldown_left(last: Option<DateTime<Utc>>, now: DateTime<Utc>, cooldown_secs: i64) -> Option<i64> {
    if cooldown_secs <= 0 {
        return None;
    }
    let elapsed_ms = (now - last?).num_milliseconds().max(0);
    let left_ms = cooldown_secs * 1000 - elapsed_ms;
    // Round up so a client waiting `retry_after_secs` is never early.
    (left_ms > 0).then(|| (left_ms + 999) / 1000)
}

pub async fn submit_tip<S: RecordStore>(
    store: &S,
    policy: &Policy,
    author_id: i64,
    draft: TipDraft,
    now: DateTime<Utc>,
) -> Result<Submitted> {
    let new_tip = draft.validate(author_id)?;

    let mut tx = store.begin().await?;
    let Some(author) = tx.user_for_update(author_id).await? else {
        return Err(Error::AuthRequired);
    };
    if let Some(retry_after_secs) =
        cooldown_left(author.last_submit_at, now, policy.feed.submit_cooldown_secs)
    {
        return Err(Error::RateLimited { retry_after_secs });
    }

    let tip = tx.insert_tip(new_tip, now).await?;
    tx.set_last_submit_at(author_id, now).await?;
    let me_points = tx.credit_points(author_id, policy.rewards.submit).await?;
    tx.commit().await?;

    info!(tip_id = tip.id, author_id, "tip submitted");
    Ok(Submitted { tip, me_points })
}

/// Parse the `tip_id` query value of a delete request.
pub fn parse_tip_id(raw: Option<&str>) -> Result<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| InvalidInput::BadTipId.into())
}

/// Delete a tip with its votes and reward grants. Points already paid stay.
pub async fn delete_tip<S: RecordStore>(store: &S, user_id: i64, tip_id: i64) -> Result<()> {
    let mut tx = store.begin().await?;
    let Some(tip) = tx.tip_for_update(tip_id).await? else {
        return Err(Error::NotFound);
    };
    if tip.author_id != user_id {
        return Err(Forbidden::NotAuthor.into());
    }

    if !tx.delete_tip(tip_id).await? {
        return Err(Error::NotFound);
    }
    tx.commit().await?;

    info!(tip_id, user_id, "tip deleted");
    Ok(())
}
