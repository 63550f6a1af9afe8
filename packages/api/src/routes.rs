//! # HTTP surface
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/login` | [`login`] |
//! | POST | `/logout` | [`logout`] |
//! | GET | `/api/me` | [`me`] |
//! | GET | `/api/feed?tab=hot\|new` | [`feed`] |
//! | POST | `/api/submit` | [`submit`] |
//! | POST | `/api/vote` | [`vote`] |
//! | POST | `/api/checkin` | [`checkin`] |
//! | POST | `/api/delete?tip_id=` | [`delete`] |
//! | GET | `/api/stats` | [`stats`] |
//!
//! Successful responses are JSON objects with `"ok": true`. Failures go
//! through [`Error`]'s `IntoResponse` and carry `"ok": false` and a `code`.
//! The router expects a `tower_sessions::SessionManagerLayer` around it.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde_json::{json, Value};
use store::{RecordStore, VoteKind};
use tower_http::trace::TraceLayer;
use tower_sessions::Session;

use crate::auth;
use crate::checkin::{check_in, CheckinOutcome};
use crate::error::{Error, InvalidInput, Result};
use crate::feed::{load_feed, Tab};
use crate::models::UserInfo;
use crate::policy::Policy;
use crate::stats::{note_visit, visitor_stats, Visitor};
use crate::tips::{delete_tip, parse_tip_id, submit_tip, TipDraft};
use crate::vote::apply_reaction;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState<S> {
    pub store: S,
    pub policy: Arc<Policy>,
}

impl<S: RecordStore> AppState<S> {
    pub fn new(store: S, policy: Policy) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
        }
    }
}

pub fn router<S: RecordStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/login", post(login::<S>))
        .route("/logout", post(logout))
        .route("/api/me", get(me::<S>))
        .route("/api/feed", get(feed::<S>))
        .route("/api/submit", post(submit::<S>))
        .route("/api/vote", post(vote::<S>))
        .route("/api/checkin", post(checkin::<S>))
        .route("/api/delete", post(delete::<S>))
        .route("/api/stats", get(stats::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub handle: String,
    pub password: String,
}

pub async fn login<S: RecordStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Json<Value>> {
    let user = auth::login(&state.store, &state.policy.rewards, &form.handle, &form.password).await?;
    auth::sign_in(&session, user.id).await?;

    let info = UserInfo::new(&user, Utc::now().date_naive(), &state.policy.token);
    Ok(Json(json!({ "ok": true, "user": info })))
}

pub async fn logout(session: Session) -> Result<Json<Value>> {
    session.flush().await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn me<S: RecordStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Json<Value>> {
    let user = auth::require_user(&session, &state.store).await?;
    let info = UserInfo::new(&user, Utc::now().date_naive(), &state.policy.token);
    Ok(Json(json!({ "ok": true, "user": info })))
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub tab: Option<String>,
}

pub async fn feed<S: RecordStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Visitor(visitor): Visitor,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Value>> {
    let now = Utc::now();
    note_visit(&state.store, now.date_naive(), &visitor).await;

    let viewer = auth::current_user(&session, &state.store).await?;
    let tab = Tab::parse_or_default(query.tab.as_deref());
    let tips = load_feed(
        &state.store,
        &state.policy.feed,
        &state.policy.hot,
        viewer.map(|u| u.id),
        tab,
        now,
    )
    .await?;

    Ok(Json(json!({ "ok": true, "tab": tab, "tips": tips })))
}

pub async fn submit<S: RecordStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Form(draft): Form<TipDraft>,
) -> Result<Json<Value>> {
    let user = auth::require_user(&session, &state.store).await?;
    let submitted = submit_tip(&state.store, &state.policy, user.id, draft, Utc::now()).await?;
    Ok(Json(json!({
        "ok": true,
        "tip": submitted.tip,
        "me_points": submitted.me_points,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VoteForm {
    pub tip_id: Option<String>,
    pub kind: Option<String>,
}

pub async fn vote<S: RecordStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Form(form): Form<VoteForm>,
) -> Result<Json<Value>> {
    let user = auth::require_user(&session, &state.store).await?;

    let kind: VoteKind = form
        .kind
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| InvalidInput::BadKind)?;
    // An id that cannot name a tip is reported like a tip that does not exist.
    let tip_id = form
        .tip_id
        .as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or(Error::NotFound)?;

    let outcome = apply_reaction(&state.store, &state.policy.rewards, user.id, tip_id, kind).await?;
    Ok(Json(json!({
        "ok": true,
        "added": outcome.added,
        "removed": outcome.removed,
        "likes": outcome.likes,
        "dislikes": outcome.dislikes,
        "me_points": outcome.me_points,
    })))
}

pub async fn checkin<S: RecordStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Json<Value>> {
    let user = auth::require_user(&session, &state.store).await?;
    let mut rng = StdRng::from_entropy();
    let today = Utc::now().date_naive();

    let body = match check_in(&state.store, &state.policy.checkin, user.id, today, &mut rng).await? {
        CheckinOutcome::Already => json!({ "ok": false, "code": "ALREADY" }),
        CheckinOutcome::Done {
            reward,
            streak,
            me_points,
        } => json!({
            "ok": true,
            "reward": reward,
            "streak": streak,
            "me_points": me_points,
        }),
    };
    Ok(Json(body))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    pub tip_id: Option<String>,
}

pub async fn delete<S: RecordStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>> {
    let user = auth::require_user(&session, &state.store).await?;
    let tip_id = parse_tip_id(query.tip_id.as_deref())?;
    delete_tip(&state.store, user.id, tip_id).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn stats<S: RecordStore>(State(state): State<AppState<S>>) -> Result<Json<Value>> {
    let stats = visitor_stats(&state.store, Utc::now().date_naive()).await?;
    Ok(Json(json!({
        "ok": true,
        "daily_visitors": stats.daily_visitors,
        "total_visitors": stats.total_visitors,
    })))
}
