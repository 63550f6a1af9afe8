use std::net::SocketAddr;

use api::{router, AppState, Policy};
use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use store::MemoryStore;
use tower::ServiceExt;
use tower_sessions::{MemoryStore as SessionMemoryStore, SessionManagerLayer};

fn app() -> Router {
    let sessions = SessionManagerLayer::new(SessionMemoryStore::default()).with_secure(false);
    router(AppState::new(MemoryStore::new(), Policy::default())).layer(sessions)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cookie, body)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::get(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::empty()).unwrap()
}

fn post(uri: &str, cookie: Option<&str>, form: &str) -> Request<Body> {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::from(form.to_string())).unwrap()
}

async fn login(app: &Router, handle: &str) -> String {
    let form = format!("handle={handle}&password=pw-{handle}");
    let (status, cookie, body) = send(app, post("/login", None, &form)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["handle"], handle);
    cookie.expect("login sets a session cookie")
}

async fn submit(app: &Router, cookie: &str, title: &str) -> i64 {
    let form = format!("title={title}&link_url=https%3A%2F%2Fexample.org");
    let (status, _, body) = send(app, post("/api/submit", Some(cookie), &form)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["tip"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_anonymous_requests() {
    let app = app();

    let (status, _, body) = send(&app, get("/api/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["ok"], false);
    assert_eq!(body["code"], "LOGIN_REQUIRED");

    let (status, _, body) = send(&app, post("/api/vote", None, "tip_id=1&kind=like")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "LOGIN_REQUIRED");

    let (status, _, body) = send(&app, get("/api/feed", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tab"], "hot");
    assert_eq!(body["tips"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_login_me_logout() {
    let app = app();

    let (status, _, body) = send(&app, post("/login", None, "handle=&password=x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_LOGIN_INPUT");

    let cookie = login(&app, "alice").await;
    let (status, _, body) = send(&app, get("/api/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["points"], 1000);
    assert_eq!(body["user"]["tokens"], 1.0);
    assert_eq!(body["user"]["checked_in_today"], false);

    let (status, _, body) = send(&app, post("/login", None, "handle=alice&password=wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "BAD_LOGIN");

    let (status, _, _) = send(&app, post("/logout", Some(&cookie), "")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, get("/api/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_vote_flow() {
    let app = app();
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;
    let tip_id = submit(&app, &alice, "Two+for+one").await;

    let like = format!("tip_id={tip_id}&kind=like");
    let (status, _, body) = send(&app, post("/api/vote", Some(&bob), &like)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["added"], "like");
    assert_eq!(body["removed"], Value::Null);
    assert_eq!(body["likes"], 1);
    assert_eq!(body["me_points"], 1001);

    // Un-like, then like again: no second reward.
    send(&app, post("/api/vote", Some(&bob), &like)).await;
    let (_, _, body) = send(&app, post("/api/vote", Some(&bob), &like)).await;
    assert_eq!(body["likes"], 1);
    assert_eq!(body["me_points"], 1001);

    let (_, _, body) = send(&app, get("/api/me", Some(&alice))).await;
    assert_eq!(body["user"]["points"], 1012);

    let (_, _, body) = send(&app, get("/api/feed?tab=new", Some(&bob))).await;
    assert_eq!(body["tab"], "new");
    assert_eq!(body["tips"][0]["id"], tip_id);
    assert_eq!(body["tips"][0]["my_reaction"], "liked");

    let (status, _, body) = send(&app, post("/api/vote", Some(&alice), &like)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "SELF_VOTE");

    let bad_kind = format!("tip_id={tip_id}&kind=love");
    let (status, _, body) = send(&app, post("/api/vote", Some(&bob), &bad_kind)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_KIND");

    let (status, _, body) = send(&app, post("/api/vote", Some(&bob), "tip_id=abc&kind=like")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_checkin_twice() {
    let app = app();
    let cookie = login(&app, "carol").await;

    let (status, _, body) = send(&app, post("/api/checkin", Some(&cookie), "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["streak"], 1);
    let reward = body["reward"].as_i64().unwrap();
    assert!((1..=50).contains(&reward));
    assert_eq!(body["me_points"], 1000 + reward);

    let (status, _, body) = send(&app, post("/api/checkin", Some(&cookie), "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert_eq!(body["code"], "ALREADY");

    let (_, _, body) = send(&app, get("/api/me", Some(&cookie))).await;
    assert_eq!(body["user"]["checked_in_today"], true);
    assert_eq!(body["user"]["points"], 1000 + reward);
}

#[tokio::test]
async fn test_submit_rules() {
    let app = app();
    let cookie = login(&app, "dave").await;

    let (status, _, body) = send(&app, post("/api/submit", Some(&cookie), "title=no+proof")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_EVIDENCE");

    submit(&app, &cookie, "first").await;
    let form = "title=second&image_url=https%3A%2F%2Fexample.org%2Fa.png";
    let (status, _, body) = send(&app, post("/api/submit", Some(&cookie), form)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");
    assert!(body["retry_after_secs"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_delete_rules() {
    let app = app();
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;
    let tip_id = submit(&app, &alice, "short+lived").await;

    let (status, _, body) = send(&app, post("/api/delete?tip_id=0", Some(&alice), "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_TIP_ID");

    let uri = format!("/api/delete?tip_id={tip_id}");
    let (status, _, body) = send(&app, post(&uri, Some(&bob), "")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "NOT_AUTHOR");

    let (status, _, _) = send(&app, post(&uri, Some(&alice), "")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(&app, post(&uri, Some(&alice), "")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (_, _, body) = send(&app, get("/api/feed", None)).await;
    assert_eq!(body["tips"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_feed_reads_count_visitors() {
    let app = app();

    for ip in ["198.51.100.1", "198.51.100.1", "198.51.100.2"] {
        let req = Request::get("/api/feed")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap();
        send(&app, req).await;
    }

    let (status, _, body) = send(&app, get("/api/stats", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["daily_visitors"], 2);
    assert_eq!(body["total_visitors"], 2);
}

#[tokio::test]
async fn test_direct_clients_count_by_peer_address() {
    let app = app();

    for peer in ["192.0.2.10:40000", "192.0.2.10:40001", "192.0.2.11:40000"] {
        let addr: SocketAddr = peer.parse().unwrap();
        let mut req = get("/api/feed", None);
        req.extensions_mut().insert(ConnectInfo(addr));
        let (status, _, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, _, body) = send(&app, get("/api/stats", None)).await;
    assert_eq!(body["daily_visitors"], 2);
    assert_eq!(body["total_visitors"], 2);
}
