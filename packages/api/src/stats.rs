//! Distinct-visitor counting.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::NaiveDate;
use serde::Serialize;
use store::RecordStore;
use tracing::warn;

use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VisitorStats {
    pub daily_visitors: i64,
    pub total_visitors: i64,
}

/// Visitor key for a request: the first `X-Forwarded-For` hop, else
/// `X-Real-IP`, else the peer address, else `"unknown"`.
pub fn visitor_key(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    match forwarded.or_else(real_ip) {
        Some(key) => key.to_string(),
        None => peer.map_or_else(|| "unknown".to_string(), |ip| ip.to_string()),
    }
}

/// The [`visitor_key`] of a request. The peer address is available when the
/// app is served with `into_make_service_with_connect_info::<SocketAddr>()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Visitor(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Visitor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(Visitor(visitor_key(&parts.headers, peer)))
    }
}

/// Record a visit. Failures are logged and otherwise ignored.
pub async fn note_visit<S: RecordStore>(store: &S, day: NaiveDate, visitor: &str) {
    if let Err(e) = store.record_visit(day, visitor).await {
        warn!(error = %e, "failed to record visit");
    }
}

pub async fn visitor_stats<S: RecordStore>(store: &S, today: NaiveDate) -> Result<VisitorStats> {
    let (daily_visitors, total_visitors) = store.visitor_counts(today).await?;
    Ok(VisitorStats {
        daily_visitors,
        total_visitors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use store::MemoryStore;

    #[test]
    fn test_visitor_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(visitor_key(&headers, None), "unknown");

        let peer: IpAddr = "192.0.2.7".parse().unwrap();
        assert_eq!(visitor_key(&headers, Some(peer)), "192.0.2.7");

        headers.insert("x-real-ip", HeaderValue::from_static("10.1.1.1"));
        assert_eq!(visitor_key(&headers, Some(peer)), "10.1.1.1");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"),
        );
        assert_eq!(visitor_key(&headers, Some(peer)), "203.0.113.9");
    }

    #[tokio::test]
    async fn test_visitor_extractor_reads_peer_address() {
        let mut request = axum::http::Request::builder()
            .uri("/api/feed")
            .body(())
            .unwrap();
        let addr: SocketAddr = "198.51.100.4:50123".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        let (mut parts, ()) = request.into_parts();

        let Visitor(key) = Visitor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(key, "198.51.100.4");

        // Without connection info or proxy headers there is nothing to go on.
        let (mut parts, ()) = axum::http::Request::new(()).into_parts();
        let Visitor(key) = Visitor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(key, "unknown");
    }

    #[tokio::test]
    async fn test_visitor_stats() {
        let store = MemoryStore::new();
        let day = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();

        note_visit(&store, day, "a").await;
        note_visit(&store, day, "a").await;
        note_visit(&store, day.pred_opt().unwrap(), "b").await;

        let stats = visitor_stats(&store, day).await.unwrap();
        assert_eq!(
            stats,
            VisitorStats {
                daily_visitors: 1,
                total_visitors: 2
            }
        );
    }
}
