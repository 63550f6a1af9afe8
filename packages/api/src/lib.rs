//! # API crate: ranking and reward accounting for Pinpoint
//!
//! Everything between an HTTP request and the record store lives here: the
//! engines that decide what a vote, check-in or submission does to balances
//! and counters, the feed ranking, the policy and settings they read, the
//! PostgreSQL backend and the axum routes.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | Handle + password login (Argon2id), session lookups |
//! | [`checkin`] | Daily check-in streak and random reward |
//! | [`db`] | PostgreSQL pool (lazy `OnceCell` singleton), migrations, [`db::PgStore`] |
//! | [`error`] | Request error taxonomy and its JSON/HTTP mapping |
//! | [`feed`] | Hot/new ordering over the recent working set |
//! | [`models`] | Client-facing projections (`UserInfo`, `TipView`) |
//! | [`policy`] | Reward amounts, check-in bounds, score weights, feed sizes |
//! | [`routes`] | axum handlers and [`routes::router`] |
//! | [`score`] | Time-decayed hot score |
//! | [`settings`] | Layered configuration (defaults, `pinpoint.toml`, `PINPOINT_*`) |
//! | [`stats`] | Distinct visitor counts |
//! | [`tips`] | Tip submission and deletion |
//! | [`vote`] | Like/dislike toggling with once-only rewards |
//!
//! Engines are generic over [`store::RecordStore`], so the same code runs
//! against [`db::PgStore`] in production and [`store::MemoryStore`] in tests
//! or when no database is configured.

pub mod auth;
pub mod checkin;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod policy;
pub mod routes;
pub mod score;
pub mod settings;
pub mod stats;
pub mod tips;
pub mod vote;

pub use error::{Error, Result};
pub use models::{TipView, UserInfo};
pub use policy::Policy;
pub use routes::{router, AppState};
pub use settings::Settings;
