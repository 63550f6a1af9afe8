//! # Database module: PostgreSQL persistence
//!
//! - [`get_pool`] returns the process-wide pool. It is a **lazy singleton**
//!   backed by a [`tokio::sync::OnceCell`]: the first call connects using the
//!   `database` settings, every later call gets the cached pool.
//! - [`migrate`] applies the embedded migrations under `packages/api/migrations`.
//! - [`PgStore`] implements [`store::RecordStore`] on top of the pool, with row
//!   locks (`SELECT … FOR UPDATE`) and `ON CONFLICT DO NOTHING` inserts giving
//!   the guarantees the engines rely on.

mod pg;
mod pool;

pub use pg::{PgStore, PgTx};
pub use pool::{get_pool, migrate};
