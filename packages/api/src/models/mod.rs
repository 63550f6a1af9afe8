//! Client-facing projections of store records.

mod tip;
mod user;

pub use tip::TipView;
pub use user::UserInfo;
