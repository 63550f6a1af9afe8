//! # What a client gets to see of a user
//!
//! [`store::User`] carries the password hash and raw check-in bookkeeping.
//! [`UserInfo`] is the projection sent over the wire: the handle, the balance
//! with its informational token equivalent, and the check-in state for today.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use store::User;

use crate::policy::TokenPolicy;

/// User information safe to send to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: i64,
    pub handle: String,
    pub points: i64,
    pub streak: i32,
    pub checked_in_today: bool,
    pub tokens: f64,
}

impl UserInfo {
    pub fn new(user: &User, today: NaiveDate, token: &TokenPolicy) -> Self {
        Self {
            id: user.id,
            handle: user.handle.clone(),
            points: user.points,
            streak: user.checkin_streak,
            checked_in_today: user.last_checkin_day == Some(today),
            tokens: token.tokens_for(user.points),
        }
    }
}
