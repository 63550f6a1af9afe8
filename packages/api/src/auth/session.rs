//! Session lookups.

use store::{RecordStore, User};
use tower_sessions::Session;

use crate::error::{Error, Result};

/// Key for storing the user id in the session.
pub const SESSION_USER_ID_KEY: &str = "user_id";

/// The user the session belongs to.
///
/// A session naming a user that no longer exists counts as anonymous.
pub async fn current_user<S: RecordStore>(session: &Session, store: &S) -> Result<Option<User>> {
    let user_id: Option<i64> = session.get(SESSION_USER_ID_KEY).await?;
    let Some(user_id) = user_id else {
        return Ok(None);
    };
    Ok(store.user(user_id).await?)
}

/// Like [`current_user`], failing with `AuthRequired` for anonymous sessions.
pub async fn require_user<S: RecordStore>(session: &Session, store: &S) -> Result<User> {
    current_user(session, store).await?.ok_or(Error::AuthRequired)
}

pub async fn sign_in(session: &Session, user_id: i64) -> Result<()> {
    // New id on privilege change.
    session.cycle_id().await?;
    session.insert(SESSION_USER_ID_KEY, user_id).await?;
    Ok(())
}
