//! Handle + password authentication.
//!
//! There is no separate sign-up: the first login with an unknown handle
//! creates the account, and a known account without a password adopts the
//! first one it is given.

mod password;
mod session;

pub use password::{hash_password, verify_password};
pub use session::{current_user, require_user, sign_in, SESSION_USER_ID_KEY};

use store::{NewUser, RecordStore, StoreError, Transaction, User};
use tracing::{debug, info};

use crate::error::{Error, Forbidden, InvalidInput, Result};
use crate::policy::RewardPolicy;

pub const MAX_HANDLE_CHARS: usize = 48;

/// Resolve or create the user for `handle` and check `password`.
pub async fn login<S: RecordStore>(
    store: &S,
    rewards: &RewardPolicy,
    handle: &str,
    password: &str,
) -> Result<User> {
    let handle = handle.trim();
    let password = password.trim();
    if handle.is_empty() || password.is_empty() || handle.chars().count() > MAX_HANDLE_CHARS {
        return Err(InvalidInput::BadLoginInput.into());
    }

    match try_login(store, rewards, handle, password).await {
        // Someone registered the handle between our lookup and insert; the
        // row exists now, so the second pass verifies against it.
        Err(Error::Store(StoreError::UniqueViolation { .. })) => {
            debug!(handle, "handle created concurrently, retrying login");
            try_login(store, rewards, handle, password).await
        }
        other => other,
    }
}

async fn try_login<S: RecordStore>(
    store: &S,
    rewards: &RewardPolicy,
    handle: &str,
    password: &str,
) -> Result<User> {
    let mut tx = store.begin().await?;

    let user = match tx.user_by_handle_for_update(handle).await? {
        None => {
            let user = tx
                .insert_user(NewUser {
                    handle: handle.to_string(),
                    password_hash: hash_password(password)?,
                    points: rewards.points_start,
                })
                .await?;
            info!(user_id = user.id, handle, "user created");
            user
        }
        Some(mut user) if user.password_hash.trim().is_empty() => {
            let hash = hash_password(password)?;
            tx.set_password_hash(user.id, &hash).await?;
            user.password_hash = hash;
            info!(user_id = user.id, "password set on first login");
            user
        }
        Some(user) => {
            if !verify_password(password, &user.password_hash)? {
                return Err(Forbidden::BadCredentials.into());
            }
            user
        }
    };

    tx.commit().await?;
    Ok(user)
}
