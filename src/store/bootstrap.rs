//! Default administrator creation on first start.

use thiserror::Error;
use tracing::{info, warn};

use crate::auth::password::{hash_password, PasswordError};
use crate::auth::Role;
use crate::config::BootstrapConfig;
use crate::store::models::{NewUser, User};
use crate::store::sqlite::{SqliteStore, StoreError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Create the configured admin account if no admin exists yet.
///
/// Returns the created user, or `None` when nothing was done.
pub fn bootstrap_admin(
    store: &SqliteStore,
    config: &BootstrapConfig,
    bcrypt_cost: u32,
) -> Result<Option<User>, BootstrapError> {
    if !config.enabled {
        return Ok(None);
    }
    if store.count_admins()? > 0 {
        return Ok(None);
    }

    let admin = store.create_user(NewUser {
        username: config.username.clone(),
        email: config.email.clone(),
        password_hash: hash_password(&config.password, bcrypt_cost)?,
        role: Role::Admin,
    })?;

    info!(
        user_id = admin.id,
        username = %admin.username,
        email = %admin.email,
        "Default admin account created"
    );
    warn!("Change the default admin password before exposing this service");

    Ok(Some(admin))
}
