use std::sync::Arc;

use tracing::{debug, info};

use scrawl_types::models::UserId;

use crate::error::{Error, Result};
use crate::input;
use crate::password::Hasher;
use crate::store::{Store, StoreError};

/// Why a credential check failed. Logged, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginFailure {
    UnknownUser,
    WrongPassword,
}

/// Username → password hash mappings.
pub struct CredentialStore {
    store: Arc<dyn Store>,
    hasher: Arc<Hasher>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn Store>, hasher: Arc<Hasher>) -> Self {
        Self { store, hasher }
    }

    pub fn register(&self, username: &str, password: &str) -> Result<UserId> {
        input::validate_username(username)?;
        input::validate_password(password)?;

        let hash = self.hasher.hash(password)?;
        match self.store.insert_user(username, &hash) {
            Ok(id) => {
                info!(user_id = %id, username, "Registered user");
                Ok(id)
            }
            Err(StoreError::Conflict) => Err(Error::UsernameTaken),
            Err(e) => Err(e.into()),
        }
    }

    /// Unknown usernames and wrong passwords both come back as
    /// [`Error::AuthenticationFailed`], after the same amount of hashing work.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<UserId> {
        let failure = match self.store.find_credentials(username)? {
            Some(rec) => {
                if self.hasher.verify(&rec.password_hash, password)? {
                    return Ok(rec.id);
                }
                LoginFailure::WrongPassword
            }
            None => {
                self.hasher.verify_dummy(password)?;
                LoginFailure::UnknownUser
            }
        };

        debug!(username, reason = ?failure, "Credential check failed");
        Err(Error::AuthenticationFailed)
    }
}
