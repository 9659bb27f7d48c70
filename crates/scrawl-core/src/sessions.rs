use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use rand_core::{OsRng, RngCore};
use tracing::{debug, error, info};

use scrawl_types::models::UserId;

use crate::error::{Error, Result};
use crate::store::{Store, StoreError};

/// Random bytes per session token (256 bits).
pub const TOKEN_BYTES: usize = 32;
/// Length of a rendered token: unpadded URL-safe base64 of [`TOKEN_BYTES`].
pub const TOKEN_LEN: usize = 43;

/// Why a presented token did not authenticate. For logs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Missing,
    Malformed,
    Unknown,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
    Authenticated(UserId),
    Unauthenticated(Reason),
}

impl Authentication {
    pub fn user_id(self) -> Option<UserId> {
        match self {
            Self::Authenticated(id) => Some(id),
            Self::Unauthenticated(_) => None,
        }
    }
}

/// Opaque token → user mappings, at most one per user.
pub struct SessionStore {
    store: Arc<dyn Store>,
    ttl: Option<TimeDelta>,
}

impl SessionStore {
    /// `ttl` of `None` keeps sessions until logout or replacement.
    pub fn new(store: Arc<dyn Store>, ttl: Option<TimeDelta>) -> Self {
        Self { store, ttl }
    }

    /// Issues a fresh token for `user_id`. Any token the user held before is
    /// dead once this returns.
    pub fn create(&self, user_id: UserId) -> Result<String> {
        let token = generate_token()?;
        match self.store.replace_session(user_id, &token, Utc::now()) {
            Ok(()) => {
                info!(user_id = %user_id, "Session created");
                Ok(token)
            }
            Err(StoreError::NoSuchUser) => {
                error!(user_id = %user_id, "Refusing session for nonexistent user");
                Err(Error::Storage(anyhow::anyhow!(
                    "session requested for unknown user {}",
                    user_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read-only: an expired row is reported, not removed.
    pub fn validate(&self, token: Option<&str>) -> Result<Authentication> {
        let Some(token) = token else {
            return Ok(Authentication::Unauthenticated(Reason::Missing));
        };
        if !is_well_formed(token) {
            return Ok(Authentication::Unauthenticated(Reason::Malformed));
        }

        let Some(session) = self.store.find_session(token)? else {
            return Ok(Authentication::Unauthenticated(Reason::Unknown));
        };
        if self.is_expired(session.created_at, Utc::now()) {
            debug!(user_id = %session.user_id, "Presented session has expired");
            return Ok(Authentication::Unauthenticated(Reason::Expired));
        }

        Ok(Authentication::Authenticated(session.user_id))
    }

    /// Idempotent.
    pub fn revoke(&self, token: &str) -> Result<()> {
        if self.store.delete_session(token)? {
            info!("Session revoked");
        }
        Ok(())
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        match self.ttl {
            Some(ttl) => Ok(self.store.delete_sessions_before(now - ttl)?),
            None => Ok(0),
        }
    }

    fn is_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.ttl.is_some_and(|ttl| created_at + ttl <= now)
    }
}

fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Entropy(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::{Sessions, Users};

    fn setup(ttl: Option<TimeDelta>) -> (Arc<MemoryStore>, SessionStore, UserId) {
        let store = Arc::new(MemoryStore::new());
        let id = store.insert_user("alice", "hash").unwrap();
        (store.clone(), SessionStore::new(store, ttl), id)
    }

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_eq!(a.len(), TOKEN_LEN);
        assert!(is_well_formed(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn create_then_validate() {
        let (_, sessions, id) = setup(None);
        let token = sessions.create(id).unwrap();
        assert_eq!(
            sessions.validate(Some(&token)).unwrap(),
            Authentication::Authenticated(id)
        );
    }

    #[test]
    fn second_create_retires_first_token() {
        let (_, sessions, id) = setup(None);
        let t1 = sessions.create(id).unwrap();
        let t2 = sessions.create(id).unwrap();
        assert_ne!(t1, t2);
        assert_eq!(
            sessions.validate(Some(&t1)).unwrap(),
            Authentication::Unauthenticated(Reason::Unknown)
        );
        assert_eq!(sessions.validate(Some(&t2)).unwrap().user_id(), Some(id));
    }

    #[test]
    fn revoke_is_idempotent() {
        let (_, sessions, id) = setup(None);
        let token = sessions.create(id).unwrap();
        sessions.revoke(&token).unwrap();
        sessions.revoke(&token).unwrap();
        sessions.revoke("never-issued").unwrap();
        assert!(sessions.validate(Some(&token)).unwrap().user_id().is_none());
    }

    #[test]
    fn reasons_are_distinguished() {
        let (_, sessions, _) = setup(None);
        assert_eq!(
            sessions.validate(None).unwrap(),
            Authentication::Unauthenticated(Reason::Missing)
        );
        assert_eq!(
            sessions.validate(Some("short")).unwrap(),
            Authentication::Unauthenticated(Reason::Malformed)
        );
        let forged = "A".repeat(TOKEN_LEN);
        assert_eq!(
            sessions.validate(Some(&forged)).unwrap(),
            Authentication::Unauthenticated(Reason::Unknown)
        );
    }

    #[test]
    fn expired_sessions_fail_and_are_purged() {
        let (store, sessions, id) = setup(Some(TimeDelta::hours(1)));
        let token = generate_token().unwrap();
        store
            .replace_session(id, &token, Utc::now() - TimeDelta::hours(2))
            .unwrap();

        assert_eq!(
            sessions.validate(Some(&token)).unwrap(),
            Authentication::Unauthenticated(Reason::Expired)
        );
        // validate does not remove the row
        assert!(store.find_session(&token).unwrap().is_some());

        assert_eq!(sessions.purge_expired(Utc::now()).unwrap(), 1);
        assert!(store.find_session(&token).unwrap().is_none());
    }

    #[test]
    fn no_ttl_never_purges() {
        let (store, sessions, id) = setup(None);
        let token = generate_token().unwrap();
        store
            .replace_session(id, &token, Utc::now() - TimeDelta::days(3650))
            .unwrap();
        assert_eq!(sessions.purge_expired(Utc::now()).unwrap(), 0);
        assert_eq!(sessions.validate(Some(&token)).unwrap().user_id(), Some(id));
    }

    #[test]
    fn session_for_unknown_user_is_storage_error() {
        let (_, sessions, _) = setup(None);
        assert!(matches!(sessions.create(UserId(999)), Err(Error::Storage(_))));
    }
}
