use std::sync::Arc;

use tracing::{debug, error, warn};

use scrawl_types::models::{User, UserId};

use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::sessions::{Authentication, SessionStore};
use crate::store::Store;

/// What a successful login hands back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub user_id: UserId,
    pub username: String,
    pub token: String,
}

pub struct SessionAuthenticator {
    store: Arc<dyn Store>,
    credentials: Arc<CredentialStore>,
    sessions: Arc<SessionStore>,
}

impl SessionAuthenticator {
    pub fn new(
        store: Arc<dyn Store>,
        credentials: Arc<CredentialStore>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            store,
            credentials,
            sessions,
        }
    }

    /// Always issues a new session, replacing whatever the user had.
    pub fn login(&self, username: &str, password: &str) -> Result<SessionCredential> {
        let user_id = self.credentials.authenticate(username, password)?;
        let token = self.sessions.create(user_id)?;
        Ok(SessionCredential {
            user_id,
            username: username.to_string(),
            token,
        })
    }

    /// Like [`Self::authenticate_request`] but keeps the failure reason.
    pub fn check(&self, token: Option<&str>) -> Result<Authentication> {
        self.sessions.validate(token)
    }

    pub fn authenticate_request(&self, token: Option<&str>) -> Result<UserId> {
        match self.check(token)? {
            Authentication::Authenticated(id) => Ok(id),
            Authentication::Unauthenticated(reason) => {
                debug!(?reason, "Request not authenticated");
                Err(Error::Unauthenticated)
            }
        }
    }

    /// Never fails from the caller's point of view; storage trouble is logged.
    pub fn logout(&self, token: Option<&str>) {
        let Some(token) = token else { return };
        if let Err(e) = self.sessions.revoke(token) {
            error!("Failed to revoke session: {}", e);
        }
    }

    pub fn whoami(&self, token: Option<&str>) -> Result<User> {
        let id = self.authenticate_request(token)?;
        match self.store.find_username(id)? {
            Some(username) => Ok(User { id, username }),
            None => {
                warn!(user_id = %id, "Live session points at a missing user");
                Err(Error::Unauthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::password::{HashParams, Hasher};
    use crate::sessions::Reason;

    fn auth() -> (SessionAuthenticator, Arc<CredentialStore>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let hasher = Arc::new(Hasher::new(HashParams::insecure_fast()).unwrap());
        let credentials = Arc::new(CredentialStore::new(store.clone(), hasher));
        let sessions = Arc::new(SessionStore::new(store.clone(), None));
        (
            SessionAuthenticator::new(store, credentials.clone(), sessions),
            credentials,
        )
    }

    #[test]
    fn login_token_resolves_to_the_same_user() {
        let (a, creds) = auth();
        let id = creds.register("alice", "pw1").unwrap();

        let cred = a.login("alice", "pw1").unwrap();
        assert_eq!(cred.user_id, id);
        assert_eq!(a.authenticate_request(Some(&cred.token)).unwrap(), id);
        assert_eq!(a.whoami(Some(&cred.token)).unwrap().username, "alice");
    }

    #[test]
    fn relogin_invalidates_old_token() {
        let (a, creds) = auth();
        creds.register("alice", "pw1").unwrap();

        let t1 = a.login("alice", "pw1").unwrap().token;
        let t2 = a.login("alice", "pw1").unwrap().token;
        assert_ne!(t1, t2);
        assert!(matches!(
            a.authenticate_request(Some(&t1)),
            Err(Error::Unauthenticated)
        ));
        assert!(a.authenticate_request(Some(&t2)).is_ok());
    }

    #[test]
    fn failed_login_is_uniform_and_issues_nothing() {
        let (a, creds) = auth();
        creds.register("alice", "pw1").unwrap();

        assert!(matches!(
            a.login("alice", "wrong"),
            Err(Error::AuthenticationFailed)
        ));
        assert!(matches!(
            a.login("nobody", "pw1"),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn logout_kills_the_token_and_never_fails() {
        let (a, creds) = auth();
        creds.register("alice", "pw1").unwrap();
        let token = a.login("alice", "pw1").unwrap().token;

        a.logout(Some(&token));
        a.logout(Some(&token));
        a.logout(None);
        assert_eq!(
            a.check(Some(&token)).unwrap(),
            Authentication::Unauthenticated(Reason::Unknown)
        );
    }
}
