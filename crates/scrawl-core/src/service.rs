use std::sync::Arc;

use chrono::{TimeDelta, Utc};

use scrawl_types::models::{Post, User, UserId};

use crate::authenticator::{SessionAuthenticator, SessionCredential};
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::ledger::WallLedger;
use crate::password::{HashParams, Hasher};
use crate::sessions::{Authentication, SessionStore};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct ScrawlConfig {
    /// `None` disables expiry.
    pub session_ttl: Option<TimeDelta>,
    pub hash_params: HashParams,
}

impl Default for ScrawlConfig {
    fn default() -> Self {
        Self {
            session_ttl: Some(TimeDelta::days(30)),
            hash_params: HashParams::default(),
        }
    }
}

/// Everything a request handler may ask of the core.
///
/// All methods block on storage; call them from a blocking context.
pub struct Scrawl {
    credentials: Arc<CredentialStore>,
    sessions: Arc<SessionStore>,
    authenticator: SessionAuthenticator,
    ledger: WallLedger,
}

impl Scrawl {
    pub fn new(store: Arc<dyn Store>, config: ScrawlConfig) -> Result<Self> {
        let hasher = Arc::new(Hasher::new(config.hash_params)?);
        let credentials = Arc::new(CredentialStore::new(store.clone(), hasher));
        let sessions = Arc::new(SessionStore::new(store.clone(), config.session_ttl));
        let authenticator =
            SessionAuthenticator::new(store.clone(), credentials.clone(), sessions.clone());
        let ledger = WallLedger::new(store);

        Ok(Self {
            credentials,
            sessions,
            authenticator,
            ledger,
        })
    }

    pub fn register(&self, username: &str, password: &str) -> Result<UserId> {
        self.credentials.register(username, password)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<SessionCredential> {
        self.authenticator.login(username, password)
    }

    pub fn logout(&self, token: Option<&str>) {
        self.authenticator.logout(token)
    }

    pub fn authenticate_request(&self, token: Option<&str>) -> Result<UserId> {
        self.authenticator.authenticate_request(token)
    }

    pub fn check_session(&self, token: Option<&str>) -> Result<Authentication> {
        self.authenticator.check(token)
    }

    pub fn whoami(&self, token: Option<&str>) -> Result<User> {
        self.authenticator.whoami(token)
    }

    /// Authenticates `token`, then appends to `recipient`'s wall as that user.
    pub fn post_to_wall(&self, token: Option<&str>, recipient: &str, body: &str) -> Result<Post> {
        let author = self.authenticator.authenticate_request(token)?;
        self.ledger.append(author, recipient, body)
    }

    /// Public; no token needed.
    pub fn get_wall(&self, recipient: &str, limit: Option<u32>) -> Result<Vec<Post>> {
        self.ledger.recent(recipient, limit)
    }

    pub fn purge_expired_sessions(&self) -> Result<usize> {
        self.sessions.purge_expired(Utc::now())
    }
}
