//! Storage capabilities the core components are built on.
//!
//! Each method is one atomic step against the backing store. Anything that
//! would otherwise be a check followed by a write (username uniqueness,
//! recipient resolution, session replacement) is a single method here so the
//! backend can do it under one constraint or transaction.

use chrono::{DateTime, Utc};
use thiserror::Error;

use scrawl_types::models::UserId;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated")]
    Conflict,

    /// A username the write depended on does not exist.
    #[error("referenced user does not exist")]
    NoSuchUser,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: i64,
    pub from_user_id: UserId,
    pub from_username: String,
    pub to_user_id: UserId,
    pub to_username: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub trait Users: Send + Sync {
    /// Inserts a user. Fails with [`StoreError::Conflict`] if the username
    /// exists; the check and the insert are the same operation.
    fn insert_user(&self, username: &str, password_hash: &str) -> StoreResult<UserId>;

    fn find_credentials(&self, username: &str) -> StoreResult<Option<CredentialRecord>>;

    fn find_username(&self, id: UserId) -> StoreResult<Option<String>>;
}

pub trait Sessions: Send + Sync {
    /// Stores `token` as the only session of `user_id`, retiring any previous
    /// one in the same step. Concurrent readers see either the old row or the
    /// new one, never neither.
    fn replace_session(&self, user_id: UserId, token: &str, now: DateTime<Utc>) -> StoreResult<()>;

    fn find_session(&self, token: &str) -> StoreResult<Option<SessionRecord>>;

    /// Returns whether a row was removed.
    fn delete_session(&self, token: &str) -> StoreResult<bool>;

    /// Removes every session created strictly before `cutoff`.
    fn delete_sessions_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;
}

pub trait Posts: Send + Sync {
    /// Resolves `recipient` and inserts the post in one transaction. The stored
    /// `created_at` is `now`, bumped past the newest existing post if needed so
    /// timestamps are strictly increasing. Fails with
    /// [`StoreError::NoSuchUser`] if the recipient does not exist.
    fn append_post(
        &self,
        author: UserId,
        recipient: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<PostRecord>;

    /// Newest first. `None` means the recipient does not exist.
    fn recent_posts(&self, recipient: &str, limit: u32) -> StoreResult<Option<Vec<PostRecord>>>;
}

/// The full capability set a [`crate::Scrawl`] needs.
pub trait Store: Users + Sessions + Posts {}

impl<T: Users + Sessions + Posts> Store for T {}
