use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use scrawl_types::models::{Post, UserId};

use crate::error::{Error, Result};
use crate::input;
use crate::store::{PostRecord, Store, StoreError};

pub const DEFAULT_WALL_LIMIT: u32 = 20;
pub const MAX_WALL_LIMIT: u32 = 200;

/// Per-recipient, append-only message log.
pub struct WallLedger {
    store: Arc<dyn Store>,
}

impl WallLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// `author` must already be authenticated; it is not checked here.
    pub fn append(&self, author: UserId, recipient: &str, body: &str) -> Result<Post> {
        input::validate_body(body)?;

        let record = match self.store.append_post(author, recipient, body, Utc::now()) {
            Ok(record) => record,
            Err(StoreError::NoSuchUser) => return Err(Error::RecipientNotFound),
            Err(e) => return Err(e.into()),
        };

        info!(
            post_id = record.id,
            from = %record.from_user_id,
            to = %record.to_user_id,
            "Wall post appended"
        );
        Ok(record.into())
    }

    /// Newest first. `limit` defaults to [`DEFAULT_WALL_LIMIT`] and is capped
    /// at [`MAX_WALL_LIMIT`].
    pub fn recent(&self, recipient: &str, limit: Option<u32>) -> Result<Vec<Post>> {
        let limit = limit.unwrap_or(DEFAULT_WALL_LIMIT).min(MAX_WALL_LIMIT);
        let records = self
            .store
            .recent_posts(recipient, limit)?
            .ok_or(Error::RecipientNotFound)?;
        Ok(records.into_iter().map(Post::from).collect())
    }
}

impl From<PostRecord> for Post {
    fn from(r: PostRecord) -> Self {
        Post {
            id: r.id,
            from: r.from_username,
            to: r.to_username,
            body: r.body,
            created_at: r.created_at,
        }
    }
}
