use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use chrono::{DateTime, TimeDelta, Utc};

use scrawl_types::models::UserId;

use crate::store::{
    CredentialRecord, PostRecord, Posts, SessionRecord, Sessions, StoreError, StoreResult, Users,
};

/// A [`crate::store::Store`] kept entirely in process memory.
///
/// All tables sit behind one mutex, so every method is trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    next_user_id: i64,
    users: Vec<CredentialRecord>,
    by_username: HashMap<String, usize>,
    /// token -> session
    sessions: HashMap<String, SessionRecord>,
    /// user_id -> token
    session_of: HashMap<UserId, String>,
    posts: Vec<StoredPost>,
}

struct StoredPost {
    id: i64,
    from: UserId,
    to: UserId,
    body: String,
    created_at: DateTime<Utc>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| StoreError::Backend(anyhow!("memory store lock poisoned: {}", e)))
    }
}

impl Tables {
    fn user(&self, username: &str) -> Option<&CredentialRecord> {
        self.by_username.get(username).map(|&i| &self.users[i])
    }

    fn username_of(&self, id: UserId) -> Option<&str> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.as_str())
    }

    fn record(&self, post: &StoredPost) -> PostRecord {
        PostRecord {
            id: post.id,
            from_user_id: post.from,
            from_username: self.username_of(post.from).unwrap_or("unknown").to_string(),
            to_user_id: post.to,
            to_username: self.username_of(post.to).unwrap_or("unknown").to_string(),
            body: post.body.clone(),
            created_at: post.created_at,
        }
    }
}

impl Users for MemoryStore {
    fn insert_user(&self, username: &str, password_hash: &str) -> StoreResult<UserId> {
        let mut t = self.lock()?;
        if t.by_username.contains_key(username) {
            return Err(StoreError::Conflict);
        }
        t.next_user_id += 1;
        let id = UserId(t.next_user_id);
        let idx = t.users.len();
        t.users.push(CredentialRecord {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        });
        t.by_username.insert(username.to_string(), idx);
        Ok(id)
    }

    fn find_credentials(&self, username: &str) -> StoreResult<Option<CredentialRecord>> {
        Ok(self.lock()?.user(username).cloned())
    }

    fn find_username(&self, id: UserId) -> StoreResult<Option<String>> {
        Ok(self.lock()?.username_of(id).map(str::to_string))
    }
}

impl Sessions for MemoryStore {
    fn replace_session(&self, user_id: UserId, token: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.username_of(user_id).is_none() {
            return Err(StoreError::NoSuchUser);
        }
        if t.sessions.contains_key(token) {
            return Err(StoreError::Conflict);
        }
        if let Some(old) = t.session_of.insert(user_id, token.to_string()) {
            t.sessions.remove(&old);
        }
        t.sessions.insert(
            token.to_string(),
            SessionRecord {
                user_id,
                token: token.to_string(),
                created_at: now,
            },
        );
        Ok(())
    }

    fn find_session(&self, token: &str) -> StoreResult<Option<SessionRecord>> {
        Ok(self.lock()?.sessions.get(token).cloned())
    }

    fn delete_session(&self, token: &str) -> StoreResult<bool> {
        let mut t = self.lock()?;
        match t.sessions.remove(token) {
            Some(session) => {
                t.session_of.remove(&session.user_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_sessions_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut t = self.lock()?;
        let expired: Vec<SessionRecord> = t
            .sessions
            .values()
            .filter(|s| s.created_at < cutoff)
            .cloned()
            .collect();
        for session in &expired {
            t.sessions.remove(&session.token);
            t.session_of.remove(&session.user_id);
        }
        Ok(expired.len())
    }
}

impl Posts for MemoryStore {
    fn append_post(
        &self,
        author: UserId,
        recipient: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<PostRecord> {
        let mut t = self.lock()?;
        let to = t.user(recipient).ok_or(StoreError::NoSuchUser)?.id;
        if t.username_of(author).is_none() {
            return Err(StoreError::Backend(anyhow!("author {} does not exist", author)));
        }

        let created_at = match t.posts.last() {
            Some(last) if last.created_at >= now => last.created_at + TimeDelta::microseconds(1),
            _ => now,
        };
        let post = StoredPost {
            id: t.posts.len() as i64 + 1,
            from: author,
            to,
            body: body.to_string(),
            created_at,
        };
        let record = t.record(&post);
        t.posts.push(post);
        Ok(record)
    }

    fn recent_posts(&self, recipient: &str, limit: u32) -> StoreResult<Option<Vec<PostRecord>>> {
        let t = self.lock()?;
        let Some(to) = t.user(recipient).map(|u| u.id) else {
            return Ok(None);
        };
        let posts = t
            .posts
            .iter()
            .rev()
            .filter(|p| p.to == to)
            .take(limit as usize)
            .map(|p| t.record(p))
            .collect();
        Ok(Some(posts))
    }
}
