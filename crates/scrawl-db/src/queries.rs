use crate::Database;
use crate::models::{PostRow, SessionRow, UserRow};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior, ffi};

use scrawl_core::store::{
    CredentialRecord, PostRecord, Posts, SessionRecord, Sessions, StoreError, StoreResult, Users,
};
use scrawl_types::models::UserId;

impl Database {
    // -- Users --

    /// `None` if the username is already taken.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            match conn.execute(
                "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
                (username, password_hash),
            ) {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(e) if violates(&e, ffi::SQLITE_CONSTRAINT_UNIQUE) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_username_by_id(&self, id: i64) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT username FROM users WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    // -- Sessions --

    /// Upserts the user's single session row. `false` if the user does not exist.
    pub fn upsert_session(&self, user_id: i64, token: &str, created_at: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let res = conn.execute(
                "INSERT INTO sessions (user_id, token, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE
                     SET token = excluded.token, created_at = excluded.created_at",
                rusqlite::params![user_id, token, created_at],
            );
            match res {
                Ok(_) => Ok(true),
                Err(e) if violates(&e, ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_session(&self, token: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id, token, created_at FROM sessions WHERE token = ?1",
                [token],
                |row| {
                    Ok(SessionRow {
                        user_id: row.get(0)?,
                        token: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_session_by_token(&self, token: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?)
        })
    }

    pub fn delete_sessions_created_before(&self, cutoff: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM sessions WHERE created_at < ?1", [cutoff])?)
        })
    }

    // -- Posts --

    /// Resolves the recipient and inserts in one IMMEDIATE transaction.
    /// `None` if the recipient does not exist.
    pub fn insert_post(
        &self,
        from_user_id: i64,
        recipient: &str,
        body: &str,
        now: i64,
    ) -> Result<Option<PostRecord>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(to) = query_user_by_username(&tx, recipient)? else {
                return Ok(None);
            };
            let from_username: String = tx
                .query_row(
                    "SELECT username FROM users WHERE id = ?1",
                    [from_user_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| anyhow!("Author {} does not exist", from_user_id))?;

            // Strictly increasing, even if the clock stalls or steps back.
            // created_at grows with id, so the last row holds the newest stamp.
            let newest: Option<i64> = tx
                .query_row(
                    "SELECT created_at FROM posts ORDER BY id DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            let created_at = match newest {
                Some(newest) if newest >= now => newest + 1,
                _ => now,
            };

            tx.execute(
                "INSERT INTO posts (from_user_id, to_user_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![from_user_id, to.id, body, created_at],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(Some(PostRecord {
                id,
                from_user_id: UserId(from_user_id),
                from_username,
                to_user_id: UserId(to.id),
                to_username: to.username,
                body: body.to_string(),
                created_at: from_micros(created_at)?,
            }))
        })
    }

    /// Newest first. `None` if the recipient does not exist.
    pub fn get_wall(&self, recipient: &str, limit: u32) -> Result<Option<(UserRow, Vec<PostRow>)>> {
        self.with_conn(|conn| {
            let Some(owner) = query_user_by_username(conn, recipient)? else {
                return Ok(None);
            };
            let posts = query_posts(conn, owner.id, limit)?;
            Ok(Some((owner, posts)))
        })
    }
}

// -- Storage capabilities --

impl Users for Database {
    fn insert_user(&self, username: &str, password_hash: &str) -> StoreResult<UserId> {
        self.create_user(username, password_hash)?
            .map(UserId)
            .ok_or(StoreError::Conflict)
    }

    fn find_credentials(&self, username: &str) -> StoreResult<Option<CredentialRecord>> {
        Ok(self.get_user_by_username(username)?.map(|u| CredentialRecord {
            id: UserId(u.id),
            username: u.username,
            password_hash: u.password_hash,
        }))
    }

    fn find_username(&self, id: UserId) -> StoreResult<Option<String>> {
        Ok(self.get_username_by_id(id.0)?)
    }
}

impl Sessions for Database {
    fn replace_session(&self, user_id: UserId, token: &str, now: DateTime<Utc>) -> StoreResult<()> {
        if self.upsert_session(user_id.0, token, now.timestamp_micros())? {
            Ok(())
        } else {
            Err(StoreError::NoSuchUser)
        }
    }

    fn find_session(&self, token: &str) -> StoreResult<Option<SessionRecord>> {
        let Some(row) = self.get_session(token)? else {
            return Ok(None);
        };
        Ok(Some(SessionRecord {
            user_id: UserId(row.user_id),
            token: row.token,
            created_at: from_micros(row.created_at)?,
        }))
    }

    fn delete_session(&self, token: &str) -> StoreResult<bool> {
        Ok(self.delete_session_by_token(token)? > 0)
    }

    fn delete_sessions_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        Ok(self.delete_sessions_created_before(cutoff.timestamp_micros())?)
    }
}

impl Posts for Database {
    fn append_post(
        &self,
        author: UserId,
        recipient: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<PostRecord> {
        self.insert_post(author.0, recipient, body, now.timestamp_micros())?
            .ok_or(StoreError::NoSuchUser)
    }

    fn recent_posts(&self, recipient: &str, limit: u32) -> StoreResult<Option<Vec<PostRecord>>> {
        let Some((owner, rows)) = self.get_wall(recipient, limit)? else {
            return Ok(None);
        };
        let posts = rows
            .into_iter()
            .map(|row| {
                Ok(PostRecord {
                    id: row.id,
                    from_user_id: UserId(row.from_user_id),
                    from_username: row.from_username,
                    to_user_id: UserId(row.to_user_id),
                    to_username: owner.username.clone(),
                    body: row.body,
                    created_at: from_micros(row.created_at)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(posts))
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password_hash FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_posts(conn: &Connection, to_user_id: i64, limit: u32) -> Result<Vec<PostRow>> {
    // JOIN users to fetch the author's username in the same query
    let mut stmt = conn.prepare(
        "SELECT p.id, p.from_user_id, u.username, p.to_user_id, p.body, p.created_at
         FROM posts p
         LEFT JOIN users u ON p.from_user_id = u.id
         WHERE p.to_user_id = ?1
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![to_user_id, limit], |row| {
            Ok(PostRow {
                id: row.get(0)?,
                from_user_id: row.get(1)?,
                from_username: row
                    .get::<_, Option<String>>(2)?
                    .unwrap_or_else(|| "unknown".to_string()),
                to_user_id: row.get(3)?,
                body: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn from_micros(us: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us).ok_or_else(|| anyhow!("Timestamp out of range: {}", us))
}

/// Whether `err` is a constraint failure with the given extended code.
fn violates(err: &rusqlite::Error, extended_code: std::os::raw::c_int) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == extended_code)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use scrawl_core::password::HashParams;
    use scrawl_core::{Error, Scrawl, ScrawlConfig};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    fn open() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("scrawl.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn duplicate_username_conflicts() {
        let (_dir, db) = open();
        db.insert_user("alice", "h1").unwrap();
        assert!(matches!(
            db.insert_user("alice", "h2"),
            Err(StoreError::Conflict)
        ));
        let creds = db.find_credentials("alice").unwrap().unwrap();
        assert_eq!(creds.password_hash, "h1");
    }

    #[test]
    fn concurrent_inserts_have_one_winner() {
        let (_dir, db) = open();
        let results: Vec<StoreResult<UserId>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| db.insert_user("alice", "h")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(StoreError::Conflict)))
                .count(),
            7
        );
    }

    #[test]
    fn replace_session_keeps_one_row_per_user() {
        let (_dir, db) = open();
        let id = db.insert_user("alice", "h").unwrap();
        let now = Utc::now();

        db.replace_session(id, "t1", now).unwrap();
        db.replace_session(id, "t2", now).unwrap();

        assert!(db.find_session("t1").unwrap().is_none());
        let live = db.find_session("t2").unwrap().unwrap();
        assert_eq!(live.user_id, id);

        let rows: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn session_requires_existing_user() {
        let (_dir, db) = open();
        assert!(matches!(
            db.replace_session(UserId(7), "t", Utc::now()),
            Err(StoreError::NoSuchUser)
        ));
    }

    #[test]
    fn delete_session_reports_whether_it_existed() {
        let (_dir, db) = open();
        let id = db.insert_user("alice", "h").unwrap();
        db.replace_session(id, "t", Utc::now()).unwrap();
        assert!(db.delete_session("t").unwrap());
        assert!(!db.delete_session("t").unwrap());
    }

    #[test]
    fn purge_removes_only_old_sessions() {
        let (_dir, db) = open();
        let alice = db.insert_user("alice", "h").unwrap();
        let bob = db.insert_user("bob", "h").unwrap();
        let now = Utc::now();
        db.replace_session(alice, "old", now - TimeDelta::days(2)).unwrap();
        db.replace_session(bob, "new", now).unwrap();

        assert_eq!(db.delete_sessions_before(now - TimeDelta::days(1)).unwrap(), 1);
        assert!(db.find_session("old").unwrap().is_none());
        assert!(db.find_session("new").unwrap().is_some());
    }

    #[test]
    fn posts_newest_first_with_increasing_timestamps() {
        let (_dir, db) = open();
        let alice = db.insert_user("alice", "h").unwrap();
        let bob = db.insert_user("bob", "h").unwrap();
        let now = Utc::now();

        let first = db.append_post(alice, "bob", "first", now).unwrap();
        // Clock went backwards; the stored timestamp must not.
        let second = db
            .append_post(bob, "bob", "second", now - TimeDelta::seconds(10))
            .unwrap();
        assert!(second.created_at > first.created_at);

        let wall = db.recent_posts("bob", 20).unwrap().unwrap();
        assert_eq!(wall, vec![second, first]);
        assert_eq!(wall[1].from_username, "alice");
        assert_eq!(wall[0].to_username, "bob");
    }

    #[test]
    fn timestamps_follow_the_latest_post_across_walls() {
        let (_dir, db) = open();
        let alice = db.insert_user("alice", "h").unwrap();
        db.insert_user("bob", "h").unwrap();
        let now = Utc::now();

        let mut last = db.append_post(alice, "bob", "p0", now).unwrap();
        for i in 1..5 {
            let wall = if i % 2 == 0 { "bob" } else { "alice" };
            let post = db.append_post(alice, wall, &format!("p{}", i), now).unwrap();
            assert!(post.created_at > last.created_at);
            assert!(post.id > last.id);
            last = post;
        }
    }

    #[test]
    fn readers_always_see_exactly_one_session_while_it_is_replaced() {
        let (_dir, db) = open();
        let id = db.insert_user("alice", "h").unwrap();
        db.replace_session(id, "t-0", Utc::now()).unwrap();

        let done = AtomicBool::new(false);
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 1..=200 {
                    db.replace_session(id, &format!("t-{}", i), Utc::now()).unwrap();
                }
                done.store(true, Ordering::Release);
            });

            for _ in 0..3 {
                s.spawn(|| {
                    while !done.load(Ordering::Acquire) {
                        let rows: i64 = db
                            .with_conn(|conn| {
                                Ok(conn.query_row(
                                    "SELECT COUNT(*) FROM sessions WHERE user_id = ?1",
                                    [id.0],
                                    |r| r.get(0),
                                )?)
                            })
                            .unwrap();
                        assert_eq!(rows, 1);
                    }
                });
            }
        });

        assert!(db.find_session("t-200").unwrap().is_some());
        assert!(db.find_session("t-199").unwrap().is_none());
    }

    #[test]
    fn nul_body_is_invalid_not_a_storage_failure() {
        let (_dir, db) = open();
        let s = service(db);
        s.register("alice", "pw1").unwrap();
        let token = s.login("alice", "pw1").unwrap().token;

        let err = s.post_to_wall(Some(&token), "alice", "\0hello").unwrap_err();
        assert!(matches!(err, Error::InvalidBody));
        assert!(!err.is_internal());
        assert!(s.get_wall("alice", None).unwrap().is_empty());
    }

    #[test]
    fn missing_recipient() {
        let (_dir, db) = open();
        let alice = db.insert_user("alice", "h").unwrap();
        assert!(matches!(
            db.append_post(alice, "ghost", "hi", Utc::now()),
            Err(StoreError::NoSuchUser)
        ));
        assert!(db.recent_posts("ghost", 20).unwrap().is_none());
        assert_eq!(db.recent_posts("alice", 20).unwrap(), Some(vec![]));
    }

    #[test]
    fn schema_rejects_oversized_bodies() {
        let (_dir, db) = open();
        let alice = db.insert_user("alice", "h").unwrap();
        let long = "x".repeat(141);
        assert!(db.append_post(alice, "alice", &long, Utc::now()).is_err());
        assert!(db.append_post(alice, "alice", "", Utc::now()).is_err());
        assert_eq!(db.recent_posts("alice", 20).unwrap(), Some(vec![]));
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scrawl.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_user("alice", "h").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.find_credentials("alice").unwrap().is_some());
    }

    fn service(db: Database) -> Scrawl {
        Scrawl::new(
            Arc::new(db),
            ScrawlConfig {
                session_ttl: None,
                hash_params: HashParams::insecure_fast(),
            },
        )
        .unwrap()
    }

    #[test]
    fn alice_scenario_on_sqlite() {
        let (_dir, db) = open();
        let s = service(db);

        s.register("alice", "pw1").unwrap();
        assert!(matches!(s.register("alice", "pw2"), Err(Error::UsernameTaken)));
        let t1 = s.login("alice", "pw1").unwrap().token;
        let t2 = s.login("alice", "pw1").unwrap().token;
        assert_ne!(t1, t2);
        assert!(matches!(
            s.authenticate_request(Some(&t1)),
            Err(Error::Unauthenticated)
        ));
        s.post_to_wall(Some(&t2), "alice", "hello").unwrap();

        let wall = s.get_wall("alice", Some(20)).unwrap();
        assert_eq!(wall.len(), 1);
        assert_eq!(wall[0].from, "alice");
        assert_eq!(wall[0].body, "hello");
        assert!(matches!(
            s.get_wall("nonexistent_user", Some(20)),
            Err(Error::RecipientNotFound)
        ));
    }

    #[test]
    fn concurrent_logins_leave_exactly_one_live_token() {
        let (_dir, db) = open();
        let s = service(db);
        s.register("alice", "pw1").unwrap();

        let tokens: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..6)
                .map(|_| scope.spawn(|| s.login("alice", "pw1").unwrap().token))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let live = tokens
            .iter()
            .filter(|t| s.authenticate_request(Some(t.as_str())).is_ok())
            .count();
        assert_eq!(live, 1);
    }
}
