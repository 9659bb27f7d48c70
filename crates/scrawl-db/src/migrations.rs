use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, sessions, posts)");
        // Timestamps in sessions and posts are microseconds since the epoch.
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              INTEGER PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE sessions (
                user_id     INTEGER PRIMARY KEY REFERENCES users(id),
                token       TEXT NOT NULL UNIQUE,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_sessions_created ON sessions(created_at);

            CREATE TABLE posts (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                from_user_id    INTEGER NOT NULL REFERENCES users(id),
                to_user_id      INTEGER NOT NULL REFERENCES users(id),
                body            TEXT NOT NULL CHECK (length(body) BETWEEN 1 AND 140),
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX idx_posts_wall ON posts(to_user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
