//! Database row types. These map directly to SQLite rows; timestamps are
//! raw microseconds and are converted at the trait boundary.
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

pub struct SessionRow {
    pub user_id: i64,
    pub token: String,
    pub created_at: i64,
}

pub struct PostRow {
    pub id: i64,
    pub from_user_id: i64,
    pub from_username: String,
    pub to_user_id: i64,
    pub body: String,
    pub created_at: i64,
}
