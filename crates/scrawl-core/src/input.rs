use crate::error::{Error, Result};

pub const MAX_USERNAME_LEN: usize = 255;
pub const MAX_BODY_CHARS: usize = 140;

/// 1 to 255 ASCII letters, digits or underscores.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(Error::InvalidUsername("must not be empty"));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(Error::InvalidUsername("must be at most 255 characters"));
    }
    if !username
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return Err(Error::InvalidUsername(
            "may only contain letters, numbers and underscores",
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::InvalidPassword("must not be empty"));
    }
    Ok(())
}

/// Length is counted in characters, not bytes. NUL is refused outright:
/// SQLite's `length()` stops at it, so the stored row could not be checked.
pub fn validate_body(body: &str) -> Result<()> {
    let len = body.chars().count();
    if len == 0 || len > MAX_BODY_CHARS || body.contains('\0') {
        return Err(Error::InvalidBody);
    }
    Ok(())
}
