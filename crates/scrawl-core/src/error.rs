use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the core operations.
///
/// `Storage`, `CorruptCredential`, `Hashing` and `Entropy` are internal: callers should
/// log them and show the user a generic failure. Everything else is an
/// expected outcome that can be reported as-is.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid username: {0}")]
    InvalidUsername(&'static str),

    #[error("invalid password: {0}")]
    InvalidPassword(&'static str),

    #[error("post body must be between 1 and 140 characters and contain no NUL")]
    InvalidBody,

    #[error("username already taken")]
    UsernameTaken,

    /// Deliberately says nothing about which half of the credentials was wrong.
    #[error("invalid username/password")]
    AuthenticationFailed,

    #[error("not authenticated")]
    Unauthenticated,

    #[error("no such wall")]
    RecipientNotFound,

    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),

    #[error("stored credential is unreadable")]
    CorruptCredential,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("system randomness unavailable: {0}")]
    Entropy(String),
}

/// Stable classification of [`Error`] for transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    UsernameTaken,
    AuthenticationFailed,
    Unauthenticated,
    RecipientNotFound,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUsername(_) | Self::InvalidPassword(_) | Self::InvalidBody => {
                ErrorKind::InvalidInput
            }
            Self::UsernameTaken => ErrorKind::UsernameTaken,
            Self::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::RecipientNotFound => ErrorKind::RecipientNotFound,
            Self::Storage(_) | Self::CorruptCredential | Self::Hashing(_) | Self::Entropy(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

impl From<StoreError> for Error {
    /// Only `Backend` is expected to reach this conversion. `Conflict` and
    /// `NoSuchUser` are handled where they carry meaning; if one leaks through,
    /// it is reported as a storage failure rather than guessed at.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Backend(e) => Self::Storage(e),
            other => Self::Storage(anyhow::Error::new(other)),
        }
    }
}
