//! Accounts, sessions and walls.
//!
//! Every component talks to persistence through the capability traits in
//! [`store`]; callers pick the backend (SQLite in `scrawl-db`, or
//! [`memory::MemoryStore`]) and hand it in. [`service::Scrawl`] is the entry
//! point request handlers use.

pub mod authenticator;
pub mod credentials;
pub mod error;
pub mod input;
pub mod ledger;
pub mod memory;
pub mod password;
pub mod service;
pub mod sessions;
pub mod store;

pub use error::{Error, ErrorKind, Result};
pub use service::{Scrawl, ScrawlConfig};
