//! JSON-over-HTTP front for the scrawl core.

pub mod auth;
pub mod error;
pub mod routes;
pub mod session;
pub mod walls;

use std::sync::Arc;

use scrawl_core::Scrawl;
use tracing::error;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub scrawl: Scrawl,
}

/// Runs a core call on the blocking pool; every core call touches storage.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Scrawl) -> scrawl_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.scrawl))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
