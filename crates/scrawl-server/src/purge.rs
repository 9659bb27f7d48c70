use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use scrawl_api::AppStateInner;

/// Background task that deletes expired sessions on an interval.
pub async fn run_purge_loop(state: Arc<AppStateInner>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let state = state.clone();
        match tokio::task::spawn_blocking(move || state.scrawl.purge_expired_sessions()).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Purge: removed {} expired sessions", count);
                }
            }
            Ok(Err(e)) => warn!("Purge error: {}", e),
            Err(e) => warn!("Purge task join error: {}", e),
        }
    }
}
