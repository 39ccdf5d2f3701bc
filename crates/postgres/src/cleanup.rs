use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::store::PostgresDurableStore;

/// Periodically run [`PostgresDurableStore::sweep_retention`], as
/// defense-in-depth alongside the synchronous per-insert pass: a process that
/// inserts rarely (or not at all, for a while) should still have its
/// retention bounds enforced.
pub fn spawn_cleanup_task(store: Arc<PostgresDurableStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.tick().await; // skip the immediate first tick
        loop {
            timer.tick().await;
            if let Err(e) = store.sweep_retention().await {
                warn!(error = %e, "background audit retention sweep failed");
            } else {
                info!("background audit retention sweep completed");
            }
        }
    })
}
