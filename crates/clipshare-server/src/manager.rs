//! Manager loop (C5): periodically expires entries and republishes
//! aggregate stats. Start/stop shape is the teacher's (`ProxyCaptureBackend`)
//! oneshot-shutdown-plus-stored-`JoinHandle` pattern, repurposed from
//! stopping a MITM proxy to stopping a background sweep.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clipshare_core::model::ClipboardStats;
use clipshare_core::store::ClipboardStore;
use clipshare_limits::LimitsTracker;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub struct Manager {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Manager {
    /// Starts the background sweep. A tick never races a shutdown request
    /// mid-sweep: `select!` only re-checks the shutdown signal between
    /// iterations, so a pass already running always completes (spec §4.5).
    pub fn start(
        store: Arc<dyn ClipboardStore>,
        limits: Arc<LimitsTracker>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        sweep(&store, &limits).await;
                    }
                }
            }
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Requests shutdown and waits for any in-flight pass to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn sweep(store: &Arc<dyn ClipboardStore>, limits: &Arc<LimitsTracker>) {
    let entries = match store.list().await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "manager: failed to list clipboard entries");
            return;
        }
    };

    let now = now_secs();
    let mut count = 0u64;
    let mut total_bytes = 0u64;

    for entry in entries {
        if entry.meta.is_expired(now) {
            if let Err(e) = store.delete(&entry.id).await {
                warn!(id = %entry.id, error = %e, "manager: failed to delete expired entry");
            }
            continue;
        }
        count += 1;
        total_bytes += entry.size;
    }

    debug!(count, total_bytes, "manager: sweep complete");
    limits.publish_stats(ClipboardStats { count, total_bytes });
}
