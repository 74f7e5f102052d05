use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use foundatio_core::CancellationToken;
use foundatio_lock::{AcquireOptions, LockProvider};

use crate::queue::Maintainable;

/// Drives the periodic auto-abandon sweep for one queue.
///
/// Exclusive across instances sharing the same lock provider: each tick
/// tries to acquire a zero-wait lease on `queue:<name>:maintenance` before
/// sweeping, so only one process runs the sweep at a time. A failed sweep
/// is logged and never stops the next tick from running.
pub struct QueueMaintenance;

impl QueueMaintenance {
    /// Spawn the maintenance loop. Drop or cancel the returned token to
    /// stop it; await the returned handle for clean shutdown.
    pub fn spawn<Q>(
        queue: Arc<Q>,
        lock_provider: Arc<dyn LockProvider>,
        queue_name: String,
        period: Duration,
    ) -> (CancellationToken, JoinHandle<()>)
    where
        Q: Maintainable + 'static,
    {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let resource = format!("queue:{queue_name}:maintenance");

        let handle = tokio::spawn(async move {
            loop {
                if loop_cancel.is_cancelled() {
                    break;
                }

                match lock_provider
                    .clone()
                    .acquire(
                        &resource,
                        AcquireOptions {
                            time_until_expires: period,
                        },
                        loop_cancel.clone(),
                    )
                    .await
                {
                    Ok(Some(lock)) => {
                        match queue.run_maintenance_once().await {
                            Ok(handled) if handled > 0 => debug!(handled, queue = %queue_name, "maintenance swept entries"),
                            Ok(_) => {}
                            Err(err) => warn!(error = %err, queue = %queue_name, "maintenance sweep failed"),
                        }
                        if let Err(err) = lock_provider.release(&lock.resource, &lock.lock_id).await {
                            warn!(error = %err, "failed to release maintenance lock");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, queue = %queue_name, "failed to acquire maintenance lock"),
                }

                tokio::select! {
                    () = tokio::time::sleep(period) => {}
                    () = loop_cancel.cancelled() => break,
                }
            }
        });

        (cancel, handle)
    }
}
