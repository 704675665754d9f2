//! Watcher and ticker loops
//!
//! Both loops check the shutdown flag at the top of every iteration and sleep
//! through [`ShutdownSignal::wait`](crate::core::ShutdownSignal::wait), so they
//! never hold a lock across a sleep and exit promptly on shutdown.

use super::ServiceInner;
use crate::core::types::ServiceState;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Polls liveness of the attached process and reattaches after it exits.
///
/// The exit is reported once per transition. While reattaching the service is
/// not ready, so callers get `ProcessNotReady` instead of a stale handle.
pub(crate) async fn run_watcher(inner: Arc<ServiceInner>) {
    let interval = inner.config.watch_interval();
    debug!(interval_ms = interval.as_millis() as u64, "Watcher started");

    loop {
        if inner.shutdown.is_shutdown() {
            break;
        }

        let alive = inner
            .current_process()
            .map(|process| process.is_alive())
            .unwrap_or(false);
        let was_alive = inner.alive.swap(alive, Ordering::SeqCst);

        if was_alive && !alive {
            let pid = inner.current_process().map(|p| p.pid());
            inner.exits.fetch_add(1, Ordering::SeqCst);
            warn!(?pid, "Target process has terminated");

            if !inner.transition(ServiceState::Detached)
                || !inner.transition(ServiceState::Attaching)
            {
                break;
            }

            match inner.attacher.attach_until(&inner.shutdown).await {
                Some(process) => {
                    if inner.install(process) {
                        inner.spawn_ticker();
                    }
                }
                None => break,
            }
            continue;
        }

        if inner.shutdown.wait(interval).await {
            break;
        }
    }

    debug!("Watcher stopped");
}

/// Refreshes every active handle once per tick.
///
/// Exits as soon as the process is gone or a newer attachment has replaced
/// the one it was started for; the watcher starts a new ticker on reattach.
pub(crate) async fn run_ticker(inner: Arc<ServiceInner>, attachment: u64) {
    let interval = inner.config.tick_interval();
    debug!(attachment, interval_ms = interval.as_millis() as u64, "Ticker started");

    loop {
        if inner.shutdown.is_shutdown() {
            break;
        }
        if inner.shutdown.wait(interval).await {
            break;
        }

        if !inner.alive.load(Ordering::SeqCst) {
            info!(attachment, "Process is gone, ticker stopping");
            break;
        }
        if inner.attachment.load(Ordering::SeqCst) != attachment {
            break;
        }

        let report = inner.active.tick_all();
        if report.failed > 0 {
            trace!(ticked = report.ticked, failed = report.failed, "Tick finished with failures");
        }
    }

    debug!(attachment, "Ticker stopped");
}
