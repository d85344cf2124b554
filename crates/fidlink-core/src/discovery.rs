// ── Discovery agent ──
//
// Background task that broadcasts a discovery query on a timer and folds
// matching announcements into the device registry. Only used when no
// static controller address was configured.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, warn};

use fidlink_api::{Announcement, Seeker};

use crate::registry::{DeviceRegistry, MatchOutcome};

/// Re-broadcast cadence while the device has not been seen yet.
const SEARCH_INTERVAL: Duration = Duration::from_millis(500);

struct AgentInner {
    registry: Arc<DeviceRegistry>,
    seeker: Seeker,
    device: String,
    span: Span,
}

#[derive(Default)]
struct TaskSlot {
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

/// Periodic discovery loop for one named device.
pub struct DiscoveryAgent {
    inner: Arc<AgentInner>,
    slot: Mutex<TaskSlot>,
}

impl DiscoveryAgent {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        seeker: Seeker,
        device: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            inner: Arc::new(AgentInner {
                registry,
                seeker,
                device: device.into(),
                span,
            }),
            slot: Mutex::new(TaskSlot::default()),
        }
    }

    /// Start the broadcast loop. Returns immediately; a no-op while a loop
    /// is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, interval: Duration) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let span = inner.span.clone();
        debug!(parent: &span, service = inner.seeker.service(), ?interval, "starting discovery");
        slot.handle = Some(tokio::spawn(
            run_loop(inner, interval, cancel.clone()).instrument(span),
        ));
        slot.cancel = Some(cancel);
    }

    /// Ask the loop to exit after its current iteration. Idempotent.
    pub fn stop(&self) {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cancel) = &slot.cancel {
            cancel.cancel();
        }
    }

    /// Stop the loop and wait for the task to finish.
    pub async fn shutdown(&self) {
        let handle = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cancel) = &slot.cancel {
                cancel.cancel();
            }
            slot.handle.take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Apply one response batch to the registry.
    ///
    /// Only the first entry matching both the device name and the service
    /// is applied; its outcome is returned. `None` means nothing matched.
    pub fn handle_batch(&self, batch: &[Announcement]) -> Option<MatchOutcome> {
        self.inner.handle_batch(batch)
    }
}

impl Drop for DiscoveryAgent {
    fn drop(&mut self) {
        self.stop();
    }
}

impl AgentInner {
    fn handle_batch(&self, batch: &[Announcement]) -> Option<MatchOutcome> {
        let service = self.seeker.service();
        let mut matches = batch.iter().filter(|a| {
            a.name == self.device && a.advertisement.service == service
        });

        let first = matches.next()?;
        for extra in matches {
            debug!(
                parent: &self.span,
                uid = %extra.advertisement.uid,
                source = %extra.source,
                "ignoring additional responder for device"
            );
        }

        let ad = &first.advertisement;
        let outcome = self.registry.apply(first);
        match &outcome {
            MatchOutcome::Found => {
                info!(parent: &self.span, host = %ad.host, port = ad.port, uid = %ad.uid, "found");
            }
            MatchOutcome::Restarted { previous_uid } => {
                warn!(
                    parent: &self.span,
                    host = %ad.host,
                    port = ad.port,
                    uid = %ad.uid,
                    previous_uid = previous_uid.as_deref().unwrap_or("-"),
                    "rediscovered with new uid; controller restarted"
                );
            }
            MatchOutcome::Refreshed => {
                debug!(parent: &self.span, host = %ad.host, port = ad.port, "refreshed");
            }
        }
        Some(outcome)
    }
}

async fn run_loop(inner: Arc<AgentInner>, interval: Duration, cancel: CancellationToken) {
    loop {
        match inner.seeker.seek().await {
            Ok(batch) => {
                inner.handle_batch(&batch);
            }
            Err(e) => warn!(error = %e, "discovery broadcast failed"),
        }

        let pause = if inner.registry.snapshot().found {
            interval
        } else {
            interval.min(SEARCH_INTERVAL)
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(pause) => {}
        }
    }
    debug!("discovery stopped");
}
