//! Notification delivery
//!
//! The engine broadcasts events; the pump fans them out to a sink with
//! at-least-once semantics and drops duplicates by dedup key. A lagged
//! receiver is logged and skipped, not treated as fatal.

use async_trait::async_trait;
use shared::error::AppResult;
use shared::event::DispatchEvent;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Downstream event consumer (push gateway, message bus, ...)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &DispatchEvent) -> AppResult<()>;
}

/// Sink that writes events to the log; the default in development
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn deliver(&self, event: &DispatchEvent) -> AppResult<()> {
        tracing::info!(
            event_id = %event.event_id,
            entity_id = %event.entity_id,
            kind = %event.kind,
            status = %event.new_status,
            version = event.version,
            "Dispatch event"
        );
        Ok(())
    }
}

/// Pump events from the broadcast channel into a sink until shutdown.
/// Registered as a Listener background task by the server.
pub async fn pump_events(
    mut rx: broadcast::Receiver<DispatchEvent>,
    sink: std::sync::Arc<dyn NotificationSink>,
    shutdown: CancellationToken,
) {
    let mut seen: HashSet<(String, String, u64)> = HashSet::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = rx.recv() => match received {
                Ok(event) => {
                    if !seen.insert(event.dedup_key()) {
                        continue;
                    }
                    if let Err(e) = sink.deliver(&event).await {
                        tracing::error!(
                            event_id = %event.event_id,
                            error = %e,
                            "Failed to deliver event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event pump lagged; events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    tracing::debug!("Event pump stopped");
}
