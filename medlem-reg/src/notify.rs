//! Notification intent forwarding
//!
//! Subscribes to the EventBus and posts each registration intent to the
//! notification service. Strictly best-effort: delivery failures are logged
//! and dropped, and a lagging subscriber skips ahead rather than blocking
//! emitters. Admission outcomes are committed before intents are emitted,
//! so nothing here can affect them.

use medlem_common::events::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawn the forwarder task
///
/// With no endpoint configured, intents are consumed and logged only.
pub fn spawn_forwarder(bus: Arc<EventBus>, endpoint: Option<String>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        match &endpoint {
            Some(url) => info!("Notification forwarding to {}", url),
            None => info!("Notification forwarding disabled (no endpoint configured)"),
        }

        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Notification forwarder lagged, {} intents dropped", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            debug!("Notification intent: {:?}", event);
            let Some(url) = &endpoint else { continue };

            let result = client
                .post(url)
                .timeout(DISPATCH_TIMEOUT)
                .json(&event)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    warn!(
                        "Notification service returned {} for intent to user {}",
                        response.status(),
                        event.user_id()
                    );
                }
                Err(e) => {
                    warn!("Notification dispatch failed: {}", e);
                }
            }
        }
    })
}
