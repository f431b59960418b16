//! Event notifications for balance-changing operations
//!
//! Events are staged on the invocation context and delivered to an
//! [`EventSink`] only after the invocation's write-set has committed.

use crate::{types::Amount, Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Payload of the `Transfer` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Debited account (mint sentinel for claims)
    pub from: String,
    /// Credited account
    pub to: String,
    /// Amount moved
    pub value: Amount,
}

/// Event as handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedEvent {
    /// Event name
    pub name: String,
    /// JSON payload
    pub payload: Vec<u8>,
}

impl EmittedEvent {
    /// Decode the payload as a transfer event
    pub fn transfer(&self) -> Result<TransferEvent> {
        serde_json::from_slice(&self.payload).map_err(|e| Error::decode(&self.name, e))
    }
}

/// Event transport
pub trait EventSink: Send + Sync {
    /// Deliver one event
    fn emit(&self, event: EmittedEvent) -> Result<()>;
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<EmittedEvent>>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Events delivered so far
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: EmittedEvent) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Sink fanning events out over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<EmittedEvent>,
}

impl BroadcastSink {
    /// Create sink with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: EmittedEvent) -> Result<()> {
        // No subscribers is not a delivery failure
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            tracing::debug!(event = %event.name, "No event subscribers");
        }
        Ok(())
    }
}

/// Log events from a broadcast subscription until every sender is gone
///
/// A lagging receiver skips the overwritten events and keeps going.
/// Returns the number of events logged.
pub async fn log_events(mut events: broadcast::Receiver<EmittedEvent>) -> u64 {
    let mut logged = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                match event.transfer() {
                    Ok(transfer) => tracing::info!(
                        event = %event.name,
                        from = %transfer.from,
                        to = %transfer.to,
                        value = transfer.value,
                        "Event emitted"
                    ),
                    Err(e) => tracing::warn!(event = %event.name, "Undecodable event: {}", e),
                }
                logged += 1;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log fell behind; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    logged
}
