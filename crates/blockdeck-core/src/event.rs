//! Change notifications for an editing session.
//!
//! ## Learning: Broadcast channels
//!
//! The controller owns the sending half of a `tokio::sync::broadcast`
//! channel. Views subscribe and receive cloned events; a slow view lags and
//! skips events instead of holding up the editor.

use blockdeck_blocks::BlockId;
use tokio::sync::broadcast;

use crate::document::DocumentId;

/// Number of events buffered per subscriber.
const EVENT_CAPACITY: usize = 256;

/// Events emitted by a [`DocumentController`](crate::DocumentController).
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    // Block events
    /// A block was appended
    BlockAdded(BlockId),
    /// A block was opened for editing
    BlockOpened(BlockId),
    /// The open block's draft changed
    BlockUpdated(BlockId),
    /// The open block passed validation and was committed
    BlockConfirmed(BlockId),
    /// The open block failed validation and stays open
    ValidationFailed { block_id: BlockId, message: String },
    /// The open block's edit was abandoned
    BlockCancelled(BlockId),
    /// A block was removed
    BlockDeleted(BlockId),
    /// Block order changed
    BlocksReordered,

    // History events
    Undone,
    Redone,

    // Document events
    /// Title, status or family metadata changed
    MetadataChanged,
    /// The store accepted a save
    Saved(DocumentId),
    /// The store rejected a save; the document is unchanged
    SaveFailed(String),
}

/// Event bus for broadcasting document events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DocumentEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: DocumentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper for consuming events in a task.
///
/// ```ignore
/// let mut handler = EventHandler::new(controller.subscribe());
///
/// tokio::spawn(async move {
///     while let Some(event) = handler.next().await {
///         if let DocumentEvent::Saved(id) = event {
///             println!("saved {id}");
///         }
///     }
/// });
/// ```
pub struct EventHandler {
    receiver: broadcast::Receiver<DocumentEvent>,
}

impl EventHandler {
    pub fn new(receiver: broadcast::Receiver<DocumentEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event. Returns `None` once the bus is dropped.
    pub async fn next(&mut self) -> Option<DocumentEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns every event already queued, without waiting.
    pub fn drain(&mut self) -> Vec<DocumentEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                }
                Err(_) => return events,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(DocumentEvent::BlocksReordered);

        let event = rx.recv().await.unwrap();
        assert_eq!(event, DocumentEvent::BlocksReordered);
    }

    #[tokio::test]
    async fn test_handler_ends_when_bus_dropped() {
        let bus = EventBus::new();
        let mut handler = EventHandler::new(bus.subscribe());

        bus.emit(DocumentEvent::Undone);
        drop(bus);

        assert_eq!(handler.next().await, Some(DocumentEvent::Undone));
        assert_eq!(handler.next().await, None);
    }

    #[test]
    fn test_drain_collects_queued_events() {
        let bus = EventBus::new();
        let mut handler = EventHandler::new(bus.subscribe());

        bus.emit(DocumentEvent::Undone);
        bus.emit(DocumentEvent::Redone);

        assert_eq!(handler.drain(), vec![DocumentEvent::Undone, DocumentEvent::Redone]);
        assert!(handler.drain().is_empty());
    }
}
