//! Typed completion event bus.
//!
//! Downstream conversational state subscribes to classification-complete
//! events. Subscriber failures never block the emitter: a send with no
//! live receivers is logged and dropped.

use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CompletionEvent {
    pub case_sys_id: String,
    pub case_number: String,
    pub category: String,
    pub confidence: f64,
}

pub struct EventBus {
    tx: broadcast::Sender<CompletionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.tx.subscribe()
    }

    /// Fire-and-forget: listeners that lag or drop their receiver cannot
    /// affect the pipeline.
    pub fn emit(&self, event: CompletionEvent) {
        match self.tx.send(event) {
            Ok(n) => debug!("completion event delivered to {} subscribers", n),
            Err(_) => debug!("completion event dropped: no subscribers"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_fail() {
        let bus = EventBus::default();
        bus.emit(CompletionEvent {
            case_sys_id: "abc".to_string(),
            case_number: "CASE001".to_string(),
            category: "access".to_string(),
            confidence: 0.9,
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(CompletionEvent {
            case_sys_id: "abc".to_string(),
            case_number: "CASE001".to_string(),
            category: "access".to_string(),
            confidence: 0.9,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.case_number, "CASE001");
    }
}
