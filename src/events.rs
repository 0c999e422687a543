//! Push notifications from the core to its consumers.
//!
//! The core never polls and holds no rebindable callback: consumers subscribe
//! once and receive every status change and batch of newly stored lines over
//! a broadcast channel. Slow subscribers lag rather than block ingestion.

use crate::store::LogLine;
use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered events per subscriber before it starts lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One notification pushed by the core.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// Human-readable connection status text.
    StatusChanged { message: String },
    /// Lines just appended to the store, in sequence order.
    LinesAppended { lines: Vec<LogLine> },
}

/// Fan-out point for [`MonitorEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Register a new subscriber. Events sent before this call are not
    /// replayed; late consumers read history from the store instead.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    pub fn status(&self, message: impl Into<String>) {
        // No subscribers is fine; send only fails when nobody listens.
        let _ = self.tx.send(MonitorEvent::StatusChanged {
            message: message.into(),
        });
    }

    pub fn lines_appended(&self, lines: Vec<LogLine>) {
        let _ = self.tx.send(MonitorEvent::LinesAppended { lines });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Severity;
    use crate::store::LogStore;

    #[tokio::test]
    async fn test_all_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.status("connected");

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                MonitorEvent::StatusChanged { message } => assert_eq!(message, "connected"),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_lines_batch_preserves_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let store = LogStore::new();
        let batch = vec![
            store.append("I (1) a".into(), Severity::Info),
            store.append("I (2) b".into(), Severity::Info),
        ];
        bus.lines_appended(batch);

        match rx.recv().await.unwrap() {
            MonitorEvent::LinesAppended { lines } => {
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[0].seq, 0);
                assert_eq!(lines[1].seq, 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_send_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.status("nobody listening");
    }
}
