//! Event emission system.
//!
//! Domain events are pushed from the daemon to front-end subscribers as
//! refresh hints. Each subscriber has an independent buffer; events are
//! dropped for slow subscribers rather than blocking mutations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An event emitted by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type name (e.g. "LedgerLocked", "PayoutBatchCreated").
    pub event_type: String,
    /// Unix timestamp.
    pub timestamp: i64,
    /// Type-specific payload.
    pub payload: serde_json::Value,
}

/// Filter for event subscriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFilter {
    /// Category filter: "ledger", "payout", "system".
    pub categories: Option<Vec<String>>,
    /// Filter to specific referrer ids.
    pub referrer_ids: Option<Vec<String>>,
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
    subscriptions: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
            subscriptions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Allocate a fresh subscription id.
    pub fn new_subscription_id(&self) -> String {
        let id = self.subscriptions.fetch_add(1, Ordering::SeqCst) + 1;
        format!("sub-{id:08}")
    }

    /// Get the current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref categories) = self.categories {
            let event_category = categorize_event(&event.event_type);
            if !categories.contains(&event_category) {
                return false;
            }
        }

        if let Some(ref referrer_ids) = self.referrer_ids {
            if let Some(referrer) = event.payload.get("referrer_id").and_then(|v| v.as_str()) {
                if !referrer_ids.iter().any(|id| id == referrer) {
                    return false;
                }
            }
        }

        true
    }
}

/// Categorize an event type into a category.
fn categorize_event(event_type: &str) -> String {
    match event_type {
        s if s.starts_with("Ledger") => "ledger".to_string(),
        s if s.starts_with("Payout") => "payout".to_string(),
        _ => "system".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(Event {
            event_type: "DaemonStarted".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({"version": "0.1.0"}),
        });

        let event = rx.try_recv().expect("receive event");
        assert_eq!(event.event_type, "DaemonStarted");
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let bus = EventBus::new(16);
        let first = bus.new_subscription_id();
        let second = bus.new_subscription_id();
        assert_ne!(first, second);
    }

    #[test]
    fn test_event_filter_categories() {
        let filter = EventFilter {
            categories: Some(vec!["ledger".to_string()]),
            referrer_ids: None,
        };

        let ledger_event = Event {
            event_type: "LedgerLocked".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({}),
        };
        assert!(filter.matches(&ledger_event));

        let payout_event = Event {
            event_type: "PayoutBatchCreated".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({}),
        };
        assert!(!filter.matches(&payout_event));
    }

    #[test]
    fn test_event_filter_referrers() {
        let filter = EventFilter {
            categories: None,
            referrer_ids: Some(vec!["ref-1".to_string()]),
        };

        let mine = Event {
            event_type: "LedgerLocked".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({"referrer_id": "ref-1"}),
        };
        assert!(filter.matches(&mine));

        let theirs = Event {
            event_type: "LedgerLocked".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({"referrer_id": "ref-2"}),
        };
        assert!(!filter.matches(&theirs));
    }

    #[test]
    fn test_categorize_event() {
        assert_eq!(categorize_event("LedgerLocked"), "ledger");
        assert_eq!(categorize_event("LedgerPaid"), "ledger");
        assert_eq!(categorize_event("PayoutBatchCreated"), "payout");
        assert_eq!(categorize_event("PayoutRequestDecided"), "payout");
        assert_eq!(categorize_event("DaemonStarted"), "system");
    }
}
