//! Tokio broadcast event bus for care events.

use crate::models::CareEvent;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1024;

/// Broadcasts [`CareEvent`]s to every subscriber.
///
/// One bus per assistant; cloning shares the channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CareEvent>,
}

/// Filtered receiver that yields events matching a predicate.
pub struct FilteredReceiver<F> {
    receiver: broadcast::Receiver<CareEvent>,
    predicate: F,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUS_CAPACITY)
    }
}

impl EventBus {
    /// Creates a new event bus with the given buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers (best effort).
    #[allow(clippy::cast_precision_loss)]
    pub fn publish(&self, event: CareEvent) {
        metrics::counter!("event_bus_publish_total", "event_type" => event.event_type())
            .increment(1);
        // No subscribers is not an error.
        if self.sender.send(event).is_ok() {
            metrics::gauge!("event_bus_queue_depth").set(self.sender.len() as f64);
        }
    }

    /// Subscribes to the event bus.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CareEvent> {
        metrics::counter!("event_bus_subscriptions_total").increment(1);
        self.sender.subscribe()
    }

    /// Subscribes with a predicate to filter events by type or attributes.
    #[must_use]
    pub fn subscribe_filtered<F>(&self, predicate: F) -> FilteredReceiver<F>
    where
        F: Fn(&CareEvent) -> bool,
    {
        FilteredReceiver {
            receiver: self.subscribe(),
            predicate,
        }
    }

    /// Subscribes to events matching the provided event type.
    #[must_use]
    pub fn subscribe_event_type(
        &self,
        event_type: &'static str,
    ) -> FilteredReceiver<impl Fn(&CareEvent) -> bool + use<>> {
        self.subscribe_filtered(move |event| event.event_type() == event_type)
    }
}

impl<F> FilteredReceiver<F>
where
    F: Fn(&CareEvent) -> bool,
{
    /// Receives the next event that matches the predicate.
    ///
    /// # Errors
    ///
    /// Returns [`broadcast::error::RecvError::Closed`] once the bus is dropped.
    pub async fn recv(&mut self) -> Result<CareEvent, broadcast::error::RecvError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if (self.predicate)(&event) => return Ok(event),
                Ok(_) => {},
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    metrics::counter!("event_bus_lagged_total").increment(skipped);
                },
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventMeta, Tier};

    #[tokio::test]
    async fn test_subscribe_filtered_skips_non_matching() {
        let bus = EventBus::new(16);
        let mut filtered = bus.subscribe_event_type("case.tier_advanced");

        bus.publish(CareEvent::RequestClassified {
            meta: EventMeta::with_timestamp("test", None, 1),
            request_id: "r1".to_string(),
            domain: None,
        });
        bus.publish(CareEvent::TierAdvanced {
            meta: EventMeta::with_timestamp("test", None, 2),
            case_id: "c1".to_string(),
            subject: "aspirin 650".to_string(),
            from: Tier::Scheduled,
            to: Tier::Reminded,
        });

        let event = filtered.recv().await.expect("receive event");
        assert_eq!(event.event_type(), "case.tier_advanced");
    }

    #[tokio::test]
    async fn test_filtered_receiver_does_not_borrow_bus() {
        let bus = EventBus::new(16);
        let mut filtered = bus.subscribe_event_type("case.tier_advanced");

        let publisher = tokio::spawn(async move {
            bus.publish(CareEvent::TierAdvanced {
                meta: EventMeta::with_timestamp("test", None, 1),
                case_id: "c1".to_string(),
                subject: "aspirin 650".to_string(),
                from: Tier::Reminded,
                to: Tier::FollowedUp,
            });
        });
        publisher.await.expect("publisher task");

        let event = filtered.recv().await.expect("receive event");
        assert_eq!(event.event_type(), "case.tier_advanced");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(CareEvent::RequestClassified {
            meta: EventMeta::new("test", None),
            request_id: "r1".to_string(),
            domain: None,
        });
    }
}
