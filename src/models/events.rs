//! Care event types for audit and observability.

use super::{CaseOutcome, Channel, Domain, Recipient, Tier, Urgency};
use crate::current_timestamp;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Shared event metadata required for observability.
#[derive(Debug, Clone)]
pub struct EventMeta {
    /// Unique identifier for this event.
    pub event_id: String,
    /// Optional correlation identifier (request or case id).
    pub correlation_id: Option<String>,
    /// Event source component.
    pub source: &'static str,
    /// Timestamp (Unix epoch seconds).
    pub timestamp: u64,
}

impl EventMeta {
    /// Creates new event metadata using the current timestamp.
    #[must_use]
    pub fn new(source: &'static str, correlation_id: Option<String>) -> Self {
        Self::with_timestamp(source, correlation_id, current_timestamp())
    }

    /// Creates new event metadata with a specified timestamp.
    #[must_use]
    pub fn with_timestamp(
        source: &'static str,
        correlation_id: Option<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            correlation_id,
            source,
            timestamp,
        }
    }
}

/// Events emitted by the router, the scheduler and the communication capability.
#[derive(Debug, Clone)]
pub enum CareEvent {
    /// A request was classified (or found unclassifiable).
    RequestClassified {
        /// Event metadata.
        meta: EventMeta,
        /// Request id.
        request_id: String,
        /// Resulting domain, `None` when unhandled.
        domain: Option<Domain>,
    },
    /// An escalation case was opened.
    CaseRegistered {
        /// Event metadata.
        meta: EventMeta,
        /// Case id.
        case_id: String,
        /// Subject.
        subject: String,
        /// Due time.
        due_at: DateTime<Utc>,
    },
    /// A case moved to the next tier.
    TierAdvanced {
        /// Event metadata.
        meta: EventMeta,
        /// Case id.
        case_id: String,
        /// Subject.
        subject: String,
        /// Previous tier.
        from: Tier,
        /// New tier.
        to: Tier,
    },
    /// A case left the open table (resolved or superseded).
    CaseClosed {
        /// Event metadata.
        meta: EventMeta,
        /// Case id.
        case_id: String,
        /// Subject.
        subject: String,
        /// Tier the case was at when it closed.
        at_tier: Tier,
        /// Why it closed.
        outcome: CaseOutcome,
    },
    /// A notification was dispatched to its channels.
    NotificationDispatched {
        /// Event metadata.
        meta: EventMeta,
        /// Notification id.
        notification_id: String,
        /// Recipient.
        recipient: Recipient,
        /// Urgency.
        urgency: Urgency,
        /// Channels that delivered.
        delivered: Vec<Channel>,
        /// Channels that were unavailable.
        unavailable: Vec<Channel>,
    },
}

impl CareEvent {
    /// Returns the event type name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::RequestClassified { .. } => "request.classified",
            Self::CaseRegistered { .. } => "case.registered",
            Self::TierAdvanced { .. } => "case.tier_advanced",
            Self::CaseClosed { .. } => "case.closed",
            Self::NotificationDispatched { .. } => "notification.dispatched",
        }
    }

    /// Returns the event metadata.
    #[must_use]
    pub const fn meta(&self) -> &EventMeta {
        match self {
            Self::RequestClassified { meta, .. }
            | Self::CaseRegistered { meta, .. }
            | Self::TierAdvanced { meta, .. }
            | Self::CaseClosed { meta, .. }
            | Self::NotificationDispatched { meta, .. } => meta,
        }
    }

    /// Returns the timestamp of the event.
    #[must_use]
    pub const fn timestamp(&self) -> u64 {
        self.meta().timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_and_meta() {
        let event = CareEvent::TierAdvanced {
            meta: EventMeta::with_timestamp("scheduler", Some("case-1".to_string()), 42),
            case_id: "case-1".to_string(),
            subject: "aspirin".to_string(),
            from: Tier::Reminded,
            to: Tier::FollowedUp,
        };
        assert_eq!(event.event_type(), "case.tier_advanced");
        assert_eq!(event.timestamp(), 42);
        assert_eq!(event.meta().source, "scheduler");
        assert_eq!(event.meta().correlation_id.as_deref(), Some("case-1"));
    }
}
