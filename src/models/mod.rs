//! Data models for carewatch.
//!
//! This module contains the core data structures shared by the router, the
//! capability handlers, the escalation scheduler and the delivery layer.

mod escalation;
mod events;
mod notification;
mod request;

pub use escalation::{
    ArchivedCase, CaseOutcome, EscalationCase, ResolutionSource, Tier, subject_key,
};
pub use events::{CareEvent, EventMeta};
pub use notification::{
    Channel, Contact, DeliveryReport, DeliveryStatus, Notification, Recipient, Urgency,
};
pub use request::{Activity, Domain, Request, RequestContext};
