//! Tiered escalation of compliance obligations.
//!
//! ```text
//! SCHEDULED ──due──► REMINDED ──T1, check──► FOLLOWED_UP ──T2, check──► ESCALATED
//!                                                                          │ reconfirm
//!                                                                          ▼
//!              RESOLVED ◄──── confirmation (any tier) ──── FAMILY_NOTIFIED
//! ```
//!
//! A positive check at any step resolves the case. A notification that reaches
//! no channel counts as a missed reminder and the next check runs at once.

mod messages;
mod policy;
mod scheduler;

pub use policy::{
    DEFAULT_ARCHIVE_CAPACITY, DEFAULT_ESCALATE_AFTER, DEFAULT_FOLLOW_UP_AFTER, EscalationPolicy,
};
pub use scheduler::{EscalationScheduler, Registration};
