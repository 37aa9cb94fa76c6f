//! Application services.
//!
//! [`CareAssistant`] assembles the router, the capability handlers and the
//! escalation scheduler from a [`crate::CarewatchConfig`] and a tool provider.

mod assistant;

pub use assistant::CareAssistant;
