//! # Carewatch
//!
//! An elder-care monitoring assistant.
//!
//! Carewatch routes situational reports (medication timing, household emergencies,
//! ad-hoc requests) to capability handlers, tracks medication compliance over time,
//! and escalates missed obligations through reminder tiers that end with the
//! family being notified.
//!
//! ## Architecture
//!
//! ```text
//! Request ──► Router ──► Capability handler ──► Tools (external providers)
//!               │               │
//!               │               └──► Communication ──► Selector + Formatter ──► send_message
//!               │
//!               └──► EscalationScheduler (one timed task per open case)
//! ```
//!
//! - [`tools`]: the fixed tool catalog, per-capability bindings, timeouts and retry
//! - [`capabilities`]: medication, emergency and communication handlers
//! - [`escalation`]: the tiered escalation state machine
//! - [`delivery`]: channel selection and per-channel message formatting
//! - [`router`]: deterministic classification and single dispatch
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use carewatch::{CareAssistant, CarewatchConfig, Request};
//! use carewatch::tools::FixtureToolProvider;
//!
//! let provider = Arc::new(FixtureToolProvider::demo());
//! let assistant = CareAssistant::new(&CarewatchConfig::default(), provider)?;
//! let outcome = assistant.submit(Request::new("Time for my aspirin?")).await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod capabilities;
pub mod config;
pub mod delivery;
pub mod escalation;
pub mod models;
pub mod observability;
pub mod router;
pub mod services;
pub mod tools;

// Re-exports for convenience
pub use capabilities::{Capability, CapabilityName, HandlerResult, Obligation, ResultKind};
pub use config::CarewatchConfig;
pub use escalation::{EscalationPolicy, EscalationScheduler, Registration};
pub use models::{
    Channel, Contact, Domain, EscalationCase, Notification, Recipient, Request, RequestContext,
    Tier, Urgency,
};
pub use router::{DispatchOutcome, DispatchStatus, Router, UnhandledReason};
pub use services::CareAssistant;
pub use tools::{ToolFailure, ToolFailureKind, ToolName, ToolProvider};

/// Error type for carewatch operations.
///
/// Tool failures and channel failures are not errors: they are absorbed at the
/// handler boundary (see [`ToolFailure`]). An `Error` means the core itself is
/// misconfigured or an I/O operation outside the tool contract failed.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty request text, unparseable admin command, bad tool arguments |
/// | `Configuration` | Unbound tool call, tool without timeout, invalid escalation policy |
/// | `OperationFailed` | Config/fixture file I/O, logging or metrics initialization |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The core is misconfigured.
    ///
    /// Raised when:
    /// - A handler calls a tool outside its declared set
    /// - A bound tool resolves to no timeout
    /// - Escalation intervals are zero
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for carewatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("empty request".to_string());
        assert_eq!(err.to_string(), "invalid input: empty request");

        let err = Error::Configuration("tool 'send_message' has no timeout".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: tool 'send_message' has no timeout"
        );

        let err = Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "operation 'read_config_file' failed: not found"
        );
    }

    #[test]
    fn test_current_timestamp() {
        assert!(current_timestamp() > 1_600_000_000);
    }
}
