//! Capability handlers.
//!
//! Each handler exposes the same [`Capability::handle`] contract and differs only
//! in the tools it binds and how it sequences them:
//!
//! | Handler | Tools | Outcome |
//! |---------|-------|---------|
//! | [`MedicationHandler`] | schedule, reminder, verification, contacts, environment | Obligations for unverified doses |
//! | [`EmergencyHandler`] | action plan, profile, contacts | Immediate critical notifications |
//! | [`CommunicationHandler`] | send, environment | Per-channel delivery report |

mod communication;
mod emergency;
mod medication;

pub use communication::{CommunicationHandler, ContactDelivery, MessageDraft};
pub use emergency::{EmergencyHandler, EmergencyKind};
pub use medication::{MedicationHandler, MedicationPolicy};

use crate::Result;
use crate::models::{Contact, DeliveryReport, Domain, Request, RequestContext};
use crate::tools::ToolName;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Name of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityName {
    /// Medication reminders and compliance.
    Medication,
    /// Household emergencies.
    Emergency,
    /// Message delivery.
    Communication,
}

impl CapabilityName {
    /// All capabilities.
    pub const ALL: [Self; 3] = [Self::Medication, Self::Emergency, Self::Communication];

    /// Returns the capability name as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Medication => "medication",
            Self::Emergency => "emergency",
            Self::Communication => "communication",
        }
    }

    /// Parses a capability name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Tools the capability binds.
    #[must_use]
    pub const fn tools(&self) -> &'static [ToolName] {
        match self {
            Self::Medication => medication::TOOLS,
            Self::Emergency => emergency::TOOLS,
            Self::Communication => communication::TOOLS,
        }
    }

    /// The capability that handles a domain.
    #[must_use]
    pub const fn for_domain(domain: Domain) -> Self {
        match domain {
            Domain::Medication => Self::Medication,
            Domain::Emergency => Self::Emergency,
            Domain::General => Self::Communication,
        }
    }
}

impl std::fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A compliance-sensitive action that must be tracked over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Obligation {
    /// What must be complied with (a medication name).
    pub subject: String,
    /// When it is due.
    pub due_at: DateTime<Utc>,
    /// Human-readable detail ("red round pill for heart medication").
    pub detail: String,
}

/// What a handler concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ResultKind {
    /// Nothing further to do.
    Informational,
    /// One or more obligations must be tracked by the escalation scheduler.
    ComplianceRequired {
        /// The obligations.
        obligations: Vec<Obligation>,
    },
    /// Notifications were delivered on at least one channel.
    Delivered,
    /// A required notification reached no channel.
    DeliveryFailed,
}

/// Result of [`Capability::handle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerResult {
    /// The capability that produced the result.
    pub capability: CapabilityName,
    /// Short summary for the caller.
    pub summary: String,
    /// Outcome.
    pub kind: ResultKind,
    /// Notifications sent while handling.
    pub deliveries: Vec<DeliveryReport>,
    /// Degradations absorbed while handling (tool failures, partial delivery).
    pub warnings: Vec<String>,
    /// Subjects a synchronous check found compliant; their open cases resolve.
    pub confirmed: Vec<String>,
}

impl HandlerResult {
    /// Creates an informational result.
    #[must_use]
    pub fn informational(capability: CapabilityName, summary: impl Into<String>) -> Self {
        Self {
            capability,
            summary: summary.into(),
            kind: ResultKind::Informational,
            deliveries: Vec::new(),
            warnings: Vec::new(),
            confirmed: Vec::new(),
        }
    }

    /// Adds a warning.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// Records subjects found compliant.
    #[must_use]
    pub fn with_confirmed(mut self, subjects: Vec<String>) -> Self {
        self.confirmed.extend(subjects);
        self
    }

    /// Obligations carried by the result, if any.
    #[must_use]
    pub fn obligations(&self) -> &[Obligation] {
        match &self.kind {
            ResultKind::ComplianceRequired { obligations } => obligations,
            _ => &[],
        }
    }
}

/// A domain handler bound to a fixed tool subset.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The capability name.
    fn name(&self) -> CapabilityName;

    /// Tools this capability is bound to.
    fn tools(&self) -> Vec<ToolName>;

    /// Whether the handler can take requests right now.
    fn is_available(&self) -> bool {
        true
    }

    /// Handles one request.
    ///
    /// Tool and channel failures are absorbed into the result.
    ///
    /// # Errors
    ///
    /// Returns an error only when the capability is misconfigured.
    async fn handle(&self, request: &Request, ctx: &RequestContext) -> Result<HandlerResult>;
}

/// Answer of a compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// The action was taken.
    Taken,
    /// The action was not taken.
    NotTaken,
    /// The check could not be performed.
    Unknown,
}

impl Verification {
    /// Only a positive answer counts as compliance.
    #[must_use]
    pub const fn is_compliant(&self) -> bool {
        matches!(self, Self::Taken)
    }
}

/// What the escalation scheduler needs from the handler that raised a case.
#[async_trait]
pub trait ComplianceProbe: Send + Sync {
    /// Reminder text for the REMINDED tier.
    async fn reminder_text(&self, subject: &str) -> String;

    /// Scheduled verification check.
    async fn verify(&self, subject: &str) -> Verification;

    /// Direct reconfirmation before family is contacted.
    async fn reconfirm(&self, subject: &str) -> Verification;

    /// Family contacts, primary first. Empty when the lookup fails.
    async fn contacts(&self) -> Vec<Contact>;
}
