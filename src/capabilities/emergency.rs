//! Emergency capability.
//!
//! Emergencies bypass the escalation scheduler: the subject gets a critical
//! notification on every known channel and the first reachable family contact
//! is notified at once.
// Allow expect() on static regex patterns
#![allow(clippy::expect_used)]

use super::{CommunicationHandler, MessageDraft};
use super::{Capability, CapabilityName, HandlerResult, ResultKind};
use crate::Result;
use crate::models::{Contact, Request, RequestContext, Urgency};
use crate::tools::types::{ActionPlan, UserProfile};
use crate::tools::{ToolBinding, ToolName, ToolRegistry};
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::fmt::Write;
use std::sync::{Arc, LazyLock};

pub(super) const TOOLS: &[ToolName] = &[
    ToolName::GetActionPlan,
    ToolName::GetUserProfile,
    ToolName::GetFamilyContacts,
];

/// Fixed emergency vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmergencyKind {
    /// Gas leak.
    GasLeak,
    /// Fire or smoke.
    Fire,
    /// Burst pipe or flooding.
    WaterBurst,
    /// Anything else.
    Unknown,
}

static KIND_PATTERNS: LazyLock<Vec<(EmergencyKind, Regex)>> = LazyLock::new(|| {
    vec![
        (
            EmergencyKind::GasLeak,
            Regex::new(r"(?i)\b(gas\s*(leak|smell|odou?r)|smell\w*\s+(of\s+)?gas|carbon\s+monoxide)\b")
                .expect("static regex: gas leak"),
        ),
        (
            EmergencyKind::Fire,
            Regex::new(r"(?i)\b(fire|smoke|flames?|burning)\b").expect("static regex: fire"),
        ),
        (
            EmergencyKind::WaterBurst,
            Regex::new(r"(?i)\b(water\s*(burst|leak)|burst\s+pipe|pipe\s+burst|flood\w*)\b")
                .expect("static regex: water burst"),
        ),
    ]
});

impl EmergencyKind {
    /// Classifies emergency text; the first matching kind wins.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        KIND_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(text))
            .map_or(Self::Unknown, |(kind, _)| *kind)
    }

    /// Key used for the action-plan lookup.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GasLeak => "gas_leak",
            Self::Fire => "fire",
            Self::WaterBurst => "water_burst",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::GasLeak => "Gas leak",
            Self::Fire => "Fire",
            Self::WaterBurst => "Water burst",
            Self::Unknown => "Emergency",
        }
    }
}

/// Handles household emergencies.
#[derive(Debug)]
pub struct EmergencyHandler {
    tools: ToolBinding,
    comms: Arc<CommunicationHandler>,
}

impl EmergencyHandler {
    /// Binds the handler to its tools.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if a tool has no timeout.
    pub fn new(registry: &ToolRegistry, comms: Arc<CommunicationHandler>) -> Result<Self> {
        Ok(Self {
            tools: registry.bind(CapabilityName::Emergency.as_str(), TOOLS)?,
            comms,
        })
    }

    async fn action_plan(&self, kind: EmergencyKind, warnings: &mut Vec<String>) -> Result<ActionPlan> {
        let outcome = self
            .tools
            .call::<ActionPlan>(ToolName::GetActionPlan, json!({"emergency_type": kind.as_str()}))
            .await?;
        Ok(match outcome {
            Ok(plan) if !plan.steps.is_empty() => plan,
            Ok(_) => ActionPlan::conservative(),
            Err(failure) => {
                warnings.push(format!("action plan unavailable, using conservative plan: {failure}"));
                ActionPlan::conservative()
            },
        })
    }

    async fn medical_context(&self, warnings: &mut Vec<String>) -> Result<Option<String>> {
        let outcome = self
            .tools
            .call::<UserProfile>(ToolName::GetUserProfile, json!({}))
            .await?;
        Ok(match outcome {
            Ok(profile) => profile.medical_context(),
            Err(failure) => {
                warnings.push(format!("medical context unavailable: {failure}"));
                None
            },
        })
    }

    async fn contacts(&self, warnings: &mut Vec<String>) -> Result<Vec<Contact>> {
        let outcome = self
            .tools
            .call::<Vec<Contact>>(ToolName::GetFamilyContacts, json!({}))
            .await?;
        Ok(outcome.unwrap_or_else(|failure| {
            warnings.push(format!("contacts unavailable: {failure}"));
            Vec::new()
        }))
    }
}

#[async_trait]
impl Capability for EmergencyHandler {
    fn name(&self) -> CapabilityName {
        CapabilityName::Emergency
    }

    fn tools(&self) -> Vec<ToolName> {
        self.tools.tools()
    }

    async fn handle(&self, request: &Request, ctx: &RequestContext) -> Result<HandlerResult> {
        let mut warnings = Vec::new();
        let kind = EmergencyKind::detect(&request.text);
        tracing::warn!(
            request_id = %request.id,
            emergency_type = kind.as_str(),
            location = ctx.location.as_deref().unwrap_or("unknown"),
            "Emergency reported"
        );
        metrics::counter!("emergencies_total", "emergency_type" => kind.as_str()).increment(1);

        let plan = self.action_plan(kind, &mut warnings).await?;
        let medical = self.medical_context(&mut warnings).await?;

        let subject_message = format!("EMERGENCY: {} detected. {}.", kind.label(), plan.instructions());
        let subject_report = self
            .comms
            .notify(
                MessageDraft::to_subject(subject_message, Urgency::Critical)
                    .with_context(ctx.clone())
                    .correlated(request.id.clone()),
            )
            .await?;

        let contacts = self.contacts(&mut warnings).await?;
        let mut family_message = format!("EMERGENCY at home: {} detected.", kind.label());
        if let Some(location) = &ctx.location {
            let _ = write!(family_message, " Location: {location}.");
        }
        if let Some(medical) = medical {
            let _ = write!(family_message, " Medical context: {medical}.");
        }
        family_message.push_str(" Please respond immediately.");

        let family = self
            .comms
            .notify_first_reachable(&contacts, &family_message, Urgency::Critical, Some(&request.id))
            .await?;
        if family.reached.is_none() {
            warnings.push("no family contact could be reached".to_string());
        }

        let delivered = subject_report.delivered().len();
        let kind_of_result = if subject_report.is_success() {
            ResultKind::Delivered
        } else {
            ResultKind::DeliveryFailed
        };
        let summary = format!(
            "{} emergency: critical alert on {delivered} channel(s); family contact: {}",
            kind.label(),
            family.reached.as_ref().map_or("none reached", |c| c.name.as_str())
        );

        let mut deliveries = vec![subject_report];
        deliveries.extend(family.attempts);

        Ok(HandlerResult {
            capability: CapabilityName::Emergency,
            summary,
            kind: kind_of_result,
            deliveries,
            warnings,
            confirmed: Vec::new(),
        })
    }
}
