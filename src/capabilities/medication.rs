//! Medication capability.
//!
//! Sequence: fetch schedule, determine due items (clock times inside the due
//! window, before-meal entries while a meal is being prepared, or entries the
//! request names), verify intake, and return an obligation for every dose that
//! is not verified as taken.

use super::{
    Capability, CapabilityName, ComplianceProbe, HandlerResult, Obligation, ResultKind,
    Verification,
};
use crate::Result;
use crate::models::{Activity, Contact, Request, RequestContext};
use crate::tools::types::{
    EnvironmentStatus, IntakeVerification, ReminderText, ScheduleEntry, Timing,
};
use crate::tools::{ToolBinding, ToolName, ToolRegistry};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveTime, Offset, TimeDelta, TimeZone, Utc};
use serde_json::json;

pub(super) const TOOLS: &[ToolName] = &[
    ToolName::GetMedicationSchedule,
    ToolName::MedicationReminder,
    ToolName::VerifyIntake,
    ToolName::ReconfirmIntake,
    ToolName::GetFamilyContacts,
    ToolName::GetEnvironmentStatus,
];

/// Timing policy for deciding which doses are due.
#[derive(Debug, Clone, Copy)]
pub struct MedicationPolicy {
    /// How far ahead a clock-timed dose counts as due.
    pub lookahead: TimeDelta,
    /// How long after its time a missed dose still counts as due.
    pub grace: TimeDelta,
    /// Offset of the household's local time from UTC.
    pub utc_offset: FixedOffset,
    /// Lead for "before meals" entries without an explicit lead.
    pub meal_lead_minutes: u32,
}

impl Default for MedicationPolicy {
    fn default() -> Self {
        Self {
            lookahead: TimeDelta::minutes(10),
            grace: TimeDelta::minutes(60),
            utc_offset: Utc.fix(),
            meal_lead_minutes: 30,
        }
    }
}

#[derive(Debug, Clone)]
struct DueItem {
    entry: ScheduleEntry,
    due_at: DateTime<Utc>,
}

/// Handles medication requests and answers compliance checks for its cases.
#[derive(Debug)]
pub struct MedicationHandler {
    tools: ToolBinding,
    policy: MedicationPolicy,
}

impl MedicationHandler {
    /// Binds the handler to its tools.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if a tool has no timeout.
    pub fn new(registry: &ToolRegistry, policy: MedicationPolicy) -> Result<Self> {
        Ok(Self {
            tools: registry.bind(CapabilityName::Medication.as_str(), TOOLS)?,
            policy,
        })
    }

    fn local_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.policy.utc_offset)
            .format("%H:%M")
            .to_string()
    }

    /// Occurrences of a local clock time on the days around `now`.
    fn occurrences(&self, time: NaiveTime, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let offset = self.policy.utc_offset;
        let today = now.with_timezone(&offset).date_naive();
        [-1, 0, 1]
            .into_iter()
            .filter_map(|days| today.checked_add_signed(TimeDelta::days(days)))
            .filter_map(|date| offset.from_local_datetime(&date.and_time(time)).single())
            .map(|local| local.with_timezone(&Utc))
            .collect()
    }

    fn nearest_occurrence(&self, time: NaiveTime, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.occurrences(time, now)
            .into_iter()
            .min_by_key(|at| (*at - now).num_seconds().abs())
    }

    /// The occurrence still within the overdue grace, otherwise the next one.
    fn pending_occurrence(&self, time: NaiveTime, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.occurrences(time, now)
            .into_iter()
            .filter(|at| *at >= now - self.policy.grace)
            .min()
    }

    fn next_occurrence(&self, time: NaiveTime, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.occurrences(time, now)
            .into_iter()
            .filter(|at| *at > now)
            .min()
    }

    fn due_items(
        &self,
        schedule: &[ScheduleEntry],
        text: &str,
        now: DateTime<Utc>,
        meal_preparation: bool,
        warnings: &mut Vec<String>,
    ) -> Vec<DueItem> {
        let text = text.to_lowercase();
        let named: Vec<&ScheduleEntry> = schedule
            .iter()
            .filter(|e| mentions(&text, &e.medication))
            .collect();
        let candidates: Vec<&ScheduleEntry> = if named.is_empty() {
            schedule.iter().collect()
        } else {
            named.clone()
        };

        let mut due = Vec::new();
        for entry in candidates {
            let Some(timing) = entry.timing(self.policy.meal_lead_minutes) else {
                warnings.push(format!(
                    "unrecognized timing '{}' for {}",
                    entry.time, entry.medication
                ));
                continue;
            };
            let due_at = match timing {
                Timing::BeforeMeal { .. } if meal_preparation => Some(now),
                Timing::BeforeMeal { .. } => None,
                Timing::At(time) if !named.is_empty() => self.pending_occurrence(time, now),
                Timing::At(time) => self.nearest_occurrence(time, now).filter(|at| {
                    *at >= now - self.policy.grace && *at <= now + self.policy.lookahead
                }),
            };
            if let Some(due_at) = due_at {
                due.push(DueItem {
                    entry: entry.clone(),
                    due_at,
                });
            }
        }
        due
    }

    fn upcoming_summary(&self, schedule: &[ScheduleEntry], now: DateTime<Utc>) -> String {
        let next = schedule
            .iter()
            .filter_map(|e| match e.timing(self.policy.meal_lead_minutes)? {
                Timing::At(time) => self.next_occurrence(time, now).map(|at| (at, e)),
                Timing::BeforeMeal { .. } => None,
            })
            .min_by_key(|(at, _)| *at);

        match next {
            Some((at, entry)) => {
                let minutes = (at - now).num_minutes();
                format!(
                    "No medication due now. Next: {} at {} (in {}h {:02}m)",
                    entry.medication,
                    self.local_time(at),
                    minutes / 60,
                    minutes % 60
                )
            },
            None => "No medication due now".to_string(),
        }
    }

    async fn detect_activity(&self, warnings: &mut Vec<String>) -> Result<Option<Activity>> {
        let outcome = self
            .tools
            .call::<EnvironmentStatus>(ToolName::GetEnvironmentStatus, json!({}))
            .await?;
        Ok(match outcome {
            Ok(status) => status.activity.as_deref().and_then(Activity::parse),
            Err(failure) => {
                warnings.push(format!("activity unknown: {failure}"));
                None
            },
        })
    }

    async fn check(&self, tool: ToolName, subject: &str) -> Result<Verification> {
        let outcome = self
            .tools
            .call::<IntakeVerification>(tool, json!({"medication": subject}))
            .await?;
        Ok(match outcome {
            Ok(v) if v.taken => Verification::Taken,
            Ok(_) => Verification::NotTaken,
            Err(failure) => {
                tracing::warn!(
                    subject,
                    tool = tool.as_str(),
                    error = %failure,
                    "Verification unavailable, treating as not taken"
                );
                Verification::Unknown
            },
        })
    }

    async fn probe_check(&self, tool: ToolName, subject: &str) -> Verification {
        self.check(tool, subject).await.unwrap_or_else(|e| {
            tracing::error!(subject, tool = tool.as_str(), error = %e, "Verification misconfigured");
            Verification::Unknown
        })
    }
}

/// Whether the request text names a medication, by full name or by its
/// distinctive first word ("aspirin" for "aspirin 650").
fn mentions(text_lower: &str, medication: &str) -> bool {
    let name = medication.trim().to_lowercase();
    if name.is_empty() {
        return false;
    }
    if text_lower.contains(&name) {
        return true;
    }
    name.split_whitespace()
        .next()
        .filter(|first| first.chars().count() >= 4)
        .is_some_and(|first| {
            text_lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == first)
        })
}

#[async_trait]
impl Capability for MedicationHandler {
    fn name(&self) -> CapabilityName {
        CapabilityName::Medication
    }

    fn tools(&self) -> Vec<ToolName> {
        self.tools.tools()
    }

    async fn handle(&self, request: &Request, ctx: &RequestContext) -> Result<HandlerResult> {
        let mut warnings = Vec::new();

        let schedule = match self
            .tools
            .call::<Vec<ScheduleEntry>>(ToolName::GetMedicationSchedule, json!({}))
            .await?
        {
            Ok(schedule) => schedule,
            Err(failure) => {
                return Ok(HandlerResult::informational(
                    CapabilityName::Medication,
                    "Medication schedule unavailable; nothing scheduled",
                )
                .with_warnings(vec![failure.to_string()]));
            },
        };

        let has_meal_rules = schedule.iter().any(|e| {
            matches!(
                e.timing(self.policy.meal_lead_minutes),
                Some(Timing::BeforeMeal { .. })
            )
        });
        let activity = match ctx.activity {
            Some(activity) => Some(activity),
            None if has_meal_rules => self.detect_activity(&mut warnings).await?,
            None => None,
        };
        let meal_preparation = activity.is_some_and(|a| a.is_meal_preparation());

        let now = ctx.at;
        let due = self.due_items(&schedule, &request.text, now, meal_preparation, &mut warnings);
        tracing::debug!(
            request_id = %request.id,
            due = due.len(),
            meal_preparation,
            "Determined due medication"
        );

        if due.is_empty() {
            return Ok(HandlerResult::informational(
                CapabilityName::Medication,
                self.upcoming_summary(&schedule, now),
            )
            .with_warnings(warnings));
        }

        let mut obligations = Vec::new();
        let mut taken = Vec::new();
        for item in due {
            let subject = item.entry.medication.clone();
            match self.check(ToolName::VerifyIntake, &subject).await? {
                Verification::Taken => taken.push(subject),
                verification => {
                    if verification == Verification::Unknown {
                        warnings.push(format!("intake of {subject} could not be verified"));
                    }
                    obligations.push(Obligation {
                        detail: format!("{} for {}", item.entry.description, item.entry.purpose),
                        subject,
                        due_at: item.due_at,
                    });
                },
            }
        }

        if obligations.is_empty() {
            return Ok(HandlerResult::informational(
                CapabilityName::Medication,
                format!("Already taken: {}", taken.join(", ")),
            )
            .with_warnings(warnings)
            .with_confirmed(taken));
        }

        let summary = obligations
            .iter()
            .map(|o| format!("{} due {}", o.subject, self.local_time(o.due_at)))
            .collect::<Vec<_>>()
            .join("; ");
        Ok(HandlerResult {
            capability: CapabilityName::Medication,
            summary: format!("Reminder scheduled: {summary}"),
            kind: ResultKind::ComplianceRequired { obligations },
            deliveries: Vec::new(),
            warnings,
            confirmed: taken,
        })
    }
}

#[async_trait]
impl ComplianceProbe for MedicationHandler {
    async fn reminder_text(&self, subject: &str) -> String {
        let fallback = || format!("Reminder: it is time to take your {subject}.");
        match self
            .tools
            .call::<ReminderText>(ToolName::MedicationReminder, json!({"medication": subject}))
            .await
        {
            Ok(Ok(text)) if !text.message.trim().is_empty() => text.message,
            Ok(_) => fallback(),
            Err(e) => {
                tracing::error!(subject, error = %e, "Reminder text misconfigured");
                fallback()
            },
        }
    }

    async fn verify(&self, subject: &str) -> Verification {
        self.probe_check(ToolName::VerifyIntake, subject).await
    }

    async fn reconfirm(&self, subject: &str) -> Verification {
        self.probe_check(ToolName::ReconfirmIntake, subject).await
    }

    async fn contacts(&self) -> Vec<Contact> {
        match self
            .tools
            .call::<Vec<Contact>>(ToolName::GetFamilyContacts, json!({}))
            .await
        {
            Ok(Ok(contacts)) => contacts,
            Ok(Err(failure)) => {
                tracing::warn!(error = %failure, "Contacts lookup failed");
                Vec::new()
            },
            Err(e) => {
                tracing::error!(error = %e, "Contacts lookup misconfigured");
                Vec::new()
            },
        }
    }
}
