//! The fixed tool catalog: names, schemas and failure kinds.
//!
//! The core knows tools only by their contract. Every tool declares an input
//! schema, an output schema and the failure kinds it may report; providers
//! implement the behavior (see [`super::ToolProvider`]).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::LazyLock;
use thiserror::Error as ThisError;

/// Name of a tool in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Profile lookup: age, living situation, conditions, allergies.
    GetUserProfile,
    /// Schedule lookup: the medication schedule.
    GetMedicationSchedule,
    /// Reminder text for a medication.
    MedicationReminder,
    /// Intake verification check.
    VerifyIntake,
    /// Direct reconfirmation with the patient before family is contacted.
    ReconfirmIntake,
    /// Contacts lookup.
    GetFamilyContacts,
    /// Action-plan lookup for an emergency type.
    GetActionPlan,
    /// Live environment sensors: location, activity, devices in use.
    GetEnvironmentStatus,
    /// Message send on one channel.
    SendMessage,
}

impl ToolName {
    /// Every tool in the catalog.
    pub const ALL: [Self; 9] = [
        Self::GetUserProfile,
        Self::GetMedicationSchedule,
        Self::MedicationReminder,
        Self::VerifyIntake,
        Self::ReconfirmIntake,
        Self::GetFamilyContacts,
        Self::GetActionPlan,
        Self::GetEnvironmentStatus,
        Self::SendMessage,
    ];

    /// Returns the tool name as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GetUserProfile => "get_user_profile",
            Self::GetMedicationSchedule => "get_medication_schedule",
            Self::MedicationReminder => "medication_reminder",
            Self::VerifyIntake => "verify_intake",
            Self::ReconfirmIntake => "reconfirm_intake",
            Self::GetFamilyContacts => "get_family_contacts",
            Self::GetActionPlan => "get_action_plan",
            Self::GetEnvironmentStatus => "get_environment_status",
            Self::SendMessage => "send_message",
        }
    }

    /// Parses a tool name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of a runtime tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    /// The provider could not be reached.
    Unavailable,
    /// The provider did not answer within the configured timeout.
    Timeout,
    /// The provider answered with a value that does not match the output schema.
    InvalidOutput,
}

impl ToolFailureKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::InvalidOutput => "invalid_output",
        }
    }

    /// Unavailable and timeout are retried; a malformed answer is not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Timeout)
    }
}

impl std::fmt::Display for ToolFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A runtime tool failure.
///
/// Never converted into [`crate::Error`]: handlers absorb it and degrade.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("tool '{tool}' {kind}: {detail}")]
pub struct ToolFailure {
    /// The failing tool.
    pub tool: ToolName,
    /// Failure kind.
    pub kind: ToolFailureKind,
    /// Provider-supplied detail.
    pub detail: String,
}

impl ToolFailure {
    /// Creates a failure.
    #[must_use]
    pub fn new(tool: ToolName, kind: ToolFailureKind, detail: impl Into<String>) -> Self {
        Self {
            tool,
            kind,
            detail: detail.into(),
        }
    }

    /// Shorthand for an unavailable provider.
    #[must_use]
    pub fn unavailable(tool: ToolName, detail: impl Into<String>) -> Self {
        Self::new(tool, ToolFailureKind::Unavailable, detail)
    }
}

/// Declared contract of one tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Tool name.
    pub name: ToolName,
    /// Human-readable description.
    pub description: &'static str,
    /// JSON schema of the arguments.
    pub input_schema: Value,
    /// JSON schema of the result.
    pub output_schema: Value,
    /// Failure kinds the tool may report.
    pub failure_kinds: &'static [ToolFailureKind],
}

impl ToolSpec {
    /// Checks that `args` is an object carrying every required key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] naming the first missing key.
    pub fn check_input(&self, args: &Value) -> crate::Result<()> {
        let Some(object) = args.as_object() else {
            return Err(crate::Error::InvalidInput(format!(
                "arguments for '{}' must be an object",
                self.name
            )));
        };

        let required = self
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(crate::Error::InvalidInput(format!(
                    "arguments for '{}' are missing '{key}'",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

const ALL_FAILURES: &[ToolFailureKind] = &[
    ToolFailureKind::Unavailable,
    ToolFailureKind::Timeout,
    ToolFailureKind::InvalidOutput,
];

fn no_args() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

fn medication_arg() -> Value {
    json!({
        "type": "object",
        "properties": {"medication": {"type": "string"}},
        "required": ["medication"]
    })
}

fn taken_output() -> Value {
    json!({
        "type": "object",
        "properties": {"taken": {"type": "boolean"}},
        "required": ["taken"]
    })
}

static CATALOG: LazyLock<Vec<ToolSpec>> = LazyLock::new(|| {
    vec![
        ToolSpec {
            name: ToolName::GetUserProfile,
            description: "Profile of the monitored person: age, living situation, conditions, allergies",
            input_schema: no_args(),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "age": {"type": "integer"},
                    "gender": {"type": "string"},
                    "living_situation": {"type": "string"},
                    "conditions": {"type": "array", "items": {"type": "string"}},
                    "allergies": {"type": "array", "items": {"type": "string"}}
                }
            }),
            failure_kinds: ALL_FAILURES,
        },
        ToolSpec {
            name: ToolName::GetMedicationSchedule,
            description: "Medication schedule with time, pill description and purpose",
            input_schema: no_args(),
            output_schema: json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "medication": {"type": "string"},
                        "time": {"type": "string"},
                        "description": {"type": "string"},
                        "condition": {"type": "string"}
                    },
                    "required": ["medication", "time"]
                }
            }),
            failure_kinds: ALL_FAILURES,
        },
        ToolSpec {
            name: ToolName::MedicationReminder,
            description: "Reminder text for a medication",
            input_schema: medication_arg(),
            output_schema: json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
            failure_kinds: ALL_FAILURES,
        },
        ToolSpec {
            name: ToolName::VerifyIntake,
            description: "Checks whether a medication was taken",
            input_schema: medication_arg(),
            output_schema: taken_output(),
            failure_kinds: ALL_FAILURES,
        },
        ToolSpec {
            name: ToolName::ReconfirmIntake,
            description: "Asks the patient directly to confirm a medication was taken",
            input_schema: medication_arg(),
            output_schema: taken_output(),
            failure_kinds: ALL_FAILURES,
        },
        ToolSpec {
            name: ToolName::GetFamilyContacts,
            description: "Family and emergency contacts, primary contact first",
            input_schema: no_args(),
            output_schema: json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "relation": {"type": "string"},
                        "address": {"type": "string"}
                    },
                    "required": ["name", "relation", "address"]
                }
            }),
            failure_kinds: ALL_FAILURES,
        },
        ToolSpec {
            name: ToolName::GetActionPlan,
            description: "Action plan template for an emergency type",
            input_schema: json!({
                "type": "object",
                "properties": {"emergency_type": {"type": "string"}},
                "required": ["emergency_type"]
            }),
            output_schema: json!({
                "type": "object",
                "properties": {"steps": {"type": "array", "items": {"type": "string"}}},
                "required": ["steps"]
            }),
            failure_kinds: ALL_FAILURES,
        },
        ToolSpec {
            name: ToolName::GetEnvironmentStatus,
            description: "Current location, activity and devices in use",
            input_schema: no_args(),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string"},
                    "activity": {"type": "string"},
                    "active_devices": {"type": "array", "items": {"type": "string"}}
                }
            }),
            failure_kinds: ALL_FAILURES,
        },
        ToolSpec {
            name: ToolName::SendMessage,
            description: "Sends a rendered message on one channel",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "channel": {"type": "string"},
                    "recipient": {"type": "object"},
                    "message": {"type": "string"},
                    "urgency": {"type": "string"}
                },
                "required": ["channel", "recipient", "message", "urgency"]
            }),
            output_schema: json!({
                "type": "object",
                "properties": {"status": {"enum": ["delivered", "channel_unavailable"]}},
                "required": ["status"]
            }),
            failure_kinds: ALL_FAILURES,
        },
    ]
});

/// Returns the full tool catalog.
#[must_use]
pub fn catalog() -> &'static [ToolSpec] {
    CATALOG.as_slice()
}

/// Returns the contract of one tool.
#[must_use]
pub fn spec(tool: ToolName) -> Option<&'static ToolSpec> {
    CATALOG.iter().find(|s| s.name == tool)
}
