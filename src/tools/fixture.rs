//! In-memory tool provider seeded from a fixture.
//!
//! Used by the binary when no real integrations are configured and by the test
//! suites. Every answer comes from the [`Fixture`]; the provider records every
//! invocation and every sent message so callers can inspect what happened.

use super::types::{ActionPlan, EnvironmentStatus, ScheduleEntry, UserProfile};
use super::{ToolFailure, ToolName, ToolProvider};
use crate::models::{Channel, Contact, DeliveryStatus, Recipient, Urgency, subject_key};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Household data and simulated failures answered by [`FixtureToolProvider`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    /// Answer of `get_user_profile`.
    pub profile: UserProfile,
    /// Answer of `get_medication_schedule`.
    pub schedule: Vec<ScheduleEntry>,
    /// Answer of `get_family_contacts`, primary contact first.
    pub contacts: Vec<Contact>,
    /// Action plan steps by emergency type (`gas_leak`, `fire`, `water_burst`).
    pub action_plans: BTreeMap<String, Vec<String>>,
    /// Answer of `get_environment_status`.
    pub environment: EnvironmentStatus,
    /// Medications verified as taken.
    pub taken: BTreeSet<String>,
    /// Channels on which `send_message` reports `channel_unavailable`.
    pub unavailable_channels: BTreeSet<Channel>,
    /// Contact addresses that cannot be reached.
    pub unreachable_addresses: BTreeSet<String>,
    /// Tools that always fail as unavailable.
    pub failing_tools: BTreeSet<ToolName>,
    /// Artificial latency per tool, in milliseconds.
    pub slow_tools: BTreeMap<ToolName, u64>,
}

impl Fixture {
    /// The demonstration household.
    #[must_use]
    pub fn demo() -> Self {
        let entry = |medication: &str, time: &str, description: &str, purpose: &str| {
            ScheduleEntry {
                medication: medication.to_string(),
                time: time.to_string(),
                description: description.to_string(),
                purpose: purpose.to_string(),
            }
        };
        let contact = |name: &str, relation: &str, address: &str| Contact {
            name: name.to_string(),
            relation: relation.to_string(),
            address: address.to_string(),
        };
        let steps = |s: &[&str]| s.iter().map(ToString::to_string).collect::<Vec<_>>();

        let mut action_plans = BTreeMap::new();
        action_plans.insert(
            "gas_leak".to_string(),
            steps(&[
                "Evacuate immediately",
                "Do not use electrical switches",
                "Call the gas company and 911 from outside",
            ]),
        );
        action_plans.insert(
            "fire".to_string(),
            steps(&[
                "Evacuate the building immediately",
                "Do not use elevators",
                "Stay low if there is smoke",
                "Call 911 once outside",
            ]),
        );
        action_plans.insert(
            "water_burst".to_string(),
            steps(&[
                "Turn off the main water supply if safely reachable",
                "Move to a safe, dry area",
                "Call emergency services",
            ]),
        );

        Self {
            profile: UserProfile {
                age: Some(52),
                gender: Some("Male".to_string()),
                living_situation: Some("alone".to_string()),
                conditions: vec!["high blood pressure".to_string(), "diabetes".to_string()],
                allergies: vec!["peanut".to_string(), "sunflower".to_string()],
            },
            schedule: vec![
                entry("paracetamol", "3:00pm", "white round tablet", "pain relief"),
                entry("aspirin 650", "7:30pm", "red round pill", "heart medication"),
                entry(
                    "gastro medicine",
                    "30 minutes before meals",
                    "blue capsule",
                    "digestive health",
                ),
                entry("metformin", "8:00am", "white oval tablet", "diabetes"),
                entry("lisinopril", "10:00pm", "yellow round tablet", "blood pressure"),
            ],
            contacts: vec![
                contact("John Smith", "Son", "+1-555-0123"),
                contact("Mary Smith", "Daughter", "+1-555-0456"),
                contact("Emergency Contact", "Neighbor", "+1-555-0789"),
            ],
            action_plans,
            environment: EnvironmentStatus {
                location: Some("living_room".to_string()),
                activity: Some("watching_tv".to_string()),
                active_devices: vec!["tv".to_string()],
            },
            ..Self::default()
        }
    }

    /// Loads a fixture from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_fixture".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::OperationFailed {
            operation: "parse_fixture".to_string(),
            cause: format!("{}: {e}", path.display()),
        })
    }
}

/// A message accepted (or refused) by the simulated `send_message` tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Target channel.
    pub channel: Channel,
    /// Recipient.
    pub recipient: Recipient,
    /// Rendered text.
    pub message: String,
    /// Urgency.
    pub urgency: Urgency,
    /// Status reported back.
    pub status: DeliveryStatus,
}

/// Tool provider answering from a [`Fixture`].
#[derive(Debug, Default)]
pub struct FixtureToolProvider {
    fixture: RwLock<Fixture>,
    verification_scripts: Mutex<HashMap<String, VecDeque<bool>>>,
    invocations: Mutex<HashMap<ToolName, usize>>,
    outbox: Mutex<Vec<SentMessage>>,
}

impl FixtureToolProvider {
    /// Creates a provider over a fixture.
    #[must_use]
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture: RwLock::new(fixture),
            ..Self::default()
        }
    }

    /// Creates a provider over the demonstration household.
    #[must_use]
    pub fn demo() -> Self {
        Self::new(Fixture::demo())
    }

    /// Marks a medication as taken: later verifications answer `true`.
    pub fn mark_taken(&self, medication: &str) {
        self.write().taken.insert(subject_key(medication));
    }

    /// Clears the taken flag for a medication.
    pub fn mark_not_taken(&self, medication: &str) {
        self.write().taken.remove(&subject_key(medication));
    }

    /// Queues scripted answers for the verification tools of one medication.
    ///
    /// Each `verify_intake`/`reconfirm_intake` call consumes one answer; once the
    /// script is exhausted the taken set answers.
    pub fn script_verification(&self, medication: &str, answers: impl IntoIterator<Item = bool>) {
        self.verification_scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject_key(medication), answers.into_iter().collect());
    }

    /// Makes a tool fail as unavailable (or recover).
    pub fn set_tool_failing(&self, tool: ToolName, failing: bool) {
        let mut fixture = self.write();
        if failing {
            fixture.failing_tools.insert(tool);
        } else {
            fixture.failing_tools.remove(&tool);
        }
    }

    /// Makes a channel report `channel_unavailable` (or recover).
    pub fn set_channel_unavailable(&self, channel: Channel, unavailable: bool) {
        let mut fixture = self.write();
        if unavailable {
            fixture.unavailable_channels.insert(channel);
        } else {
            fixture.unavailable_channels.remove(&channel);
        }
    }

    /// Applies an arbitrary change to the fixture.
    pub fn update_fixture(&self, change: impl FnOnce(&mut Fixture)) {
        change(&mut self.write());
    }

    /// Sets the simulated environment.
    pub fn set_environment(&self, environment: EnvironmentStatus) {
        self.write().environment = environment;
    }

    /// Number of invocations of one tool, including failed ones.
    #[must_use]
    pub fn invocation_count(&self, tool: ToolName) -> usize {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tool)
            .copied()
            .unwrap_or(0)
    }

    /// Number of invocations across all tools.
    #[must_use]
    pub fn total_invocations(&self) -> usize {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    /// Every message passed to `send_message`, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Fixture> {
        self.fixture.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Fixture> {
        self.fixture.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, tool: ToolName) {
        *self
            .invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(tool)
            .or_insert(0) += 1;
    }

    fn medication_arg(tool: ToolName, args: &Value) -> std::result::Result<String, ToolFailure> {
        args.get("medication")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| ToolFailure::unavailable(tool, "missing medication argument"))
    }

    fn verify(&self, medication: &str) -> bool {
        let key = subject_key(medication);
        let scripted = self
            .verification_scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| self.read().taken.contains(&key))
    }

    fn reminder(&self, medication: &str) -> String {
        let key = subject_key(medication);
        let fixture = self.read();
        fixture
            .schedule
            .iter()
            .find(|e| subject_key(&e.medication) == key)
            .map_or_else(
                || format!("Time to take your {medication}."),
                |e| {
                    format!(
                        "Time to take your {} ({}) for {}.",
                        e.medication, e.description, e.purpose
                    )
                },
            )
    }

    fn action_plan(&self, emergency_type: &str) -> ActionPlan {
        let key = emergency_type.trim().to_lowercase().replace(' ', "_");
        self.read().action_plans.get(&key).map_or_else(
            || ActionPlan {
                steps: vec![
                    format!("Unknown emergency type: {emergency_type}"),
                    "Call 911 for assistance".to_string(),
                ],
            },
            |steps| ActionPlan {
                steps: steps.clone(),
            },
        )
    }

    fn send(&self, args: &Value) -> std::result::Result<Value, ToolFailure> {
        let invalid = |what: &str| ToolFailure::unavailable(ToolName::SendMessage, what.to_string());
        let channel = args
            .get("channel")
            .and_then(Value::as_str)
            .and_then(Channel::parse)
            .ok_or_else(|| invalid("unknown channel"))?;
        let recipient: Recipient = args
            .get("recipient")
            .cloned()
            .and_then(|r| serde_json::from_value(r).ok())
            .ok_or_else(|| invalid("malformed recipient"))?;
        let urgency = args
            .get("urgency")
            .and_then(Value::as_str)
            .and_then(Urgency::parse)
            .ok_or_else(|| invalid("unknown urgency"))?;
        let message = args
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let status = {
            let fixture = self.read();
            let unreachable = match &recipient {
                Recipient::Contact(c) => fixture.unreachable_addresses.contains(&c.address),
                Recipient::Subject => false,
            };
            if unreachable || fixture.unavailable_channels.contains(&channel) {
                DeliveryStatus::ChannelUnavailable
            } else {
                DeliveryStatus::Delivered
            }
        };

        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage {
                channel,
                recipient,
                message,
                urgency,
                status,
            });
        Ok(json!({"status": status.as_str()}))
    }
}

#[async_trait]
impl ToolProvider for FixtureToolProvider {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn invoke(&self, tool: ToolName, args: Value) -> std::result::Result<Value, ToolFailure> {
        self.record(tool);

        let (failing, delay) = {
            let fixture = self.read();
            (
                fixture.failing_tools.contains(&tool),
                fixture.slow_tools.get(&tool).copied(),
            )
        };
        if let Some(ms) = delay {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if failing {
            return Err(ToolFailure::unavailable(tool, "fixture marks tool as failing"));
        }

        let to_value = |v: std::result::Result<Value, serde_json::Error>| {
            v.map_err(|e| ToolFailure::unavailable(tool, e.to_string()))
        };

        match tool {
            ToolName::GetUserProfile => to_value(serde_json::to_value(&self.read().profile)),
            ToolName::GetMedicationSchedule => {
                to_value(serde_json::to_value(&self.read().schedule))
            },
            ToolName::MedicationReminder => {
                let medication = Self::medication_arg(tool, &args)?;
                Ok(json!({"message": self.reminder(&medication)}))
            },
            ToolName::VerifyIntake | ToolName::ReconfirmIntake => {
                let medication = Self::medication_arg(tool, &args)?;
                Ok(json!({"taken": self.verify(&medication)}))
            },
            ToolName::GetFamilyContacts => to_value(serde_json::to_value(&self.read().contacts)),
            ToolName::GetActionPlan => {
                let emergency_type = args
                    .get("emergency_type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                to_value(serde_json::to_value(self.action_plan(&emergency_type)))
            },
            ToolName::GetEnvironmentStatus => {
                to_value(serde_json::to_value(&self.read().environment))
            },
            ToolName::SendMessage => self.send(&args),
        }
    }
}
