//! Typed tool results.
//!
//! Providers answer with JSON; the registry decodes answers into these types and
//! reports a mismatch as [`super::ToolFailureKind::InvalidOutput`].

use crate::models::{Activity, Channel, DeliveryStatus, RequestContext};
use chrono::{DateTime, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Profile of the monitored person.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Age in years.
    #[serde(default)]
    pub age: Option<u32>,
    /// Gender.
    #[serde(default)]
    pub gender: Option<String>,
    /// Living situation ("alone", "with spouse").
    #[serde(default)]
    pub living_situation: Option<String>,
    /// Chronic conditions.
    #[serde(default)]
    pub conditions: Vec<String>,
    /// Known allergies.
    #[serde(default)]
    pub allergies: Vec<String>,
}

impl UserProfile {
    /// One-line medical context for responders, or `None` when nothing is known.
    #[must_use]
    pub fn medical_context(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(age) = self.age {
            parts.push(format!("Age {age}"));
        }
        if let Some(living) = &self.living_situation {
            parts.push(format!("lives {living}"));
        }
        if !self.conditions.is_empty() {
            parts.push(format!("conditions: {}", self.conditions.join(", ")));
        }
        if !self.allergies.is_empty() {
            parts.push(format!("allergies: {}", self.allergies.join(", ")));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

/// When a schedule entry is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    /// At a clock time of day, in household local time.
    At(NaiveTime),
    /// A fixed lead before a meal.
    BeforeMeal {
        /// Minutes before the meal.
        lead_minutes: u32,
    },
}

#[allow(clippy::expect_used)]
static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\s*$")
        .expect("static regex: clock time")
});

#[allow(clippy::expect_used)]
static BEFORE_MEAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:(\d+)\s*min(?:ute)?s?\s+)?before[\s_]+(?:meals?|eating|food)\s*$")
        .expect("static regex: before meals")
});

/// One medication schedule entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Medication name.
    pub medication: String,
    /// Timing expression: "7:30pm", "19:30", "30 minutes before meals".
    pub time: String,
    /// Pill description ("red round pill").
    #[serde(default)]
    pub description: String,
    /// What the medication treats.
    #[serde(default, alias = "condition")]
    pub purpose: String,
}

impl ScheduleEntry {
    /// Parses the timing expression.
    ///
    /// `default_meal_lead` applies to "before meals" without an explicit lead.
    /// Returns `None` for expressions that are neither a clock time nor a
    /// before-meal rule.
    #[must_use]
    pub fn timing(&self, default_meal_lead: u32) -> Option<Timing> {
        if let Some(caps) = BEFORE_MEAL.captures(&self.time) {
            let lead_minutes = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(default_meal_lead);
            return Some(Timing::BeforeMeal { lead_minutes });
        }

        let caps = CLOCK_TIME.captures(&self.time)?;
        let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;

        match caps.get(3).map(|m| m.as_str().to_lowercase()).as_deref() {
            Some("am") if hour == 12 => hour = 0,
            Some("pm") if hour < 12 => hour += 12,
            Some(_) if hour > 12 => return None,
            _ => {},
        }

        NaiveTime::from_hms_opt(hour, minute, 0).map(Timing::At)
    }
}

/// Answer of the verification and reconfirmation tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeVerification {
    /// Whether the medication was taken.
    pub taken: bool,
}

/// Answer of the reminder-text tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderText {
    /// Reminder message.
    pub message: String,
}

/// Answer of the action-plan tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// Ordered steps.
    pub steps: Vec<String>,
}

impl ActionPlan {
    /// Conservative plan used when no template is available.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            steps: vec![
                "Call 911 immediately".to_string(),
                "Leave the area if it is unsafe".to_string(),
                "Wait for help in a safe place".to_string(),
            ],
        }
    }

    /// Steps joined into a single instruction line.
    #[must_use]
    pub fn instructions(&self) -> String {
        self.steps.join(". ")
    }
}

/// Answer of the environment-status tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentStatus {
    /// Room the person is in.
    #[serde(default)]
    pub location: Option<String>,
    /// Detected activity.
    #[serde(default)]
    pub activity: Option<String>,
    /// Devices currently in use, by household device name.
    #[serde(default)]
    pub active_devices: Vec<String>,
}

impl EnvironmentStatus {
    /// Converts the reading into a request context observed at `at`.
    ///
    /// Unknown activities and device names are ignored.
    #[must_use]
    pub fn into_context(self, at: DateTime<Utc>) -> RequestContext {
        RequestContext {
            at,
            location: self.location,
            activity: self.activity.as_deref().and_then(Activity::parse),
            active_devices: self
                .active_devices
                .iter()
                .filter_map(|d| Channel::parse(d))
                .collect(),
        }
    }
}

/// Answer of the send tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Channel-level status.
    pub status: DeliveryStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(time: &str) -> ScheduleEntry {
        ScheduleEntry {
            medication: "aspirin 650".to_string(),
            time: time.to_string(),
            description: String::new(),
            purpose: String::new(),
        }
    }

    fn at(h: u32, m: u32) -> Option<Timing> {
        NaiveTime::from_hms_opt(h, m, 0).map(Timing::At)
    }

    #[test]
    fn test_timing_clock_formats() {
        assert_eq!(entry("7:30pm").timing(30), at(19, 30));
        assert_eq!(entry("8:00am").timing(30), at(8, 0));
        assert_eq!(entry("12:15am").timing(30), at(0, 15));
        assert_eq!(entry("12:00pm").timing(30), at(12, 0));
        assert_eq!(entry("19:30").timing(30), at(19, 30));
        assert_eq!(entry("3 PM").timing(30), at(15, 0));
    }

    #[test]
    fn test_timing_before_meals() {
        assert_eq!(
            entry("30 minutes before meals").timing(15),
            Some(Timing::BeforeMeal { lead_minutes: 30 })
        );
        assert_eq!(
            entry("before_meal").timing(20),
            Some(Timing::BeforeMeal { lead_minutes: 20 })
        );
    }

    #[test]
    fn test_timing_rejects_garbage() {
        assert_eq!(entry("whenever").timing(30), None);
        assert_eq!(entry("25:00").timing(30), None);
        assert_eq!(entry("13:00pm").timing(30), None);
    }

    #[test]
    fn test_medical_context() {
        let profile = UserProfile {
            age: Some(52),
            gender: Some("Male".to_string()),
            living_situation: Some("alone".to_string()),
            conditions: vec!["high blood pressure".to_string(), "diabetes".to_string()],
            allergies: vec!["peanut".to_string()],
        };
        assert_eq!(
            profile.medical_context().as_deref(),
            Some("Age 52; lives alone; conditions: high blood pressure, diabetes; allergies: peanut")
        );
        assert_eq!(UserProfile::default().medical_context(), None);
    }

    #[test]
    fn test_environment_into_context() {
        let status = EnvironmentStatus {
            location: Some("living room".to_string()),
            activity: Some("cooking".to_string()),
            active_devices: vec!["tv".to_string(), "kitchen_appliances".to_string(), "fridge".to_string()],
        };
        let ctx = status.into_context(Utc::now());
        assert_eq!(ctx.activity, Some(Activity::Cooking));
        assert!(ctx.active_devices.contains(&Channel::Display));
        assert!(ctx.active_devices.contains(&Channel::ApplianceDisplay));
        assert_eq!(ctx.active_devices.len(), 2);
    }
}
