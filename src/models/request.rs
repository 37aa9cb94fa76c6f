//! Inbound requests and their situational context.

use super::Channel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Domain a request is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Medication timing, intake and reminders.
    Medication,
    /// Household emergencies (gas leak, fire, water burst).
    Emergency,
    /// Anything else that should be relayed as a direct response.
    General,
}

impl Domain {
    /// Returns all domains.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Medication, Self::Emergency, Self::General]
    }

    /// Returns the domain as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Medication => "medication",
            Self::Emergency => "emergency",
            Self::General => "general",
        }
    }

    /// Parses a domain hint.
    ///
    /// Case-insensitive, with common aliases.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "medication" | "medicine" | "meds" => Some(Self::Medication),
            "emergency" | "safety" => Some(Self::Emergency),
            "general" | "communication" | "message" => Some(Self::General),
            _ => None,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the monitored person is currently doing, as reported by sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Watching television.
    WatchingTv,
    /// Preparing a meal (cooktop or kitchen appliance active).
    Cooking,
    /// Eating.
    Eating,
    /// Resting or idle at home.
    Resting,
    /// Asleep.
    Sleeping,
    /// Out of the home.
    Away,
}

impl Activity {
    /// Returns the activity as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WatchingTv => "watching_tv",
            Self::Cooking => "cooking",
            Self::Eating => "eating",
            Self::Resting => "resting",
            Self::Sleeping => "sleeping",
            Self::Away => "away",
        }
    }

    /// Parses an activity string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "watching_tv" | "tv" => Some(Self::WatchingTv),
            "cooking" | "meal_preparation" | "cooktop_active" => Some(Self::Cooking),
            "eating" => Some(Self::Eating),
            "resting" | "idle" => Some(Self::Resting),
            "sleeping" | "asleep" => Some(Self::Sleeping),
            "away" | "out" => Some(Self::Away),
            _ => None,
        }
    }

    /// Whether this activity means a meal is imminent.
    #[must_use]
    pub const fn is_meal_preparation(&self) -> bool {
        matches!(self, Self::Cooking)
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured situational context attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// When the situation was observed.
    pub at: DateTime<Utc>,
    /// Room or place the person is in.
    #[serde(default)]
    pub location: Option<String>,
    /// Detected activity.
    #[serde(default)]
    pub activity: Option<Activity>,
    /// Devices the person is currently attending to (a display being watched,
    /// an appliance in use).
    #[serde(default)]
    pub active_devices: BTreeSet<Channel>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}

impl RequestContext {
    /// Creates an empty context observed at the given instant.
    #[must_use]
    pub const fn at(at: DateTime<Utc>) -> Self {
        Self {
            at,
            location: None,
            activity: None,
            active_devices: BTreeSet::new(),
        }
    }

    /// Sets the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the activity.
    #[must_use]
    pub const fn with_activity(mut self, activity: Activity) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Marks a device as currently attended.
    #[must_use]
    pub fn with_active_device(mut self, channel: Channel) -> Self {
        self.active_devices.insert(channel);
        self
    }
}

/// An incoming situational report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Unique request identifier.
    pub id: String,
    /// Free-form text of the report.
    pub text: String,
    /// Explicit domain hint supplied by the caller, if any.
    #[serde(default)]
    pub domain_hint: Option<Domain>,
    /// Situational context.
    #[serde(default)]
    pub context: RequestContext,
}

impl Request {
    /// Creates a request with a fresh identifier and a context observed now.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            text: text.into(),
            domain_hint: None,
            context: RequestContext::default(),
        }
    }

    /// Sets an explicit domain hint.
    #[must_use]
    pub const fn with_domain_hint(mut self, domain: Domain) -> Self {
        self.domain_hint = Some(domain);
        self
    }

    /// Replaces the situational context.
    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_parse_aliases() {
        assert_eq!(Domain::parse("Medicine"), Some(Domain::Medication));
        assert_eq!(Domain::parse(" emergency "), Some(Domain::Emergency));
        assert_eq!(Domain::parse("communication"), Some(Domain::General));
        assert_eq!(Domain::parse("weather"), None);
    }

    #[test]
    fn test_activity_parse() {
        assert_eq!(Activity::parse("cooktop_active"), Some(Activity::Cooking));
        assert_eq!(Activity::parse("watching-tv"), Some(Activity::WatchingTv));
        assert_eq!(Activity::parse("juggling"), None);
        assert!(Activity::Cooking.is_meal_preparation());
        assert!(!Activity::Resting.is_meal_preparation());
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new("smell of gas in the kitchen")
            .with_domain_hint(Domain::Emergency)
            .with_context(
                RequestContext::default()
                    .with_location("kitchen")
                    .with_activity(Activity::Cooking)
                    .with_active_device(Channel::ApplianceDisplay),
            );

        assert_eq!(request.domain_hint, Some(Domain::Emergency));
        assert_eq!(request.context.location.as_deref(), Some("kitchen"));
        assert!(request.context.active_devices.contains(&Channel::ApplianceDisplay));
        assert!(!request.id.is_empty());
    }
}
