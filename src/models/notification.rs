//! Notifications, channels, urgency and delivery outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered severity level driving channel selection.
///
/// `Standard < Elevated < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Routine reminder.
    #[default]
    Standard,
    /// First follow-up.
    Elevated,
    /// Escalated: subject and family.
    High,
    /// Emergency: every known channel.
    Critical,
}

impl Urgency {
    /// All urgencies in ascending order.
    pub const ALL: [Self; 4] = [Self::Standard, Self::Elevated, Self::High, Self::Critical];

    /// Returns the urgency as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Elevated => "elevated",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parses an urgency string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "normal" => Some(Self::Standard),
            "elevated" => Some(Self::Elevated),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A notification delivery target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// The person's phone.
    Phone,
    /// A wearable (smart watch).
    Wearable,
    /// A television or wall display.
    Display,
    /// The display of a kitchen appliance.
    ApplianceDisplay,
    /// A smart speaker.
    AmbientSpeaker,
}

impl Channel {
    /// Every known channel.
    pub const ALL: [Self; 5] = [
        Self::Phone,
        Self::Wearable,
        Self::Display,
        Self::ApplianceDisplay,
        Self::AmbientSpeaker,
    ];

    /// Returns the channel as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Wearable => "wearable",
            Self::Display => "display",
            Self::ApplianceDisplay => "appliance_display",
            Self::AmbientSpeaker => "ambient_speaker",
        }
    }

    /// Parses a channel name, accepting household device names as aliases.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "phone" | "mobile" => Some(Self::Phone),
            "wearable" | "watch" => Some(Self::Wearable),
            "display" | "tv" => Some(Self::Display),
            "appliance_display" | "appliancedisplay" | "kitchen_appliances" | "cooktop" => {
                Some(Self::ApplianceDisplay)
            },
            "ambient_speaker" | "ambientspeaker" | "smart_speakers" | "speaker" => {
                Some(Self::AmbientSpeaker)
            },
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A family or emergency contact, obtained from the contacts tool.
///
/// Opaque to the core: only forwarded to the communication capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Display name.
    pub name: String,
    /// Relation to the monitored person.
    pub relation: String,
    /// Delivery address (phone number).
    pub address: String,
}

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Recipient {
    /// The monitored person.
    Subject,
    /// A family or emergency contact.
    Contact(Contact),
}

impl Recipient {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Subject => "subject".to_string(),
            Self::Contact(c) => format!("contact:{}", c.name),
        }
    }

    /// Whether this is the monitored person.
    #[must_use]
    pub const fn is_subject(&self) -> bool {
        matches!(self, Self::Subject)
    }
}

/// A rendered, immutable notification ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier.
    pub id: String,
    /// Recipient.
    pub recipient: Recipient,
    /// Urgency.
    pub urgency: Urgency,
    /// Rendered message per selected channel.
    pub rendered: BTreeMap<Channel, String>,
    /// When the notification was produced.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// The selected channels, in channel order.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.rendered.keys().copied()
    }
}

/// Result of sending one rendered message to one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// The channel accepted the message.
    Delivered,
    /// The channel could not be reached.
    ChannelUnavailable,
}

impl DeliveryStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::ChannelUnavailable => "channel_unavailable",
        }
    }
}

/// Per-channel outcome of dispatching a [`Notification`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// The notification this report belongs to.
    pub notification_id: String,
    /// Recipient.
    pub recipient: Recipient,
    /// Urgency.
    pub urgency: Urgency,
    /// Status per selected channel.
    pub statuses: BTreeMap<Channel, DeliveryStatus>,
}

impl DeliveryReport {
    /// At least one channel delivered.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.statuses
            .values()
            .any(|s| matches!(s, DeliveryStatus::Delivered))
    }

    /// No channel delivered.
    #[must_use]
    pub fn is_total_failure(&self) -> bool {
        !self.is_success()
    }

    /// Channels that delivered.
    #[must_use]
    pub fn delivered(&self) -> Vec<Channel> {
        self.channels_with(DeliveryStatus::Delivered)
    }

    /// Channels that reported `channel_unavailable`.
    #[must_use]
    pub fn unavailable(&self) -> Vec<Channel> {
        self.channels_with(DeliveryStatus::ChannelUnavailable)
    }

    fn channels_with(&self, status: DeliveryStatus) -> Vec<Channel> {
        self.statuses
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(c, _)| *c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_order() {
        assert!(Urgency::Standard < Urgency::Elevated);
        assert!(Urgency::Elevated < Urgency::High);
        assert!(Urgency::High < Urgency::Critical);
        assert_eq!(Urgency::parse("HIGH"), Some(Urgency::High));
    }

    #[test]
    fn test_channel_device_aliases() {
        assert_eq!(Channel::parse("watch"), Some(Channel::Wearable));
        assert_eq!(Channel::parse("tv"), Some(Channel::Display));
        assert_eq!(
            Channel::parse("kitchen_appliances"),
            Some(Channel::ApplianceDisplay)
        );
        assert_eq!(
            Channel::parse("smart-speakers"),
            Some(Channel::AmbientSpeaker)
        );
        assert_eq!(Channel::parse("pager"), None);
    }

    #[test]
    fn test_delivery_report_success() {
        let mut statuses = BTreeMap::new();
        statuses.insert(Channel::Phone, DeliveryStatus::ChannelUnavailable);
        statuses.insert(Channel::Wearable, DeliveryStatus::Delivered);
        let report = DeliveryReport {
            notification_id: "n1".to_string(),
            recipient: Recipient::Subject,
            urgency: Urgency::Elevated,
            statuses,
        };
        assert!(report.is_success());
        assert_eq!(report.delivered(), vec![Channel::Wearable]);
        assert_eq!(report.unavailable(), vec![Channel::Phone]);
    }

    #[test]
    fn test_delivery_report_total_failure() {
        let mut statuses = BTreeMap::new();
        statuses.insert(Channel::Phone, DeliveryStatus::ChannelUnavailable);
        let report = DeliveryReport {
            notification_id: "n2".to_string(),
            recipient: Recipient::Subject,
            urgency: Urgency::Standard,
            statuses,
        };
        assert!(report.is_total_failure());
    }

    #[test]
    fn test_recipient_label() {
        let contact = Contact {
            name: "John Smith".to_string(),
            relation: "Son".to_string(),
            address: "+1-555-0123".to_string(),
        };
        assert_eq!(Recipient::Subject.label(), "subject");
        assert_eq!(Recipient::Contact(contact).label(), "contact:John Smith");
    }
}
