//! Escalation cases and their tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One state in the escalation sequence, in strict order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Waiting for the due time.
    Scheduled,
    /// Standard reminder sent.
    Reminded,
    /// Elevated follow-up sent.
    FollowedUp,
    /// High urgency sent to the subject.
    Escalated,
    /// Primary family contact notified.
    FamilyNotified,
    /// Compliance confirmed.
    Resolved,
}

impl Tier {
    /// All tiers in order.
    pub const ALL: [Self; 6] = [
        Self::Scheduled,
        Self::Reminded,
        Self::FollowedUp,
        Self::Escalated,
        Self::FamilyNotified,
        Self::Resolved,
    ];

    /// Returns the tier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Reminded => "REMINDED",
            Self::FollowedUp => "FOLLOWED_UP",
            Self::Escalated => "ESCALATED",
            Self::FamilyNotified => "FAMILY_NOTIFIED",
            Self::Resolved => "RESOLVED",
        }
    }

    /// The tier a timed transition moves to, or `None` at the end of the timeline.
    ///
    /// `FamilyNotified` only leaves through an explicit confirmation.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Scheduled => Some(Self::Reminded),
            Self::Reminded => Some(Self::FollowedUp),
            Self::FollowedUp => Some(Self::Escalated),
            Self::Escalated => Some(Self::FamilyNotified),
            Self::FamilyNotified | Self::Resolved => None,
        }
    }

    /// Whether no timer remains pending for a case at this tier.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::FamilyNotified | Self::Resolved)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One open compliance obligation, owned by the escalation scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationCase {
    /// Unique case identifier.
    pub id: String,
    /// What must be complied with (a medication name).
    pub subject: String,
    /// When the obligation is due.
    pub due_at: DateTime<Utc>,
    /// Current tier.
    pub tier: Tier,
    /// When the case was registered.
    pub created_at: DateTime<Utc>,
    /// When verification last ran.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Whether compliance was confirmed.
    pub resolved: bool,
    /// Number of verification checks performed so far.
    pub checks: u32,
}

impl EscalationCase {
    /// Creates a case in `Scheduled`.
    #[must_use]
    pub fn new(subject: impl Into<String>, due_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            subject: subject.into(),
            due_at,
            tier: Tier::Scheduled,
            created_at: Utc::now(),
            last_checked_at: None,
            resolved: false,
            checks: 0,
        }
    }

    /// Normalized key used to enforce one open case per subject.
    #[must_use]
    pub fn key(&self) -> String {
        subject_key(&self.subject)
    }

    /// Marks the case resolved.
    pub const fn resolve(&mut self) {
        self.tier = Tier::Resolved;
        self.resolved = true;
    }
}

/// Normalizes a subject for identity comparison.
#[must_use]
pub fn subject_key(subject: &str) -> String {
    subject.trim().to_lowercase()
}

/// How a case was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// A scheduled verification check returned "taken".
    Verified,
    /// An external confirmation (admin command, caller).
    Confirmed,
}

/// How an archived case left the open table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "source")]
pub enum CaseOutcome {
    /// Compliance confirmed.
    Resolved(ResolutionSource),
    /// Replaced by a newer case for the same subject.
    Superseded,
}

/// A closed case kept for history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedCase {
    /// The case as it was when it closed.
    pub case: EscalationCase,
    /// Why it closed.
    pub outcome: CaseOutcome,
    /// When it closed.
    pub closed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_sequence_is_strict() {
        let mut tier = Tier::Scheduled;
        let mut visited = vec![tier];
        while let Some(next) = tier.next() {
            assert!(next > tier);
            tier = next;
            visited.push(tier);
        }
        assert_eq!(
            visited,
            vec![
                Tier::Scheduled,
                Tier::Reminded,
                Tier::FollowedUp,
                Tier::Escalated,
                Tier::FamilyNotified,
            ]
        );
    }

    #[test]
    fn test_resolve_case() {
        let mut case = EscalationCase::new("Aspirin 650", Utc::now());
        assert_eq!(case.key(), "aspirin 650");
        case.resolve();
        assert!(case.resolved);
        assert_eq!(case.tier, Tier::Resolved);
        assert!(case.tier.is_terminal());
    }
}
