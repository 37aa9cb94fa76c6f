//! Message templates for the timed tiers.

use chrono::{DateTime, FixedOffset, Utc};

/// Follow-up sent on entering FOLLOWED_UP.
pub fn follow_up(subject: &str) -> String {
    format!("Follow-up: your {subject} has not been confirmed yet. Please take it now.")
}

/// Message to the subject on entering ESCALATED.
pub fn escalated(subject: &str) -> String {
    format!(
        "Important: your {subject} is still not confirmed. Please take it now; your family will be contacted."
    )
}

/// Family-facing message sent when the subject has not responded.
pub fn family(subject: &str, due_at: DateTime<Utc>, offset: FixedOffset) -> String {
    format!(
        "Missed medication: {subject} was due at {} and has not been confirmed after repeated reminders. Please check in.",
        due_at.with_timezone(&offset).format("%H:%M")
    )
}
