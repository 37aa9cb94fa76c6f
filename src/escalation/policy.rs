//! Escalation timing policy.

use crate::{Error, Result};
use chrono::{FixedOffset, Offset, Utc};
use std::time::Duration;

/// Default interval between the reminder and the first verification.
pub const DEFAULT_FOLLOW_UP_AFTER: Duration = Duration::from_secs(30 * 60);

/// Default interval between the follow-up and the second verification.
pub const DEFAULT_ESCALATE_AFTER: Duration = Duration::from_secs(30 * 60);

/// Default number of closed cases kept in the archive.
pub const DEFAULT_ARCHIVE_CAPACITY: usize = 128;

/// Tier intervals and archive size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// Wait after REMINDED before the first verification (T1).
    pub follow_up_after: Duration,
    /// Wait after FOLLOWED_UP before the second verification (T2).
    pub escalate_after: Duration,
    /// Closed cases kept for history.
    pub archive_capacity: usize,
    /// Household offset used when rendering due times in messages.
    pub utc_offset: FixedOffset,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            follow_up_after: DEFAULT_FOLLOW_UP_AFTER,
            escalate_after: DEFAULT_ESCALATE_AFTER,
            archive_capacity: DEFAULT_ARCHIVE_CAPACITY,
            utc_offset: Utc.fix(),
        }
    }
}

impl EscalationPolicy {
    /// Sets both tier intervals.
    #[must_use]
    pub const fn with_intervals(mut self, follow_up_after: Duration, escalate_after: Duration) -> Self {
        self.follow_up_after = follow_up_after;
        self.escalate_after = escalate_after;
        self
    }

    /// Checks that the intervals and archive are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if an interval or the archive capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.follow_up_after.is_zero() {
            return Err(Error::Configuration(
                "escalation follow-up interval (T1) must be positive".to_string(),
            ));
        }
        if self.escalate_after.is_zero() {
            return Err(Error::Configuration(
                "escalation interval (T2) must be positive".to_string(),
            ));
        }
        if self.archive_capacity == 0 {
            return Err(Error::Configuration(
                "escalation archive capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
