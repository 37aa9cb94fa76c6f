//! One timed task per open escalation case.
//!
//! The case table is the only shared state. A confirmation never waits on a
//! running step: it removes the case from the table and aborts its task under the
//! table lock. A step re-checks that its case is still open after every tool call
//! and before every notification, so once a confirmation is observed nothing more
//! is sent for that case.

use super::{EscalationPolicy, messages};
use crate::capabilities::{CommunicationHandler, ComplianceProbe, MessageDraft, Verification};
use crate::models::{
    ArchivedCase, CareEvent, CaseOutcome, EscalationCase, EventMeta, ResolutionSource, Tier,
    Urgency, subject_key,
};
use crate::observability::EventBus;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

const EVENT_SOURCE: &str = "escalation";

/// Outcome of [`EscalationScheduler::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A new case was opened.
    Created(EscalationCase),
    /// An identical `(subject, due_at)` case is already open.
    Unchanged(EscalationCase),
    /// A new case replaced the open case for the same subject.
    Superseded {
        /// The new case.
        case: EscalationCase,
        /// The cancelled case.
        replaced: EscalationCase,
    },
}

impl Registration {
    /// The case that is now open.
    #[must_use]
    pub const fn case(&self) -> &EscalationCase {
        match self {
            Self::Created(case) | Self::Unchanged(case) | Self::Superseded { case, .. } => case,
        }
    }
}

struct OpenCase {
    case: EscalationCase,
    task: Option<JoinHandle<()>>,
}

struct CaseTable {
    open: HashMap<String, OpenCase>,
    archive: LruCache<String, ArchivedCase>,
}

impl CaseTable {
    fn current(&self, key: &str, case_id: &str) -> Option<&OpenCase> {
        self.open.get(key).filter(|open| open.case.id == case_id)
    }

    fn current_mut(&mut self, key: &str, case_id: &str) -> Option<&mut OpenCase> {
        self.open
            .get_mut(key)
            .filter(|open| open.case.id == case_id)
    }

    fn has_running(&self) -> bool {
        self.open.values().any(|open| open.task.is_some())
    }

    /// Moves an open case to the archive, aborting its task if it still has one.
    fn close(&mut self, mut entry: OpenCase, outcome: CaseOutcome, events: &EventBus) -> EscalationCase {
        if let Some(task) = entry.task.take() {
            task.abort();
        }
        let at_tier = entry.case.tier;
        if matches!(outcome, CaseOutcome::Resolved(_)) {
            entry.case.resolve();
            metrics::counter!(
                "escalation_transitions_total",
                "from" => at_tier.as_str(),
                "to" => Tier::Resolved.as_str()
            )
            .increment(1);
        }
        let label = match outcome {
            CaseOutcome::Resolved(ResolutionSource::Verified) => "verified",
            CaseOutcome::Resolved(ResolutionSource::Confirmed) => "confirmed",
            CaseOutcome::Superseded => "superseded",
        };
        metrics::counter!("escalation_cases_closed_total", "outcome" => label).increment(1);
        tracing::info!(
            case_id = %entry.case.id,
            subject = %entry.case.subject,
            at_tier = %at_tier,
            outcome = label,
            "Escalation case closed"
        );

        events.publish(CareEvent::CaseClosed {
            meta: EventMeta::new(EVENT_SOURCE, Some(entry.case.id.clone())),
            case_id: entry.case.id.clone(),
            subject: entry.case.subject.clone(),
            at_tier,
            outcome,
        });
        self.archive.put(
            entry.case.id.clone(),
            ArchivedCase {
                case: entry.case.clone(),
                outcome,
                closed_at: Utc::now(),
            },
        );
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("escalation_open_cases").set(self.open.len() as f64);
        entry.case
    }
}

/// What a timed task does after a step.
enum Step {
    /// Run the next step after the given pause.
    Next(Duration),
    /// The case is closed, terminal or stalled.
    Done,
}

struct Inner {
    policy: EscalationPolicy,
    probe: Arc<dyn ComplianceProbe>,
    comms: Arc<CommunicationHandler>,
    events: EventBus,
    table: Mutex<CaseTable>,
    settled: Notify,
}

/// Owns every open [`EscalationCase`] and drives its tiers.
///
/// Cloning shares the same case table.
#[derive(Clone)]
pub struct EscalationScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EscalationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationScheduler")
            .field("policy", &self.inner.policy)
            .field("open_cases", &self.inner.table().open.len())
            .finish_non_exhaustive()
    }
}

impl EscalationScheduler {
    /// Creates a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the policy is invalid.
    pub fn new(
        policy: EscalationPolicy,
        probe: Arc<dyn ComplianceProbe>,
        comms: Arc<CommunicationHandler>,
        events: EventBus,
    ) -> Result<Self> {
        policy.validate()?;
        let capacity = NonZeroUsize::new(policy.archive_capacity).ok_or_else(|| {
            Error::Configuration("escalation archive capacity must be positive".to_string())
        })?;
        Ok(Self {
            inner: Arc::new(Inner {
                policy,
                probe,
                comms,
                events,
                table: Mutex::new(CaseTable {
                    open: HashMap::new(),
                    archive: LruCache::new(capacity),
                }),
                settled: Notify::new(),
            }),
        })
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> &EscalationPolicy {
        &self.inner.policy
    }

    /// Opens a case for `subject` due at `due_at` and starts its timer.
    ///
    /// Re-registering an identical `(subject, due_at)` is a no-op. A different due
    /// time cancels the open case for the subject and replaces it. Must be called
    /// inside a tokio runtime.
    pub fn register(&self, subject: &str, due_at: DateTime<Utc>) -> Registration {
        let key = subject_key(subject);
        let mut table = self.inner.table();

        if let Some(open) = table.open.get(&key)
            && open.case.due_at == due_at
        {
            tracing::debug!(case_id = %open.case.id, subject, "Case already open, registration ignored");
            return Registration::Unchanged(open.case.clone());
        }

        let replaced = table
            .open
            .remove(&key)
            .map(|old| table.close(old, CaseOutcome::Superseded, &self.inner.events));

        let case = EscalationCase::new(subject.trim(), due_at);
        let task = tokio::spawn(Inner::run(Arc::clone(&self.inner), key.clone(), case.id.clone()));
        table.open.insert(
            key,
            OpenCase {
                case: case.clone(),
                task: Some(task),
            },
        );
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("escalation_open_cases").set(table.open.len() as f64);
        drop(table);

        tracing::info!(
            case_id = %case.id,
            subject = %case.subject,
            due_at = %case.due_at,
            superseded = replaced.as_ref().map(|c| c.id.as_str()),
            "Escalation case registered"
        );
        self.inner.events.publish(CareEvent::CaseRegistered {
            meta: EventMeta::new(EVENT_SOURCE, Some(case.id.clone())),
            case_id: case.id.clone(),
            subject: case.subject.clone(),
            due_at: case.due_at,
        });

        match replaced {
            Some(replaced) => Registration::Superseded { case, replaced },
            None => Registration::Created(case),
        }
    }

    /// Resolves the open case for `subject` from whatever tier it is in.
    ///
    /// Does not wait for an in-flight step: the case leaves the table and its task
    /// is aborted at once, and a step still running observes the removal before
    /// it notifies anyone. Returns the resolved case, or `None` when no case is
    /// open for the subject.
    pub fn confirm(&self, subject: &str) -> Option<EscalationCase> {
        let key = subject_key(subject);
        let mut table = self.inner.table();
        let entry = table.open.remove(&key)?;
        let case = table.close(
            entry,
            CaseOutcome::Resolved(ResolutionSource::Confirmed),
            &self.inner.events,
        );
        drop(table);
        self.inner.settled.notify_waiters();
        Some(case)
    }

    /// The open case for a subject.
    #[must_use]
    pub fn case(&self, subject: &str) -> Option<EscalationCase> {
        self.inner
            .table()
            .open
            .get(&subject_key(subject))
            .map(|open| open.case.clone())
    }

    /// Open cases ordered by due time.
    #[must_use]
    pub fn open_cases(&self) -> Vec<EscalationCase> {
        let mut cases: Vec<_> = self
            .inner
            .table()
            .open
            .values()
            .map(|open| open.case.clone())
            .collect();
        cases.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.subject.cmp(&b.subject)));
        cases
    }

    /// Closed cases, most recently closed first.
    #[must_use]
    pub fn archived_cases(&self) -> Vec<ArchivedCase> {
        self.inner
            .table()
            .archive
            .iter()
            .map(|(_, archived)| archived.clone())
            .collect()
    }

    /// Whether any case still has a pending timer or step.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner.table().has_running()
    }

    /// Waits until no case has a pending timer or step.
    pub async fn settled(&self) {
        loop {
            let notified = self.inner.settled.notified();
            if !self.has_pending() {
                return;
            }
            notified.await;
        }
    }

    /// Cancels every pending timer. Open cases stay in the table at their tier.
    pub fn shutdown(&self) {
        let mut table = self.inner.table();
        let mut cancelled = 0_usize;
        for open in table.open.values_mut() {
            if let Some(task) = open.task.take() {
                task.abort();
                cancelled += 1;
            }
        }
        drop(table);
        tracing::info!(cancelled, "Escalation scheduler shut down");
        self.inner.settled.notify_waiters();
    }
}

impl Inner {
    fn table(&self) -> MutexGuard<'_, CaseTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self, key: &str, case_id: &str) -> Option<EscalationCase> {
        self.table()
            .current(key, case_id)
            .map(|open| open.case.clone())
    }

    fn is_open(&self, key: &str, case_id: &str) -> bool {
        self.table().current(key, case_id).is_some()
    }

    async fn run(self: Arc<Self>, key: String, case_id: String) {
        let Some(case) = self.current(&key, &case_id) else {
            return;
        };
        let until_due = (case.due_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(until_due).await;

        loop {
            match self.step(&key, &case_id).await {
                Step::Next(pause) => {
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                },
                Step::Done => break,
            }
        }
        self.finish(&key, &case_id);
    }

    async fn step(&self, key: &str, case_id: &str) -> Step {
        let Some(case) = self.current(key, case_id) else {
            return Step::Done;
        };

        match case.tier {
            Tier::Scheduled => {
                let text = self.probe.reminder_text(&case.subject).await;
                if !self.is_open(key, case_id) {
                    return Step::Done;
                }
                let delivered = self.notify_subject(&case, text, Urgency::Standard).await;
                self.advance(key, case_id, Tier::Reminded);
                Step::Next(self.pause_after(&case, delivered, self.policy.follow_up_after))
            },
            Tier::Reminded | Tier::FollowedUp => {
                let verdict = self.probe.verify(&case.subject).await;
                if self.record_check(key, case_id, verdict) {
                    return Step::Done;
                }
                if case.tier == Tier::Reminded {
                    let delivered = self
                        .notify_subject(&case, messages::follow_up(&case.subject), Urgency::Elevated)
                        .await;
                    self.advance(key, case_id, Tier::FollowedUp);
                    Step::Next(self.pause_after(&case, delivered, self.policy.escalate_after))
                } else {
                    self.notify_subject(&case, messages::escalated(&case.subject), Urgency::High)
                        .await;
                    self.advance(key, case_id, Tier::Escalated);
                    Step::Next(Duration::ZERO)
                }
            },
            Tier::Escalated => {
                let verdict = self.probe.reconfirm(&case.subject).await;
                if self.record_check(key, case_id, verdict) {
                    return Step::Done;
                }
                self.notify_family(key, &case).await;
                Step::Done
            },
            Tier::FamilyNotified | Tier::Resolved => Step::Done,
        }
    }

    /// Sends to the subject; returns whether any channel delivered.
    async fn notify_subject(&self, case: &EscalationCase, message: String, urgency: Urgency) -> bool {
        let draft = MessageDraft::to_subject(message, urgency).correlated(case.id.clone());
        match self.comms.notify(draft).await {
            Ok(report) => report.is_success(),
            Err(e) => {
                tracing::error!(case_id = %case.id, error = %e, "Escalation notification failed");
                false
            },
        }
    }

    async fn notify_family(&self, key: &str, case: &EscalationCase) {
        let contacts = self.probe.contacts().await;
        if !self.is_open(key, &case.id) {
            return;
        }
        let message = messages::family(&case.subject, case.due_at, self.policy.utc_offset);
        let reached = match self
            .comms
            .notify_first_reachable(&contacts, &message, Urgency::High, Some(&case.id))
            .await
        {
            Ok(delivery) => delivery.reached,
            Err(e) => {
                tracing::error!(case_id = %case.id, error = %e, "Family notification failed");
                None
            },
        };

        match reached {
            Some(contact) => {
                tracing::info!(case_id = %case.id, contact = %contact.name, "Family contact notified");
                self.advance(key, &case.id, Tier::FamilyNotified);
            },
            None => {
                metrics::counter!("escalation_family_unreachable_total").increment(1);
                tracing::error!(
                    case_id = %case.id,
                    subject = %case.subject,
                    contacts = contacts.len(),
                    "No family contact reachable, case stays escalated"
                );
            },
        }
    }

    /// A reminder that reached no channel counts as missed: the wait is skipped.
    fn pause_after(&self, case: &EscalationCase, delivered: bool, interval: Duration) -> Duration {
        if delivered {
            return interval;
        }
        metrics::counter!("escalation_skipped_waits_total").increment(1);
        tracing::warn!(
            case_id = %case.id,
            subject = %case.subject,
            "Notification reached no channel, advancing without waiting"
        );
        Duration::ZERO
    }

    /// Records a verification and resolves the case when compliant.
    ///
    /// Returns `true` once the case is no longer open, including when a
    /// confirmation closed it while the check was in flight.
    fn record_check(&self, key: &str, case_id: &str, verdict: Verification) -> bool {
        let mut table = self.table();
        let Some(open) = table.current_mut(key, case_id) else {
            return true;
        };
        open.case.checks += 1;
        open.case.last_checked_at = Some(Utc::now());
        tracing::info!(
            case_id,
            subject = %open.case.subject,
            check = open.case.checks,
            verdict = ?verdict,
            "Compliance check"
        );
        if !verdict.is_compliant() {
            return false;
        }

        if let Some(mut entry) = table.open.remove(key) {
            // The running task is this one: detach instead of aborting.
            entry.task = None;
            table.close(
                entry,
                CaseOutcome::Resolved(ResolutionSource::Verified),
                &self.events,
            );
        }
        drop(table);
        self.settled.notify_waiters();
        true
    }

    fn advance(&self, key: &str, case_id: &str, to: Tier) {
        let mut table = self.table();
        let Some(open) = table.current_mut(key, case_id) else {
            return;
        };
        let from = open.case.tier;
        open.case.tier = to;
        let subject = open.case.subject.clone();
        drop(table);

        metrics::counter!(
            "escalation_transitions_total",
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
        tracing::info!(case_id, subject = %subject, from = %from, to = %to, "Escalation tier advanced");
        self.events.publish(CareEvent::TierAdvanced {
            meta: EventMeta::new(EVENT_SOURCE, Some(case_id.to_string())),
            case_id: case_id.to_string(),
            subject,
            from,
            to,
        });
    }

    fn finish(&self, key: &str, case_id: &str) {
        if let Some(open) = self.table().current_mut(key, case_id) {
            open.task = None;
        }
        self.settled.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{MedicationHandler, MedicationPolicy};
    use crate::delivery::ChannelCatalog;
    use crate::models::{Channel, Recipient};
    use crate::tools::{FixtureToolProvider, ToolName, ToolPolicy, ToolProvider, ToolRegistry};
    use tokio::sync::broadcast::Receiver;

    const T1: Duration = Duration::from_secs(30 * 60);

    fn scheduler(provider: &Arc<FixtureToolProvider>) -> (EscalationScheduler, Receiver<CareEvent>) {
        let registry = ToolRegistry::new(
            Arc::clone(provider) as Arc<dyn ToolProvider>,
            ToolPolicy::default(),
        );
        let events = EventBus::default();
        let receiver = events.subscribe();
        let comms = Arc::new(
            CommunicationHandler::new(&registry, ChannelCatalog::default(), events.clone()).unwrap(),
        );
        let probe = Arc::new(MedicationHandler::new(&registry, MedicationPolicy::default()).unwrap());
        let scheduler =
            EscalationScheduler::new(EscalationPolicy::default(), probe, comms, events).unwrap();
        (scheduler, receiver)
    }

    fn drain(receiver: &mut Receiver<CareEvent>) -> Vec<CareEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn subject_urgencies(events: &[CareEvent]) -> Vec<Urgency> {
        events
            .iter()
            .filter_map(|event| match event {
                CareEvent::NotificationDispatched {
                    recipient: Recipient::Subject,
                    urgency,
                    ..
                } => Some(*urgency),
                _ => None,
            })
            .collect()
    }

    fn tiers(events: &[CareEvent]) -> Vec<Tier> {
        events
            .iter()
            .filter_map(|event| match event {
                CareEvent::TierAdvanced { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_case_reaches_family_after_three_checks() {
        let provider = Arc::new(FixtureToolProvider::demo());
        let (scheduler, mut receiver) = scheduler(&provider);

        scheduler.register("aspirin 650", Utc::now());
        scheduler.settled().await;

        let case = scheduler.case("aspirin 650").unwrap();
        assert_eq!(case.tier, Tier::FamilyNotified);
        assert_eq!(case.checks, 3);

        let events = drain(&mut receiver);
        assert_eq!(
            tiers(&events),
            vec![Tier::Reminded, Tier::FollowedUp, Tier::Escalated, Tier::FamilyNotified]
        );
        assert_eq!(
            subject_urgencies(&events),
            vec![Urgency::Standard, Urgency::Elevated, Urgency::High]
        );
        let family: Vec<_> = provider
            .sent()
            .into_iter()
            .filter(|m| !m.recipient.is_subject())
            .collect();
        assert_eq!(family.len(), 1);
        assert_eq!(family[0].urgency, Urgency::High);
        assert_eq!(family[0].channel, Channel::Phone);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verified_at_first_check_resolves() {
        let provider = Arc::new(FixtureToolProvider::demo());
        provider.script_verification("aspirin 650", [true]);
        let (scheduler, mut receiver) = scheduler(&provider);

        scheduler.register("aspirin 650", Utc::now());
        scheduler.settled().await;

        assert!(scheduler.open_cases().is_empty());
        let archived = scheduler.archived_cases();
        assert_eq!(
            archived[0].outcome,
            CaseOutcome::Resolved(ResolutionSource::Verified)
        );
        let events = drain(&mut receiver);
        assert_eq!(tiers(&events), vec![Tier::Reminded]);
        assert_eq!(subject_urgencies(&events), vec![Urgency::Standard]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_registration_is_noop() {
        let provider = Arc::new(FixtureToolProvider::demo());
        let (scheduler, _receiver) = scheduler(&provider);
        let due = Utc::now() + chrono::TimeDelta::hours(2);

        let first = scheduler.register("Aspirin 650", due);
        let second = scheduler.register("aspirin 650 ", due);

        assert!(matches!(first, Registration::Created(_)));
        assert!(matches!(second, Registration::Unchanged(_)));
        assert_eq!(first.case().id, second.case().id);
        assert_eq!(scheduler.open_cases().len(), 1);
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_supersession_cancels_old_timer() {
        let provider = Arc::new(FixtureToolProvider::demo());
        let (scheduler, mut receiver) = scheduler(&provider);
        let later = Utc::now() + chrono::TimeDelta::hours(1);

        let old = scheduler.register("aspirin 650", later);
        let new = scheduler.register("aspirin 650", Utc::now());

        let Registration::Superseded { case, replaced } = new else {
            panic!("expected supersession");
        };
        assert_eq!(replaced.id, old.case().id);

        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        scheduler.settled().await;

        let events = drain(&mut receiver);
        let stale = events.iter().any(|event| {
            matches!(event, CareEvent::TierAdvanced { case_id, .. } if *case_id == replaced.id)
        });
        assert!(!stale);
        assert_eq!(scheduler.case("aspirin 650").unwrap().id, case.id);
        assert_eq!(scheduler.archived_cases()[0].outcome, CaseOutcome::Superseded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_stops_notifications() {
        let provider = Arc::new(FixtureToolProvider::demo());
        let (scheduler, mut receiver) = scheduler(&provider);

        scheduler.register("aspirin 650", Utc::now());
        // Reminder fires at once; stop halfway through T1.
        tokio::time::sleep(T1 / 2).await;
        let resolved = scheduler.confirm("ASPIRIN 650").unwrap();
        assert_eq!(resolved.tier, Tier::Resolved);

        tokio::time::sleep(T1 * 4).await;
        scheduler.settled().await;

        let events = drain(&mut receiver);
        assert_eq!(subject_urgencies(&events), vec![Urgency::Standard]);
        assert!(scheduler.confirm("aspirin 650").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_during_reconfirm_cancels_family_notice() {
        let provider = Arc::new(FixtureToolProvider::demo());
        provider.update_fixture(|fixture| {
            fixture.slow_tools.insert(ToolName::ReconfirmIntake, 3_000);
        });
        let (scheduler, mut receiver) = scheduler(&provider);

        scheduler.register("aspirin 650", Utc::now());
        // Both timed checks have run; the reconfirmation is still in flight.
        tokio::time::sleep(T1 * 2 + Duration::from_secs(1)).await;
        assert_eq!(scheduler.case("aspirin 650").unwrap().tier, Tier::Escalated);

        let resolved = scheduler.confirm("aspirin 650").unwrap();
        assert_eq!(resolved.tier, Tier::Resolved);

        tokio::time::sleep(Duration::from_secs(60)).await;
        scheduler.settled().await;

        let family = provider
            .sent()
            .into_iter()
            .filter(|m| !m.recipient.is_subject())
            .count();
        assert_eq!(family, 0);
        assert_eq!(provider.invocation_count(ToolName::GetFamilyContacts), 0);
        assert!(!tiers(&drain(&mut receiver)).contains(&Tier::FamilyNotified));
        assert_eq!(
            scheduler.archived_cases()[0].outcome,
            CaseOutcome::Resolved(ResolutionSource::Confirmed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_delivery_failure_skips_waits() {
        let provider = Arc::new(FixtureToolProvider::demo());
        for channel in Channel::ALL {
            provider.set_channel_unavailable(channel, true);
        }
        let (scheduler, _receiver) = scheduler(&provider);
        let start = tokio::time::Instant::now();

        scheduler.register("aspirin 650", Utc::now());
        scheduler.settled().await;

        assert!(start.elapsed() < T1);
        // No contact reachable over the phone: the case stays escalated.
        assert_eq!(scheduler.case("aspirin 650").unwrap().tier, Tier::Escalated);
    }
}
