//! The assembled assistant.

use crate::capabilities::{
    Capability, CapabilityName, CommunicationHandler, ComplianceProbe, EmergencyHandler,
    MedicationHandler,
};
use crate::config::CarewatchConfig;
use crate::delivery::ChannelCatalog;
use crate::escalation::EscalationScheduler;
use crate::models::{ArchivedCase, CareEvent, EscalationCase, Request};
use crate::observability::EventBus;
use crate::router::{DispatchOutcome, Router};
use crate::tools::{ToolProvider, ToolRegistry};
use crate::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Router, handlers and escalation scheduler wired over one tool provider.
///
/// The scheduler exists only while the medication capability is enabled, since
/// medication is the only source of compliance obligations.
#[derive(Debug)]
pub struct CareAssistant {
    router: Router,
    scheduler: Option<EscalationScheduler>,
    events: EventBus,
}

impl CareAssistant {
    /// Validates the configuration and wires the assistant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if the configuration is invalid or
    /// a handler cannot bind its tools.
    pub fn new(config: &CarewatchConfig, provider: Arc<dyn ToolProvider>) -> Result<Self> {
        config.validate()?;

        let events = EventBus::default();
        let registry = ToolRegistry::new(provider, config.tools.clone());
        let catalog = ChannelCatalog::with_max_lengths(&config.channel_max_lengths);
        let comms = Arc::new(CommunicationHandler::new(&registry, catalog, events.clone())?);

        let mut router = Router::new(events.clone());
        let mut scheduler = None;

        if config.is_enabled(CapabilityName::Medication) {
            let medication = Arc::new(MedicationHandler::new(&registry, config.medication)?);
            let escalation = EscalationScheduler::new(
                config.escalation,
                Arc::clone(&medication) as Arc<dyn ComplianceProbe>,
                Arc::clone(&comms),
                events.clone(),
            )?;
            router = router.with_scheduler(escalation.clone());
            router.register(medication);
            scheduler = Some(escalation);
        }
        if config.is_enabled(CapabilityName::Emergency) {
            router.register(Arc::new(EmergencyHandler::new(&registry, Arc::clone(&comms))?));
        }
        if config.is_enabled(CapabilityName::Communication) {
            router.register(comms as Arc<dyn Capability>);
        }

        tracing::info!(
            capabilities = ?router.capabilities(),
            escalation = scheduler.is_some(),
            "Care assistant ready"
        );
        Ok(Self {
            router,
            scheduler,
            events,
        })
    }

    /// Routes one request. Escalation timers it starts keep running in the background.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for empty text, or a configuration error.
    pub async fn submit(&self, request: &Request) -> Result<DispatchOutcome> {
        self.router.dispatch(request).await
    }

    /// Resolves the open case for `subject`, e.g. after a manual check.
    #[must_use]
    pub fn confirm(&self, subject: &str) -> Option<EscalationCase> {
        self.scheduler
            .as_ref()
            .and_then(|scheduler| scheduler.confirm(subject))
    }

    /// Open escalation cases ordered by due time.
    #[must_use]
    pub fn open_cases(&self) -> Vec<EscalationCase> {
        self.scheduler
            .as_ref()
            .map(EscalationScheduler::open_cases)
            .unwrap_or_default()
    }

    /// Recently closed cases, most recent first.
    #[must_use]
    pub fn history(&self) -> Vec<ArchivedCase> {
        self.scheduler
            .as_ref()
            .map(EscalationScheduler::archived_cases)
            .unwrap_or_default()
    }

    /// The enabled capabilities.
    #[must_use]
    pub fn capabilities(&self) -> Vec<CapabilityName> {
        self.router.capabilities()
    }

    /// The assistant's event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribes to every care event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CareEvent> {
        self.events.subscribe()
    }

    /// Whether any escalation timer is still pending.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.scheduler
            .as_ref()
            .is_some_and(EscalationScheduler::has_pending)
    }

    /// Waits until every escalation case has stopped moving.
    pub async fn settled(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.settled().await;
        }
    }

    /// Cancels pending escalation timers.
    pub fn shutdown(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tier;
    use crate::router::{DispatchStatus, UnhandledReason};
    use crate::tools::FixtureToolProvider;

    fn assistant(config: &CarewatchConfig) -> (CareAssistant, Arc<FixtureToolProvider>) {
        let provider = Arc::new(FixtureToolProvider::demo());
        let assistant = CareAssistant::new(config, provider.clone()).unwrap();
        (assistant, provider)
    }

    #[tokio::test]
    async fn test_all_capabilities_wired() {
        let (assistant, _) = assistant(&CarewatchConfig::default());
        assert_eq!(assistant.capabilities(), CapabilityName::ALL.to_vec());
        assert!(assistant.open_cases().is_empty());
        assert!(!assistant.has_pending());
    }

    #[tokio::test]
    async fn test_disabled_capability_is_not_routed() {
        let mut config = CarewatchConfig::default();
        config.enabled_capabilities.remove(&CapabilityName::Emergency);
        let (assistant, provider) = assistant(&config);

        let outcome = assistant.submit(&Request::new("I smell gas")).await.unwrap();

        assert_eq!(
            outcome.status,
            DispatchStatus::Unhandled(UnhandledReason::NoHandler(crate::models::Domain::Emergency))
        );
        assert!(provider.sent().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = CarewatchConfig::default();
        config.tools.default_timeout = None;
        let provider = Arc::new(FixtureToolProvider::demo());
        assert!(CareAssistant::new(&config, provider).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_named_medication_opens_case_and_confirm_closes_it() {
        let (assistant, _) = assistant(&CarewatchConfig::default());

        let outcome = assistant
            .submit(&Request::new("Did I take my aspirin?"))
            .await
            .unwrap();
        assert!(matches!(outcome.status, DispatchStatus::Escalating { .. }));

        let open = assistant.open_cases();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].subject, "aspirin 650");
        assert_eq!(open[0].tier, Tier::Scheduled);

        let resolved = assistant.confirm("Aspirin 650").unwrap();
        assert!(resolved.resolved);
        assert!(assistant.open_cases().is_empty());
        assert_eq!(assistant.history().len(), 1);
        assistant.settled().await;
    }
}
