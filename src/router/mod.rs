//! Request routing.
//!
//! The router classifies a request, invokes exactly one capability handler, and
//! hands any compliance obligation the handler returns to the escalation
//! scheduler. Registration does not wait on any timer.

mod classifier;
mod patterns;

pub use classifier::{classify, classify_text, matched_signals};
pub use patterns::{DOMAIN_SIGNALS, DomainSignal};

use crate::capabilities::{Capability, CapabilityName, HandlerResult, ResultKind};
use crate::escalation::{EscalationScheduler, Registration};
use crate::models::{CareEvent, Domain, EventMeta, Request};
use crate::observability::EventBus;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Why a request was not handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum UnhandledReason {
    /// No domain signal and no hint.
    UnknownCapability,
    /// The domain has no registered handler.
    NoHandler(Domain),
    /// The handler reports itself unavailable.
    HandlerUnavailable(CapabilityName),
}

impl std::fmt::Display for UnhandledReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCapability => write!(f, "request could not be classified"),
            Self::NoHandler(domain) => write!(f, "no handler registered for domain '{domain}'"),
            Self::HandlerUnavailable(name) => write!(f, "capability '{name}' is unavailable"),
        }
    }
}

/// What happened to a dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    /// The handler finished; nothing is tracked.
    Completed(HandlerResult),
    /// The handler returned obligations, now tracked as escalation cases.
    Escalating {
        /// The handler result.
        result: HandlerResult,
        /// One registration per obligation.
        registrations: Vec<Registration>,
    },
    /// A required notification reached no channel.
    DeliveryFailed(HandlerResult),
    /// No handler took the request.
    Unhandled(UnhandledReason),
}

/// Result of [`Router::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// The request.
    pub request_id: String,
    /// The classified domain.
    pub domain: Option<Domain>,
    /// What happened.
    pub status: DispatchStatus,
}

impl DispatchOutcome {
    /// The handler result, unless the request was unhandled.
    #[must_use]
    pub const fn result(&self) -> Option<&HandlerResult> {
        match &self.status {
            DispatchStatus::Completed(result)
            | DispatchStatus::Escalating { result, .. }
            | DispatchStatus::DeliveryFailed(result) => Some(result),
            DispatchStatus::Unhandled(_) => None,
        }
    }

    /// Whether a handler took the request.
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        !matches!(self.status, DispatchStatus::Unhandled(_))
    }

    /// Short status label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self.status {
            DispatchStatus::Completed(_) => "completed",
            DispatchStatus::Escalating { .. } => "escalating",
            DispatchStatus::DeliveryFailed(_) => "delivery_failed",
            DispatchStatus::Unhandled(_) => "unhandled",
        }
    }
}

/// Classifies requests and dispatches each to a single capability.
pub struct Router {
    handlers: HashMap<CapabilityName, Arc<dyn Capability>>,
    scheduler: Option<EscalationScheduler>,
    events: EventBus,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("Router")
            .field("handlers", &names)
            .field("scheduler", &self.scheduler.is_some())
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Creates a router with no handlers.
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            handlers: HashMap::new(),
            scheduler: None,
            events,
        }
    }

    /// Attaches the escalation scheduler.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: EscalationScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Registers a handler under its capability name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn Capability>) {
        tracing::debug!(capability = %handler.name(), "Registered capability handler");
        self.handlers.insert(handler.name(), handler);
    }

    /// Registered capability names, sorted.
    #[must_use]
    pub fn capabilities(&self) -> Vec<CapabilityName> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort();
        names
    }

    /// Dispatches one request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for empty request text, or a configuration
    /// error raised by the handler.
    pub async fn dispatch(&self, request: &Request) -> Result<DispatchOutcome> {
        if request.text.trim().is_empty() {
            return Err(Error::InvalidInput("request text is empty".to_string()));
        }
        let start = Instant::now();

        let domain = classify(request);
        self.events.publish(CareEvent::RequestClassified {
            meta: EventMeta::new("router", Some(request.id.clone())),
            request_id: request.id.clone(),
            domain,
        });
        tracing::info!(
            request_id = %request.id,
            domain = domain.map_or("none", |d| d.as_str()),
            hinted = request.domain_hint.is_some(),
            "Request classified"
        );

        let status = match self.handler_for(domain) {
            Ok(handler) => self.run(handler, request).await?,
            Err(reason) => {
                tracing::warn!(request_id = %request.id, reason = %reason, "Request unhandled");
                DispatchStatus::Unhandled(reason)
            },
        };

        let outcome = DispatchOutcome {
            request_id: request.id.clone(),
            domain,
            status,
        };
        metrics::counter!(
            "router_requests_total",
            "domain" => domain.map_or("none", |d| d.as_str()),
            "status" => outcome.label()
        )
        .increment(1);
        metrics::histogram!("router_dispatch_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        Ok(outcome)
    }

    fn handler_for(
        &self,
        domain: Option<Domain>,
    ) -> std::result::Result<&Arc<dyn Capability>, UnhandledReason> {
        let domain = domain.ok_or(UnhandledReason::UnknownCapability)?;
        let name = CapabilityName::for_domain(domain);
        let handler = self
            .handlers
            .get(&name)
            .ok_or(UnhandledReason::NoHandler(domain))?;
        if handler.is_available() {
            Ok(handler)
        } else {
            Err(UnhandledReason::HandlerUnavailable(name))
        }
    }

    async fn run(&self, handler: &Arc<dyn Capability>, request: &Request) -> Result<DispatchStatus> {
        let mut result = handler.handle(request, &request.context).await?;
        tracing::debug!(
            request_id = %request.id,
            capability = %result.capability,
            warnings = result.warnings.len(),
            "Handler finished"
        );

        if let Some(scheduler) = &self.scheduler {
            for subject in &result.confirmed {
                if let Some(case) = scheduler.confirm(subject) {
                    tracing::info!(case_id = %case.id, subject = %case.subject, "Open case resolved by check");
                }
            }
        }

        if result.kind == ResultKind::DeliveryFailed {
            tracing::error!(
                request_id = %request.id,
                capability = %result.capability,
                "Required notification reached no channel"
            );
            return Ok(DispatchStatus::DeliveryFailed(result));
        }
        if result.obligations().is_empty() {
            return Ok(DispatchStatus::Completed(result));
        }

        let Some(scheduler) = &self.scheduler else {
            tracing::warn!(request_id = %request.id, "Obligations returned without an escalation scheduler");
            result
                .warnings
                .push("no escalation scheduler; obligations are not tracked".to_string());
            return Ok(DispatchStatus::Completed(result));
        };
        let registrations = result
            .obligations()
            .iter()
            .map(|o| scheduler.register(&o.subject, o.due_at))
            .collect();
        Ok(DispatchStatus::Escalating {
            result,
            registrations,
        })
    }
}
