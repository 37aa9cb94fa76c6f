//! Communication capability: stateless delivery through the formatter.

use super::{Capability, CapabilityName, HandlerResult, ResultKind};
use crate::Result;
use crate::delivery::{self, ChannelCatalog};
use crate::models::{
    CareEvent, Contact, DeliveryReport, DeliveryStatus, EventMeta, Notification, Recipient, Request,
    RequestContext, Urgency,
};
use crate::observability::EventBus;
use crate::tools::types::{EnvironmentStatus, SendReceipt};
use crate::tools::{ToolBinding, ToolName, ToolRegistry};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;

pub(super) const TOOLS: &[ToolName] = &[ToolName::SendMessage, ToolName::GetEnvironmentStatus];

/// A raw message to be selected, formatted and delivered.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    /// Message text before channel formatting.
    pub message: String,
    /// Urgency.
    pub urgency: Urgency,
    /// Recipient.
    pub recipient: Recipient,
    /// Situational context. `None` reads the live environment.
    pub context: Option<RequestContext>,
    /// Request or case the message belongs to.
    pub correlation_id: Option<String>,
}

impl MessageDraft {
    /// Creates a draft for the monitored person.
    #[must_use]
    pub fn to_subject(message: impl Into<String>, urgency: Urgency) -> Self {
        Self {
            message: message.into(),
            urgency,
            recipient: Recipient::Subject,
            context: None,
            correlation_id: None,
        }
    }

    /// Creates a draft for a contact.
    #[must_use]
    pub fn to_contact(contact: Contact, message: impl Into<String>, urgency: Urgency) -> Self {
        Self {
            recipient: Recipient::Contact(contact),
            ..Self::to_subject(message, urgency)
        }
    }

    /// Attaches a situational context.
    #[must_use]
    pub fn with_context(mut self, ctx: RequestContext) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Attaches a correlation id.
    #[must_use]
    pub fn correlated(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// Delivers notifications; holds no contacts or verification tools.
#[derive(Debug)]
pub struct CommunicationHandler {
    tools: ToolBinding,
    catalog: ChannelCatalog,
    events: EventBus,
}

impl CommunicationHandler {
    /// Binds the handler to the send and environment tools.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if a tool has no timeout.
    pub fn new(registry: &ToolRegistry, catalog: ChannelCatalog, events: EventBus) -> Result<Self> {
        Ok(Self {
            tools: registry.bind(CapabilityName::Communication.as_str(), TOOLS)?,
            catalog,
            events,
        })
    }

    /// The channel catalog used for selection and formatting.
    #[must_use]
    pub const fn catalog(&self) -> &ChannelCatalog {
        &self.catalog
    }

    /// Reads the live environment; an empty context observed now when unavailable.
    ///
    /// # Errors
    ///
    /// Returns an error only on misconfiguration.
    pub async fn live_context(&self) -> Result<RequestContext> {
        let now = Utc::now();
        let outcome = self
            .tools
            .call::<EnvironmentStatus>(ToolName::GetEnvironmentStatus, json!({}))
            .await?;
        Ok(outcome.map_or_else(
            |_| RequestContext::at(now),
            |status| status.into_context(now),
        ))
    }

    /// Selects channels, renders and delivers a draft.
    ///
    /// # Errors
    ///
    /// Returns an error only on misconfiguration; channel failures are in the report.
    pub async fn notify(&self, draft: MessageDraft) -> Result<DeliveryReport> {
        let ctx = match draft.context {
            Some(ctx) => ctx,
            None => self.live_context().await?,
        };
        let notification = delivery::render(
            &self.catalog,
            &draft.message,
            draft.recipient,
            draft.urgency,
            &ctx,
        );
        self.deliver(&notification, draft.correlation_id).await
    }

    /// Delivers an already rendered notification, channel by channel.
    ///
    /// A send failure on one channel counts as `channel_unavailable` for that
    /// channel and never stops the others.
    ///
    /// # Errors
    ///
    /// Returns an error only on misconfiguration.
    pub async fn deliver(
        &self,
        notification: &Notification,
        correlation_id: Option<String>,
    ) -> Result<DeliveryReport> {
        let recipient = serde_json::to_value(&notification.recipient).map_err(|e| {
            crate::Error::OperationFailed {
                operation: "encode_recipient".to_string(),
                cause: e.to_string(),
            }
        })?;

        let mut statuses = BTreeMap::new();
        for (channel, text) in &notification.rendered {
            let args = json!({
                "channel": channel.as_str(),
                "recipient": recipient,
                "message": text,
                "urgency": notification.urgency.as_str(),
            });
            let status = match self.tools.call::<SendReceipt>(ToolName::SendMessage, args).await? {
                Ok(receipt) => receipt.status,
                Err(_) => DeliveryStatus::ChannelUnavailable,
            };
            metrics::counter!(
                "notification_deliveries_total",
                "channel" => channel.as_str(),
                "status" => status.as_str()
            )
            .increment(1);
            statuses.insert(*channel, status);
        }

        let report = DeliveryReport {
            notification_id: notification.id.clone(),
            recipient: notification.recipient.clone(),
            urgency: notification.urgency,
            statuses,
        };

        if report.is_total_failure() {
            tracing::error!(
                notification_id = %report.notification_id,
                recipient = %report.recipient.label(),
                urgency = %report.urgency,
                "Notification reached no channel"
            );
        } else {
            tracing::info!(
                notification_id = %report.notification_id,
                recipient = %report.recipient.label(),
                urgency = %report.urgency,
                delivered = ?report.delivered(),
                unavailable = ?report.unavailable(),
                "Notification delivered"
            );
        }

        self.events.publish(CareEvent::NotificationDispatched {
            meta: EventMeta::new("communication", correlation_id),
            notification_id: report.notification_id.clone(),
            recipient: report.recipient.clone(),
            urgency: report.urgency,
            delivered: report.delivered(),
            unavailable: report.unavailable(),
        });

        Ok(report)
    }

    /// Notifies the first reachable contact, walking the list in order.
    ///
    /// Returns the contact reached and its report, or `None` when no contact
    /// could be reached (every attempt is returned in `attempts`).
    ///
    /// # Errors
    ///
    /// Returns an error only on misconfiguration.
    pub async fn notify_first_reachable(
        &self,
        contacts: &[Contact],
        message: &str,
        urgency: Urgency,
        correlation_id: Option<&str>,
    ) -> Result<ContactDelivery> {
        let mut attempts = Vec::new();
        for contact in contacts {
            let mut draft = MessageDraft::to_contact(contact.clone(), message, urgency)
                .with_context(RequestContext::default());
            draft.correlation_id = correlation_id.map(ToString::to_string);
            let report = self.notify(draft).await?;
            let success = report.is_success();
            attempts.push(report);
            if success {
                return Ok(ContactDelivery {
                    reached: Some(contact.clone()),
                    attempts,
                });
            }
            tracing::warn!(contact = %contact.name, "Contact unreachable, trying next");
        }
        Ok(ContactDelivery {
            reached: None,
            attempts,
        })
    }
}

/// Outcome of [`CommunicationHandler::notify_first_reachable`].
#[derive(Debug, Clone)]
pub struct ContactDelivery {
    /// The contact that was reached.
    pub reached: Option<Contact>,
    /// Every delivery attempt, in order.
    pub attempts: Vec<DeliveryReport>,
}

#[async_trait]
impl Capability for CommunicationHandler {
    fn name(&self) -> CapabilityName {
        CapabilityName::Communication
    }

    fn tools(&self) -> Vec<ToolName> {
        self.tools.tools()
    }

    async fn handle(&self, request: &Request, ctx: &RequestContext) -> Result<HandlerResult> {
        let draft = MessageDraft::to_subject(request.text.clone(), Urgency::Standard)
            .with_context(ctx.clone())
            .correlated(request.id.clone());
        let report = self.notify(draft).await?;

        let (kind, summary) = if report.is_success() {
            (
                ResultKind::Delivered,
                format!("Relayed message on {} channel(s)", report.delivered().len()),
            )
        } else {
            (
                ResultKind::DeliveryFailed,
                "Message could not be delivered on any channel".to_string(),
            )
        };
        let warnings = report
            .unavailable()
            .iter()
            .map(|c| format!("channel '{c}' unavailable"))
            .collect();

        Ok(HandlerResult {
            capability: CapabilityName::Communication,
            summary,
            kind,
            deliveries: vec![report],
            warnings,
            confirmed: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Channel;
    use crate::tools::{FixtureToolProvider, ToolPolicy, ToolProvider};
    use std::sync::Arc;

    fn handler(provider: &Arc<FixtureToolProvider>) -> CommunicationHandler {
        let registry = ToolRegistry::new(
            Arc::clone(provider) as Arc<dyn ToolProvider>,
            ToolPolicy::default(),
        );
        CommunicationHandler::new(&registry, ChannelCatalog::default(), EventBus::default())
            .unwrap()
    }

    #[tokio::test]
    async fn test_notify_uses_live_environment() {
        let provider = Arc::new(FixtureToolProvider::demo());
        let comms = handler(&provider);

        let report = comms
            .notify(MessageDraft::to_subject("Take your aspirin", Urgency::High))
            .await
            .unwrap();

        // Demo household is watching TV: the display is attended.
        assert_eq!(
            report.delivered(),
            vec![Channel::Phone, Channel::Wearable, Channel::Display]
        );
        assert_eq!(provider.invocation_count(ToolName::GetEnvironmentStatus), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_is_success() {
        let provider = Arc::new(FixtureToolProvider::demo());
        provider.set_channel_unavailable(Channel::Phone, true);
        let comms = handler(&provider);

        let report = comms
            .notify(
                MessageDraft::to_subject("Take your aspirin", Urgency::Elevated)
                    .with_context(RequestContext::default()),
            )
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.unavailable(), vec![Channel::Phone]);
    }

    #[tokio::test]
    async fn test_send_tool_failure_counts_as_unavailable() {
        let provider = Arc::new(FixtureToolProvider::demo());
        provider.set_tool_failing(ToolName::SendMessage, true);
        let comms = handler(&provider);

        let request = Request::new("Tell John I will call back later");
        let result = comms.handle(&request, &RequestContext::default()).await.unwrap();

        assert_eq!(result.kind, ResultKind::DeliveryFailed);
        assert!(result.deliveries[0].is_total_failure());
    }

    #[tokio::test]
    async fn test_first_reachable_contact() {
        let provider = Arc::new(FixtureToolProvider::demo());
        provider.update_fixture(|f| {
            f.unreachable_addresses.insert("+1-555-0123".to_string());
        });
        let comms = handler(&provider);
        let contacts = crate::tools::Fixture::demo().contacts;

        let outcome = comms
            .notify_first_reachable(&contacts, "Please check on your father", Urgency::High, None)
            .await
            .unwrap();

        assert_eq!(outcome.reached.map(|c| c.name), Some("Mary Smith".to_string()));
        assert_eq!(outcome.attempts.len(), 2);
        assert!(outcome.attempts[0].is_total_failure());
    }
}
