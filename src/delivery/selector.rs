//! Urgency- and context-driven channel selection.

use super::channels::{ChannelCatalog, ChannelRole};
use crate::models::{Channel, Recipient, RequestContext, Urgency};
use std::collections::BTreeSet;

/// Selects the channels for a notification to the monitored person.
///
/// - `standard`: primary personal channels
/// - `elevated`: adds secondary personal channels
/// - `high`: all personal channels plus every attended ambient channel
/// - `critical`: every known channel
///
/// The result is monotonic in urgency for a fixed context.
#[must_use]
pub fn select(catalog: &ChannelCatalog, urgency: Urgency, ctx: &RequestContext) -> BTreeSet<Channel> {
    catalog
        .iter()
        .filter(|spec| match urgency {
            Urgency::Standard => spec.role == ChannelRole::PrimaryPersonal,
            Urgency::Elevated => spec.is_personal(),
            Urgency::High => spec.is_personal() || spec.is_attended(ctx),
            Urgency::Critical => true,
        })
        .map(|spec| spec.channel)
        .collect()
}

/// Selects channels for a recipient.
///
/// Contacts are reached on their phone only; the household devices belong to
/// the monitored person.
#[must_use]
pub fn select_for(
    catalog: &ChannelCatalog,
    recipient: &Recipient,
    urgency: Urgency,
    ctx: &RequestContext,
) -> BTreeSet<Channel> {
    match recipient {
        Recipient::Subject => select(catalog, urgency, ctx),
        Recipient::Contact(_) => BTreeSet::from([Channel::Phone]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Activity, Contact};

    fn set(channels: &[Channel]) -> BTreeSet<Channel> {
        channels.iter().copied().collect()
    }

    #[test]
    fn test_selection_by_urgency() {
        let catalog = ChannelCatalog::default();
        let ctx = RequestContext::default().with_activity(Activity::WatchingTv);

        assert_eq!(select(&catalog, Urgency::Standard, &ctx), set(&[Channel::Phone]));
        assert_eq!(
            select(&catalog, Urgency::Elevated, &ctx),
            set(&[Channel::Phone, Channel::Wearable])
        );
        assert_eq!(
            select(&catalog, Urgency::High, &ctx),
            set(&[Channel::Phone, Channel::Wearable, Channel::Display])
        );
        assert_eq!(select(&catalog, Urgency::Critical, &ctx), set(&Channel::ALL));
    }

    #[test]
    fn test_high_without_attended_devices() {
        let catalog = ChannelCatalog::default();
        let ctx = RequestContext::default().with_activity(Activity::Sleeping);
        assert_eq!(
            select(&catalog, Urgency::High, &ctx),
            set(&[Channel::Phone, Channel::Wearable])
        );
    }

    #[test]
    fn test_contacts_get_phone_only() {
        let catalog = ChannelCatalog::default();
        let contact = Recipient::Contact(Contact {
            name: "Mary Smith".to_string(),
            relation: "Daughter".to_string(),
            address: "+1-555-0456".to_string(),
        });
        let ctx = RequestContext::default();
        assert_eq!(
            select_for(&catalog, &contact, Urgency::Critical, &ctx),
            set(&[Channel::Phone])
        );
    }
}
