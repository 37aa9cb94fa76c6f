//! Property-based tests for delivery and escalation invariants.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Rendering is deterministic and never exceeds a channel's maximum length
//! - Channel selection is monotonic in urgency
//! - Timed tier transitions move strictly forward
//! - Classification is deterministic and an explicit hint always wins

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use carewatch::delivery::{ChannelCatalog, format, select};
use carewatch::models::{Activity, Channel, Domain, Request, RequestContext, Tier, Urgency};
use carewatch::router::classify;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn any_channel() -> impl Strategy<Value = Channel> {
    prop::sample::select(Channel::ALL.to_vec())
}

fn any_urgency() -> impl Strategy<Value = Urgency> {
    prop::sample::select(Urgency::ALL.to_vec())
}

fn any_context() -> impl Strategy<Value = RequestContext> {
    (
        proptest::option::of(prop::sample::select(vec![
            Activity::WatchingTv,
            Activity::Cooking,
            Activity::Eating,
            Activity::Resting,
            Activity::Sleeping,
            Activity::Away,
        ])),
        prop::collection::btree_set(any_channel(), 0..=Channel::ALL.len()),
    )
        .prop_map(|(activity, devices)| {
            let mut ctx = RequestContext::default();
            ctx.activity = activity;
            ctx.active_devices = devices;
            ctx
        })
}

proptest! {
    /// Property: rendering never exceeds the channel's declared maximum length.
    #[test]
    fn prop_format_respects_max_length(
        message in "\\PC{0,600}",
        channel in any_channel(),
        urgency in any_urgency(),
    ) {
        let catalog = ChannelCatalog::default();
        let spec = catalog.spec(channel).unwrap();
        let rendered = format(&message, spec, urgency);
        prop_assert!(rendered.chars().count() <= spec.max_len);
    }

    /// Property: the bound holds for configured length overrides too.
    #[test]
    fn prop_format_respects_overridden_length(
        message in "[a-zA-Z ]{0,300}",
        channel in any_channel(),
        urgency in any_urgency(),
        max_len in 8usize..120,
    ) {
        let catalog = ChannelCatalog::with_max_lengths(&BTreeMap::from([(channel, max_len)]));
        let spec = catalog.spec(channel).unwrap();
        prop_assert_eq!(spec.max_len, max_len);
        prop_assert!(format(&message, spec, urgency).chars().count() <= max_len);
    }

    /// Property: rendering is a pure function of its inputs.
    #[test]
    fn prop_format_is_deterministic(
        message in "\\PC{0,200}",
        channel in any_channel(),
        urgency in any_urgency(),
    ) {
        let catalog = ChannelCatalog::default();
        let spec = catalog.spec(channel).unwrap();
        prop_assert_eq!(format(&message, spec, urgency), format(&message, spec, urgency));
    }

    /// Property: a higher urgency never selects fewer channels for the same context.
    #[test]
    fn prop_selection_is_monotonic(
        ctx in any_context(),
        a in any_urgency(),
        b in any_urgency(),
    ) {
        let catalog = ChannelCatalog::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low_set = select(&catalog, low, &ctx);
        let high_set = select(&catalog, high, &ctx);
        prop_assert!(low_set.is_subset(&high_set), "{low} {low_set:?} not within {high} {high_set:?}");
        prop_assert!(low_set.contains(&Channel::Phone));
    }

    /// Property: critical urgency always reaches every known channel.
    #[test]
    fn prop_critical_reaches_everything(ctx in any_context()) {
        let catalog = ChannelCatalog::default();
        prop_assert_eq!(select(&catalog, Urgency::Critical, &ctx).len(), Channel::ALL.len());
    }

    /// Property: an explicit domain hint wins over any text.
    #[test]
    fn prop_hint_wins(
        text in "\\PC{1,120}",
        hint in prop::sample::select(Domain::all().to_vec()),
    ) {
        let request = Request::new(text).with_domain_hint(hint);
        prop_assert_eq!(classify(&request), Some(hint));
    }

    /// Property: classification of the same text is stable.
    #[test]
    fn prop_classification_is_deterministic(text in "\\PC{0,120}") {
        let first = classify(&Request::new(text.clone()));
        let second = classify(&Request::new(text));
        prop_assert_eq!(first, second);
    }
}

#[test]
fn test_timed_transitions_move_forward() {
    for tier in Tier::ALL {
        if let Some(next) = tier.next() {
            assert!(next > tier, "{tier} -> {next} goes backwards");
            assert_ne!(next, Tier::Resolved, "timed transitions never resolve");
        }
    }
    assert!(Tier::FamilyNotified.next().is_none());
    assert!(Tier::Resolved.is_terminal());
}
