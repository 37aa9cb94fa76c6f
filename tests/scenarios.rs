//! End-to-end scenarios through the assembled assistant.
//!
//! Every scenario runs on tokio's paused clock, so the follow-up and escalation
//! intervals elapse as soon as the runtime is idle.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use carewatch::models::{
    CareEvent, CaseOutcome, Channel, Recipient, Request, ResolutionSource, Tier, Urgency,
};
use carewatch::tools::{FixtureToolProvider, ToolName};
use carewatch::{CareAssistant, CarewatchConfig, DispatchStatus, UnhandledReason};
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;

fn assistant() -> (CareAssistant, Arc<FixtureToolProvider>) {
    let provider = Arc::new(FixtureToolProvider::demo());
    let assistant = CareAssistant::new(&CarewatchConfig::default(), provider.clone()).unwrap();
    (assistant, provider)
}

fn drain(receiver: &mut Receiver<CareEvent>) -> Vec<CareEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// `(recipient label, urgency, delivered channels)` per dispatched notification.
fn notifications(events: &[CareEvent]) -> Vec<(String, Urgency, Vec<Channel>)> {
    events
        .iter()
        .filter_map(|event| match event {
            CareEvent::NotificationDispatched {
                recipient,
                urgency,
                delivered,
                ..
            } => Some((recipient.label(), *urgency, delivered.clone())),
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
async fn scenario_a_unconfirmed_medication_reaches_family() {
    let (assistant, provider) = assistant();
    let mut events = assistant.subscribe();

    let outcome = assistant
        .submit(&Request::new("Did I take my aspirin?"))
        .await
        .unwrap();
    let DispatchStatus::Escalating { registrations, .. } = &outcome.status else {
        panic!("expected escalation, got {:?}", outcome.status);
    };
    assert_eq!(registrations.len(), 1);

    assistant.settled().await;

    let events = drain(&mut events);
    assert_eq!(
        tiers(&events),
        vec![
            Tier::Reminded,
            Tier::FollowedUp,
            Tier::Escalated,
            Tier::FamilyNotified
        ]
    );
    assert_eq!(
        notifications(&events),
        vec![
            ("subject".to_string(), Urgency::Standard, vec![Channel::Phone]),
            (
                "subject".to_string(),
                Urgency::Elevated,
                vec![Channel::Phone, Channel::Wearable]
            ),
            (
                "subject".to_string(),
                Urgency::High,
                vec![Channel::Phone, Channel::Wearable, Channel::Display]
            ),
            (
                "contact:John Smith".to_string(),
                Urgency::High,
                vec![Channel::Phone]
            ),
        ]
    );

    let open = assistant.open_cases();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].tier, Tier::FamilyNotified);
    assert_eq!(open[0].checks, 3);
    assert_eq!(provider.invocation_count(ToolName::ReconfirmIntake), 1);

    let resolved = assistant.confirm("aspirin 650").unwrap();
    assert_eq!(resolved.tier, Tier::Resolved);
    assert!(assistant.open_cases().is_empty());
}

#[tokio::test(start_paused = true)]
async fn scenario_a_family_falls_back_to_next_contact() {
    let (assistant, provider) = assistant();
    provider.update_fixture(|fixture| {
        fixture.unreachable_addresses.insert("+1-555-0123".to_string());
    });
    let mut events = assistant.subscribe();

    assistant
        .submit(&Request::new("Did I take my aspirin?"))
        .await
        .unwrap();
    assistant.settled().await;

    let contacts: Vec<_> = notifications(&drain(&mut events))
        .into_iter()
        .filter(|(label, ..)| label.starts_with("contact:"))
        .map(|(label, _, delivered)| (label, delivered.is_empty()))
        .collect();
    assert_eq!(
        contacts,
        vec![
            ("contact:John Smith".to_string(), true),
            ("contact:Mary Smith".to_string(), false),
        ]
    );
    assert_eq!(assistant.open_cases()[0].tier, Tier::FamilyNotified);
}

#[tokio::test(start_paused = true)]
async fn scenario_b_fire_alerts_everyone_without_a_case() {
    let (assistant, provider) = assistant();
    let mut events = assistant.subscribe();

    let outcome = assistant
        .submit(&Request::new("There is a fire in the kitchen!"))
        .await
        .unwrap();
    assert!(matches!(outcome.status, DispatchStatus::Completed(_)));

    let events = drain(&mut events);
    let sent = notifications(&events);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, "subject");
    assert_eq!(sent[0].1, Urgency::Critical);
    assert_eq!(sent[0].2, Channel::ALL.to_vec());
    assert_eq!(sent[1].0, "contact:John Smith");

    assert!(
        !events
            .iter()
            .any(|e| matches!(e, CareEvent::CaseRegistered { .. }))
    );
    assert!(assistant.open_cases().is_empty());
    assert!(assistant.history().is_empty());
    assert_eq!(provider.invocation_count(ToolName::GetActionPlan), 1);

    let family = provider
        .sent()
        .into_iter()
        .find(|m| matches!(m.recipient, Recipient::Contact(_)))
        .unwrap();
    assert!(family.message.contains("Fire"));
}

#[tokio::test(start_paused = true)]
async fn scenario_c_taken_at_first_check_resolves_without_follow_up() {
    let (assistant, provider) = assistant();
    // The request-time check finds it not taken; the first timed check finds it taken.
    provider.script_verification("aspirin 650", [false, true]);
    let mut events = assistant.subscribe();

    assistant
        .submit(&Request::new("Is it time for my aspirin?"))
        .await
        .unwrap();
    assistant.settled().await;

    let events = drain(&mut events);
    assert_eq!(tiers(&events), vec![Tier::Reminded]);
    assert!(
        notifications(&events)
            .iter()
            .all(|(_, urgency, _)| *urgency == Urgency::Standard)
    );
    let closed = events.iter().find_map(|e| match e {
        CareEvent::CaseClosed {
            at_tier, outcome, ..
        } => Some((*at_tier, *outcome)),
        _ => None,
    });
    assert_eq!(
        closed,
        Some((
            Tier::Reminded,
            CaseOutcome::Resolved(ResolutionSource::Verified)
        ))
    );
    assert!(assistant.open_cases().is_empty());
    assert_eq!(assistant.history()[0].case.tier, Tier::Resolved);
}

#[tokio::test(start_paused = true)]
async fn scenario_d_unclassifiable_request_is_unhandled() {
    let (assistant, provider) = assistant();

    let outcome = assistant
        .submit(&Request::new("What a lovely afternoon"))
        .await
        .unwrap();

    assert_eq!(
        outcome.status,
        DispatchStatus::Unhandled(UnhandledReason::UnknownCapability)
    );
    assert!(outcome.domain.is_none());
    assert_eq!(provider.total_invocations(), 0);
    assert!(!assistant.has_pending());
}

#[tokio::test(start_paused = true)]
async fn taken_before_request_resolves_open_case() {
    let (assistant, provider) = assistant();

    assistant
        .submit(&Request::new("Did I take my aspirin?"))
        .await
        .unwrap();
    assert_eq!(assistant.open_cases().len(), 1);

    provider.mark_taken("aspirin 650");
    let outcome = assistant
        .submit(&Request::new("Did I take my aspirin?"))
        .await
        .unwrap();

    assert!(matches!(outcome.status, DispatchStatus::Completed(_)));
    assert!(assistant.open_cases().is_empty());
    assert_eq!(
        assistant.history()[0].outcome,
        CaseOutcome::Resolved(ResolutionSource::Confirmed)
    );
    assistant.settled().await;
}

#[tokio::test(start_paused = true)]
async fn unavailable_send_tool_degrades_emergency() {
    let (assistant, provider) = assistant();
    provider.set_tool_failing(ToolName::SendMessage, true);

    let outcome = assistant
        .submit(&Request::new("I smell gas in the hallway"))
        .await
        .unwrap();

    assert!(matches!(outcome.status, DispatchStatus::DeliveryFailed(_)));
    let result = outcome.result().unwrap();
    assert!(result.warnings.iter().any(|w| w.contains("no family contact")));
}
