//! Command handlers module.
//!
//! - `submit.rs`: one request through the router, optionally waiting on escalation
//! - `console.rs`: long-lived admin session over stdin
//! - `config.rs`: configuration display command

mod config;
mod console;
mod submit;

use carewatch::models::{
    Activity, CareEvent, CaseOutcome, Channel, Domain, EscalationCase, Request, RequestContext,
    ResolutionSource,
};
use carewatch::tools::SentMessage;
use carewatch::{DispatchOutcome, DispatchStatus, Registration};
use clap::Args;

pub use config::cmd_config;
pub use console::cmd_console;
pub use submit::cmd_submit;

/// Arguments shared by `carewatch submit` and the console's `submit`.
#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// The request text.
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,

    /// Domain hint: medication, emergency or general.
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Where the person is.
    #[arg(short, long)]
    pub location: Option<String>,

    /// Detected activity (watching_tv, cooking, resting, away, ...).
    #[arg(short, long)]
    pub activity: Option<String>,

    /// Devices currently attended (comma-separated channel names).
    #[arg(long, value_delimiter = ',')]
    pub attended: Vec<String>,

    /// Keep running until every registered case reaches a terminal tier.
    #[arg(short, long)]
    pub wait: bool,
}

impl SubmitArgs {
    /// Builds the request, rejecting unknown domain, activity or channel names.
    pub fn to_request(&self) -> carewatch::Result<Request> {
        let invalid = |what: &str, value: &str| {
            carewatch::Error::InvalidInput(format!("unknown {what} '{value}'"))
        };

        let mut context = RequestContext::default();
        if let Some(location) = &self.location {
            context = context.with_location(location);
        }
        if let Some(activity) = &self.activity {
            let activity = Activity::parse(activity).ok_or_else(|| invalid("activity", activity))?;
            context = context.with_activity(activity);
        }
        for name in &self.attended {
            let channel = Channel::parse(name).ok_or_else(|| invalid("channel", name))?;
            context = context.with_active_device(channel);
        }

        let mut request = Request::new(self.text.join(" ")).with_context(context);
        if let Some(domain) = &self.domain {
            let domain = Domain::parse(domain).ok_or_else(|| invalid("domain", domain))?;
            request = request.with_domain_hint(domain);
        }
        Ok(request)
    }
}

/// Prints a dispatch outcome and the messages sent while handling it.
fn print_outcome(outcome: &DispatchOutcome, sent: &[SentMessage]) {
    println!("Request {}", outcome.request_id);
    println!(
        "  Domain: {}",
        outcome.domain.map_or("(unclassified)", |d| d.as_str())
    );
    println!("  Status: {}", outcome.label());

    match &outcome.status {
        DispatchStatus::Unhandled(reason) => println!("  Reason: {reason}"),
        DispatchStatus::Escalating { registrations, .. } => {
            for registration in registrations {
                let verb = match registration {
                    Registration::Created(_) => "opened",
                    Registration::Unchanged(_) => "already open",
                    Registration::Superseded { .. } => "replaced",
                };
                let case = registration.case();
                println!(
                    "  Case {verb}: {} due {} ({})",
                    case.subject,
                    case.due_at.format("%Y-%m-%d %H:%M UTC"),
                    case.id
                );
            }
        },
        DispatchStatus::Completed(_) | DispatchStatus::DeliveryFailed(_) => {},
    }

    if let Some(result) = outcome.result() {
        println!("  Summary: {}", result.summary);
        for warning in &result.warnings {
            println!("  Warning: {warning}");
        }
    }
    print_sent(sent);
}

/// Prints messages accepted or refused by the fixture provider.
fn print_sent(sent: &[SentMessage]) {
    for message in sent {
        println!(
            "  -> [{}] {} ({}, {}): {}",
            message.channel,
            message.recipient.label(),
            message.urgency,
            message.status.as_str(),
            message.message
        );
    }
}

/// Prints open escalation cases.
fn print_cases(cases: &[EscalationCase]) {
    if cases.is_empty() {
        println!("No open cases");
        return;
    }
    for case in cases {
        println!(
            "{:<16} {:<20} due {}  checks {}  ({})",
            case.tier.as_str(),
            case.subject,
            case.due_at.format("%Y-%m-%d %H:%M UTC"),
            case.checks,
            case.id
        );
    }
}

/// One line per escalation event; `None` for events the console does not echo.
fn describe_event(event: &CareEvent) -> Option<String> {
    match event {
        CareEvent::CaseRegistered { subject, due_at, .. } => Some(format!(
            "case opened: {subject} due {}",
            due_at.format("%H:%M UTC")
        )),
        CareEvent::TierAdvanced {
            subject, from, to, ..
        } => Some(format!("case {subject}: {from} -> {to}")),
        CareEvent::CaseClosed {
            subject,
            at_tier,
            outcome,
            ..
        } => {
            let how = match outcome {
                CaseOutcome::Resolved(ResolutionSource::Verified) => "resolved (verified)",
                CaseOutcome::Resolved(ResolutionSource::Confirmed) => "resolved (confirmed)",
                CaseOutcome::Superseded => "superseded",
            };
            Some(format!("case {subject} closed at {at_tier}: {how}"))
        },
        CareEvent::RequestClassified { .. } | CareEvent::NotificationDispatched { .. } => None,
    }
}
