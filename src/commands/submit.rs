//! Submit command handler.

use super::{SubmitArgs, describe_event, print_outcome};
use carewatch::tools::FixtureToolProvider;
use carewatch::{CareAssistant, CarewatchConfig};
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Submit command.
pub async fn cmd_submit(
    config: &CarewatchConfig,
    provider: Arc<FixtureToolProvider>,
    args: SubmitArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = args.to_request()?;
    let assistant = CareAssistant::new(config, provider.clone())?;
    let mut events = assistant.subscribe();

    let outcome = assistant.submit(&request).await?;
    print_outcome(&outcome, &provider.sent());

    if !args.wait || !assistant.has_pending() {
        assistant.shutdown();
        return Ok(());
    }

    println!(
        "Waiting on escalation (T1 {}s, T2 {}s)...",
        config.escalation.follow_up_after.as_secs(),
        config.escalation.escalate_after.as_secs()
    );
    let already_sent = provider.sent().len();
    loop {
        tokio::select! {
            () = assistant.settled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = describe_event(&event) {
                        println!("{line}");
                    }
                },
                Err(RecvError::Lagged(skipped)) => println!("({skipped} events skipped)"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Some(line) = describe_event(&event) {
                    println!("{line}");
                }
            },
            Err(TryRecvError::Lagged(_)) => {},
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    let sent = provider.sent();
    println!("Escalation messages:");
    super::print_sent(sent.get(already_sent..).unwrap_or_default());
    Ok(())
}
