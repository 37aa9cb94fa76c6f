//! Console command handler.
//!
//! Reads one admin command per line from stdin. Escalation timers keep running
//! between commands and their transitions are echoed as they happen.

use super::{SubmitArgs, describe_event, print_cases, print_outcome};
use carewatch::observability::MetricsHandle;
use carewatch::tools::FixtureToolProvider;
use carewatch::{CareAssistant, CarewatchConfig};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

/// One console line.
#[derive(Parser)]
#[command(name = "carewatch", no_binary_name = true, disable_version_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

/// Console commands.
#[derive(Subcommand)]
enum ConsoleCommand {
    /// Route a request.
    Submit(SubmitArgs),

    /// List escalation cases.
    Cases {
        /// Include recently closed cases.
        #[arg(long)]
        all: bool,
    },

    /// Confirm compliance for a subject, resolving its open case.
    Confirm {
        /// The subject (medication name).
        #[arg(required = true, num_args = 1..)]
        subject: Vec<String>,
    },

    /// Simulate the person taking a medication: later checks find it taken.
    Taken {
        /// The medication name.
        #[arg(required = true, num_args = 1..)]
        subject: Vec<String>,
    },

    /// Print current metrics in Prometheus format.
    Metrics,

    /// Leave the console.
    #[command(alias = "exit")]
    Quit,
}

/// Console command.
pub async fn cmd_console(
    config: &CarewatchConfig,
    provider: Arc<FixtureToolProvider>,
    metrics: Option<&MetricsHandle>,
) -> Result<(), Box<dyn std::error::Error>> {
    let assistant = CareAssistant::new(config, provider.clone())?;

    let mut events = assistant.subscribe();
    let echo = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = describe_event(&event) {
                        println!("* {line}");
                    }
                },
                Err(RecvError::Lagged(skipped)) => println!("* ({skipped} events skipped)"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!(
        "carewatch console: capabilities {:?}. Type 'help' for commands.",
        assistant.capabilities()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(words) = shlex::split(line) else {
            println!("Unbalanced quotes");
            continue;
        };
        let command = match ConsoleLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                let _ = e.print();
                continue;
            },
        };

        match command {
            ConsoleCommand::Submit(args) => {
                let request = match args.to_request() {
                    Ok(request) => request,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    },
                };
                let before = provider.sent().len();
                match assistant.submit(&request).await {
                    Ok(outcome) => {
                        let sent = provider.sent();
                        print_outcome(&outcome, sent.get(before..).unwrap_or_default());
                    },
                    Err(e) => println!("{e}"),
                }
            },
            ConsoleCommand::Cases { all } => {
                print_cases(&assistant.open_cases());
                if all {
                    for archived in assistant.history() {
                        println!(
                            "closed {} {:<20} at {} ({:?})",
                            archived.closed_at.format("%H:%M:%S UTC"),
                            archived.case.subject,
                            archived.case.tier.as_str(),
                            archived.outcome
                        );
                    }
                }
            },
            ConsoleCommand::Confirm { subject } => {
                let subject = subject.join(" ");
                match assistant.confirm(&subject) {
                    Some(case) => println!("Resolved case {} for {}", case.id, case.subject),
                    None => println!("No open case for {subject}"),
                }
            },
            ConsoleCommand::Taken { subject } => {
                let subject = subject.join(" ");
                provider.mark_taken(&subject);
                println!("Marked {subject} as taken; the next check will find it");
            },
            ConsoleCommand::Metrics => match metrics {
                Some(handle) => print!("{}", handle.render()),
                None => println!("Metrics are disabled"),
            },
            ConsoleCommand::Quit => break,
        }
    }

    assistant.shutdown();
    echo.abort();
    Ok(())
}
