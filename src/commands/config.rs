//! Config command handler.

use carewatch::observability::{LoggingConfig, MetricsConfig};
use carewatch::tools::ToolName;
use carewatch::{CapabilityName, CarewatchConfig};

/// Config command.
pub fn cmd_config(config: &CarewatchConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !show {
        println!("Use --show to display current configuration");
        return Ok(());
    }

    println!("Current Configuration");
    println!("=====================");
    println!();

    println!("Config Files Loaded:");
    if config.config_sources.is_empty() {
        println!("  (none - using defaults)");
    } else {
        for source in &config.config_sources {
            println!("  - {}", source.display());
        }
    }
    println!();

    println!("Capabilities:");
    for name in CapabilityName::ALL {
        let state = if config.is_enabled(name) {
            "enabled"
        } else {
            "disabled"
        };
        println!("  {name}: {state}");
    }
    println!();

    let escalation = &config.escalation;
    println!("Escalation:");
    println!(
        "  Follow-up after (T1): {}m",
        escalation.follow_up_after.as_secs() / 60
    );
    println!(
        "  Escalate after (T2): {}m",
        escalation.escalate_after.as_secs() / 60
    );
    println!("  Archive Capacity: {}", escalation.archive_capacity);
    println!("  UTC Offset: {}", escalation.utc_offset);
    println!();

    let medication = &config.medication;
    println!("Medication:");
    println!("  Lookahead: {}m", medication.lookahead.num_minutes());
    println!("  Overdue Grace: {}m", medication.grace.num_minutes());
    println!("  Meal Lead: {}m", medication.meal_lead_minutes);
    println!();

    println!("Tools:");
    println!("  Max Retries: {}", config.tools.max_retries);
    println!("  Retry Backoff: {}ms", config.tools.retry_backoff.as_millis());
    for tool in ToolName::ALL {
        let timeout = config
            .tools
            .timeout_for(tool)
            .map_or_else(|| "(none)".to_string(), |t| format!("{}ms", t.as_millis()));
        println!("  {tool}: {timeout}");
    }
    println!();

    if !config.channel_max_lengths.is_empty() {
        println!("Channel Overrides:");
        for (channel, max_length) in &config.channel_max_lengths {
            println!("  {channel}: max {max_length} chars");
        }
        println!();
    }

    println!("Observability:");
    let logging = LoggingConfig::from_settings(Some(&config.logging), false);
    println!("  Log Filter: {}", logging.filter);
    println!("  Log Format: {:?}", logging.format);
    if let Some(file) = &logging.file {
        println!("  Log File: {}", file.display());
    }
    let metrics = MetricsConfig::from_settings(Some(&config.metrics));
    println!("  Metrics Enabled: {}", metrics.enabled);
    println!("  Metrics Listen: {}", metrics.listen_addr);
    println!();

    println!(
        "Fixtures: {}",
        config
            .fixtures
            .as_ref()
            .map_or_else(|| "(demo household)".to_string(), |p| p.display().to_string())
    );

    Ok(())
}
