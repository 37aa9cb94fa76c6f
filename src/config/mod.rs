//! Configuration management.
//!
//! Configuration is read from a TOML file, then overridden by `CAREWATCH_*`
//! environment variables, then validated. Every field has a default, so an
//! absent file is not an error.
//!
//! ```toml
//! fixtures = "household.json"
//!
//! [escalation]
//! follow_up_minutes = 30
//! escalate_minutes = 30
//!
//! [medication]
//! utc_offset = "+01:00"
//!
//! [tools]
//! timeout_ms = 5000
//! timeouts_ms = { send_message = 2000 }
//!
//! [channels.wearable]
//! max_length = 50
//!
//! [capabilities]
//! emergency = true
//! ```

use crate::capabilities::{CapabilityName, MedicationPolicy};
use crate::escalation::EscalationPolicy;
use crate::models::Channel;
use crate::tools::{ToolName, ToolPolicy};
use crate::{Error, Result};
use chrono::{FixedOffset, Offset, TimeDelta, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CAREWATCH_CONFIG_PATH";

/// Effective configuration.
#[derive(Debug, Clone)]
pub struct CarewatchConfig {
    /// Escalation tier intervals.
    pub escalation: EscalationPolicy,
    /// Medication due-window policy.
    pub medication: MedicationPolicy,
    /// Tool timeouts and retries.
    pub tools: ToolPolicy,
    /// Per-channel maximum length overrides.
    pub channel_max_lengths: BTreeMap<Channel, usize>,
    /// Capabilities registered with the router.
    pub enabled_capabilities: BTreeSet<CapabilityName>,
    /// Logging section, resolved by the observability module.
    pub logging: LoggingSettings,
    /// Metrics section, resolved by the observability module.
    pub metrics: MetricsSettings,
    /// Fixture file for the in-memory tool provider.
    pub fixtures: Option<PathBuf>,
    /// Files the configuration was read from.
    pub config_sources: Vec<PathBuf>,
}

/// Logging section in config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `carewatch=debug`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Append log output to this file instead of stderr.
    pub file: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSettings {
    /// Install the Prometheus recorder.
    pub enabled: Option<bool>,
    /// Port for the HTTP listener.
    pub port: Option<u16>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Escalation section.
    pub escalation: Option<ConfigFileEscalation>,
    /// Medication section.
    pub medication: Option<ConfigFileMedication>,
    /// Tools section.
    pub tools: Option<ConfigFileTools>,
    /// Per-channel sections keyed by channel name.
    pub channels: Option<HashMap<String, ConfigFileChannel>>,
    /// Capability toggles.
    pub capabilities: Option<ConfigFileCapabilities>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
    /// Fixture file path.
    pub fixtures: Option<String>,
}

/// Escalation section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEscalation {
    /// T1 in minutes.
    pub follow_up_minutes: Option<u64>,
    /// T2 in minutes.
    pub escalate_minutes: Option<u64>,
    /// Closed cases kept for history.
    pub archive_capacity: Option<usize>,
}

/// Medication section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMedication {
    /// Minutes ahead a dose counts as due.
    pub lookahead_minutes: Option<i64>,
    /// Minutes after its time a missed dose still counts as due.
    pub grace_minutes: Option<i64>,
    /// Household offset, e.g. `+01:00`.
    pub utc_offset: Option<String>,
    /// Default lead for before-meal entries.
    pub meal_lead_minutes: Option<u32>,
}

/// Tools section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileTools {
    /// Default timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Per-tool timeouts keyed by tool name.
    pub timeouts_ms: Option<HashMap<String, u64>>,
    /// Retries after the first attempt.
    pub max_retries: Option<u32>,
    /// Base retry backoff in milliseconds.
    pub retry_backoff_ms: Option<u64>,
}

/// Channel section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileChannel {
    /// Maximum rendered length.
    pub max_length: Option<usize>,
}

/// Capabilities section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileCapabilities {
    /// Medication handler.
    pub medication: Option<bool>,
    /// Emergency handler.
    pub emergency: Option<bool>,
    /// Communication handler.
    pub communication: Option<bool>,
}

impl Default for CarewatchConfig {
    fn default() -> Self {
        Self {
            escalation: EscalationPolicy::default(),
            medication: MedicationPolicy::default(),
            tools: ToolPolicy::default(),
            channel_max_lengths: BTreeMap::new(),
            enabled_capabilities: CapabilityName::ALL.into_iter().collect(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
            fixtures: None,
            config_sources: Vec::new(),
        }
    }
}

impl CarewatchConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads, overrides from the process environment, and validates.
    ///
    /// Lookup order: `explicit`, then `CAREWATCH_CONFIG_PATH`, then the platform
    /// config directory, then built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a named file cannot be read or parsed, or if the
    /// result is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default()?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.config_sources.push(path.to_path_buf());
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or names unknown tools,
    /// channels or offsets.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the platform config directory
    /// (`<config_dir>/carewatch/config.toml`), or defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_default() -> Result<Self> {
        let Some(dirs) = directories::ProjectDirs::from("", "", "carewatch") else {
            return Ok(Self::default());
        };
        let path = dirs.config_dir().join("config.toml");
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Converts a `ConfigFile` to `CarewatchConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(escalation) = file.escalation {
            if let Some(minutes) = escalation.follow_up_minutes {
                config.escalation.follow_up_after = minutes_to_duration(minutes);
            }
            if let Some(minutes) = escalation.escalate_minutes {
                config.escalation.escalate_after = minutes_to_duration(minutes);
            }
            if let Some(capacity) = escalation.archive_capacity {
                config.escalation.archive_capacity = capacity;
            }
        }
        if let Some(medication) = file.medication {
            if let Some(minutes) = medication.lookahead_minutes {
                config.medication.lookahead = TimeDelta::minutes(minutes);
            }
            if let Some(minutes) = medication.grace_minutes {
                config.medication.grace = TimeDelta::minutes(minutes);
            }
            if let Some(offset) = medication.utc_offset {
                config.set_utc_offset(&offset)?;
            }
            if let Some(minutes) = medication.meal_lead_minutes {
                config.medication.meal_lead_minutes = minutes;
            }
        }
        if let Some(tools) = file.tools {
            if let Some(ms) = tools.timeout_ms {
                config.tools.default_timeout = Some(Duration::from_millis(ms));
            }
            for (name, ms) in tools.timeouts_ms.unwrap_or_default() {
                let tool = ToolName::parse(&name)
                    .ok_or_else(|| Error::Configuration(format!("unknown tool '{name}'")))?;
                config.tools.timeouts.insert(tool, Duration::from_millis(ms));
            }
            if let Some(retries) = tools.max_retries {
                config.tools.max_retries = retries;
            }
            if let Some(ms) = tools.retry_backoff_ms {
                config.tools.retry_backoff = Duration::from_millis(ms);
            }
        }
        for (name, channel) in file.channels.unwrap_or_default() {
            let parsed = Channel::parse(&name)
                .ok_or_else(|| Error::Configuration(format!("unknown channel '{name}'")))?;
            if let Some(max_length) = channel.max_length {
                config.channel_max_lengths.insert(parsed, max_length);
            }
        }
        if let Some(capabilities) = file.capabilities {
            for (name, enabled) in [
                (CapabilityName::Medication, capabilities.medication),
                (CapabilityName::Emergency, capabilities.emergency),
                (CapabilityName::Communication, capabilities.communication),
            ] {
                match enabled {
                    Some(true) => {
                        config.enabled_capabilities.insert(name);
                    },
                    Some(false) => {
                        config.enabled_capabilities.remove(&name);
                    },
                    None => {},
                }
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.metrics = metrics;
        }
        config.fixtures = file.fixtures.map(PathBuf::from);

        Ok(config)
    }

    /// Applies `CAREWATCH_*` overrides read through `lookup`.
    ///
    /// | Variable | Setting |
    /// |----------|---------|
    /// | `CAREWATCH_FOLLOW_UP_MINUTES` | T1 |
    /// | `CAREWATCH_ESCALATE_MINUTES` | T2 |
    /// | `CAREWATCH_TOOL_TIMEOUT_MS` | default tool timeout |
    /// | `CAREWATCH_UTC_OFFSET` | household offset |
    /// | `CAREWATCH_FIXTURES` | fixture file |
    /// | `CAREWATCH_LOG_FORMAT` | `pretty` or `json` |
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for values that do not parse.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let number = |key: &str| -> Result<Option<u64>> {
            lookup(key)
                .map(|v| {
                    v.trim().parse::<u64>().map_err(|_| {
                        Error::Configuration(format!("{key} must be a whole number, got '{v}'"))
                    })
                })
                .transpose()
        };

        if let Some(minutes) = number("CAREWATCH_FOLLOW_UP_MINUTES")? {
            self.escalation.follow_up_after = minutes_to_duration(minutes);
        }
        if let Some(minutes) = number("CAREWATCH_ESCALATE_MINUTES")? {
            self.escalation.escalate_after = minutes_to_duration(minutes);
        }
        if let Some(ms) = number("CAREWATCH_TOOL_TIMEOUT_MS")? {
            self.tools.default_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(offset) = lookup("CAREWATCH_UTC_OFFSET") {
            self.set_utc_offset(&offset)?;
        }
        if let Some(path) = lookup("CAREWATCH_FIXTURES").filter(|p| !p.trim().is_empty()) {
            self.fixtures = Some(PathBuf::from(path));
        }
        if let Some(format) = lookup("CAREWATCH_LOG_FORMAT") {
            self.logging.format = Some(format);
        }
        Ok(())
    }

    /// Checks intervals and that every tool of every enabled capability has a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        self.escalation.validate()?;
        if self.medication.lookahead < TimeDelta::zero() || self.medication.grace < TimeDelta::zero()
        {
            return Err(Error::Configuration(
                "medication lookahead and grace must not be negative".to_string(),
            ));
        }
        for capability in &self.enabled_capabilities {
            for &tool in capability.tools() {
                if self.tools.timeout_for(tool).is_none() {
                    return Err(Error::Configuration(format!(
                        "tool '{tool}' used by '{capability}' has no positive timeout"
                    )));
                }
            }
        }
        for (channel, max_length) in &self.channel_max_lengths {
            if *max_length < 8 {
                return Err(Error::Configuration(format!(
                    "channel '{channel}' max_length {max_length} is too short"
                )));
            }
        }
        Ok(())
    }

    /// Whether a capability is enabled.
    #[must_use]
    pub fn is_enabled(&self, capability: CapabilityName) -> bool {
        self.enabled_capabilities.contains(&capability)
    }

    fn set_utc_offset(&mut self, raw: &str) -> Result<()> {
        let offset = parse_utc_offset(raw)
            .ok_or_else(|| Error::Configuration(format!("invalid UTC offset '{raw}'")))?;
        self.medication.utc_offset = offset;
        self.escalation.utc_offset = offset;
        Ok(())
    }
}

const fn minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

/// Parses `+HH:MM`, `-HH:MM`, `Z` or `UTC`.
#[must_use]
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Some(Utc.fix());
    }
    raw.parse::<FixedOffset>().ok()
}
