//! Per-capability tool bindings with bounded waits and retry.
//!
//! A capability receives a [`ToolBinding`] for exactly the tools it declares.
//! Every call through a binding:
//!
//! 1. Rejects tools outside the declared set ([`Error::Configuration`])
//! 2. Checks arguments against the tool's input schema
//! 3. Bounds the provider call with the tool's timeout
//! 4. Retries `Unavailable`/`Timeout` failures with exponential backoff
//! 5. Decodes the answer, reporting a mismatch as `InvalidOutput`

use super::contract::spec;
use super::{ToolFailure, ToolFailureKind, ToolName, ToolProvider};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a bound tool call: the typed answer or an absorbed failure.
pub type ToolOutcome<T> = std::result::Result<T, ToolFailure>;

/// Timeouts and retry policy for tool calls.
#[derive(Debug, Clone)]
pub struct ToolPolicy {
    /// Timeout for tools without an override. `None` leaves them unbounded,
    /// which binding rejects.
    pub default_timeout: Option<Duration>,
    /// Per-tool timeout overrides.
    pub timeouts: HashMap<ToolName, Duration>,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
    /// Base delay before the first retry; doubles per attempt.
    pub retry_backoff: Duration,
}

impl Default for ToolPolicy {
    fn default() -> Self {
        Self {
            default_timeout: Some(Duration::from_secs(5)),
            timeouts: HashMap::new(),
            max_retries: 1,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

impl ToolPolicy {
    /// Resolved timeout for a tool. Zero durations count as unset.
    #[must_use]
    pub fn timeout_for(&self, tool: ToolName) -> Option<Duration> {
        self.timeouts
            .get(&tool)
            .copied()
            .or(self.default_timeout)
            .filter(|d| !d.is_zero())
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.retry_backoff
            .saturating_mul(1 << (attempt - 1).min(10))
    }
}

/// Hands out tool bindings over one provider.
#[derive(Clone)]
pub struct ToolRegistry {
    provider: Arc<dyn ToolProvider>,
    policy: Arc<ToolPolicy>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("provider", &self.provider.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ToolRegistry {
    /// Creates a registry.
    #[must_use]
    pub fn new(provider: Arc<dyn ToolProvider>, policy: ToolPolicy) -> Self {
        Self {
            provider,
            policy: Arc::new(policy),
        }
    }

    /// The retry and timeout policy.
    #[must_use]
    pub fn policy(&self) -> &ToolPolicy {
        &self.policy
    }

    /// Binds a capability to its declared tool set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if any declared tool resolves to no timeout.
    pub fn bind(&self, owner: &'static str, tools: &[ToolName]) -> Result<ToolBinding> {
        let mut timeouts = BTreeMap::new();
        for &tool in tools {
            let timeout = self.policy.timeout_for(tool).ok_or_else(|| {
                Error::Configuration(format!(
                    "tool '{tool}' bound to '{owner}' has no configured timeout"
                ))
            })?;
            timeouts.insert(tool, timeout);
        }

        tracing::debug!(
            capability = owner,
            tools = ?timeouts.keys().collect::<Vec<_>>(),
            "Bound capability tools"
        );

        Ok(ToolBinding {
            owner,
            timeouts,
            provider: Arc::clone(&self.provider),
            policy: Arc::clone(&self.policy),
        })
    }
}

/// The tools one capability may call.
#[derive(Clone)]
pub struct ToolBinding {
    owner: &'static str,
    timeouts: BTreeMap<ToolName, Duration>,
    provider: Arc<dyn ToolProvider>,
    policy: Arc<ToolPolicy>,
}

impl std::fmt::Debug for ToolBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBinding")
            .field("owner", &self.owner)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl ToolBinding {
    /// The owning capability.
    #[must_use]
    pub const fn owner(&self) -> &'static str {
        self.owner
    }

    /// Whether `tool` is in the declared set.
    #[must_use]
    pub fn is_bound(&self, tool: ToolName) -> bool {
        self.timeouts.contains_key(&tool)
    }

    /// Declared tools, in catalog order.
    #[must_use]
    pub fn tools(&self) -> Vec<ToolName> {
        self.timeouts.keys().copied().collect()
    }

    /// Calls a bound tool and decodes its answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a tool outside the declared set and
    /// [`Error::InvalidInput`] for arguments that violate the input schema.
    /// Runtime failures are returned inside the [`ToolOutcome`].
    pub async fn call<T: DeserializeOwned>(
        &self,
        tool: ToolName,
        args: Value,
    ) -> Result<ToolOutcome<T>> {
        let Some(&timeout) = self.timeouts.get(&tool) else {
            return Err(Error::Configuration(format!(
                "capability '{}' called unbound tool '{tool}'",
                self.owner
            )));
        };
        if let Some(contract) = spec(tool) {
            contract.check_input(&args)?;
        }

        let start = Instant::now();
        let max_attempts = self.policy.max_retries + 1;
        let mut attempt = 1;

        let outcome = loop {
            let failure = match tokio::time::timeout(timeout, self.provider.invoke(tool, args.clone()))
                .await
            {
                Ok(Ok(value)) => break decode::<T>(tool, value),
                Ok(Err(failure)) => failure,
                Err(_) => ToolFailure::new(
                    tool,
                    ToolFailureKind::Timeout,
                    format!("no answer within {}ms", timeout.as_millis()),
                ),
            };

            if !failure.kind.is_retryable() || attempt >= max_attempts {
                break Err(failure);
            }

            let delay = self.policy.delay_for_attempt(attempt);
            tracing::warn!(
                capability = self.owner,
                tool = tool.as_str(),
                kind = failure.kind.as_str(),
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Tool call failed, retrying"
            );
            metrics::counter!("tool_retries_total", "tool" => tool.as_str()).increment(1);
            tokio::time::sleep(delay).await;
            attempt += 1;
        };

        Self::record(self.owner, tool, &outcome, attempt, start);
        Ok(outcome)
    }

    fn record<T>(
        owner: &'static str,
        tool: ToolName,
        outcome: &ToolOutcome<T>,
        attempts: u32,
        start: Instant,
    ) {
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let status = if outcome.is_ok() { "success" } else { "failure" };
        metrics::counter!(
            "tool_invocations_total",
            "tool" => tool.as_str(),
            "status" => status
        )
        .increment(1);
        metrics::histogram!("tool_duration_ms", "tool" => tool.as_str()).record(duration_ms);

        match outcome {
            Ok(_) => tracing::debug!(
                capability = owner,
                tool = tool.as_str(),
                attempts,
                duration_ms,
                "Tool call succeeded"
            ),
            Err(failure) => {
                metrics::counter!(
                    "tool_failures_total",
                    "tool" => tool.as_str(),
                    "kind" => failure.kind.as_str()
                )
                .increment(1);
                tracing::warn!(
                    capability = owner,
                    tool = tool.as_str(),
                    kind = failure.kind.as_str(),
                    attempts,
                    error = %failure,
                    "Tool call failed, degrading"
                );
            },
        }
    }
}

fn decode<T: DeserializeOwned>(tool: ToolName, value: Value) -> ToolOutcome<T> {
    serde_json::from_value(value)
        .map_err(|e| ToolFailure::new(tool, ToolFailureKind::InvalidOutput, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FixtureToolProvider;
    use crate::tools::types::{IntakeVerification, UserProfile};
    use serde_json::json;

    fn registry(provider: &Arc<FixtureToolProvider>, policy: ToolPolicy) -> ToolRegistry {
        ToolRegistry::new(Arc::clone(provider) as Arc<dyn ToolProvider>, policy)
    }

    #[test]
    fn test_delay_for_attempt() {
        let policy = ToolPolicy {
            retry_backoff: Duration::from_millis(100),
            ..ToolPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_bind_rejects_missing_timeout() {
        let provider = Arc::new(FixtureToolProvider::demo());
        let mut policy = ToolPolicy {
            default_timeout: None,
            ..ToolPolicy::default()
        };
        policy
            .timeouts
            .insert(ToolName::GetUserProfile, Duration::from_secs(1));
        let registry = registry(&provider, policy);

        assert!(registry.bind("test", &[ToolName::GetUserProfile]).is_ok());
        let err = registry
            .bind("test", &[ToolName::GetUserProfile, ToolName::SendMessage])
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("send_message"));
    }

    #[test]
    fn test_zero_timeout_counts_as_unset() {
        let mut policy = ToolPolicy::default();
        policy.timeouts.insert(ToolName::SendMessage, Duration::ZERO);
        assert_eq!(policy.timeout_for(ToolName::SendMessage), None);
        assert_eq!(
            policy.timeout_for(ToolName::GetUserProfile),
            Some(Duration::from_secs(5))
        );
    }

    #[tokio::test]
    async fn test_unbound_tool_is_configuration_error() {
        let provider = Arc::new(FixtureToolProvider::demo());
        let binding = registry(&provider, ToolPolicy::default())
            .bind("communication", &[ToolName::SendMessage])
            .unwrap();

        let err = binding
            .call::<IntakeVerification>(ToolName::VerifyIntake, json!({"medication": "aspirin"}))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(provider.total_invocations(), 0);
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected_before_invocation() {
        let provider = Arc::new(FixtureToolProvider::demo());
        let binding = registry(&provider, ToolPolicy::default())
            .bind("medication", &[ToolName::VerifyIntake])
            .unwrap();

        let err = binding
            .call::<IntakeVerification>(ToolName::VerifyIntake, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(provider.total_invocations(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_retried_once() {
        let provider = Arc::new(FixtureToolProvider::demo());
        provider.set_tool_failing(ToolName::GetUserProfile, true);
        let binding = registry(&provider, ToolPolicy::default())
            .bind("emergency", &[ToolName::GetUserProfile])
            .unwrap();

        let outcome = binding
            .call::<UserProfile>(ToolName::GetUserProfile, json!({}))
            .await
            .unwrap();

        let failure = outcome.unwrap_err();
        assert_eq!(failure.kind, ToolFailureKind::Unavailable);
        assert_eq!(provider.invocation_count(ToolName::GetUserProfile), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_bounded_and_retried() {
        let provider = Arc::new(FixtureToolProvider::demo());
        provider.update_fixture(|f| {
            f.slow_tools.insert(ToolName::GetUserProfile, 10_000);
        });
        let mut policy = ToolPolicy::default();
        policy
            .timeouts
            .insert(ToolName::GetUserProfile, Duration::from_millis(500));
        let binding = registry(&provider, policy)
            .bind("emergency", &[ToolName::GetUserProfile])
            .unwrap();

        let started = tokio::time::Instant::now();
        let outcome = binding
            .call::<UserProfile>(ToolName::GetUserProfile, json!({}))
            .await
            .unwrap();

        assert_eq!(outcome.unwrap_err().kind, ToolFailureKind::Timeout);
        assert_eq!(provider.invocation_count(ToolName::GetUserProfile), 2);
        // Two bounded attempts plus one backoff.
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_mismatched_answer_is_invalid_output() {
        let provider = Arc::new(FixtureToolProvider::demo());
        let binding = registry(&provider, ToolPolicy::default())
            .bind("medication", &[ToolName::GetFamilyContacts])
            .unwrap();

        let outcome = binding
            .call::<IntakeVerification>(ToolName::GetFamilyContacts, json!({}))
            .await
            .unwrap();

        assert_eq!(outcome.unwrap_err().kind, ToolFailureKind::InvalidOutput);
        assert_eq!(provider.invocation_count(ToolName::GetFamilyContacts), 1);
    }
}
