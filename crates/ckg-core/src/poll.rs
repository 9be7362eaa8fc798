//! Bounded oracle polling
//!
//! A prompt is re-sent until the response passes the caller's acceptance
//! check or the attempt budget is spent. Transport errors that are safe to
//! retry, timeouts and rejected responses all consume an attempt.

use serde::{Deserialize, Serialize};

use crate::capability::{CodeOracle, TokenUsage};
use crate::config::OraclePolicy;
use crate::error::{OracleError, SynthesisError};
use crate::prompt::ChatPrompt;

/// Counters kept across one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisStats {
    pub oracle_calls: u64,
    /// Responses that arrived but did not pass the acceptance check
    pub rejected_responses: u64,
    /// Calls that failed or timed out
    pub oracle_failures: u64,
    pub syntax_failures: u64,
    pub compile_failures: u64,
    pub test_failures: u64,
    pub repairs: u64,
    /// Tokens reported by the oracle, rejected responses included
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl SynthesisStats {
    #[inline]
    pub fn record_usage(&mut self, usage: TokenUsage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
    }
}

/// Poll `oracle` with `prompt` until `accept` yields a value.
///
/// Non-retryable oracle errors end polling immediately.
pub async fn poll_oracle<T, F>(
    oracle: &dyn CodeOracle,
    prompt: &ChatPrompt,
    policy: &OraclePolicy,
    stats: &mut SynthesisStats,
    mut accept: F,
) -> Result<T, SynthesisError>
where
    F: FnMut(&str) -> Option<T>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        stats.oracle_calls += 1;
        let call = tokio::time::timeout(policy.call_timeout(), oracle.invoke(prompt)).await;
        let response = match call {
            Ok(Ok(reply)) => {
                stats.record_usage(reply.usage);
                reply.text
            }
            Ok(Err(e)) if e.is_retryable() => {
                stats.oracle_failures += 1;
                tracing::warn!(
                    "Oracle call {}/{} for {:?} failed: {}",
                    attempt,
                    attempts,
                    prompt.kind,
                    e
                );
                continue;
            }
            Ok(Err(e)) => {
                stats.oracle_failures += 1;
                return Err(e.into());
            }
            Err(_) => {
                stats.oracle_failures += 1;
                let e = OracleError::Timeout {
                    secs: policy.call_timeout_secs,
                };
                tracing::warn!("Oracle call {}/{} {}", attempt, attempts, e);
                continue;
            }
        };
        match accept(&response) {
            Some(value) => return Ok(value),
            None => {
                stats.rejected_responses += 1;
                tracing::debug!(
                    "Oracle response {}/{} for {:?} rejected",
                    attempt,
                    attempts,
                    prompt.kind
                );
            }
        }
    }
    Err(SynthesisError::OracleExhausted { attempts })
}
