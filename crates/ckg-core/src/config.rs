//! Synthesis configuration

use std::time::Duration;

use ckg_retrieval::RetrievalConfig;
use serde::{Deserialize, Serialize};

/// Imports every staged checker must carry
pub const DEFAULT_REQUIRED_IMPORTS: &[&str] = &[
    "net.sourceforge.pmd.lang.java.rule.AbstractJavaRulechainRule",
    "net.sourceforge.pmd.lang.java.ast.*",
    "net.sourceforge.pmd.lang.java.ast.internal.*",
    "net.sourceforge.pmd.lang.java.types.*",
    "net.sourceforge.pmd.lang.java.symbols.*",
    "net.sourceforge.pmd.lang.ast.NodeStream",
];

/// Bounds on polling the oracle for one usable response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OraclePolicy {
    /// Calls made before giving up on a prompt
    pub max_attempts: u32,
    /// Per-call timeout in seconds
    pub call_timeout_secs: u64,
}

impl OraclePolicy {
    #[inline]
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for OraclePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            call_timeout_secs: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Rounds per anchor before it is abandoned
    pub max_outer_rounds: u32,
    /// Oracle-assisted compile fixes per round
    pub max_inner_repairs: u32,
    pub oracle: OraclePolicy,
    pub retrieval: RetrievalConfig,
    /// APIs never to suggest, in addition to those learned from failures
    pub blocked_apis: Vec<String>,
    pub required_imports: Vec<String>,
}

impl SynthesisConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_max_outer_rounds(mut self, rounds: u32) -> Self {
        self.max_outer_rounds = rounds;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_inner_repairs(mut self, repairs: u32) -> Self {
        self.max_inner_repairs = repairs;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_oracle_policy(mut self, policy: OraclePolicy) -> Self {
        self.oracle = policy;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    #[must_use]
    pub fn with_blocked_api(mut self, api: impl Into<String>) -> Self {
        self.blocked_apis.push(api.into());
        self
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_outer_rounds: 5,
            max_inner_repairs: 2,
            oracle: OraclePolicy::default(),
            retrieval: RetrievalConfig::default(),
            blocked_apis: Vec::new(),
            required_imports: DEFAULT_REQUIRED_IMPORTS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SynthesisConfig::new();
        assert_eq!(config.max_outer_rounds, 5);
        assert_eq!(config.max_inner_repairs, 2);
        assert_eq!(config.oracle.max_attempts, 5);
        assert_eq!(config.required_imports.len(), DEFAULT_REQUIRED_IMPORTS.len());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SynthesisConfig =
            serde_json::from_str(r#"{"max_outer_rounds": 3, "oracle": {"max_attempts": 2}}"#).unwrap();
        assert_eq!(config.max_outer_rounds, 3);
        assert_eq!(config.max_inner_repairs, 2);
        assert_eq!(config.oracle.max_attempts, 2);
        assert_eq!(config.oracle.call_timeout(), Duration::from_secs(180));
    }
}
