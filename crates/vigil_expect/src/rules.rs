//! Expectation configuration.
//!
//! A closed set of four options. An empty substring set counts as
//! undeclared. Any other key in a configuration document is rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use vigil_core::{RuleId, VigilError, VigilResult};

/// Declared expectations for one call
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectationSet {
    /// Substrings that must all appear in the response text
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub must_include: BTreeSet<String>,
    /// Substrings none of which may appear in the response text
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub must_not_include: BTreeSet<String>,
    /// Latency ceiling in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<u64>,
    /// Output token floor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_tokens: Option<u64>,
}

impl ExpectationSet {
    /// Create an empty set (declares nothing)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add substrings that must appear
    #[must_use]
    pub fn must_include<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.must_include.extend(substrings.into_iter().map(Into::into));
        self
    }

    /// Add substrings that must not appear
    #[must_use]
    pub fn must_not_include<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.must_not_include
            .extend(substrings.into_iter().map(Into::into));
        self
    }

    /// Set the latency ceiling
    #[must_use]
    pub fn max_latency_ms(mut self, ms: u64) -> Self {
        self.max_latency_ms = Some(ms);
        self
    }

    /// Set the output token floor
    #[must_use]
    pub fn min_tokens(mut self, tokens: u64) -> Self {
        self.min_tokens = Some(tokens);
        self
    }

    /// Whether a rule is declared
    #[must_use]
    pub fn declares(&self, rule: RuleId) -> bool {
        match rule {
            RuleId::MustInclude => !self.must_include.is_empty(),
            RuleId::MustNotInclude => !self.must_not_include.is_empty(),
            RuleId::MaxLatencyMs => self.max_latency_ms.is_some(),
            RuleId::MinTokens => self.min_tokens.is_some(),
        }
    }

    /// Declared rules in evaluation order
    #[must_use]
    pub fn declared_rules(&self) -> Vec<RuleId> {
        RuleId::ALL
            .into_iter()
            .filter(|rule| self.declares(*rule))
            .collect()
    }

    /// Whether no rule is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declared_rules().is_empty()
    }

    /// Combine two sets, keeping the stricter bound for every option
    #[must_use]
    pub fn merge(&self, other: &ExpectationSet) -> ExpectationSet {
        ExpectationSet {
            must_include: self.must_include.union(&other.must_include).cloned().collect(),
            must_not_include: self
                .must_not_include
                .union(&other.must_not_include)
                .cloned()
                .collect(),
            max_latency_ms: stricter(self.max_latency_ms, other.max_latency_ms, u64::min),
            min_tokens: stricter(self.min_tokens, other.min_tokens, u64::max),
        }
    }

    /// Parse a JSON configuration document
    ///
    /// # Errors
    ///
    /// `UnknownExpectationOption` for any key outside the four recognized
    /// options, `Encoding` for malformed values
    pub fn from_json(text: &str) -> VigilResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Parse an already-decoded JSON value
    ///
    /// # Errors
    ///
    /// Same as [`ExpectationSet::from_json`]
    pub fn from_value(value: serde_json::Value) -> VigilResult<Self> {
        if let serde_json::Value::Object(map) = &value {
            if let Some(option) = map
                .keys()
                .find(|key| !RuleId::ALL.iter().any(|rule| rule.as_str() == key.as_str()))
            {
                tracing::warn!(option = %option, "rejected unknown expectation option");
                return Err(VigilError::UnknownExpectationOption {
                    option: option.clone(),
                });
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

fn stricter(a: Option<u64>, b: Option<u64>, pick: fn(u64, u64) -> u64) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::ErrorCode;

    #[test]
    fn test_empty_set_declares_nothing() {
        let set = ExpectationSet::new();
        assert!(set.is_empty());
        assert!(ExpectationSet::new().must_include(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_declared_rules_follow_fixed_order() {
        let set = ExpectationSet::new()
            .min_tokens(3)
            .max_latency_ms(100)
            .must_include(["a"]);
        assert_eq!(
            set.declared_rules(),
            vec![RuleId::MustInclude, RuleId::MaxLatencyMs, RuleId::MinTokens]
        );
    }

    #[test]
    fn test_from_json() {
        let set = ExpectationSet::from_json(
            r#"{"must_include":["refund"],"max_latency_ms":1500}"#,
        )
        .unwrap();
        assert!(set.must_include.contains("refund"));
        assert_eq!(set.max_latency_ms, Some(1500));
        assert_eq!(set.min_tokens, None);
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = ExpectationSet::from_json(r#"{"must_include":["a"],"similarity":0.8}"#)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownExpectationOption);
        assert_eq!(
            err,
            VigilError::UnknownExpectationOption {
                option: "similarity".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_value_is_encoding_error() {
        let err = ExpectationSet::from_json(r#"{"max_latency_ms":"fast"}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Encoding);
    }

    #[test]
    fn test_merge_keeps_stricter_bounds() {
        let a = ExpectationSet::new().must_include(["x"]).max_latency_ms(3000).min_tokens(10);
        let b = ExpectationSet::new().must_include(["y"]).max_latency_ms(1000).min_tokens(50);
        let merged = a.merge(&b);
        assert_eq!(merged.must_include.len(), 2);
        assert_eq!(merged.max_latency_ms, Some(1000));
        assert_eq!(merged.min_tokens, Some(50));
    }

    #[test]
    fn test_merge_with_undeclared_keeps_declared() {
        let a = ExpectationSet::new().max_latency_ms(3000);
        let merged = a.merge(&ExpectationSet::new());
        assert_eq!(merged, a);
    }
}
