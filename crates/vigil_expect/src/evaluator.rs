//! Expectation evaluator.
//!
//! Every declared rule is evaluated against the same response; nothing
//! short-circuits. Violations are listed in fixed rule order
//! (must_include, must_not_include, max_latency_ms, min_tokens) whatever
//! combination is declared.

use crate::rules::ExpectationSet;
use serde::{Deserialize, Serialize};
use vigil_core::{CallRecord, Response, RuleId, Verdict, VigilError, VigilResult};

/// Outcome of a single declared rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Rule evaluated
    pub rule: RuleId,
    /// Whether the rule held
    pub passed: bool,
}

/// Evaluator bound to one non-empty expectation set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluator {
    rules: ExpectationSet,
}

impl Evaluator {
    /// Bind an expectation set
    ///
    /// # Errors
    ///
    /// `NoExpectations` if the set declares no rule
    pub fn new(rules: ExpectationSet) -> VigilResult<Self> {
        if rules.is_empty() {
            return Err(VigilError::NoExpectations);
        }
        Ok(Self { rules })
    }

    /// The bound expectation set
    #[must_use]
    pub fn rules(&self) -> &ExpectationSet {
        &self.rules
    }

    /// Per-rule outcomes in evaluation order
    #[must_use]
    pub fn outcomes(&self, response: &Response) -> Vec<RuleOutcome> {
        self.rules
            .declared_rules()
            .into_iter()
            .map(|rule| RuleOutcome {
                rule,
                passed: rule_holds(&self.rules, rule, response),
            })
            .collect()
    }

    /// Verdict for a response
    #[must_use]
    pub fn verdict(&self, response: &Response) -> Verdict {
        let violations = self
            .outcomes(response)
            .into_iter()
            .filter(|outcome| !outcome.passed)
            .map(|outcome| outcome.rule)
            .collect();
        Verdict::from_violations(violations)
    }

    /// Verdict for a completed call
    #[must_use]
    pub fn evaluate(&self, record: &CallRecord) -> Verdict {
        let verdict = self.verdict(&record.response);
        tracing::debug!(
            trace_id = %record.trace_id,
            node_id = %record.node_id,
            verdict = %verdict,
            "evaluated expectations"
        );
        verdict
    }
}

/// Evaluate declared expectations against a completed call
///
/// # Errors
///
/// `NoExpectations` if `rules` declares nothing
pub fn evaluate(rules: &ExpectationSet, record: &CallRecord) -> VigilResult<Verdict> {
    Ok(Evaluator::new(rules.clone())?.evaluate(record))
}

/// Evaluate declared expectations against a bare response
///
/// # Errors
///
/// `NoExpectations` if `rules` declares nothing
pub fn evaluate_response(rules: &ExpectationSet, response: &Response) -> VigilResult<Verdict> {
    Ok(Evaluator::new(rules.clone())?.verdict(response))
}

fn rule_holds(rules: &ExpectationSet, rule: RuleId, response: &Response) -> bool {
    match rule {
        RuleId::MustInclude => rules
            .must_include
            .iter()
            .all(|needle| response.text.contains(needle.as_str())),
        RuleId::MustNotInclude => !rules
            .must_not_include
            .iter()
            .any(|needle| response.text.contains(needle.as_str())),
        RuleId::MaxLatencyMs => rules
            .max_latency_ms
            .is_none_or(|ceiling| response.latency_ms <= ceiling),
        RuleId::MinTokens => rules
            .min_tokens
            .is_none_or(|floor| response.token_usage.output_tokens >= floor),
    }
}
