//! Per-call verdicts.
//!
//! The status space is closed: `Pass` or `Fail`, nothing else. A passing
//! verdict carries neither severity nor violations. A failing verdict
//! carries at least one violation and the maximum severity among them.
//! Construction and deserialization both enforce this.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Every declared expectation held
    Pass,
    /// At least one declared expectation was violated
    Fail,
}

impl Status {
    /// Lowercase wire form
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }

    /// Whether this is `Fail`
    #[must_use]
    pub const fn is_fail(&self) -> bool {
        matches!(self, Self::Fail)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure severity, ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Low severity
    Low,
    /// Medium severity
    Medium,
    /// High severity
    High,
}

impl Severity {
    /// Lowercase wire form
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a recognized expectation rule.
///
/// Declaration order is evaluation order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    /// Every listed substring must appear in the response text
    MustInclude,
    /// No listed substring may appear in the response text
    MustNotInclude,
    /// Observed latency must not exceed the ceiling
    MaxLatencyMs,
    /// Observed output token count must reach the floor
    MinTokens,
}

impl RuleId {
    /// Every rule, in evaluation order
    pub const ALL: [RuleId; 4] = [
        Self::MustInclude,
        Self::MustNotInclude,
        Self::MaxLatencyMs,
        Self::MinTokens,
    ];

    /// Severity assigned when this rule is violated
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::MustInclude => Severity::Low,
            Self::MustNotInclude => Severity::High,
            Self::MaxLatencyMs => Severity::Medium,
            Self::MinTokens => Severity::Low,
        }
    }

    /// Configuration key naming this rule
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MustInclude => "must_include",
            Self::MustNotInclude => "must_not_include",
            Self::MaxLatencyMs => "max_latency_ms",
            Self::MinTokens => "min_tokens",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary verdict for one recorded call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "VerdictRepr", into = "VerdictRepr")]
pub struct Verdict {
    status: Status,
    severity: Option<Severity>,
    violations: Vec<RuleId>,
}

impl Verdict {
    /// A passing verdict
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            status: Status::Pass,
            severity: None,
            violations: Vec::new(),
        }
    }

    /// Build a verdict from violated rules, in the order given.
    ///
    /// No violations yields `Pass`; otherwise `Fail` with the maximum
    /// severity among the violations.
    #[must_use]
    pub fn from_violations(violations: Vec<RuleId>) -> Self {
        match violations.iter().map(RuleId::severity).max() {
            None => Self::pass(),
            Some(severity) => Self {
                status: Status::Fail,
                severity: Some(severity),
                violations,
            },
        }
    }

    /// Verdict status
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Severity, present only on `Fail`
    #[must_use]
    pub const fn severity(&self) -> Option<Severity> {
        self.severity
    }

    /// Violated rules in evaluation order
    #[must_use]
    pub fn violations(&self) -> &[RuleId] {
        &self.violations
    }

    /// Whether the status is `Pass`
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self.status, Status::Pass)
    }

    /// Whether the status is `Fail`
    #[must_use]
    pub const fn is_fail(&self) -> bool {
        self.status.is_fail()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            None => write!(f, "{}", self.status),
            Some(severity) => {
                let rules: Vec<&str> = self.violations.iter().map(RuleId::as_str).collect();
                write!(f, "{} ({}): {}", self.status, severity, rules.join(", "))
            }
        }
    }
}

/// Wire shape of a verdict, validated on the way in
#[derive(Serialize, Deserialize)]
struct VerdictRepr {
    status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    violations: Vec<RuleId>,
}

impl From<Verdict> for VerdictRepr {
    fn from(v: Verdict) -> Self {
        Self {
            status: v.status,
            severity: v.severity,
            violations: v.violations,
        }
    }
}

impl TryFrom<VerdictRepr> for Verdict {
    type Error = String;

    fn try_from(repr: VerdictRepr) -> Result<Self, Self::Error> {
        match repr.status {
            Status::Pass => {
                if repr.severity.is_some() || !repr.violations.is_empty() {
                    return Err("pass verdict carries severity or violations".to_string());
                }
                Ok(Self::pass())
            }
            Status::Fail => {
                if repr.violations.is_empty() {
                    return Err("fail verdict carries no violations".to_string());
                }
                let verdict = Self::from_violations(repr.violations);
                if repr.severity != verdict.severity {
                    return Err("fail verdict severity is not the maximum of its violations".to_string());
                }
                Ok(verdict)
            }
        }
    }
}
