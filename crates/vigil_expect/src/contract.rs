//! Plain-text and Markdown rendering of declared expectations.

use crate::rules::ExpectationSet;
use std::fmt::Write as _;
use vigil_core::RuleId;

fn rule_clause(rules: &ExpectationSet, rule: RuleId) -> String {
    fn quoted<'a>(items: impl Iterator<Item = &'a String>) -> String {
        items
            .map(|s| format!("\"{}\"", s))
            .collect::<Vec<_>>()
            .join(", ")
    }

    match rule {
        RuleId::MustInclude => format!("response contains {}", quoted(rules.must_include.iter())),
        RuleId::MustNotInclude => {
            format!("response excludes {}", quoted(rules.must_not_include.iter()))
        }
        RuleId::MaxLatencyMs => format!(
            "latency <= {} ms",
            rules.max_latency_ms.unwrap_or_default()
        ),
        RuleId::MinTokens => format!(
            "output tokens >= {}",
            rules.min_tokens.unwrap_or_default()
        ),
    }
}

/// One line per declared rule, in evaluation order
#[must_use]
pub fn describe(rules: &ExpectationSet) -> String {
    let declared = rules.declared_rules();
    if declared.is_empty() {
        return "no expectations declared".to_string();
    }
    declared
        .into_iter()
        .map(|rule| format!("{} [{}]: {}", rule, rule.severity(), rule_clause(rules, rule)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Markdown contract document
#[must_use]
pub fn to_markdown(rules: &ExpectationSet, title: &str, description: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", title);
    out.push('\n');
    if !description.is_empty() {
        let _ = writeln!(out, "{}", description);
        out.push('\n');
    }
    out.push_str("| rule | severity | requirement |\n");
    out.push_str("|---|---|---|\n");
    for rule in rules.declared_rules() {
        let _ = writeln!(
            out,
            "| `{}` | {} | {} |",
            rule,
            rule.severity(),
            rule_clause(rules, rule).replace('|', "\\|")
        );
    }
    out
}
