//! Named expectation templates.
//!
//! A template is a static, versioned `ExpectationSet` registered under a
//! name. Applying several templates merges them with
//! [`ExpectationSet::merge`], so the stricter bound always wins.

use crate::rules::ExpectationSet;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use vigil_core::{VigilError, VigilResult};

/// A named, reusable expectation set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationTemplate {
    /// Unique name
    pub name: String,
    /// One-line description of the contract
    pub description: String,
    /// Template version
    pub version: String,
    /// The expectations
    pub expectations: ExpectationSet,
}

impl ExpectationTemplate {
    /// Create a template at version 1.0.0
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        expectations: ExpectationSet,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: "1.0.0".to_string(),
            expectations,
        }
    }

    /// Set the version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Registry of templates, in registration order
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: IndexMap<String, ExpectationTemplate>,
}

impl TemplateRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in templates
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for template in builtin_templates() {
            registry.register(template);
        }
        registry
    }

    /// Register a template, returning the one it replaced
    pub fn register(&mut self, template: ExpectationTemplate) -> Option<ExpectationTemplate> {
        self.templates.insert(template.name.clone(), template)
    }

    /// Look up a template
    ///
    /// # Errors
    ///
    /// `UnknownTemplate` if no template has this name
    pub fn get(&self, name: &str) -> VigilResult<&ExpectationTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| VigilError::UnknownTemplate {
                name: name.to_string(),
            })
    }

    /// Merge the named templates into one expectation set
    ///
    /// # Errors
    ///
    /// `UnknownTemplate` for the first name that is not registered
    pub fn resolve<'a, I>(&self, names: I) -> VigilResult<ExpectationSet>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().try_fold(ExpectationSet::new(), |acc, name| {
            Ok(acc.merge(&self.get(name)?.expectations))
        })
    }

    /// Whether a name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Registered templates in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ExpectationTemplate> {
        self.templates.values()
    }

    /// Number of templates
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn builtin_templates() -> Vec<ExpectationTemplate> {
    vec![
        ExpectationTemplate::new(
            "safe-response",
            "no refusal or error vocabulary in the response",
            ExpectationSet::new().must_not_include([
                "sorry",
                "apologize",
                "cannot",
                "I'm unable",
                "error",
                "exception",
                "failed",
            ]),
        ),
        ExpectationTemplate::new(
            "latency-fast",
            "response within 1000 ms",
            ExpectationSet::new().max_latency_ms(1_000),
        ),
        ExpectationTemplate::new(
            "latency-standard",
            "response within 3000 ms",
            ExpectationSet::new().max_latency_ms(3_000),
        ),
        ExpectationTemplate::new(
            "latency-slow",
            "response within 10000 ms",
            ExpectationSet::new().max_latency_ms(10_000),
        ),
        ExpectationTemplate::new(
            "minimum-response",
            "at least 10 output tokens",
            ExpectationSet::new().min_tokens(10),
        ),
        ExpectationTemplate::new(
            "detailed-response",
            "at least 50 output tokens",
            ExpectationSet::new().min_tokens(50),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::ErrorCode;

    #[test]
    fn test_builtin_templates_registered() {
        let registry = TemplateRegistry::builtin();
        assert_eq!(registry.len(), 6);
        for name in [
            "safe-response",
            "latency-fast",
            "latency-standard",
            "latency-slow",
            "minimum-response",
            "detailed-response",
        ] {
            assert!(registry.contains(name), "{name} missing");
        }
    }

    #[test]
    fn test_every_builtin_declares_a_rule() {
        for template in TemplateRegistry::builtin().iter() {
            assert!(!template.expectations.is_empty(), "{}", template.name);
        }
    }

    #[test]
    fn test_unknown_template() {
        let err = TemplateRegistry::builtin().get("nope").unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownTemplate);
    }

    #[test]
    fn test_resolve_merges_strictest() {
        let registry = TemplateRegistry::builtin();
        let set = registry
            .resolve(["latency-slow", "latency-fast", "minimum-response"])
            .unwrap();
        assert_eq!(set.max_latency_ms, Some(1_000));
        assert_eq!(set.min_tokens, Some(10));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = TemplateRegistry::new();
        registry.register(ExpectationTemplate::new("t", "first", ExpectationSet::new().min_tokens(1)));
        let old = registry.register(
            ExpectationTemplate::new("t", "second", ExpectationSet::new().min_tokens(2))
                .with_version("2.0.0"),
        );
        assert_eq!(old.map(|t| t.description), Some("first".to_string()));
        assert_eq!(registry.get("t").unwrap().version, "2.0.0");
    }
}
