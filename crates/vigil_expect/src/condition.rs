//! Activation conditions.
//!
//! A condition gates an expectation on something declared in the request:
//! a substring of the input, the model, the provider or a metadata entry.
//! Conditions are exact checks. An expectation whose conditions do not hold
//! is inactive and has no effect on the verdict.

use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_core::CallRecord;

/// Exact, declared activation check
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// The request input contains a substring
    InputContains {
        /// Substring to look for
        text: String,
        /// Compare case-sensitively
        #[serde(default)]
        case_sensitive: bool,
    },
    /// The model name equals a value
    ModelEquals(String),
    /// The provider name equals a value, ignoring case
    ProviderEquals(String),
    /// A request metadata entry equals a value
    MetadataEquals {
        /// Metadata key
        key: String,
        /// Required value
        value: String,
    },
}

impl Condition {
    /// Case-insensitive input substring condition
    #[must_use]
    pub fn input_contains(text: impl Into<String>) -> Self {
        Self::InputContains {
            text: text.into(),
            case_sensitive: false,
        }
    }

    /// Whether the condition holds for the record
    #[must_use]
    pub fn holds(&self, record: &CallRecord) -> bool {
        let request = &record.request;
        match self {
            Self::InputContains {
                text,
                case_sensitive,
            } => {
                let input = input_text(record);
                if *case_sensitive {
                    input.contains(text.as_str())
                } else {
                    input.to_lowercase().contains(&text.to_lowercase())
                }
            }
            Self::ModelEquals(model) => request.model == *model,
            Self::ProviderEquals(provider) => {
                request.provider.to_lowercase() == provider.to_lowercase()
            }
            Self::MetadataEquals { key, value } => request.metadata.get(key) == Some(value),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputContains { text, .. } => write!(f, "input contains {text:?}"),
            Self::ModelEquals(model) => write!(f, "model = {model}"),
            Self::ProviderEquals(provider) => write!(f, "provider = {provider}"),
            Self::MetadataEquals { key, value } => write!(f, "metadata {key} = {value}"),
        }
    }
}

/// Request input: message contents joined by newlines
fn input_text(record: &CallRecord) -> String {
    record
        .request
        .messages
        .iter()
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
