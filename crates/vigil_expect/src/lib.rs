//! VIGIL Expectations
//!
//! Author-declared rules over a completed call and the pure evaluator that
//! turns them into a binary verdict. Rules are exact and deterministic:
//! substring presence, substring absence, a latency ceiling and an output
//! token floor. Nothing here scores, infers or adapts.
//!
//! Expectation sets can be targeted at part of a trace with a scope and
//! gated by exact activation conditions; see [`selection`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod condition;
pub mod contract;
pub mod evaluator;
pub mod rules;
pub mod scope;
pub mod selection;
pub mod template;

pub use condition::Condition;
pub use contract::{describe, to_markdown};
pub use evaluator::{evaluate, evaluate_response, Evaluator, RuleOutcome};
pub use rules::ExpectationSet;
pub use scope::{ExpectationScope, Stage};
pub use selection::{ScopedExpectation, ScopedExpectations};
pub use template::{ExpectationTemplate, TemplateRegistry};
