//! VIGIL Capture
//!
//! Supplies the execution lineage of each new call record. Lineage is bound
//! per thread, or per task inside async code, and nested scopes restore the
//! enclosing binding on every exit path. Outside any scope a call gets a
//! fresh execution id and no parent, so it is always a graph root.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod recorder;

pub use context::{
    current, enter, in_current_scope, lineage_for_new_call, scope, scope_async, ContextGuard,
    ExecutionContext,
};
pub use recorder::Recorder;
