//! Scoped execution context.
//!
//! Two stacks hold the active bindings: one per OS thread, and one per
//! tokio task while inside [`scope_async`]. Inside a task scope the task
//! stack is authoritative, so bindings follow the task across worker
//! threads. `ContextGuard` truncates its stack back to the depth it found,
//! which restores the enclosing binding on return, on `?` and on unwind.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use vigil_core::{ExecutionId, NodeId};

/// Lineage for calls made inside a scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionContext {
    /// Execution group of every call in scope
    pub execution_id: ExecutionId,
    /// Parent of every call in scope, `None` at the top of an execution
    pub parent_node_id: Option<NodeId>,
}

impl ExecutionContext {
    /// Top of a new execution with a generated id
    #[must_use]
    pub fn new_root() -> Self {
        Self::for_execution(ExecutionId::generate())
    }

    /// Top of a named execution
    #[must_use]
    pub fn for_execution(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            parent_node_id: None,
        }
    }

    /// Context for calls made underneath `node_id`
    #[must_use]
    pub fn child(&self, node_id: NodeId) -> Self {
        Self {
            execution_id: self.execution_id.clone(),
            parent_node_id: Some(node_id),
        }
    }
}

type Stack = RefCell<Vec<ExecutionContext>>;

thread_local! {
    static THREAD_STACK: Stack = const { RefCell::new(Vec::new()) };
}

tokio::task_local! {
    static TASK_STACK: Stack;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Thread,
    Task,
}

fn active_binding() -> Binding {
    if TASK_STACK.try_with(|_| ()).is_ok() {
        Binding::Task
    } else {
        Binding::Thread
    }
}

fn with_stack<R>(binding: Binding, f: impl FnOnce(&Stack) -> R) -> Option<R> {
    match binding {
        Binding::Task => TASK_STACK.try_with(f).ok(),
        Binding::Thread => THREAD_STACK.try_with(f).ok(),
    }
}

/// The innermost active context, if any
#[must_use]
pub fn current() -> Option<ExecutionContext> {
    with_stack(active_binding(), |stack| stack.borrow().last().cloned()).flatten()
}

/// Execution id and parent for a call about to be recorded
#[must_use]
pub fn lineage_for_new_call() -> ExecutionContext {
    current().unwrap_or_else(ExecutionContext::new_root)
}

/// Restores the enclosing context when dropped
#[must_use = "the context is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard {
    binding: Binding,
    depth: usize,
    // Pinned to the thread or task that pushed it
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let depth = self.depth;
        let _ = with_stack(self.binding, |stack| stack.borrow_mut().truncate(depth));
    }
}

/// Bind `context` until the returned guard is dropped
pub fn enter(context: ExecutionContext) -> ContextGuard {
    let binding = active_binding();
    let depth = with_stack(binding, |stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.push(context);
        depth
    })
    .unwrap_or(0);
    ContextGuard {
        binding,
        depth,
        _not_send: PhantomData,
    }
}

/// Run `f` with `context` bound
pub fn scope<R>(context: ExecutionContext, f: impl FnOnce() -> R) -> R {
    let _guard = enter(context);
    f()
}

/// Run `fut` with `context` bound to the task that polls it
pub async fn scope_async<F>(context: ExecutionContext, fut: F) -> F::Output
where
    F: Future,
{
    TASK_STACK.scope(RefCell::new(vec![context]), fut).await
}

/// Carry the caller's current context into a future that may run on
/// another task, such as one handed to `tokio::spawn`
pub fn in_current_scope<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let stack = current().into_iter().collect::<Vec<_>>();
    TASK_STACK.scope(RefCell::new(stack), fut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ctx(exec: &str, parent: Option<&str>) -> ExecutionContext {
        ExecutionContext {
            execution_id: ExecutionId::from(exec),
            parent_node_id: parent.map(NodeId::from),
        }
    }

    #[test]
    fn test_outside_any_scope_is_a_fresh_root() {
        assert_eq!(current(), None);
        let a = lineage_for_new_call();
        let b = lineage_for_new_call();
        assert_eq!(a.parent_node_id, None);
        assert_ne!(a.execution_id, b.execution_id);
    }

    #[test]
    fn test_nested_scopes_restore() {
        scope(ctx("e", None), || {
            assert_eq!(current(), Some(ctx("e", None)));
            scope(ctx("e", Some("n1")), || {
                assert_eq!(current(), Some(ctx("e", Some("n1"))));
            });
            assert_eq!(current(), Some(ctx("e", None)));
        });
        assert_eq!(current(), None);
    }

    #[test]
    fn test_error_exit_restores() {
        fn adapter() -> Result<u32, String> {
            Err("boom".to_string())
        }
        fn inner() -> Result<u32, String> {
            let _guard = enter(ctx("e", Some("deep")));
            let tokens = adapter()?;
            Ok(tokens)
        }
        let _outer = enter(ctx("e", None));
        assert!(inner().is_err());
        assert_eq!(current(), Some(ctx("e", None)));
    }

    #[test]
    fn test_panic_exit_restores() {
        let _outer = enter(ctx("e", None));
        let result = std::panic::catch_unwind(|| {
            scope::<()>(ctx("e", Some("p")), || panic!("adapter blew up"));
        });
        assert!(result.is_err());
        assert_eq!(current(), Some(ctx("e", None)));
    }

    #[test]
    fn test_threads_do_not_share_bindings() {
        let _outer = enter(ctx("main", None));
        let seen = thread::spawn(|| {
            let before = current();
            scope(ctx("worker", None), current)
                .map(|c| (before, c.execution_id))
        })
        .join()
        .unwrap();
        assert_eq!(seen, Some((None, ExecutionId::from("worker"))));
        assert_eq!(current(), Some(ctx("main", None)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tasks_see_their_own_lineage() {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let exec = format!("exec-{i}");
                tokio::spawn(scope_async(ctx(&exec, None), async move {
                    for step in 0..5 {
                        tokio::task::yield_now().await;
                        let seen = current().map(|c| c.execution_id);
                        assert_eq!(seen, Some(ExecutionId::from(exec.as_str())), "step {step}");
                    }
                }))
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_sync_guard_inside_task_uses_task_stack() {
        scope_async(ctx("e", None), async {
            {
                let _guard = enter(ctx("e", Some("child")));
                tokio::task::yield_now().await;
                assert_eq!(current(), Some(ctx("e", Some("child"))));
            }
            assert_eq!(current(), Some(ctx("e", None)));
        })
        .await;
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn test_spawned_task_inherits_with_in_current_scope() {
        scope_async(ctx("e", Some("p")), async {
            let inherited = tokio::spawn(in_current_scope(async { current() }))
                .await
                .unwrap();
            assert_eq!(inherited, Some(ctx("e", Some("p"))));
            let detached = tokio::spawn(async { current() }).await.unwrap();
            assert_eq!(detached, None);
        })
        .await;
    }
}
