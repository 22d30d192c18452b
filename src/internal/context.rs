//! Execution-context-local scope activation state.
//!
//! Async tasks see a task-local activation stack (installed by
//! [`ScopeHandle::run`](crate::ScopeHandle::run)); synchronous code falls
//! back to a thread-local stack. Concurrent tasks and threads therefore
//! never observe each other's scopes.

use std::cell::RefCell;
use std::sync::Arc;

use crate::scope::ScopeFrame;

/// The activation stack for one execution context, innermost last.
#[derive(Default, Clone)]
pub(crate) struct ActiveScopes {
    frames: Vec<Arc<ScopeFrame>>,
}

impl ActiveScopes {
    /// Topmost frame matching (container, scope name).
    pub(crate) fn find(&self, container_id: u64, name: &str) -> Option<Arc<ScopeFrame>> {
        self.frames
            .iter()
            .rev()
            .find(|f| f.container_id() == container_id && f.name() == name)
            .cloned()
    }

    pub(crate) fn is_active(&self, container_id: u64, name: &str) -> bool {
        self.find(container_id, name).is_some()
    }

    /// Innermost frame belonging to the given container, if any.
    pub(crate) fn innermost(&self, container_id: u64) -> Option<Arc<ScopeFrame>> {
        self.frames
            .iter()
            .rev()
            .find(|f| f.container_id() == container_id)
            .cloned()
    }

    pub(crate) fn push(&mut self, frame: Arc<ScopeFrame>) {
        self.frames.push(frame);
    }

    /// Removes the given frame. Activation is LIFO, so the frame is
    /// expected on top; an out-of-order removal is a guard misuse and
    /// trips the debug assertion.
    pub(crate) fn remove(&mut self, frame: &Arc<ScopeFrame>) {
        if let Some(top) = self.frames.last() {
            if Arc::ptr_eq(top, frame) {
                self.frames.pop();
                return;
            }
        }
        debug_assert!(false, "scope frames must be exited in LIFO order");
        self.frames.retain(|f| !Arc::ptr_eq(f, frame));
    }
}

thread_local! {
    static ACTIVE_THREAD: RefCell<ActiveScopes> = RefCell::new(ActiveScopes::default());
}

tokio::task_local! {
    pub(crate) static ACTIVE_TASK: RefCell<ActiveScopes>;
}

/// Runs `f` against the activation stack of the current execution
/// context: the task-local stack inside a scoped task, the thread-local
/// stack otherwise.
pub(crate) fn with_active<R>(f: impl FnOnce(&mut ActiveScopes) -> R) -> R {
    let mut f = Some(f);
    match ACTIVE_TASK.try_with(|cell| (f.take().expect("closure consumed once"))(&mut cell.borrow_mut())) {
        Ok(result) => result,
        Err(_) => ACTIVE_THREAD
            .with(|cell| (f.take().expect("closure consumed once"))(&mut cell.borrow_mut())),
    }
}

/// Snapshot of the current context's activation stack.
pub(crate) fn snapshot_active() -> ActiveScopes {
    with_active(|active| active.clone())
}
