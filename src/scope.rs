//! Named scopes: activation, caching, and teardown.
//!
//! A scope is a bounded region of execution during which scoped
//! instances are cached. Activation is execution-context-local and
//! strictly LIFO; exiting a scope disposes its instances in reverse
//! construction order.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::container::ContainerInner;
use crate::error::{DiError, DiResult};
use crate::internal::context::{snapshot_active, with_active, ACTIVE_TASK};
use crate::internal::DisposeBag;
use crate::key::Key;
use crate::provider::{AnyArc, HookSet};

/// One activation of a named scope: its instance cache and its ordered
/// disposables.
pub(crate) struct ScopeFrame {
    name: Arc<str>,
    container_id: u64,
    instances: Mutex<AHashMap<Key, AnyArc>>,
    disposers: Mutex<DisposeBag>,
    disposed: AtomicBool,
}

impl ScopeFrame {
    pub(crate) fn new(name: Arc<str>, container_id: u64) -> Self {
        ScopeFrame {
            name,
            container_id,
            instances: Mutex::new(AHashMap::new()),
            disposers: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn container_id(&self) -> u64 {
        self.container_id
    }

    pub(crate) fn get(&self, key: &Key) -> Option<AnyArc> {
        self.instances.lock().get(key).cloned()
    }

    /// Commits a constructed instance; the first writer wins, so
    /// concurrent construction races within one frame converge on one
    /// instance.
    pub(crate) fn commit(&self, key: &Key, value: AnyArc) -> (AnyArc, bool) {
        let mut instances = self.instances.lock();
        match instances.get(key) {
            Some(existing) => (existing.clone(), false),
            None => {
                instances.insert(key.clone(), value.clone());
                (value, true)
            }
        }
    }

    /// Tracks an instance for disposal in reverse construction order.
    pub(crate) fn track(&self, key: Key, value: AnyArc, hooks: HookSet) {
        self.disposers.lock().track(key, value, hooks);
    }

    fn begin_dispose(&self) -> Option<DisposeBag> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return None;
        }
        debug!(scope = %self.name, "disposing scope");
        Some(std::mem::take(&mut *self.disposers.lock()))
    }

    pub(crate) fn dispose_sync(&self) {
        if let Some(mut bag) = self.begin_dispose() {
            bag.run_reverse_sync();
            self.instances.lock().clear();
        }
    }

    pub(crate) async fn dispose_async(&self) {
        if let Some(mut bag) = self.begin_dispose() {
            bag.run_reverse_async().await;
            self.instances.lock().clear();
        }
    }
}

/// Activation handle for a named scope on one container.
///
/// Obtained from [`Container::scope`](crate::Container::scope). Use
/// [`enter`](ScopeHandle::enter) for a synchronous guard or
/// [`run`](ScopeHandle::run) to wrap an async block.
///
/// # Examples
///
/// ```rust
/// use cask_di::{Container, DiError, DiResult, Injectable, Registration, ResolvedArgs, Signature};
///
/// struct RequestCtx;
/// impl Injectable for RequestCtx {
///     fn signature() -> Signature {
///         Signature::empty()
///     }
///     fn construct(_args: &ResolvedArgs) -> DiResult<Self> {
///         Ok(RequestCtx)
///     }
/// }
///
/// let container = Container::new();
/// container
///     .register(Registration::for_type::<RequestCtx>().scoped("request"))
///     .unwrap();
///
/// // Outside an activation the scoped component is unreachable.
/// assert!(matches!(
///     container.resolve_sync::<RequestCtx>(),
///     Err(DiError::ScopeInactive { .. })
/// ));
///
/// let guard = container.scope("request").enter().unwrap();
/// let a = container.resolve_sync::<RequestCtx>().unwrap();
/// let b = container.resolve_sync::<RequestCtx>().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// drop(guard);
/// ```
pub struct ScopeHandle {
    pub(crate) inner: Arc<ContainerInner>,
    pub(crate) name: Arc<str>,
}

impl ScopeHandle {
    /// Activates the scope on the current execution context and returns
    /// a guard. Dropping the guard exits the scope and disposes its
    /// instances in reverse construction order.
    ///
    /// Fails with [`DiError::ScopeReentry`] when the scope name is
    /// already active on this context.
    pub fn enter(&self) -> DiResult<ScopeGuard> {
        let frame = Arc::new(ScopeFrame::new(self.name.clone(), self.inner.id));
        with_active(|active| {
            if active.is_active(self.inner.id, &self.name) {
                return Err(DiError::ScopeReentry { scope: self.name.to_string() });
            }
            active.push(frame.clone());
            Ok(())
        })?;
        debug!(scope = %self.name, "entered scope");
        Ok(ScopeGuard { frame })
    }

    /// Runs an async block inside one activation of the scope.
    ///
    /// The activation is task-local: concurrent tasks do not observe it.
    /// When the block finishes (or fails), scoped instances are disposed
    /// in reverse construction order, awaiting async disposers.
    pub async fn run<F, R>(&self, fut: F) -> DiResult<R>
    where
        F: Future<Output = R>,
    {
        let current = snapshot_active();
        if current.is_active(self.inner.id, &self.name) {
            return Err(DiError::ScopeReentry { scope: self.name.to_string() });
        }
        let frame = Arc::new(ScopeFrame::new(self.name.clone(), self.inner.id));
        let mut state = current;
        state.push(frame.clone());

        debug!(scope = %self.name, "entered scope");
        let result = ACTIVE_TASK
            .scope(std::cell::RefCell::new(state), fut)
            .await;
        frame.dispose_async().await;
        Ok(result)
    }
}

/// Guard holding a synchronous scope activation. Exits the scope on
/// drop.
pub struct ScopeGuard {
    frame: Arc<ScopeFrame>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        with_active(|active| active.remove(&self.frame));
        self.frame.dispose_sync();
    }
}
