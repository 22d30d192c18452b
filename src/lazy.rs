//! Deferred construction handles.

use std::marker::PhantomData;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::container::ContainerInner;
use crate::error::DiResult;
use crate::key::Key;
use crate::provider::AnyArc;
use crate::resolver::{downcast_value, Overrides};

/// Type-erased deferred construction state shared by every clone of a
/// [`Lazy`] handle. Captures the resolver, key, and overrides; the
/// construction protocol runs on first use and the result is cached.
pub(crate) struct LazyCore {
    container: Arc<ContainerInner>,
    key: Key,
    overrides: Overrides,
    cell: OnceCell<AnyArc>,
    init_lock: Mutex<()>,
}

impl LazyCore {
    pub(crate) fn new(container: Arc<ContainerInner>, key: Key, overrides: Overrides) -> Self {
        LazyCore {
            container,
            key,
            overrides,
            cell: OnceCell::new(),
            init_lock: Mutex::new(()),
        }
    }

    pub(crate) fn force_sync(&self) -> DiResult<AnyArc> {
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }
        let _guard = self.init_lock.lock();
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }
        let value = self.container.resolve_any_sync(&self.key, &self.overrides)?;
        Ok(self.cell.get_or_init(|| value.clone()).clone())
    }

    pub(crate) async fn force_async(&self) -> DiResult<AnyArc> {
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }
        // Construct without a blocking lock held across the await; the
        // cell commit is first-wins, so concurrent first uses observe
        // one instance.
        let value = self
            .container
            .clone()
            .resolve_any_async(&self.key, &self.overrides)
            .await?;
        Ok(self.cell.get_or_init(|| value.clone()).clone())
    }

    pub(crate) fn is_materialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// A thread-safe, idempotent handle that defers construction of a
/// component until first use.
///
/// Obtained either from [`Container::resolve_lazy`](crate::Container::resolve_lazy)
/// or as a declared deferred parameter via
/// [`ResolvedArgs::get_lazy`](crate::ResolvedArgs::get_lazy).
///
/// # Examples
///
/// ```rust
/// use cask_di::{Container, DiResult, Injectable, Registration, ResolvedArgs, Signature};
///
/// struct Expensive;
/// impl Injectable for Expensive {
///     fn signature() -> Signature {
///         Signature::empty()
///     }
///     fn construct(_args: &ResolvedArgs) -> DiResult<Self> {
///         Ok(Expensive)
///     }
/// }
///
/// let container = Container::new();
/// container
///     .register(Registration::for_type::<Expensive>().singleton())
///     .unwrap();
///
/// let lazy = container.resolve_lazy::<Expensive>();
/// assert!(!lazy.is_materialized());
/// let _value = lazy.get().unwrap();
/// assert!(lazy.is_materialized());
/// ```
pub struct Lazy<T> {
    core: Arc<LazyCore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Lazy { core: self.core.clone(), _marker: PhantomData }
    }
}

impl<T: Send + Sync + 'static> Lazy<T> {
    pub(crate) fn from_core(core: Arc<LazyCore>) -> Self {
        Lazy { core, _marker: PhantomData }
    }

    /// Materializes the component, constructing it on first call.
    ///
    /// Fails with [`DiError::AsyncInSyncContext`](crate::DiError::AsyncInSyncContext)
    /// when the underlying provider is asynchronous.
    pub fn get(&self) -> DiResult<Arc<T>> {
        let value = self.core.force_sync()?;
        downcast_value::<T>(value, &self.core.key)
    }

    /// Materializes the component through the async resolution path.
    pub async fn get_async(&self) -> DiResult<Arc<T>> {
        let value = self.core.force_async().await?;
        downcast_value::<T>(value, &self.core.key)
    }

    /// Whether construction already happened.
    pub fn is_materialized(&self) -> bool {
        self.core.is_materialized()
    }
}
