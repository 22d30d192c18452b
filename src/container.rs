//! The container façade: the user-visible object.

use std::future::IntoFuture;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::analyzer::TypeAnalyzer;
use crate::error::{DiResult, DiError};
use crate::internal::context::{snapshot_active, ActiveScopes};
use crate::internal::DisposeBag;
use crate::key::Key;
use crate::lazy::{Lazy, LazyCore};
use crate::provider::{AnyArc, BoxFuture, Callable, Injectable, ResolvedArgs};
use crate::registration::Registration;
use crate::registry::{Blueprint, ComponentRegistry};
use crate::resolver::{
    downcast_capability, downcast_value, Overrides, ResolutionContext, SingletonStore,
};
use crate::scope::ScopeHandle;
use crate::token::TypeToken;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct ContainerInner {
    pub(crate) id: u64,
    pub(crate) registry: Arc<ComponentRegistry>,
    pub(crate) parent: Option<Arc<ContainerInner>>,
    pub(crate) analyzer: TypeAnalyzer,
    pub(crate) singletons: SingletonStore,
    pub(crate) root_disposers: Mutex<DisposeBag>,
    auto_create: AtomicBool,
    shut_down: AtomicBool,
}

impl ContainerInner {
    pub(crate) fn auto_create_enabled(&self) -> bool {
        self.auto_create.load(Ordering::Relaxed)
    }

    fn registry_chain(&self) -> Vec<Arc<ComponentRegistry>> {
        let mut chain = vec![self.registry.clone()];
        let mut cursor = self.parent.clone();
        while let Some(parent) = cursor {
            chain.push(parent.registry.clone());
            cursor = parent.parent.clone();
        }
        chain
    }
}

/// Explicit snapshot of the active scope set, for resolutions that must
/// not depend on the ambient context.
pub struct ScopeSnapshot(pub(crate) ActiveScopes);

/// The dependency-injection container.
///
/// Registration mutates the registry; resolution walks the dependency
/// graph with automatic wiring driven by declared signatures. The
/// container is cheap to clone (`Arc` internally) and safe to share
/// across threads and tasks.
///
/// # Examples
///
/// ```rust
/// use cask_di::{Container, DiResult, Injectable, ParamSpec, Registration, ResolvedArgs,
///               Signature, TypeToken};
/// use std::sync::Arc;
///
/// struct Database {
///     url: String,
/// }
/// impl Injectable for Database {
///     fn signature() -> Signature {
///         Signature::empty()
///     }
///     fn construct(_args: &ResolvedArgs) -> DiResult<Self> {
///         Ok(Database { url: "postgres://localhost".to_string() })
///     }
/// }
///
/// struct UserService {
///     db: Arc<Database>,
/// }
/// impl Injectable for UserService {
///     fn signature() -> Signature {
///         Signature::new(vec![ParamSpec::new("db", TypeToken::of::<Database>())])
///     }
///     fn construct(args: &ResolvedArgs) -> DiResult<Self> {
///         Ok(UserService { db: args.get::<Database>("db")? })
///     }
/// }
///
/// let container = Container::new();
/// container
///     .register(Registration::for_type::<Database>().singleton())
///     .unwrap();
/// container
///     .register(Registration::for_type::<UserService>())
///     .unwrap();
///
/// let service = container.resolve_sync::<UserService>().unwrap();
/// assert_eq!(service.db.url, "postgres://localhost");
/// ```
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Container { inner: self.inner.clone() }
    }
}

impl Container {
    /// An empty root container.
    pub fn new() -> Self {
        Self::build(None)
    }

    fn build(parent: Option<Arc<ContainerInner>>) -> Self {
        let registry = Arc::new(ComponentRegistry::new());
        let mut chain = vec![registry.clone()];
        if let Some(parent) = &parent {
            chain.extend(parent.registry_chain());
        }
        let auto_create = parent
            .as_ref()
            .map(|p| p.auto_create_enabled())
            .unwrap_or(true);
        let inner = ContainerInner {
            id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
            registry,
            parent,
            analyzer: TypeAnalyzer::new(chain),
            singletons: SingletonStore::new(),
            root_disposers: Mutex::new(DisposeBag::default()),
            auto_create: AtomicBool::new(auto_create),
            shut_down: AtomicBool::new(false),
        };
        Container { inner: Arc::new(inner) }
    }

    /// A child container: it shares this container's registry for
    /// lookup but owns its own registrations, singleton cache, and
    /// scope activations. A child's registrations hide, but never
    /// mutate, the parent's.
    pub fn create_child(&self) -> Container {
        Self::build(Some(self.inner.clone()))
    }

    /// Toggles auto-creation of declared-but-unregistered types
    /// (enabled by default; see [`Container::declare`]).
    pub fn set_auto_create(&self, enabled: bool) {
        self.inner.auto_create.store(enabled, Ordering::Relaxed);
    }

    // ----- registration -----

    /// Registers a component described by a [`Registration`] builder.
    pub fn register<T>(&self, registration: Registration<T>) -> DiResult<()> {
        let (descriptor, allow_override) = registration.into_parts();
        let key = descriptor.key().clone();
        self.inner.registry.register(descriptor, allow_override)?;
        // A replaced registration must not serve a stale singleton.
        self.inner.singletons.invalidate(&key);
        Ok(())
    }

    /// Registers `T` as a transient component provided by itself.
    pub fn add_transient<T: Injectable>(&self) -> DiResult<()> {
        self.register(Registration::for_type::<T>())
    }

    /// Registers `T` as a singleton provided by itself.
    pub fn add_singleton<T: Injectable>(&self) -> DiResult<()> {
        self.register(Registration::for_type::<T>().singleton())
    }

    /// Registers `T` as a scoped component under `scope_name`.
    pub fn add_scoped<T: Injectable>(&self, scope_name: &str) -> DiResult<()> {
        self.register(Registration::for_type::<T>().scoped(scope_name))
    }

    /// Registers a pre-built instance under its type's key.
    pub fn add_instance<T: Send + Sync + 'static>(&self, value: T) -> DiResult<()> {
        self.register(Registration::instance(value).singleton())
    }

    /// Declares `T`'s constructor without registering it, making the
    /// type eligible for auto-creation when all of its parameters are
    /// auto-satisfiable.
    pub fn declare<T: Injectable>(&self) {
        let construct = Arc::new(|args: &ResolvedArgs| {
            T::construct(args).map(|value| Arc::new(value) as AnyArc)
        });
        self.inner.registry.declare_blueprint(
            Key::of::<T>(),
            Blueprint { signature: T::signature(), construct },
        );
    }

    /// Binds a forward type name to a concrete token for the analyzer's
    /// forward-reference rule.
    pub fn link_type(&self, name: &str, token: TypeToken) {
        self.inner.registry.link_type(name, token);
    }

    /// Registers a concrete implementation for a generic origin.
    pub fn register_generic(&self, binding: crate::GenericBinding) {
        self.inner.registry.register_generic(binding);
    }

    /// Declares a subtype link used by generic compatibility scoring.
    pub fn link_subtype(&self, child: &str, parent: &str) {
        self.inner.registry.link_subtype(child, parent);
    }

    /// This container's own registry (parent registries are consulted
    /// during resolution but are not reachable through this accessor).
    pub fn registry(&self) -> &ComponentRegistry {
        &self.inner.registry
    }

    /// The analyzer backing this container, for injection-plan and
    /// cycle diagnostics.
    pub fn analyzer(&self) -> &TypeAnalyzer {
        &self.inner.analyzer
    }

    // ----- mapping-style sugar -----

    /// Membership test across this container and its parents.
    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        self.inner.find_descriptor(&key.into()).is_some()
    }

    /// Write-registers an instance under a string key.
    pub fn insert<T: Send + Sync + 'static>(&self, key: &str, value: T) -> DiResult<()> {
        self.register(Registration::instance(value).keyed(key).singleton())
    }

    /// Read-resolves a string key synchronously.
    pub fn get<T: Send + Sync + 'static>(&self, key: impl Into<Key>) -> DiResult<Arc<T>> {
        let key = key.into();
        let value = self.inner.resolve_any_sync(&key, &Overrides::default())?;
        downcast_value::<T>(value, &key)
    }

    /// Removes a registration from this container's own registry.
    pub fn remove(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let removed = self.inner.registry.remove(&key);
        if removed {
            self.inner.singletons.invalidate(&key);
        }
        removed
    }

    // ----- resolution -----

    /// Context-adaptive resolution request for `T`.
    ///
    /// Call [`sync`](ResolveRequest::sync) from synchronous code or
    /// `.await` the request from async code; both produce the same
    /// instance semantics.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> ResolveRequest<'_, T> {
        ResolveRequest::new(self, Key::of::<T>())
    }

    /// Context-adaptive resolution request for a string key.
    pub fn resolve_key<T: Send + Sync + 'static>(&self, key: impl Into<Key>) -> ResolveRequest<'_, T> {
        ResolveRequest::new(self, key.into())
    }

    /// Explicitly synchronous resolution of `T`.
    pub fn resolve_sync<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.resolve::<T>().sync()
    }

    /// Explicitly asynchronous resolution of `T`.
    pub async fn resolve_async<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.resolve::<T>().await
    }

    /// Synchronous resolution of a named alternate.
    pub fn resolve_named_sync<T: Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        self.resolve::<T>().named(name).sync()
    }

    /// Resolves `T`, mapping the explicit null marker (and a plain
    /// miss) to `None`.
    pub fn resolve_optional<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        match self.resolve_sync::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(DiError::NotRegistered { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    /// Synchronous resolution of a capability (trait object).
    pub fn resolve_trait_sync<C: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<C>>
    where
        Arc<C>: 'static,
    {
        let key = Key::of::<C>();
        let value = self.inner.resolve_any_sync(&key, &Overrides::default())?;
        downcast_capability::<C>(value, &key)
    }

    /// Asynchronous resolution of a capability (trait object).
    pub async fn resolve_trait_async<C: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<C>>
    where
        Arc<C>: 'static,
    {
        let key = Key::of::<C>();
        let value = self
            .inner
            .clone()
            .resolve_any_async(&key, &Overrides::default())
            .await?;
        downcast_capability::<C>(value, &key)
    }

    /// A lazy handle for `T`: construction runs on first use of the
    /// handle, once, and the result is cached in the handle.
    pub fn resolve_lazy<T: Send + Sync + 'static>(&self) -> Lazy<T> {
        self.resolve_lazy_key(Key::of::<T>())
    }

    /// A lazy handle for a string key.
    pub fn resolve_lazy_key<T: Send + Sync + 'static>(&self, key: impl Into<Key>) -> Lazy<T> {
        let core = Arc::new(LazyCore::new(self.inner.clone(), key.into(), Overrides::default()));
        Lazy::from_core(core)
    }

    // ----- callables -----

    /// Context-adaptive invocation of a declared callable with injected
    /// arguments.
    pub fn call<'c, R: Send + 'static>(&'c self, callable: &'c Callable<R>) -> CallRequest<'c, R> {
        CallRequest { container: self, callable, overrides: Overrides::default() }
    }

    /// Explicitly synchronous invocation.
    pub fn call_sync<R: Send + 'static>(&self, callable: &Callable<R>) -> DiResult<R> {
        self.inner.call_sync(callable, &Overrides::default())
    }

    /// Explicitly asynchronous invocation.
    pub async fn call_async<R: Send + 'static>(&self, callable: &Callable<R>) -> DiResult<R> {
        self.inner.call_async(callable, &Overrides::default()).await
    }

    // ----- scopes -----

    /// An activation handle for the named scope.
    pub fn scope(&self, name: &str) -> ScopeHandle {
        ScopeHandle { inner: self.inner.clone(), name: Arc::from(name) }
    }

    /// A snapshot of the scopes active on the current execution context,
    /// usable with [`ResolveRequest::with_scope_snapshot`].
    pub fn snapshot_scopes(&self) -> ScopeSnapshot {
        ScopeSnapshot(snapshot_active())
    }

    // ----- lifecycle -----

    /// Disposes every cached singleton in reverse construction order,
    /// awaiting async disposers. Idempotent.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut bag = std::mem::take(&mut *self.inner.root_disposers.lock());
        bag.run_reverse_async().await;
    }

    /// Synchronous shutdown: runs sync disposers in reverse construction
    /// order; async disposers are logged and skipped.
    pub fn shutdown_sync(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut bag = std::mem::take(&mut *self.inner.root_disposers.lock());
        bag.run_reverse_sync();
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1
            && !self.inner.shut_down.load(Ordering::SeqCst)
            && !self.inner.root_disposers.lock().is_empty()
        {
            warn!("container dropped with undisposed singletons; call shutdown() first");
        }
    }
}

/// A context-adaptive resolution request.
///
/// In synchronous code, finish with [`sync`](ResolveRequest::sync); in
/// asynchronous code, `.await` the request. Both honor the same
/// instance semantics; the async form additionally reaches async
/// providers and hooks.
#[must_use = "a resolve request does nothing until .sync() or .await"]
pub struct ResolveRequest<'c, T> {
    container: &'c Container,
    key: Key,
    overrides: Overrides,
    scopes: Option<ActiveScopes>,
    _marker: PhantomData<fn() -> T>,
}

impl<'c, T: Send + Sync + 'static> ResolveRequest<'c, T> {
    fn new(container: &'c Container, key: Key) -> Self {
        ResolveRequest { container, key, overrides: Overrides::default(), scopes: None, _marker: PhantomData }
    }

    /// Selects a named alternate: `<base>:<name>`.
    pub fn named(mut self, name: &str) -> Self {
        self.key = Key::with_name(self.key.base(), Some(name));
        self
    }

    /// Binds an override value to a parameter name. Overrides bypass
    /// injection and apply only to this top-most resolution.
    pub fn with_override(mut self, name: impl Into<String>, value: impl Send + Sync + 'static) -> Self {
        self.overrides = self.overrides.with(name, value);
        self
    }

    /// Replaces the whole override set.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Resolves against an explicit scope snapshot instead of the
    /// ambient active-scope set.
    pub fn with_scope_snapshot(mut self, snapshot: ScopeSnapshot) -> Self {
        self.scopes = Some(snapshot.0);
        self
    }

    /// Resolves on the synchronous path. Reaching an async provider or
    /// hook fails with [`DiError::AsyncInSyncContext`].
    pub fn sync(self) -> DiResult<Arc<T>> {
        let mut ctx = ResolutionContext::with_scopes(false, self.scopes);
        let value = self
            .container
            .inner
            .resolve_entry_sync(&self.key, &self.overrides, &mut ctx)?;
        downcast_value::<T>(value, &self.key)
    }
}

impl<'c, T: Send + Sync + 'static> IntoFuture for ResolveRequest<'c, T> {
    type Output = DiResult<Arc<T>>;
    type IntoFuture = BoxFuture<'c, DiResult<Arc<T>>>;

    fn into_future(self) -> Self::IntoFuture {
        let inner = self.container.inner.clone();
        Box::pin(async move {
            let mut ctx = ResolutionContext::with_scopes(true, self.scopes);
            let value = inner
                .resolve_entry_async(&self.key, &self.overrides, &mut ctx)
                .await?;
            downcast_value::<T>(value, &self.key)
        })
    }
}

/// A context-adaptive callable invocation, mirroring [`ResolveRequest`].
#[must_use = "a call request does nothing until .sync() or .await"]
pub struct CallRequest<'c, R> {
    container: &'c Container,
    callable: &'c Callable<R>,
    overrides: Overrides,
}

impl<'c, R: Send + 'static> CallRequest<'c, R> {
    /// Binds an override value to a parameter name.
    pub fn with_override(mut self, name: impl Into<String>, value: impl Send + Sync + 'static) -> Self {
        self.overrides = self.overrides.with(name, value);
        self
    }

    /// Replaces the whole override set.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Invokes on the synchronous path.
    pub fn sync(self) -> DiResult<R> {
        self.container.inner.call_sync(self.callable, &self.overrides)
    }
}

impl<'c, R: Send + 'static> IntoFuture for CallRequest<'c, R> {
    type Output = DiResult<R>;
    type IntoFuture = BoxFuture<'c, DiResult<R>>;

    fn into_future(self) -> Self::IntoFuture {
        let inner = self.container.inner.clone();
        let overrides = self.overrides;
        let callable = self.callable;
        Box::pin(async move { inner.call_async(callable, &overrides).await })
    }
}

