//! The resolver: graph traversal, scope policy, and context adaptation.
//!
//! Resolution walks the dependency graph descriptor by descriptor:
//! translate the key, check the resolution stack for cycles, enforce the
//! lifetime through the scope machinery, build arguments from the
//! analyzer's plan, invoke the provider, run initialization, and hand
//! the instance over for disposal tracking. Sync and async paths mirror
//! each other; the async path additionally awaits async factories,
//! hooks, and dependencies.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::analyzer::{InjectDecision, InjectResult};
use crate::container::ContainerInner;
use crate::descriptor::ComponentDescriptor;
use crate::error::{DiError, DiResult};
use crate::internal::context::{with_active, ActiveScopes};
use crate::key::Key;
use crate::lazy::LazyCore;
use crate::lifetime::Lifetime;
use crate::provider::{
    is_null, ArgValue, BoxFuture, CallableBody, Callable, ParamSpec, ProviderImpl, ResolvedArgs,
    Signature,
};
use crate::provider::AnyArc;
use crate::registration::null_value;
use crate::scope::ScopeFrame;
use crate::token::{TokenShape, TypeToken};

const MAX_RESOLUTION_DEPTH: usize = 128;

/// Caller-supplied parameter values, bound by parameter name.
///
/// Override values bypass injection entirely: they are never resolved
/// from the registry and apply only to the top-most resolution.
///
/// # Examples
///
/// ```rust
/// use cask_di::Overrides;
///
/// let overrides = Overrides::new().with("retries", 3u32);
/// assert!(!overrides.is_empty());
/// ```
#[derive(Default, Clone)]
pub struct Overrides {
    values: AHashMap<String, AnyArc>,
}

impl Overrides {
    /// An empty override set.
    pub fn new() -> Self {
        Overrides::default()
    }

    /// Binds `value` to the parameter named `name`.
    pub fn with(mut self, name: impl Into<String>, value: impl Send + Sync + 'static) -> Self {
        self.values.insert(name.into(), Arc::new(value));
        self
    }

    /// Binds an already-shared value without re-wrapping it.
    pub fn with_arc<T: Send + Sync + 'static>(mut self, name: impl Into<String>, value: Arc<T>) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Whether no overrides are bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn get(&self, name: &str) -> Option<AnyArc> {
        self.values.get(name).cloned()
    }
}

/// Per-resolution state: the resolving stack for cycle detection, the
/// sync/async mode observed at entry, and an optional explicit scope
/// snapshot.
pub(crate) struct ResolutionContext {
    stack: SmallVec<[Key; 16]>,
    pub(crate) is_async: bool,
    pub(crate) scopes: Option<ActiveScopes>,
}

impl ResolutionContext {
    pub(crate) fn new(is_async: bool) -> Self {
        ResolutionContext { stack: SmallVec::new(), is_async, scopes: None }
    }

    pub(crate) fn with_scopes(is_async: bool, scopes: Option<ActiveScopes>) -> Self {
        ResolutionContext { stack: SmallVec::new(), is_async, scopes }
    }

    /// Pushes a key, detecting cycles in O(depth).
    fn push(&mut self, key: &Key) -> DiResult<()> {
        if let Some(position) = self.stack.iter().position(|k| k == key) {
            let mut path: Vec<Key> = self.stack[position..].to_vec();
            path.push(key.clone());
            return Err(DiError::CircularDependency { path });
        }
        if self.stack.len() >= MAX_RESOLUTION_DEPTH {
            return Err(DiError::DepthExceeded(self.stack.len()));
        }
        self.stack.push(key.clone());
        Ok(())
    }

    fn pop(&mut self) {
        self.stack.pop();
    }
}

/// Per-container singleton cache: one cell and one construction lock
/// per descriptor key, so unrelated singletons never serialize on each
/// other.
pub(crate) struct SingletonStore {
    cells: Mutex<AHashMap<Key, Arc<SingletonCell>>>,
}

pub(crate) struct SingletonCell {
    value: OnceCell<AnyArc>,
    sync_lock: Mutex<()>,
    async_lock: tokio::sync::Mutex<()>,
}

impl SingletonCell {
    /// First-wins commit; returns the stored value and whether this
    /// caller won the insert.
    fn commit(&self, value: AnyArc) -> (AnyArc, bool) {
        let stored = self.value.get_or_init(|| value.clone()).clone();
        let won = Arc::ptr_eq(&stored, &value);
        (stored, won)
    }
}

impl SingletonStore {
    pub(crate) fn new() -> Self {
        SingletonStore { cells: Mutex::new(AHashMap::new()) }
    }

    fn cell(&self, key: &Key) -> Arc<SingletonCell> {
        self.cells
            .lock()
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(SingletonCell {
                    value: OnceCell::new(),
                    sync_lock: Mutex::new(()),
                    async_lock: tokio::sync::Mutex::new(()),
                })
            })
            .clone()
    }

    /// Drops the cached cell for a key whose registration was replaced
    /// or removed; the next resolution constructs fresh.
    pub(crate) fn invalidate(&self, key: &Key) {
        self.cells.lock().remove(key);
    }
}

/// Downcasts an erased value to its concrete type. The explicit null
/// marker reads as not-registered for required consumers.
pub(crate) fn downcast_value<T: Send + Sync + 'static>(value: AnyArc, key: &Key) -> DiResult<Arc<T>> {
    if is_null(&value) {
        return Err(DiError::NotRegistered { key: key.clone() });
    }
    value
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch { key: key.clone(), expected: std::any::type_name::<T>() })
}

/// Downcasts an erased value stored in the `Arc<Arc<dyn Trait>>`
/// capability form.
pub(crate) fn downcast_capability<C: ?Sized + Send + Sync + 'static>(
    value: AnyArc,
    key: &Key,
) -> DiResult<Arc<C>>
where
    Arc<C>: 'static,
{
    if is_null(&value) {
        return Err(DiError::NotRegistered { key: key.clone() });
    }
    value
        .downcast::<Arc<C>>()
        .map(|outer| (*outer).clone())
        .map_err(|_| DiError::TypeMismatch { key: key.clone(), expected: std::any::type_name::<C>() })
}

/// Failures an optional slot absorbs as "not available": the dependency
/// could not be resolved (missing, unresolvable forward name, cyclic,
/// or ambiguous). Scope misuse and provider/initialization failures
/// still propagate.
fn optional_miss(err: &DiError) -> bool {
    matches!(
        err,
        DiError::NotRegistered { .. }
            | DiError::TypeResolutionFailed { .. }
            | DiError::CircularDependency { .. }
            | DiError::AmbiguousInjection { .. }
    )
}

fn capability_name_of(param: &ParamSpec) -> Option<&str> {
    fn from_token(token: &TypeToken) -> Option<&str> {
        match token.shape() {
            TokenShape::Capability { .. } => Some(token.name()),
            TokenShape::Optional(inner) | TokenShape::Deferred(inner) => from_token(inner),
            _ => None,
        }
    }
    from_token(param.token())
}

impl ContainerInner {
    /// Descriptor lookup through the parent chain. Child registrations
    /// hide the parent's; condition-false descriptors are invisible and
    /// fall through.
    pub(crate) fn find_descriptor(&self, key: &Key) -> Option<Arc<ComponentDescriptor>> {
        if let Some(descriptor) = self.registry.get(key) {
            return Some(descriptor);
        }
        self.parent.as_ref().and_then(|parent| parent.find_descriptor(key))
    }

    fn active_frame(&self, ctx: &ResolutionContext, scope_name: &str) -> Option<Arc<ScopeFrame>> {
        match &ctx.scopes {
            Some(snapshot) => snapshot.find(self.id, scope_name),
            None => with_active(|active| active.find(self.id, scope_name)),
        }
    }

    fn innermost_frame(&self, ctx: &ResolutionContext) -> Option<Arc<ScopeFrame>> {
        match &ctx.scopes {
            Some(snapshot) => snapshot.innermost(self.id),
            None => with_active(|active| active.innermost(self.id)),
        }
    }

    // ----- sync path -----

    pub(crate) fn resolve_any_sync(
        self: &Arc<Self>,
        key: &Key,
        overrides: &Overrides,
    ) -> DiResult<AnyArc> {
        let mut ctx = ResolutionContext::new(false);
        self.resolve_entry_sync(key, overrides, &mut ctx)
    }

    pub(crate) fn resolve_entry_sync(
        self: &Arc<Self>,
        key: &Key,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        ctx.push(key)?;
        let result = self.resolve_body_sync(key, overrides, ctx);
        ctx.pop();
        result.map_err(|e| e.attribute_to(key))
    }

    fn resolve_body_sync(
        self: &Arc<Self>,
        key: &Key,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        let Some(descriptor) = self.find_descriptor(key) else {
            return self.auto_create_sync(key, overrides, ctx);
        };
        debug!(key = %key, lifetime = ?descriptor.lifetime, is_async = ctx.is_async, "resolving");
        match descriptor.lifetime {
            Lifetime::Singleton => self.resolve_singleton_sync(&descriptor, key, overrides, ctx),
            Lifetime::Scoped => self.resolve_scoped_sync(&descriptor, key, overrides, ctx),
            Lifetime::Transient => {
                let value = self.construct_sync(&descriptor, overrides, ctx)?;
                if descriptor.hooks.has_disposer() {
                    if let Some(frame) = self.innermost_frame(ctx) {
                        frame.track(key.clone(), value.clone(), descriptor.hooks.clone());
                    }
                }
                Ok(value)
            }
        }
    }

    fn auto_create_sync(
        self: &Arc<Self>,
        key: &Key,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        if self.auto_create_enabled() {
            if let Some(blueprint) = self.analyzer.chain_blueprint(key) {
                if self.analyzer.can_auto_create(key) {
                    debug!(key = %key, "auto-creating unregistered type");
                    let args = self.build_args_sync(&blueprint.signature, overrides, ctx)?;
                    return (blueprint.construct)(&args).map_err(|e| e.attribute_to(key));
                }
            }
        }
        Err(DiError::NotRegistered { key: key.clone() })
    }

    fn resolve_singleton_sync(
        self: &Arc<Self>,
        descriptor: &Arc<ComponentDescriptor>,
        key: &Key,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        let cell = self.singletons.cell(key);
        if let Some(value) = cell.value.get() {
            return Ok(value.clone());
        }
        let _guard = cell.sync_lock.lock();
        if let Some(value) = cell.value.get() {
            return Ok(value.clone());
        }
        let value = self.construct_sync(descriptor, overrides, ctx)?;
        let (stored, won) = cell.commit(value);
        if won && descriptor.hooks.has_disposer() {
            self.root_disposers
                .lock()
                .track(key.clone(), stored.clone(), descriptor.hooks.clone());
        }
        Ok(stored)
    }

    fn resolve_scoped_sync(
        self: &Arc<Self>,
        descriptor: &Arc<ComponentDescriptor>,
        key: &Key,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        let scope_name = descriptor
            .scope_name
            .as_ref()
            .expect("scoped descriptor carries a scope name");
        let Some(frame) = self.active_frame(ctx, scope_name) else {
            return Err(DiError::ScopeInactive {
                scope: scope_name.to_string(),
                key: key.clone(),
            });
        };
        if let Some(value) = frame.get(key) {
            return Ok(value);
        }
        let value = self.construct_sync(descriptor, overrides, ctx)?;
        let (stored, won) = frame.commit(key, value);
        if won && descriptor.hooks.has_disposer() {
            frame.track(key.clone(), stored.clone(), descriptor.hooks.clone());
        }
        Ok(stored)
    }

    fn construct_sync(
        self: &Arc<Self>,
        descriptor: &Arc<ComponentDescriptor>,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        let key = &descriptor.key;
        let value = match &descriptor.provider {
            ProviderImpl::Instance(value) => return Ok(value.clone()),
            ProviderImpl::Null => return Ok(null_value()),
            ProviderImpl::Type { signature, construct: invoke }
            | ProviderImpl::FactorySync { signature, invoke } => {
                // An async initialize hook makes the whole construction
                // async; gate before invoking the provider.
                if descriptor.hooks.init_async.is_some() {
                    return Err(DiError::AsyncInSyncContext { key: key.clone() });
                }
                let args = self.build_args_sync(signature, overrides, ctx)?;
                invoke(&args).map_err(|e| e.attribute_to(key))?
            }
            ProviderImpl::FactoryAsync { .. } => {
                return Err(DiError::AsyncInSyncContext { key: key.clone() });
            }
        };
        if let Some(init) = &descriptor.hooks.init {
            if let Err(source) = init(&value) {
                self.destroy_after_failed_init(descriptor, &value);
                return Err(DiError::InitializationFailed { key: key.clone(), source });
            }
        }
        Ok(value)
    }

    fn destroy_after_failed_init(&self, descriptor: &ComponentDescriptor, value: &AnyArc) {
        if let Some(dispose) = &descriptor.hooks.dispose {
            let result = catch_unwind(AssertUnwindSafe(|| dispose(value)));
            if result.is_err() {
                warn!(key = %descriptor.key, "dispose hook panicked while destroying a failed instance");
            }
        }
    }

    fn build_args_sync(
        self: &Arc<Self>,
        signature: &Signature,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<ResolvedArgs> {
        let plan = self.analyzer.injection_plan(signature);
        let mut args = ResolvedArgs::default();
        for (param, result) in signature.params().iter().zip(plan) {
            if let Some(value) = overrides.get(param.name()) {
                args.insert(param.name(), ArgValue::Present(value));
                continue;
            }
            if let Some(slot) = self.deferred_slot(param, &result) {
                args.insert(param.name(), slot);
                continue;
            }
            match result.decision {
                InjectDecision::Skip => {}
                InjectDecision::Inject => {
                    let value = self.resolve_slot_sync(param, &result, ctx)?;
                    if is_null(&value) {
                        return Err(DiError::NotRegistered { key: slot_key(param, &result) });
                    }
                    args.insert(param.name(), ArgValue::Present(value));
                }
                InjectDecision::Optional => {
                    let slot = match self.resolve_slot_sync(param, &result, ctx) {
                        Ok(value) if is_null(&value) => ArgValue::Absent,
                        Ok(value) => ArgValue::Present(value),
                        Err(err) if optional_miss(&err) => ArgValue::Absent,
                        Err(other) => return Err(other),
                    };
                    args.insert(param.name(), slot);
                }
                InjectDecision::Ambiguous => {
                    return Err(ambiguity_error(param, result));
                }
            }
        }
        Ok(args)
    }

    fn resolve_slot_sync(
        self: &Arc<Self>,
        param: &ParamSpec,
        result: &InjectResult,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        let dep_key = slot_key(param, result);
        let value = self.resolve_entry_sync(&dep_key, &Overrides::default(), ctx)?;
        self.apply_capability_cast(param, &dep_key, value)
    }

    /// Lazy slots: declared `Deferred` parameters, and dependencies whose
    /// descriptor is marked lazy. Both receive a thunk capturing the
    /// resolver, key, and (empty nested) overrides.
    fn deferred_slot(self: &Arc<Self>, param: &ParamSpec, result: &InjectResult) -> Option<ArgValue> {
        if !result.should_provide() {
            return None;
        }
        let dep_key = slot_key(param, result);
        let declared_deferred = matches!(param.token().shape(), TokenShape::Deferred(_));
        let lazy_descriptor = self
            .find_descriptor(&dep_key)
            .map(|d| d.lazy)
            .unwrap_or(false);
        if declared_deferred || lazy_descriptor {
            let core = Arc::new(LazyCore::new(Arc::clone(self), dep_key, Overrides::default()));
            Some(ArgValue::Deferred(core))
        } else {
            None
        }
    }

    fn apply_capability_cast(
        &self,
        param: &ParamSpec,
        dep_key: &Key,
        value: AnyArc,
    ) -> DiResult<AnyArc> {
        let Some(capability) = capability_name_of(param) else {
            return Ok(value);
        };
        // A value registered directly under the capability key is
        // already stored in capability form.
        if dep_key == &Key::new(capability) {
            return Ok(value);
        }
        let descriptor = self
            .find_descriptor(dep_key)
            .ok_or_else(|| DiError::NotRegistered { key: dep_key.clone() })?;
        let cast = descriptor.capability_cast(capability).ok_or_else(|| {
            DiError::TypeMismatch { key: dep_key.clone(), expected: "declared capability cast" }
        })?;
        cast(&value).ok_or_else(|| DiError::TypeMismatch {
            key: dep_key.clone(),
            expected: "declared capability cast",
        })
    }

    // ----- async path -----

    pub(crate) async fn resolve_any_async(
        self: Arc<Self>,
        key: &Key,
        overrides: &Overrides,
    ) -> DiResult<AnyArc> {
        let mut ctx = ResolutionContext::new(true);
        self.resolve_entry_async(key, overrides, &mut ctx).await
    }

    pub(crate) fn resolve_entry_async<'a>(
        self: &'a Arc<Self>,
        key: &'a Key,
        overrides: &'a Overrides,
        ctx: &'a mut ResolutionContext,
    ) -> BoxFuture<'a, DiResult<AnyArc>> {
        Box::pin(async move {
            ctx.push(key)?;
            let result = self.resolve_body_async(key, overrides, ctx).await;
            ctx.pop();
            result.map_err(|e| e.attribute_to(key))
        })
    }

    async fn resolve_body_async(
        self: &Arc<Self>,
        key: &Key,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        let Some(descriptor) = self.find_descriptor(key) else {
            return self.auto_create_async(key, overrides, ctx).await;
        };
        debug!(key = %key, lifetime = ?descriptor.lifetime, is_async = ctx.is_async, "resolving");
        match descriptor.lifetime {
            Lifetime::Singleton => {
                self.resolve_singleton_async(&descriptor, key, overrides, ctx).await
            }
            Lifetime::Scoped => self.resolve_scoped_async(&descriptor, key, overrides, ctx).await,
            Lifetime::Transient => {
                let value = self.construct_async(&descriptor, overrides, ctx).await?;
                if descriptor.hooks.has_disposer() {
                    if let Some(frame) = self.innermost_frame(ctx) {
                        frame.track(key.clone(), value.clone(), descriptor.hooks.clone());
                    }
                }
                Ok(value)
            }
        }
    }

    async fn auto_create_async(
        self: &Arc<Self>,
        key: &Key,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        if self.auto_create_enabled() {
            if let Some(blueprint) = self.analyzer.chain_blueprint(key) {
                if self.analyzer.can_auto_create(key) {
                    debug!(key = %key, "auto-creating unregistered type (async)");
                    let args = self.build_args_async(&blueprint.signature, overrides, ctx).await?;
                    return (blueprint.construct)(&args).map_err(|e| e.attribute_to(key));
                }
            }
        }
        Err(DiError::NotRegistered { key: key.clone() })
    }

    async fn resolve_singleton_async(
        self: &Arc<Self>,
        descriptor: &Arc<ComponentDescriptor>,
        key: &Key,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        let cell = self.singletons.cell(key);
        if let Some(value) = cell.value.get() {
            return Ok(value.clone());
        }
        // Async-aware construction lock; never a blocking lock across a
        // suspension point.
        let _guard = cell.async_lock.lock().await;
        if let Some(value) = cell.value.get() {
            return Ok(value.clone());
        }
        let value = self.construct_async(descriptor, overrides, ctx).await?;
        let (stored, won) = cell.commit(value);
        if won && descriptor.hooks.has_disposer() {
            self.root_disposers
                .lock()
                .track(key.clone(), stored.clone(), descriptor.hooks.clone());
        }
        Ok(stored)
    }

    async fn resolve_scoped_async(
        self: &Arc<Self>,
        descriptor: &Arc<ComponentDescriptor>,
        key: &Key,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        let scope_name = descriptor
            .scope_name
            .as_ref()
            .expect("scoped descriptor carries a scope name");
        let Some(frame) = self.active_frame(ctx, scope_name) else {
            return Err(DiError::ScopeInactive {
                scope: scope_name.to_string(),
                key: key.clone(),
            });
        };
        if let Some(value) = frame.get(key) {
            return Ok(value);
        }
        let value = self.construct_async(descriptor, overrides, ctx).await?;
        let (stored, won) = frame.commit(key, value);
        if won && descriptor.hooks.has_disposer() {
            frame.track(key.clone(), stored.clone(), descriptor.hooks.clone());
        }
        Ok(stored)
    }

    async fn construct_async(
        self: &Arc<Self>,
        descriptor: &Arc<ComponentDescriptor>,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        let key = &descriptor.key;
        let value = match &descriptor.provider {
            ProviderImpl::Instance(value) => return Ok(value.clone()),
            ProviderImpl::Null => return Ok(null_value()),
            ProviderImpl::Type { signature, construct: invoke }
            | ProviderImpl::FactorySync { signature, invoke } => {
                let args = self.build_args_async(signature, overrides, ctx).await?;
                invoke(&args).map_err(|e| e.attribute_to(key))?
            }
            ProviderImpl::FactoryAsync { signature, invoke } => {
                let args = self.build_args_async(signature, overrides, ctx).await?;
                invoke(args).await.map_err(|e| e.attribute_to(key))?
            }
        };
        if let Some(init) = &descriptor.hooks.init {
            if let Err(source) = init(&value) {
                self.destroy_after_failed_init(descriptor, &value);
                return Err(DiError::InitializationFailed { key: key.clone(), source });
            }
        }
        if let Some(init) = &descriptor.hooks.init_async {
            if let Err(source) = init(value.clone()).await {
                self.destroy_after_failed_init(descriptor, &value);
                return Err(DiError::InitializationFailed { key: key.clone(), source });
            }
        }
        Ok(value)
    }

    async fn build_args_async(
        self: &Arc<Self>,
        signature: &Signature,
        overrides: &Overrides,
        ctx: &mut ResolutionContext,
    ) -> DiResult<ResolvedArgs> {
        let plan = self.analyzer.injection_plan(signature);
        let mut args = ResolvedArgs::default();
        for (param, result) in signature.params().iter().zip(plan) {
            if let Some(value) = overrides.get(param.name()) {
                args.insert(param.name(), ArgValue::Present(value));
                continue;
            }
            if let Some(slot) = self.deferred_slot(param, &result) {
                args.insert(param.name(), slot);
                continue;
            }
            match result.decision {
                InjectDecision::Skip => {}
                InjectDecision::Inject => {
                    let value = self.resolve_slot_async(param, &result, ctx).await?;
                    if is_null(&value) {
                        return Err(DiError::NotRegistered { key: slot_key(param, &result) });
                    }
                    args.insert(param.name(), ArgValue::Present(value));
                }
                InjectDecision::Optional => {
                    let slot = match self.resolve_slot_async(param, &result, ctx).await {
                        Ok(value) if is_null(&value) => ArgValue::Absent,
                        Ok(value) => ArgValue::Present(value),
                        Err(err) if optional_miss(&err) => ArgValue::Absent,
                        Err(other) => return Err(other),
                    };
                    args.insert(param.name(), slot);
                }
                InjectDecision::Ambiguous => {
                    return Err(ambiguity_error(param, result));
                }
            }
        }
        Ok(args)
    }

    async fn resolve_slot_async(
        self: &Arc<Self>,
        param: &ParamSpec,
        result: &InjectResult,
        ctx: &mut ResolutionContext,
    ) -> DiResult<AnyArc> {
        let dep_key = slot_key(param, result);
        let empty = Overrides::default();
        let value = self.resolve_entry_async(&dep_key, &empty, ctx).await?;
        self.apply_capability_cast(param, &dep_key, value)
    }

    // ----- callables -----

    pub(crate) fn call_sync<R: Send + 'static>(
        self: &Arc<Self>,
        callable: &Callable<R>,
        overrides: &Overrides,
    ) -> DiResult<R> {
        match &callable.body {
            CallableBody::Sync(f) => {
                let mut ctx = ResolutionContext::new(false);
                let args = self.build_args_sync(callable.signature(), overrides, &mut ctx)?;
                f(&args)
            }
            CallableBody::Async(_) => {
                Err(DiError::AsyncInSyncContext { key: Key::new(callable.name()) })
            }
        }
    }

    pub(crate) async fn call_async<R: Send + 'static>(
        self: &Arc<Self>,
        callable: &Callable<R>,
        overrides: &Overrides,
    ) -> DiResult<R> {
        let mut ctx = ResolutionContext::new(true);
        let args = self.build_args_async(callable.signature(), overrides, &mut ctx).await?;
        match &callable.body {
            CallableBody::Sync(f) => f(&args),
            CallableBody::Async(f) => f(args).await,
        }
    }
}

fn slot_key(param: &ParamSpec, result: &InjectResult) -> Key {
    if let Some(target) = &result.target {
        return target.clone();
    }
    match (&result.inner, param.token().shape()) {
        (Some(inner), _) => inner.key(),
        (None, TokenShape::Deferred(inner)) => inner.key(),
        _ => param.token().key(),
    }
}

fn ambiguity_error(param: &ParamSpec, result: InjectResult) -> DiError {
    if matches!(param.token().shape(), TokenShape::Forward(_)) && result.candidates.is_empty() {
        return DiError::TypeResolutionFailed { name: param.token().name().to_string() };
    }
    DiError::AmbiguousInjection {
        parameter: param.name().to_string(),
        candidates: result.candidates,
    }
}
