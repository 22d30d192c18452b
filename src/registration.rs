//! Fluent registration builder.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use ahash::AHashMap;

use crate::descriptor::{CapabilityCast, ComponentDescriptor, Condition};
use crate::error::DiResult;
use crate::key::{simple_name, Key};
use crate::lifecycle::{AsyncDisposable, AsyncInitializable, Disposable, Initializable};
use crate::lifetime::Lifetime;
use crate::provider::{
    AnyArc, HookSet, Injectable, NullMarker, ProviderImpl, ResolvedArgs, Signature,
};
use crate::token::TypeToken;

/// Builder describing one component registration.
///
/// Start from one of the provider constructors
/// ([`for_type`](Registration::for_type), [`instance`](Registration::instance),
/// [`factory`](Registration::factory), [`async_factory`](Registration::async_factory),
/// [`null`](Registration::null)), layer on options, and hand the result
/// to [`Container::register`](crate::Container::register).
///
/// # Examples
///
/// ```rust
/// use cask_di::{Container, DiResult, Injectable, Registration, ResolvedArgs, Signature};
///
/// struct Cache;
/// impl Injectable for Cache {
///     fn signature() -> Signature {
///         Signature::empty()
///     }
///     fn construct(_args: &ResolvedArgs) -> DiResult<Self> {
///         Ok(Cache)
///     }
/// }
///
/// let container = Container::new();
/// container
///     .register(
///         Registration::for_type::<Cache>()
///             .singleton()
///             .tag("infrastructure"),
///     )
///     .unwrap();
/// assert!(container.contains_key("Cache"));
/// ```
pub struct Registration<T = ()> {
    base_key: Option<String>,
    name: Option<String>,
    component_type: TypeToken,
    provider: ProviderImpl,
    hooks: HookSet,
    lifetime: Lifetime,
    scope_name: Option<String>,
    condition: Option<Condition>,
    tags: Vec<String>,
    lazy: bool,
    metadata: AHashMap<String, String>,
    allow_override: bool,
    capabilities: Vec<(Arc<str>, CapabilityCast)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Registration<T> {
    fn from_provider(component_type: TypeToken, provider: ProviderImpl) -> Self {
        Registration {
            base_key: None,
            name: None,
            component_type,
            provider,
            hooks: HookSet::default(),
            lifetime: Lifetime::Transient,
            scope_name: None,
            condition: None,
            tags: Vec::new(),
            lazy: false,
            metadata: AHashMap::new(),
            allow_override: false,
            capabilities: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl Registration {
    /// Starts a registration of a constructible type as its own
    /// provider.
    pub fn for_type<T: Injectable>() -> Registration<T> {
        let construct = Arc::new(|args: &ResolvedArgs| {
            T::construct(args).map(|value| Arc::new(value) as AnyArc)
        });
        Registration::from_provider(
            TypeToken::of::<T>(),
            ProviderImpl::Type { signature: T::signature(), construct },
        )
    }

    /// Starts a registration of a pre-built instance.
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Registration<T> {
        Registration::from_provider(
            TypeToken::of::<T>(),
            ProviderImpl::Instance(Arc::new(value)),
        )
    }

    /// Starts a registration of a synchronous factory producing `T`.
    pub fn factory<T, F>(signature: Signature, f: F) -> Registration<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolvedArgs) -> DiResult<T> + Send + Sync + 'static,
    {
        let invoke =
            Arc::new(move |args: &ResolvedArgs| f(args).map(|value| Arc::new(value) as AnyArc));
        Registration::from_provider(
            TypeToken::of::<T>(),
            ProviderImpl::FactorySync { signature, invoke },
        )
    }

    /// Starts a registration of an asynchronous factory producing `T`.
    /// Components built this way are reachable only through the async
    /// resolution path.
    pub fn async_factory<T, F, Fut>(signature: Signature, f: F) -> Registration<T>
    where
        T: Send + Sync + 'static,
        F: Fn(ResolvedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        let invoke = Arc::new(move |args: ResolvedArgs| {
            let fut = f(args);
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as AnyArc) })
                as crate::provider::BoxFuture<'static, DiResult<AnyArc>>
        });
        Registration::from_provider(
            TypeToken::of::<T>(),
            ProviderImpl::FactoryAsync { signature, invoke },
        )
    }
}

impl<T: Send + Sync + 'static> Registration<T> {
    /// Declares that this component satisfies capability `C`, with the
    /// coercion from the concrete type. Capability consumers declare
    /// their parameter with [`TypeToken::capability`] and receive an
    /// `Arc<C>` through [`ResolvedArgs::get_capability`].
    ///
    /// ```rust,ignore
    /// Registration::for_type::<ConsoleLogger>()
    ///     .implements::<dyn Logger>(|svc| svc)
    /// ```
    pub fn implements<C: ?Sized + Send + Sync + 'static>(
        mut self,
        cast: fn(Arc<T>) -> Arc<C>,
    ) -> Self {
        let name: Arc<str> = Arc::from(simple_name(std::any::type_name::<C>()));
        let adapter: CapabilityCast = Arc::new(move |any: &AnyArc| {
            any.clone()
                .downcast::<T>()
                .ok()
                .map(|concrete| Arc::new(cast(concrete)) as AnyArc)
        });
        self.capabilities.push((name, adapter));
        self
    }

    /// Runs [`Initializable::initialize`] exactly once after
    /// construction, before the instance is exposed.
    pub fn with_initializer(mut self) -> Self
    where
        T: Initializable,
    {
        self.hooks.init = Some(Arc::new(|any: &AnyArc| match any.clone().downcast::<T>() {
            Ok(svc) => svc.initialize().map_err(Arc::from),
            Err(_) => Err(Arc::from(crate::error::BoxError::from(
                "initializer hook saw an unexpected concrete type",
            ))),
        }));
        self
    }

    /// Awaits [`AsyncInitializable::initialize`] on the async path.
    pub fn with_async_initializer(mut self) -> Self
    where
        T: AsyncInitializable,
    {
        self.hooks.init_async = Some(Arc::new(|any: AnyArc| {
            Box::pin(async move {
                match any.downcast::<T>() {
                    Ok(svc) => svc.initialize().await.map_err(Arc::from),
                    Err(_) => Err(Arc::from(crate::error::BoxError::from(
                        "initializer hook saw an unexpected concrete type",
                    ))),
                }
            }) as crate::provider::BoxFuture<'static, Result<(), crate::error::SharedError>>
        }));
        self
    }

    /// Runs [`Disposable::dispose`] exactly once during teardown.
    pub fn with_disposer(mut self) -> Self
    where
        T: Disposable,
    {
        self.hooks.dispose = Some(Arc::new(|any: &AnyArc| {
            if let Ok(svc) = any.clone().downcast::<T>() {
                svc.dispose();
            }
        }));
        self
    }

    /// Awaits [`AsyncDisposable::dispose`] during async teardown.
    pub fn with_async_disposer(mut self) -> Self
    where
        T: AsyncDisposable,
    {
        self.hooks.dispose_async = Some(Arc::new(|any: AnyArc| {
            Box::pin(async move {
                if let Ok(svc) = any.downcast::<T>() {
                    svc.dispose().await;
                }
            }) as crate::provider::BoxFuture<'static, ()>
        }));
        self
    }
}

impl Registration<()> {
    /// Registers a pre-built capability value under the capability's
    /// canonical name (e.g. `Logger` for `dyn Logger`).
    pub fn capability_instance<C: ?Sized + Send + Sync + 'static>(value: Arc<C>) -> Self {
        let token = TypeToken::capability::<C>();
        Registration::from_provider(token, ProviderImpl::Instance(Arc::new(value)))
    }

    /// Registers an explicit resolves-to-null marker under `key`.
    /// Resolvable through [`Container::resolve_optional`](crate::Container::resolve_optional);
    /// optional injection slots read it as `None`.
    pub fn null(key: impl Into<String>) -> Self {
        let mut reg = Registration::from_provider(TypeToken::untyped(), ProviderImpl::Null);
        reg.base_key = Some(key.into());
        reg
    }
}

impl<T> Registration<T> {
    /// Overrides the canonical base key (defaults to the component
    /// type's simple name).
    pub fn keyed(mut self, key: impl Into<String>) -> Self {
        self.base_key = Some(key.into());
        self
    }

    /// Marks this registration as a named alternate; the canonical key
    /// becomes `<base>:<name>`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// One instance per container.
    pub fn singleton(mut self) -> Self {
        self.lifetime = Lifetime::Singleton;
        self.scope_name = None;
        self
    }

    /// A fresh instance per resolution (the default).
    pub fn transient(mut self) -> Self {
        self.lifetime = Lifetime::Transient;
        self.scope_name = None;
        self
    }

    /// One instance per activation of the named scope.
    pub fn scoped(mut self, scope_name: impl Into<String>) -> Self {
        self.lifetime = Lifetime::Scoped;
        self.scope_name = Some(scope_name.into());
        self
    }

    /// Gates visibility behind a predicate, evaluated at every lookup.
    pub fn condition(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(predicate));
        self
    }

    /// Adds a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Adds several tags.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Defers construction until first use through a thunk.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Attaches a free-form metadata entry (e.g. `priority`).
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Permits replacing an existing registration with the same key.
    pub fn allow_override(mut self) -> Self {
        self.allow_override = true;
        self
    }

    pub(crate) fn into_parts(self) -> (ComponentDescriptor, bool) {
        let base = self
            .base_key
            .unwrap_or_else(|| self.component_type.name().to_string());
        let key = Key::with_name(&base, self.name.as_deref());
        let descriptor = ComponentDescriptor {
            key,
            component_type: self.component_type,
            provider: self.provider,
            hooks: self.hooks,
            lifetime: self.lifetime,
            scope_name: self.scope_name.map(|s| Arc::from(s.as_str())),
            name: self.name.map(|s| Arc::from(s.as_str())),
            condition: self.condition,
            tags: self.tags.iter().map(|t| Arc::from(t.as_str())).collect(),
            lazy: self.lazy,
            metadata: self.metadata,
            capabilities: self.capabilities,
        };
        (descriptor, self.allow_override)
    }
}

/// Null-provider constructions keep returning a marker so optional
/// consumers observe "registered, resolves to nothing".
pub(crate) fn null_value() -> AnyArc {
    Arc::new(NullMarker)
}
