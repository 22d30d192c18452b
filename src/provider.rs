//! Providers, declared signatures, and resolved arguments.
//!
//! A provider is the concrete means of producing a component instance:
//! a constructible type, a sync or async factory, a pre-built instance,
//! or the explicit null marker. Constructible types and factories
//! declare a [`Signature`] listing their parameters; the analyzer turns
//! that signature into an injection plan and the resolver delivers the
//! plan's results as [`ResolvedArgs`].

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ahash::AHashMap;

use crate::error::{DiError, DiResult, SharedError};
use crate::key::Key;
use crate::lazy::{Lazy, LazyCore};
use crate::token::TypeToken;

/// Type-erased shared value, the unit of storage for every cache.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Boxed future used across the async seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Marker stored by descriptors that explicitly resolve to nothing.
pub(crate) struct NullMarker;

pub(crate) fn is_null(value: &AnyArc) -> bool {
    value.is::<NullMarker>()
}

/// One declared parameter of a constructor or factory.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    name: &'static str,
    token: TypeToken,
    has_default: bool,
}

impl ParamSpec {
    /// A required parameter with the given type.
    pub fn new(name: &'static str, token: TypeToken) -> Self {
        ParamSpec { name, token, has_default: false }
    }

    /// A parameter the provider can fill itself; the analyzer always
    /// skips it, regardless of its type.
    pub fn with_default(name: &'static str, token: TypeToken) -> Self {
        ParamSpec { name, token, has_default: true }
    }

    /// The parameter name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared type token.
    pub fn token(&self) -> &TypeToken {
        &self.token
    }

    /// Whether the provider supplies its own default for this slot.
    pub fn has_default(&self) -> bool {
        self.has_default
    }
}

/// The declared parameter list of a constructor, factory, or callable.
///
/// # Examples
///
/// ```rust
/// use cask_di::{ParamSpec, Signature, TypeToken};
///
/// struct Cache;
/// struct Store;
///
/// let sig = Signature::new(vec![
///     ParamSpec::new("cache", TypeToken::of::<Cache>()),
///     ParamSpec::new("store", TypeToken::of::<Store>()),
/// ]);
/// assert_eq!(sig.params().len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Signature {
    params: Vec<ParamSpec>,
}

impl Signature {
    /// A signature with the given parameters.
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Signature { params }
    }

    /// A signature with no parameters.
    pub fn empty() -> Self {
        Signature { params: Vec::new() }
    }

    /// The declared parameters, in order.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }
}

pub(crate) enum ArgValue {
    Present(AnyArc),
    /// An optional slot whose inner type could not be provided.
    Absent,
    Deferred(Arc<LazyCore>),
}

/// Arguments delivered to a provider, keyed by parameter name.
///
/// Values arrive type-erased; accessors downcast back to the declared
/// types. Optional slots that could not be provided read as `None`.
#[derive(Default)]
pub struct ResolvedArgs {
    values: AHashMap<&'static str, ArgValue>,
}

impl ResolvedArgs {
    pub(crate) fn insert(&mut self, name: &'static str, value: ArgValue) {
        self.values.insert(name, value);
    }

    /// A required argument.
    ///
    /// Reading a deferred slot forces it on the synchronous path; use
    /// [`get_lazy`](ResolvedArgs::get_lazy) to keep construction
    /// deferred.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        match self.values.get(name) {
            Some(ArgValue::Present(any)) => any.clone().downcast::<T>().map_err(|_| {
                DiError::TypeMismatch {
                    key: Key::new(name),
                    expected: std::any::type_name::<T>(),
                }
            }),
            Some(ArgValue::Deferred(core)) => {
                let value = core.force_sync()?;
                crate::resolver::downcast_value::<T>(value, &Key::new(name))
            }
            Some(ArgValue::Absent) | None => {
                Err(DiError::MissingArgument { parameter: name.to_string() })
            }
        }
    }

    /// An optional argument: `None` when the inner type was unavailable.
    pub fn get_optional<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        match self.values.get(name) {
            Some(ArgValue::Present(any)) => any.clone().downcast::<T>().ok(),
            Some(ArgValue::Deferred(core)) => core
                .force_sync()
                .ok()
                .filter(|value| !is_null(value))
                .and_then(|value| value.downcast::<T>().ok()),
            _ => None,
        }
    }

    /// A capability argument, stored as `Arc<Arc<dyn Trait>>` internally.
    pub fn get_capability<C: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<C>>
    where
        Arc<C>: 'static,
    {
        match self.values.get(name) {
            Some(ArgValue::Present(any)) => any
                .clone()
                .downcast::<Arc<C>>()
                .map(|outer| (*outer).clone())
                .map_err(|_| DiError::TypeMismatch {
                    key: Key::new(name),
                    expected: std::any::type_name::<C>(),
                }),
            Some(ArgValue::Absent) | Some(ArgValue::Deferred(_)) | None => {
                Err(DiError::MissingArgument { parameter: name.to_string() })
            }
        }
    }

    /// A deferred argument delivered as a lazy handle.
    pub fn get_lazy<T: Send + Sync + 'static>(&self, name: &str) -> DiResult<Lazy<T>> {
        match self.values.get(name) {
            Some(ArgValue::Deferred(core)) => Ok(Lazy::from_core(core.clone())),
            _ => Err(DiError::MissingArgument { parameter: name.to_string() }),
        }
    }

    /// Whether an argument was produced for `name` (absent optionals
    /// count as produced).
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

/// A type the container can construct from resolved arguments.
///
/// This is the registration-time stand-in for constructor introspection:
/// the type declares its parameter list once, and the analyzer decides
/// per parameter whether to inject, skip, or fail.
///
/// # Examples
///
/// ```rust
/// use cask_di::{DiResult, Injectable, ParamSpec, ResolvedArgs, Signature, TypeToken};
/// use std::sync::Arc;
///
/// struct Database;
/// impl Injectable for Database {
///     fn signature() -> Signature {
///         Signature::empty()
///     }
///     fn construct(_args: &ResolvedArgs) -> DiResult<Self> {
///         Ok(Database)
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
/// ```
pub trait Injectable: Send + Sync + Sized + 'static {
    /// The declared constructor parameters.
    fn signature() -> Signature;

    /// Builds an instance from resolved arguments.
    fn construct(args: &ResolvedArgs) -> DiResult<Self>;
}

type ConstructFn = Arc<dyn Fn(&ResolvedArgs) -> DiResult<AnyArc> + Send + Sync>;
type AsyncConstructFn =
    Arc<dyn Fn(ResolvedArgs) -> BoxFuture<'static, DiResult<AnyArc>> + Send + Sync>;

/// The tagged provider variant behind a descriptor.
pub(crate) enum ProviderImpl {
    /// A constructible type.
    Type { signature: Signature, construct: ConstructFn },
    /// A synchronous factory.
    FactorySync { signature: Signature, invoke: ConstructFn },
    /// An asynchronous factory; only reachable from async resolution.
    FactoryAsync { signature: Signature, invoke: AsyncConstructFn },
    /// A pre-built instance.
    Instance(AnyArc),
    /// The explicit resolves-to-null marker.
    Null,
}

impl ProviderImpl {
    pub(crate) fn kind(&self) -> ProviderKind {
        match self {
            ProviderImpl::Type { .. } => ProviderKind::Type,
            ProviderImpl::FactorySync { .. } => ProviderKind::FactorySync,
            ProviderImpl::FactoryAsync { .. } => ProviderKind::FactoryAsync,
            ProviderImpl::Instance(_) => ProviderKind::Instance,
            ProviderImpl::Null => ProviderKind::Null,
        }
    }

    pub(crate) fn signature(&self) -> Option<&Signature> {
        match self {
            ProviderImpl::Type { signature, .. }
            | ProviderImpl::FactorySync { signature, .. }
            | ProviderImpl::FactoryAsync { signature, .. } => Some(signature),
            ProviderImpl::Instance(_) | ProviderImpl::Null => None,
        }
    }
}

/// Derived classification of a descriptor's provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// A constructible type.
    Type,
    /// A synchronous factory callable.
    FactorySync,
    /// An asynchronous factory callable.
    FactoryAsync,
    /// A pre-built instance.
    Instance,
    /// The explicit resolves-to-null marker.
    Null,
}

type InitFn = Arc<dyn Fn(&AnyArc) -> Result<(), SharedError> + Send + Sync>;
type AsyncInitFn = Arc<dyn Fn(AnyArc) -> BoxFuture<'static, Result<(), SharedError>> + Send + Sync>;
type DisposeFn = Arc<dyn Fn(&AnyArc) + Send + Sync>;
type AsyncDisposeFn = Arc<dyn Fn(AnyArc) -> BoxFuture<'static, ()> + Send + Sync>;

/// Lifecycle hook adapters captured at registration time, when the
/// concrete type is still known.
#[derive(Clone, Default)]
pub(crate) struct HookSet {
    pub(crate) init: Option<InitFn>,
    pub(crate) init_async: Option<AsyncInitFn>,
    pub(crate) dispose: Option<DisposeFn>,
    pub(crate) dispose_async: Option<AsyncDisposeFn>,
}

impl HookSet {
    pub(crate) fn has_disposer(&self) -> bool {
        self.dispose.is_some() || self.dispose_async.is_some()
    }
}

type CallSyncFn<R> = Arc<dyn Fn(&ResolvedArgs) -> DiResult<R> + Send + Sync>;
type CallAsyncFn<R> = Arc<dyn Fn(ResolvedArgs) -> BoxFuture<'static, DiResult<R>> + Send + Sync>;

pub(crate) enum CallableBody<R> {
    Sync(CallSyncFn<R>),
    Async(CallAsyncFn<R>),
}

/// A user callable with a declared signature, invokable through
/// [`Container::call`](crate::Container::call) with injected arguments.
///
/// # Examples
///
/// ```rust
/// use cask_di::{Callable, Container, ParamSpec, Registration, Signature, TypeToken};
/// use std::sync::Arc;
///
/// struct Greeter;
///
/// let container = Container::new();
/// container
///     .register(Registration::instance(Greeter))
///     .unwrap();
///
/// let hello = Callable::new(
///     "hello",
///     Signature::new(vec![ParamSpec::new("greeter", TypeToken::of::<Greeter>())]),
///     |args| {
///         let _greeter: Arc<Greeter> = args.get("greeter")?;
///         Ok("hi".to_string())
///     },
/// );
/// let out = container.call(&hello).sync().unwrap();
/// assert_eq!(out, "hi");
/// ```
pub struct Callable<R> {
    name: &'static str,
    signature: Signature,
    pub(crate) body: CallableBody<R>,
}

impl<R: Send + 'static> Callable<R> {
    /// A synchronous callable.
    pub fn new<F>(name: &'static str, signature: Signature, f: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> DiResult<R> + Send + Sync + 'static,
    {
        Callable { name, signature, body: CallableBody::Sync(Arc::new(f)) }
    }

    /// An asynchronous callable; invoking it from the sync path fails
    /// with [`DiError::AsyncInSyncContext`].
    pub fn new_async<F, Fut>(name: &'static str, signature: Signature, f: F) -> Self
    where
        F: Fn(ResolvedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<R>> + Send + 'static,
    {
        Callable {
            name,
            signature,
            body: CallableBody::Async(Arc::new(move |args| Box::pin(f(args)))),
        }
    }

    /// The callable's display name, used in error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared parameters.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}
