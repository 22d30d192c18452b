//! Error types for the dependency injection runtime.

use std::sync::Arc;

use thiserror::Error;

use crate::key::Key;

/// Boxed error type accepted from user-provided hooks and factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared error type carried inside [`DiError`] so errors stay cloneable.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

fn fmt_path(path: &[Key]) -> String {
    path.iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn fmt_candidates(candidates: &[Key]) -> String {
    candidates
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Dependency injection errors.
///
/// Every predictable failure in the container surfaces as one of these
/// variants; the runtime never panics for missing registrations, scope
/// misuse, or provider failures. Disposal failures are the one exception
/// to the propagation rule: they are logged and swallowed so scope
/// cleanup always makes progress.
///
/// # Examples
///
/// ```rust
/// use cask_di::{Container, DiError};
///
/// struct Database;
///
/// let container = Container::new();
/// match container.resolve_sync::<Database>() {
///     Err(DiError::NotRegistered { key }) => {
///         assert_eq!(key.as_str(), "Database");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum DiError {
    /// Lookup missed and auto-creation was not possible.
    #[error("component '{key}' is not registered")]
    NotRegistered {
        /// The canonical key that missed.
        key: Key,
    },

    /// Duplicate key registered without `allow_override`.
    #[error("component '{key}' is already registered; use allow_override to replace it")]
    AlreadyRegistered {
        /// The canonical key that collided.
        key: Key,
    },

    /// The analyzer found two or more candidates for one injection slot.
    #[error("ambiguous injection for parameter '{parameter}': candidates [{}]", fmt_candidates(.candidates))]
    AmbiguousInjection {
        /// The offending parameter name.
        parameter: String,
        /// Every candidate the analyzer discovered, sorted.
        candidates: Vec<Key>,
    },

    /// The resolution stack repeated a key.
    #[error("circular dependency detected: {}", fmt_path(.path))]
    CircularDependency {
        /// The full cycle path, first repeated key at both ends.
        path: Vec<Key>,
    },

    /// A scoped descriptor was resolved outside an active matching scope.
    #[error("scope '{scope}' must be active to resolve '{key}'")]
    ScopeInactive {
        /// The scope name the descriptor belongs to.
        scope: String,
        /// The key being resolved.
        key: Key,
    },

    /// A scope name was activated twice on the same execution context.
    #[error("scope '{scope}' is already active on this context")]
    ScopeReentry {
        /// The scope name.
        scope: String,
    },

    /// An async provider was reached from a synchronous resolution path.
    #[error("component '{key}' has an async provider; use resolve_async() or await the resolve request")]
    AsyncInSyncContext {
        /// The component that needs the async API.
        key: Key,
    },

    /// A user `initialize` hook failed; the fresh instance was destroyed.
    #[error("initialization of '{key}' failed: {source}")]
    InitializationFailed {
        /// The component whose hook failed.
        key: Key,
        /// The underlying cause.
        #[source]
        source: SharedError,
    },

    /// A user constructor or factory failed.
    #[error("provider for '{key}' failed: {source}")]
    ProviderFailed {
        /// The component whose provider failed.
        key: Key,
        /// The underlying cause.
        #[source]
        source: SharedError,
    },

    /// A forward type reference could not be resolved at analysis time.
    #[error("cannot resolve forward type reference '{name}'")]
    TypeResolutionFailed {
        /// The unresolved name.
        name: String,
    },

    /// A stored value failed to downcast to the requested type.
    #[error("type mismatch for '{key}': stored value is not a {expected}")]
    TypeMismatch {
        /// The key whose value mismatched.
        key: Key,
        /// The requested Rust type.
        expected: &'static str,
    },

    /// A provider asked for an argument the resolver never produced.
    #[error("argument '{parameter}' was not resolved for this construction")]
    MissingArgument {
        /// The parameter name.
        parameter: String,
    },

    /// The resolution recursed past the depth guard.
    #[error("maximum resolution depth {0} exceeded")]
    DepthExceeded(usize),
}

impl DiError {
    /// Wraps an arbitrary user error as a provider failure.
    ///
    /// Factories and constructors return [`DiResult`]; failures that are
    /// not DI errors themselves go through here. The resolver fills in
    /// the component key before the error reaches the caller.
    pub fn provider_failure(err: impl Into<BoxError>) -> Self {
        DiError::ProviderFailed {
            key: Key::unresolved(),
            source: Arc::from(err.into()),
        }
    }

    pub(crate) fn attribute_to(self, key: &Key) -> Self {
        match self {
            DiError::ProviderFailed { key: k, source } if k.is_unresolved() => {
                DiError::ProviderFailed { key: key.clone(), source }
            }
            other => other,
        }
    }
}

/// Result type for DI operations.
pub type DiResult<T> = Result<T, DiError>;
