//! Lifecycle capability traits consumed from user code.
//!
//! Components opt into these hooks at registration time (see
//! [`Registration::with_initializer`](crate::Registration::with_initializer)
//! and friends). `initialize` runs exactly once after construction,
//! before the instance is exposed; `dispose` runs exactly once on scope
//! exit or container shutdown, in reverse construction order, with
//! failures logged and swallowed.

use crate::error::BoxError;

/// Synchronous post-construction initialization.
///
/// A failing `initialize` destroys the fresh instance immediately and
/// surfaces [`DiError::InitializationFailed`](crate::DiError::InitializationFailed)
/// to the resolving caller.
pub trait Initializable: Send + Sync + 'static {
    /// Called exactly once after construction, before the instance is
    /// visible to any other component.
    fn initialize(&self) -> Result<(), BoxError>;
}

/// Asynchronous post-construction initialization.
///
/// Awaited by the async resolution path; reaching one of these from a
/// synchronous resolution fails with
/// [`DiError::AsyncInSyncContext`](crate::DiError::AsyncInSyncContext).
#[async_trait::async_trait]
pub trait AsyncInitializable: Send + Sync + 'static {
    /// Called exactly once after construction.
    async fn initialize(&self) -> Result<(), BoxError>;
}

/// Synchronous teardown.
///
/// # Examples
///
/// ```rust
/// use cask_di::Disposable;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Connection {
///     closed: AtomicUsize,
/// }
///
/// impl Disposable for Connection {
///     fn dispose(&self) {
///         self.closed.fetch_add(1, Ordering::SeqCst);
///     }
/// }
/// ```
pub trait Disposable: Send + Sync + 'static {
    /// Called exactly once when the owning scope or container tears
    /// down. Must be idempotent; panics are caught and logged.
    fn dispose(&self);
}

/// Asynchronous teardown, awaited during async scope exit or container
/// shutdown.
#[async_trait::async_trait]
pub trait AsyncDisposable: Send + Sync + 'static {
    /// Called exactly once during teardown.
    async fn dispose(&self);
}
