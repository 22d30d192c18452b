//! # cask-di
//!
//! Scope-aware, analyzer-driven dependency injection for Rust.
//!
//! The container instantiates an application's object graph on demand
//! with automatic wiring based on declared types. Four subsystems carry
//! the load:
//!
//! - **Registry** — the single source of truth for component
//!   declarations, with reverse indices by type, tag, lifetime, and
//!   capability.
//! - **Type analyzer** — decides, per declared parameter, whether the
//!   runtime injects it, skips it, injects it optionally, or reports an
//!   ambiguity, following a fixed rule order.
//! - **Resolver** — walks the dependency graph, detecting cycles,
//!   enforcing lifetimes, and adapting to sync or async callers.
//! - **Scope manager** — caches instances inside named, LIFO-activated
//!   scopes and disposes them in reverse construction order on exit.
//!
//! ## Quick start
//!
//! ```rust
//! use cask_di::{Container, DiResult, Injectable, ParamSpec, Registration, ResolvedArgs,
//!               Signature, TypeToken};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! impl Injectable for Database {
//!     fn signature() -> Signature {
//!         Signature::empty()
//!     }
//!     fn construct(_args: &ResolvedArgs) -> DiResult<Self> {
//!         Ok(Database { connection_string: "postgres://localhost".to_string() })
//!     }
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn signature() -> Signature {
//!         Signature::new(vec![ParamSpec::new("db", TypeToken::of::<Database>())])
//!     }
//!     fn construct(args: &ResolvedArgs) -> DiResult<Self> {
//!         Ok(UserService { db: args.get::<Database>("db")? })
//!     }
//! }
//!
//! let container = Container::new();
//! container
//!     .register(Registration::for_type::<Database>().singleton())
//!     .unwrap();
//! container
//!     .register(Registration::for_type::<UserService>())
//!     .unwrap();
//!
//! let service = container.resolve_sync::<UserService>().unwrap();
//! assert_eq!(service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Lifetimes
//!
//! - **Singleton**: one instance per container, disposed at shutdown.
//! - **Scoped**: one instance per activation of a named scope, disposed
//!   on scope exit.
//! - **Transient**: a fresh instance per resolution.
//!
//! ## Sync and async
//!
//! Every resolution has three forms: `resolve_sync` (explicitly
//! synchronous), `resolve_async` (explicitly asynchronous), and the
//! adaptive `resolve()` request that is finished with `.sync()` or
//! `.await`. Reaching an async factory or async hook from the
//! synchronous path fails with [`DiError::AsyncInSyncContext`]; the
//! async path runs sync providers inline and awaits async ones.

// Module declarations
pub mod analyzer;
pub mod container;
pub mod descriptor;
pub mod error;
pub mod generics;
pub mod key;
pub mod lazy;
pub mod lifecycle;
pub mod lifetime;
pub mod provider;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod token;

// Internal modules
mod internal;

// Re-export core types
pub use analyzer::{InjectDecision, InjectResult, TypeAnalyzer};
pub use container::{CallRequest, Container, ResolveRequest, ScopeSnapshot};
pub use descriptor::{ComponentDescriptor, Condition};
pub use error::{BoxError, DiError, DiResult, SharedError};
pub use generics::{GenericBinding, Variance};
pub use key::Key;
pub use lazy::Lazy;
pub use lifecycle::{AsyncDisposable, AsyncInitializable, Disposable, Initializable};
pub use lifetime::Lifetime;
pub use provider::{BoxFuture, Callable, Injectable, ParamSpec, ProviderKind, ResolvedArgs, Signature};
pub use registration::Registration;
pub use registry::ComponentRegistry;
pub use resolver::Overrides;
pub use scope::{ScopeGuard, ScopeHandle};
pub use token::{TokenShape, TypeToken};
