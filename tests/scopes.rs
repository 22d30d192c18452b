//! Scope activation, caching, isolation, and teardown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cask_di::{
    Container, DiError, DiResult, Disposable, Injectable, Registration, ResolvedArgs, Signature,
};

struct RequestCtx {
    disposed: Arc<AtomicUsize>,
}

impl Disposable for RequestCtx {
    fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A container with a scoped, disposal-counting RequestCtx.
fn scoped_container(disposed: &Arc<AtomicUsize>) -> Container {
    let container = Container::new();
    let counter = disposed.clone();
    container
        .register(
            Registration::factory(Signature::empty(), move |_| {
                Ok(RequestCtx { disposed: counter.clone() })
            })
            .scoped("request")
            .with_disposer(),
        )
        .unwrap();
    container
}

#[test]
fn scoped_resolution_requires_active_scope() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&disposed);
    match container.resolve_sync::<RequestCtx>() {
        Err(DiError::ScopeInactive { scope, key }) => {
            assert_eq!(scope, "request");
            assert_eq!(key.as_str(), "RequestCtx");
        }
        other => panic!("expected ScopeInactive, got {:?}", other.err()),
    }
}

#[test]
fn scope_caches_one_instance_and_disposes_once_on_exit() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&disposed);

    let guard = container.scope("request").enter().unwrap();
    let a = container.resolve_sync::<RequestCtx>().unwrap();
    let b = container.resolve_sync::<RequestCtx>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(disposed.load(Ordering::SeqCst), 0);

    drop(guard);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn separate_activations_get_separate_instances() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&disposed);

    let guard = container.scope("request").enter().unwrap();
    let first = container.resolve_sync::<RequestCtx>().unwrap();
    drop(guard);

    let guard = container.scope("request").enter().unwrap();
    let second = container.resolve_sync::<RequestCtx>().unwrap();
    drop(guard);

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(disposed.load(Ordering::SeqCst), 2);
}

#[test]
fn reentering_an_active_scope_fails() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&disposed);
    let _guard = container.scope("request").enter().unwrap();

    match container.scope("request").enter() {
        Err(DiError::ScopeReentry { scope }) => assert_eq!(scope, "request"),
        Ok(_) => panic!("expected ScopeReentry"),
        Err(other) => panic!("expected ScopeReentry, got {other:?}"),
    }
}

#[test]
fn nested_scopes_activate_independently() {
    struct SessionCtx;
    impl Injectable for SessionCtx {
        fn signature() -> Signature {
            Signature::empty()
        }
        fn construct(_args: &ResolvedArgs) -> DiResult<Self> {
            Ok(SessionCtx)
        }
    }

    let disposed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&disposed);
    container
        .register(Registration::for_type::<SessionCtx>().scoped("session"))
        .unwrap();

    let _session = container.scope("session").enter().unwrap();
    let _request = container.scope("request").enter().unwrap();

    assert!(container.resolve_sync::<SessionCtx>().is_ok());
    assert!(container.resolve_sync::<RequestCtx>().is_ok());
}

#[test]
fn scope_activation_is_thread_local() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&disposed);
    let _guard = container.scope("request").enter().unwrap();
    assert!(container.resolve_sync::<RequestCtx>().is_ok());

    let remote = container.clone();
    let outcome = std::thread::spawn(move || remote.resolve_sync::<RequestCtx>())
        .join()
        .unwrap();
    assert!(matches!(outcome, Err(DiError::ScopeInactive { .. })));
}

#[tokio::test]
async fn async_scope_run_caches_and_disposes() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&disposed);

    let handle = container.scope("request");
    let (a, b) = handle
        .run(async {
            let a = container.resolve_async::<RequestCtx>().await.unwrap();
            let b = container.resolve_async::<RequestCtx>().await.unwrap();
            (a, b)
        })
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_tasks_do_not_share_scopes() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&disposed);
    let remote = container.clone();

    let inside = container
        .scope("request")
        .run(async move {
            // A sibling task without the activation must not see it.
            tokio::spawn(async move { remote.resolve_async::<RequestCtx>().await })
                .await
                .unwrap()
        })
        .await
        .unwrap();

    assert!(matches!(inside, Err(DiError::ScopeInactive { .. })));
}

#[test]
fn transient_disposal_is_tracked_by_the_active_scope() {
    struct Buffer {
        disposed: Arc<AtomicUsize>,
    }
    impl Disposable for Buffer {
        fn dispose(&self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    let disposed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&disposed);
    let buffer_disposed = Arc::new(AtomicUsize::new(0));
    let counter = buffer_disposed.clone();
    container
        .register(
            Registration::factory(Signature::empty(), move |_| {
                Ok(Buffer { disposed: counter.clone() })
            })
            .with_disposer(),
        )
        .unwrap();

    // Outside any scope: disposal is the caller's problem.
    let loose = container.resolve_sync::<Buffer>().unwrap();
    drop(loose);
    assert_eq!(buffer_disposed.load(Ordering::SeqCst), 0);

    let guard = container.scope("request").enter().unwrap();
    let _tracked = container.resolve_sync::<Buffer>().unwrap();
    drop(guard);
    assert_eq!(buffer_disposed.load(Ordering::SeqCst), 1);
}
