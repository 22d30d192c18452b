//! Sync/async context adaptation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cask_di::{
    AsyncInitializable, Container, DiError, DiResult, Injectable, ParamSpec, Registration,
    ResolvedArgs, Signature, TypeToken,
};

struct Thing(u32);

fn async_thing_container() -> Container {
    let container = Container::new();
    container
        .register(Registration::async_factory(Signature::empty(), |_args| async {
            Ok(Thing(7))
        }))
        .unwrap();
    container
}

#[test]
fn sync_resolution_of_async_provider_fails_with_a_suggestion() {
    let container = async_thing_container();
    match container.resolve_sync::<Thing>() {
        Err(DiError::AsyncInSyncContext { key }) => {
            assert_eq!(key.as_str(), "Thing");
        }
        other => panic!("expected AsyncInSyncContext, got {:?}", other.err()),
    }
    let message = container
        .resolve_sync::<Thing>()
        .err()
        .expect("async provider must be gated")
        .to_string();
    assert!(message.contains("Thing"));
    assert!(message.contains("resolve_async"));
}

#[tokio::test]
async fn async_resolution_awaits_the_factory() {
    let container = async_thing_container();
    let thing = container.resolve_async::<Thing>().await.unwrap();
    assert_eq!(thing.0, 7);

    // The adaptive request awaited from async context behaves the same.
    let thing = container.resolve::<Thing>().await.unwrap();
    assert_eq!(thing.0, 7);
}

#[tokio::test]
async fn adaptive_and_explicit_forms_agree_on_singletons() {
    let container = Container::new();
    container
        .register(
            Registration::async_factory(Signature::empty(), |_args| async { Ok(Thing(1)) })
                .singleton(),
        )
        .unwrap();

    let a = container.resolve_async::<Thing>().await.unwrap();
    let b = container.resolve::<Thing>().await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    // The cached singleton is readable from the sync path too; only
    // construction is gated on the async context.
    let c = container.resolve_sync::<Thing>().unwrap();
    assert!(Arc::ptr_eq(&a, &c));
}

#[tokio::test]
async fn async_caller_runs_sync_providers_inline() {
    let container = Container::new();
    container
        .register(Registration::factory(Signature::empty(), |_| Ok(Thing(3))))
        .unwrap();
    let thing = container.resolve_async::<Thing>().await.unwrap();
    assert_eq!(thing.0, 3);
}

#[tokio::test]
async fn async_dependencies_are_awaited_during_argument_assembly() {
    struct Consumer {
        thing: Arc<Thing>,
    }
    impl Injectable for Consumer {
        fn signature() -> Signature {
            Signature::new(vec![ParamSpec::new("thing", TypeToken::of::<Thing>())])
        }
        fn construct(args: &ResolvedArgs) -> DiResult<Self> {
            Ok(Consumer { thing: args.get::<Thing>("thing")? })
        }
    }

    let container = async_thing_container();
    container.add_transient::<Consumer>().unwrap();

    // Sync path: the async dependency is unreachable.
    assert!(matches!(
        container.resolve_sync::<Consumer>(),
        Err(DiError::AsyncInSyncContext { .. })
    ));

    let consumer = container.resolve_async::<Consumer>().await.unwrap();
    assert_eq!(consumer.thing.0, 7);
}

#[tokio::test]
async fn async_initialization_is_awaited_and_gated() {
    struct Warmed {
        ready: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AsyncInitializable for Warmed {
        async fn initialize(&self) -> Result<(), cask_di::BoxError> {
            self.ready.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let container = Container::new();
    container
        .register(
            Registration::factory(Signature::empty(), |_| {
                Ok(Warmed { ready: AtomicUsize::new(0) })
            })
            .singleton()
            .with_async_initializer(),
        )
        .unwrap();

    // The async hook is unreachable from the sync path.
    assert!(matches!(
        container.resolve_sync::<Warmed>(),
        Err(DiError::AsyncInSyncContext { .. })
    ));

    let warmed = container.resolve_async::<Warmed>().await.unwrap();
    assert_eq!(warmed.ready.load(Ordering::SeqCst), 1);
    let again = container.resolve_async::<Warmed>().await.unwrap();
    assert_eq!(again.ready.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_singleton_demand_constructs_once() {
    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    let container = Container::new();
    container
        .register(
            Registration::async_factory(Signature::empty(), |_args| async {
                BUILDS.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                Ok(Thing(42))
            })
            .singleton(),
        )
        .unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let c = container.clone();
            tokio::spawn(async move { c.resolve_async::<Thing>().await.unwrap() })
        })
        .collect();

    let mut instances = Vec::new();
    for task in tasks {
        instances.push(task.await.unwrap());
    }

    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    for pair in instances.windows(2) {
        assert!(Arc::ptr_eq(&pair[0], &pair[1]));
    }
}

#[tokio::test]
async fn async_callable_requires_the_async_path() {
    use cask_di::Callable;

    let container = async_thing_container();
    let sum = Callable::new_async(
        "sum",
        Signature::new(vec![ParamSpec::new("thing", TypeToken::of::<Thing>())]),
        |args| async move {
            let thing = args.get::<Thing>("thing")?;
            Ok(thing.0 + 1)
        },
    );

    assert!(matches!(
        container.call_sync(&sum),
        Err(DiError::AsyncInSyncContext { .. })
    ));
    let value = container.call(&sum).await.unwrap();
    assert_eq!(value, 8);
}
