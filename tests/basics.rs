//! Core wiring behavior: auto-wiring, lifetimes, overrides, naming,
//! and conditional visibility.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cask_di::{
    Container, DiError, DiResult, Injectable, ParamSpec, Registration, ResolvedArgs, Signature,
    TypeToken,
};

static CACHE_BUILDS: AtomicUsize = AtomicUsize::new(0);

struct Cache {
    id: usize,
}

impl Injectable for Cache {
    fn signature() -> Signature {
        Signature::empty()
    }
    fn construct(_args: &ResolvedArgs) -> DiResult<Self> {
        Ok(Cache { id: CACHE_BUILDS.fetch_add(1, Ordering::SeqCst) })
    }
}

struct Store;

impl Injectable for Store {
    fn signature() -> Signature {
        Signature::empty()
    }
    fn construct(_args: &ResolvedArgs) -> DiResult<Self> {
        Ok(Store)
    }
}

struct Service {
    cache: Arc<Cache>,
    store: Arc<Store>,
}

impl Injectable for Service {
    fn signature() -> Signature {
        Signature::new(vec![
            ParamSpec::new("cache", TypeToken::of::<Cache>()),
            ParamSpec::new("store", TypeToken::of::<Store>()),
        ])
    }
    fn construct(args: &ResolvedArgs) -> DiResult<Self> {
        Ok(Service {
            cache: args.get::<Cache>("cache")?,
            store: args.get::<Store>("store")?,
        })
    }
}

#[test]
fn auto_wires_two_levels_with_transient_freshness() {
    let container = Container::new();
    container.add_transient::<Cache>().unwrap();
    container.add_transient::<Store>().unwrap();
    container.add_transient::<Service>().unwrap();

    let first = container.resolve_sync::<Service>().unwrap();
    let second = container.resolve_sync::<Service>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(&first.cache, &second.cache));
    assert!(!Arc::ptr_eq(&first.store, &second.store));
}

#[test]
fn singleton_dependency_is_shared_across_transients() {
    let container = Container::new();
    container.add_singleton::<Cache>().unwrap();
    container.add_transient::<Store>().unwrap();
    container.add_transient::<Service>().unwrap();

    let first = container.resolve_sync::<Service>().unwrap();
    let second = container.resolve_sync::<Service>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first.cache, &second.cache));
    assert!(!Arc::ptr_eq(&first.store, &second.store));
}

#[test]
fn override_takes_precedence_and_skips_registry() {
    let container = Container::new();
    container.add_transient::<Store>().unwrap();
    container.add_transient::<Service>().unwrap();
    container
        .register(
            Registration::factory(Signature::empty(), |_| -> DiResult<Cache> {
                panic!("override must bypass the registered factory")
            })
            .allow_override(),
        )
        .unwrap();

    let service = container
        .resolve::<Service>()
        .with_override("cache", Cache { id: 999 })
        .sync()
        .unwrap();

    assert_eq!(service.cache.id, 999);
}

#[test]
fn overrides_do_not_propagate_to_dependencies() {
    struct Wrapper {
        service: Arc<Service>,
    }
    impl Injectable for Wrapper {
        fn signature() -> Signature {
            Signature::new(vec![ParamSpec::new("service", TypeToken::of::<Service>())])
        }
        fn construct(args: &ResolvedArgs) -> DiResult<Self> {
            Ok(Wrapper { service: args.get::<Service>("service")? })
        }
    }

    let container = Container::new();
    container.add_transient::<Cache>().unwrap();
    container.add_transient::<Store>().unwrap();
    container.add_transient::<Service>().unwrap();
    container.add_transient::<Wrapper>().unwrap();

    // The override names a parameter of Service, not of Wrapper; it must
    // not reach the nested resolution.
    let wrapper = container
        .resolve::<Wrapper>()
        .with_override("cache", Cache { id: 777 })
        .sync()
        .unwrap();

    assert_ne!(wrapper.service.cache.id, 777);
}

#[test]
fn named_alternates_resolve_independently() {
    let container = Container::new();
    container
        .register(Registration::instance(10u64).named("small").singleton())
        .unwrap();
    container
        .register(Registration::instance(1000u64).named("large").singleton())
        .unwrap();

    let small = container.resolve_named_sync::<u64>("small").unwrap();
    let large = container.resolve_named_sync::<u64>("large").unwrap();
    assert_eq!(*small, 10);
    assert_eq!(*large, 1000);

    // The bare key was never registered.
    assert!(matches!(
        container.resolve_sync::<u64>(),
        Err(DiError::NotRegistered { .. })
    ));
}

#[test]
fn duplicate_registration_requires_allow_override() {
    let container = Container::new();
    container.add_instance(1u8).unwrap();

    let err = container.add_instance(2u8).unwrap_err();
    assert!(matches!(err, DiError::AlreadyRegistered { .. }));
    assert_eq!(*container.resolve_sync::<u8>().unwrap(), 1);

    container
        .register(Registration::instance(3u8).singleton().allow_override())
        .unwrap();
    assert_eq!(*container.resolve_sync::<u8>().unwrap(), 3);
}

#[test]
fn condition_gates_resolution_at_lookup_time() {
    use std::sync::atomic::AtomicBool;
    static ENABLED: AtomicBool = AtomicBool::new(false);

    let container = Container::new();
    container
        .register(
            Registration::instance("feature".to_string())
                .singleton()
                .condition(|| ENABLED.load(Ordering::SeqCst)),
        )
        .unwrap();

    assert!(matches!(
        container.resolve_sync::<String>(),
        Err(DiError::NotRegistered { .. })
    ));

    ENABLED.store(true, Ordering::SeqCst);
    assert_eq!(&*container.resolve_sync::<String>().unwrap(), "feature");
}

#[test]
fn null_registration_reads_as_none() {
    struct Absent;

    let container = Container::new();
    container
        .register(Registration::null("Absent"))
        .unwrap();

    assert!(container.contains_key("Absent"));
    assert!(container.resolve_optional::<Absent>().unwrap().is_none());
    assert!(matches!(
        container.resolve_sync::<Absent>(),
        Err(DiError::NotRegistered { .. })
    ));
}

#[test]
fn descriptor_introspection_reports_registration_options() {
    let container = Container::new();
    container
        .register(
            Registration::instance(5i32)
                .singleton()
                .tags(["config", "numbers"])
                .metadata("priority", "10"),
        )
        .unwrap();

    let descriptors = container.registry().find_by_tag("config");
    assert_eq!(descriptors.len(), 1);
    let descriptor = &descriptors[0];
    assert!(descriptor.has_all_tags(["config", "numbers"]));
    assert!(!descriptor.has_tag("missing"));
    assert_eq!(descriptor.metadata("priority"), Some("10"));
    assert_eq!(descriptor.key().as_str(), "i32");
}
