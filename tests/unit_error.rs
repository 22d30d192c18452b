//! Error value shapes and message content.

use cask_di::{DiError, Key};

#[test]
fn every_kind_is_distinguishable() {
    let errors: Vec<DiError> = vec![
        DiError::NotRegistered { key: Key::new("A") },
        DiError::AlreadyRegistered { key: Key::new("A") },
        DiError::AmbiguousInjection { parameter: "x".into(), candidates: vec![Key::new("B")] },
        DiError::CircularDependency { path: vec![Key::new("A"), Key::new("A")] },
        DiError::ScopeInactive { scope: "request".into(), key: Key::new("A") },
        DiError::ScopeReentry { scope: "request".into() },
        DiError::AsyncInSyncContext { key: Key::new("A") },
        DiError::TypeResolutionFailed { name: "Late".into() },
        DiError::DepthExceeded(128),
    ];

    let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    for (i, a) in rendered.iter().enumerate() {
        for b in rendered.iter().skip(i + 1) {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn async_error_suggests_the_async_api() {
    let err = DiError::AsyncInSyncContext { key: Key::new("Thing") };
    let message = err.to_string();
    assert!(message.contains("Thing"));
    assert!(message.contains("resolve_async"));
}

#[test]
fn scope_error_names_the_scope_and_key() {
    let err = DiError::ScopeInactive { scope: "request".into(), key: Key::new("Ctx") };
    let message = err.to_string();
    assert!(message.contains("request"));
    assert!(message.contains("Ctx"));
}

#[test]
fn initialization_failure_carries_its_cause() {
    use std::error::Error;

    let err = DiError::InitializationFailed {
        key: Key::new("Svc"),
        source: std::sync::Arc::from(cask_di::BoxError::from("warmup failed")),
    };
    assert!(err.source().is_some());
    assert_eq!(err.source().unwrap().to_string(), "warmup failed");
}

#[test]
fn errors_are_cloneable_values() {
    let err = DiError::CircularDependency { path: vec![Key::new("A"), Key::new("B")] };
    let copy = err.clone();
    assert_eq!(err.to_string(), copy.to_string());
}
