//! Property tests for registry invariants.

use cask_di::{Container, DiError, Registration};
use proptest::prelude::*;

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-d][a-z]{0,3}"
}

proptest! {
    /// Without allow_override, a duplicate registration is rejected and
    /// the earlier value survives.
    #[test]
    fn duplicate_keys_are_rejected_and_state_is_preserved(
        keys in proptest::collection::vec(key_strategy(), 1..12)
    ) {
        let container = Container::new();
        let mut expected: Vec<(String, usize)> = Vec::new();

        for (index, key) in keys.iter().enumerate() {
            let outcome = container.register(
                Registration::instance(index).keyed(key.as_str()).singleton(),
            );
            if expected.iter().any(|(k, _)| k == key) {
                let is_already_registered = matches!(outcome, Err(DiError::AlreadyRegistered { .. }));
                prop_assert!(is_already_registered);
            } else {
                prop_assert!(outcome.is_ok());
                expected.push((key.clone(), index));
            }
        }

        prop_assert_eq!(container.registry().len(), expected.len());
        for (key, value) in &expected {
            let resolved = container.get::<usize>(key.as_str()).unwrap();
            prop_assert_eq!(*resolved, *value);
        }
    }

    /// has(k) agrees with get(k) for registered and unregistered keys.
    #[test]
    fn membership_matches_lookup(
        registered in proptest::collection::hash_set(key_strategy(), 0..8),
        probes in proptest::collection::vec(key_strategy(), 0..16)
    ) {
        let container = Container::new();
        for key in &registered {
            container
                .register(Registration::instance(1u8).keyed(key.as_str()).singleton())
                .unwrap();
        }

        for probe in &probes {
            let has = container.contains_key(probe.as_str());
            let got = container.get::<u8>(probe.as_str()).is_ok();
            prop_assert_eq!(has, got);
            prop_assert_eq!(has, registered.contains(probe));
        }
    }

    /// Removal restores the unregistered state and cleans the indices.
    #[test]
    fn remove_round_trips(
        keys in proptest::collection::hash_set(key_strategy(), 1..8)
    ) {
        let container = Container::new();
        for key in &keys {
            container
                .register(
                    Registration::instance(0u16).keyed(key.as_str()).singleton().tag("probe"),
                )
                .unwrap();
        }

        for key in &keys {
            prop_assert!(container.remove(key.as_str()));
            prop_assert!(!container.contains_key(key.as_str()));
            prop_assert!(!container.remove(key.as_str()));
        }

        prop_assert_eq!(container.registry().len(), 0);
        prop_assert!(container.registry().find_by_tag("probe").is_empty());
    }
}
