//! Canonical key behavior.

use cask_di::Key;

mod fixtures {
    pub struct Database;
}

#[test]
fn type_and_string_keys_share_the_canonical_form() {
    let by_type = Key::of::<fixtures::Database>();
    let by_string = Key::new("Database");
    assert_eq!(by_type, by_string);
    assert_eq!(by_type.as_str(), "Database");
}

#[test]
fn named_alternates_round_trip() {
    let key = Key::of_named::<fixtures::Database>("primary");
    assert_eq!(key.as_str(), "Database:primary");
    assert_eq!(key.base(), "Database");
    assert_eq!(key.service_name(), Some("primary"));

    let unnamed = Key::of::<fixtures::Database>();
    assert_eq!(unnamed.service_name(), None);
}

#[test]
fn keys_are_order_and_hash_friendly() {
    use std::collections::{BTreeSet, HashSet};

    let keys = [Key::new("b"), Key::new("a"), Key::new("a:x")];
    let ordered: BTreeSet<_> = keys.iter().cloned().collect();
    assert_eq!(
        ordered.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
        ["a", "a:x", "b"]
    );

    let unique: HashSet<_> = keys.iter().cloned().chain(keys.iter().cloned()).collect();
    assert_eq!(unique.len(), 3);
}

#[test]
fn display_matches_canonical_form() {
    let key = Key::named("cache", "hot");
    assert_eq!(key.to_string(), "cache:hot");
}
