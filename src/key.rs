//! Canonical component keys.

use std::fmt;
use std::sync::Arc;

/// Canonical string key identifying a component in a registry.
///
/// The canonical form is `<TypeName>`, `<TypeName>:<name>`, or
/// `<user-string>[:<name>]`. Lookup always goes through the canonical
/// form; the registry never compares types by identity, so forward
/// declarations and re-exports of the same type land on the same key.
///
/// # Examples
///
/// ```rust
/// use cask_di::Key;
///
/// struct Database;
///
/// assert_eq!(Key::of::<Database>().as_str(), "Database");
/// assert_eq!(Key::of_named::<Database>("primary").as_str(), "Database:primary");
/// assert_eq!(Key::new("cache").as_str(), "cache");
/// assert_eq!(Key::named("cache", "hot").as_str(), "cache:hot");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    /// Creates a key from a user-supplied string.
    pub fn new(key: impl AsRef<str>) -> Self {
        Key(Arc::from(key.as_ref()))
    }

    /// Creates a named alternate of a user-supplied key: `key:name`.
    pub fn named(key: &str, name: &str) -> Self {
        Key(Arc::from(format!("{key}:{name}")))
    }

    /// Canonical key for a type: its simple name without the module path.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Key(Arc::from(simple_name(std::any::type_name::<T>())))
    }

    /// Canonical key for a named alternate of a type: `TypeName:name`.
    pub fn of_named<T: ?Sized + 'static>(name: &str) -> Self {
        Key(Arc::from(format!(
            "{}:{name}",
            simple_name(std::any::type_name::<T>())
        )))
    }

    pub(crate) fn with_name(base: &str, name: Option<&str>) -> Self {
        match name {
            Some(n) => Key::named(base, n),
            None => Key::new(base),
        }
    }

    /// Sentinel key for errors raised before attribution. Internal.
    pub(crate) fn unresolved() -> Self {
        Key(Arc::from("?"))
    }

    pub(crate) fn is_unresolved(&self) -> bool {
        &*self.0 == "?"
    }

    /// The full canonical form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key part before any `:<name>` suffix.
    pub fn base(&self) -> &str {
        match self.0.split_once(':') {
            Some((base, _)) => base,
            None => &self.0,
        }
    }

    /// The `<name>` suffix for named alternates, if any.
    pub fn service_name(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, name)| name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::new(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(Arc::from(s))
    }
}

/// Strips module paths from a `std::any::type_name` result, including
/// inside generic argument lists: `a::b::Repo<c::User>` -> `Repo<User>`.
///
/// The `dyn ` prefix of trait object names is dropped so a trait and its
/// registrations share one canonical spelling.
pub fn simple_name(full: &str) -> String {
    let full = full.strip_prefix("dyn ").unwrap_or(full);
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0usize;
    for (i, ch) in full.char_indices() {
        match ch {
            ':' => {
                // Path separator; restart the current segment after it.
                segment_start = i + 1;
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(full[segment_start..i].trim_start_matches(':'));
                out.push(ch);
                segment_start = i + 1;
            }
            _ => {}
        }
    }
    out.push_str(full[segment_start..].trim_start_matches(':'));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    #[test]
    fn type_keys_use_simple_names() {
        assert_eq!(Key::of::<Plain>().as_str(), "Plain");
        assert_eq!(Key::of::<String>().as_str(), "String");
    }

    #[test]
    fn named_keys_append_suffix() {
        let key = Key::of_named::<Plain>("primary");
        assert_eq!(key.as_str(), "Plain:primary");
        assert_eq!(key.base(), "Plain");
        assert_eq!(key.service_name(), Some("primary"));
    }

    #[test]
    fn string_keys_pass_through() {
        let key = Key::new("database");
        assert_eq!(key.as_str(), "database");
        assert_eq!(key.service_name(), None);
    }

    #[test]
    fn simple_name_handles_generics() {
        assert_eq!(simple_name("a::b::Repo<c::d::User>"), "Repo<User>");
        assert_eq!(
            simple_name("std::collections::HashMap<alloc::string::String, u32>"),
            "HashMap<String, u32>"
        );
    }

    #[test]
    fn simple_name_strips_dyn_prefix() {
        assert_eq!(simple_name("dyn my_crate::Logger"), "Logger");
    }
}
