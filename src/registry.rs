//! The component registry: single source of truth for declarations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::descriptor::ComponentDescriptor;
use crate::error::{DiError, DiResult};
use crate::generics::{GenericBinding, GenericTable};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::provider::{AnyArc, ResolvedArgs, Signature};
use crate::token::TypeToken;

/// Declared constructor of a type that may be auto-created without a
/// full registration.
pub(crate) struct Blueprint {
    pub(crate) signature: Signature,
    pub(crate) construct: Arc<dyn Fn(&ResolvedArgs) -> DiResult<AnyArc> + Send + Sync>,
}

#[derive(Default)]
struct RegistryInner {
    descriptors: AHashMap<Key, Arc<ComponentDescriptor>>,
    /// Registration order, kept for deterministic listings.
    order: Vec<Key>,
    by_type: AHashMap<Arc<str>, Vec<Key>>,
    by_tag: AHashMap<Arc<str>, Vec<Key>>,
    by_lifetime: AHashMap<Lifetime, Vec<Key>>,
    by_capability: AHashMap<Arc<str>, Vec<Key>>,
    type_links: AHashMap<Arc<str>, TypeToken>,
    blueprints: AHashMap<Key, Arc<Blueprint>>,
    generics: GenericTable,
    /// Direct subtype links: child type name -> parent type names.
    subtypes: AHashMap<Arc<str>, Vec<Arc<str>>>,
}

impl RegistryInner {
    fn unindex(&mut self, descriptor: &ComponentDescriptor) {
        let key = &descriptor.key;
        self.order.retain(|k| k != key);
        if let Some(keys) = self.by_type.get_mut(descriptor.component_type.name()) {
            keys.retain(|k| k != key);
        }
        for tag in &descriptor.tags {
            if let Some(keys) = self.by_tag.get_mut(&**tag) {
                keys.retain(|k| k != key);
            }
        }
        if let Some(keys) = self.by_lifetime.get_mut(&descriptor.lifetime) {
            keys.retain(|k| k != key);
        }
        for (capability, _) in &descriptor.capabilities {
            if let Some(keys) = self.by_capability.get_mut(&**capability) {
                keys.retain(|k| k != key);
            }
        }
    }

    fn index(&mut self, descriptor: &Arc<ComponentDescriptor>) {
        let key = descriptor.key.clone();
        self.order.push(key.clone());
        self.by_type
            .entry(Arc::from(descriptor.component_type.name()))
            .or_default()
            .push(key.clone());
        for tag in &descriptor.tags {
            self.by_tag.entry(tag.clone()).or_default().push(key.clone());
        }
        self.by_lifetime
            .entry(descriptor.lifetime)
            .or_default()
            .push(key.clone());
        for (capability, _) in &descriptor.capabilities {
            self.by_capability
                .entry(capability.clone())
                .or_default()
                .push(key.clone());
        }
    }
}

/// Thread-safe registry of [`ComponentDescriptor`]s with reverse
/// indices by type, tag, lifetime, and capability.
///
/// Mutations take the writer lock and update the reverse indices inside
/// the same critical section, so readers never observe torn state. Every
/// mutation bumps an epoch counter that invalidates the analyzer cache.
pub struct ComponentRegistry {
    inner: RwLock<RegistryInner>,
    epoch: AtomicU64,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        ComponentRegistry { inner: RwLock::new(RegistryInner::default()), epoch: AtomicU64::new(0) }
    }

    fn bump(&self) {
        self.epoch.fetch_add(1, Ordering::Release);
    }

    /// Monotonic mutation counter, consumed by the analyzer cache.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Inserts a descriptor. Fails with [`DiError::AlreadyRegistered`]
    /// when the canonical key exists and `allow_override` is false; the
    /// registry state is untouched in that case.
    pub(crate) fn register(
        &self,
        descriptor: ComponentDescriptor,
        allow_override: bool,
    ) -> DiResult<Arc<ComponentDescriptor>> {
        let descriptor = Arc::new(descriptor);
        let key = descriptor.key.clone();
        {
            let mut inner = self.inner.write();
            if let Some(existing) = inner.descriptors.get(&key) {
                if !allow_override {
                    return Err(DiError::AlreadyRegistered { key });
                }
                let existing = existing.clone();
                inner.unindex(&existing);
            }
            inner.descriptors.insert(key.clone(), descriptor.clone());
            inner.index(&descriptor);
        }
        self.bump();
        debug!(key = %key, lifetime = ?descriptor.lifetime, "registered component");
        Ok(descriptor)
    }

    /// Looks up a descriptor, applying its visibility condition. The
    /// predicate runs outside the registry lock.
    pub fn get(&self, key: &Key) -> Option<Arc<ComponentDescriptor>> {
        let descriptor = self.inner.read().descriptors.get(key).cloned()?;
        descriptor.matches_condition().then_some(descriptor)
    }

    /// Whether `key` is registered and currently visible.
    pub fn has(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Removes a registration and its index entries.
    pub fn remove(&self, key: &Key) -> bool {
        let removed = {
            let mut inner = self.inner.write();
            match inner.descriptors.remove(key) {
                Some(descriptor) => {
                    inner.unindex(&descriptor);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.bump();
        }
        removed
    }

    fn collect(&self, keys: Vec<Key>) -> Vec<Arc<ComponentDescriptor>> {
        let inner = self.inner.read();
        let descriptors: Vec<_> = keys
            .iter()
            .filter_map(|k| inner.descriptors.get(k).cloned())
            .collect();
        drop(inner);
        descriptors
            .into_iter()
            .filter(|d| d.matches_condition())
            .collect()
    }

    /// Visible descriptors providing the given type name.
    pub fn find_by_type(&self, type_name: &str) -> Vec<Arc<ComponentDescriptor>> {
        let keys = self
            .inner
            .read()
            .by_type
            .get(type_name)
            .cloned()
            .unwrap_or_default();
        self.collect(keys)
    }

    /// Visible descriptors carrying the given tag.
    pub fn find_by_tag(&self, tag: &str) -> Vec<Arc<ComponentDescriptor>> {
        let keys = self.inner.read().by_tag.get(tag).cloned().unwrap_or_default();
        self.collect(keys)
    }

    /// Visible descriptors with the given lifetime.
    pub fn find_by_lifetime(&self, lifetime: Lifetime) -> Vec<Arc<ComponentDescriptor>> {
        let keys = self
            .inner
            .read()
            .by_lifetime
            .get(&lifetime)
            .cloned()
            .unwrap_or_default();
        self.collect(keys)
    }

    /// Keys of visible descriptors declaring the given capability.
    pub fn implementers_of(&self, capability: &str) -> Vec<Key> {
        let keys = self
            .inner
            .read()
            .by_capability
            .get(capability)
            .cloned()
            .unwrap_or_default();
        self.collect(keys).into_iter().map(|d| d.key.clone()).collect()
    }

    /// Every visible descriptor, in registration order.
    pub fn list_all(&self) -> Vec<Arc<ComponentDescriptor>> {
        let keys = self.inner.read().order.clone();
        self.collect(keys)
    }

    /// Number of registrations, visible or not.
    pub fn len(&self) -> usize {
        self.inner.read().descriptors.len()
    }

    /// Whether the registry has no registrations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every registration, link, and blueprint.
    pub fn clear(&self) {
        *self.inner.write() = RegistryInner::default();
        self.bump();
    }

    /// Binds a forward type name to a concrete token; the analyzer's
    /// forward-reference rule resolves through this table.
    pub fn link_type(&self, name: impl AsRef<str>, token: TypeToken) {
        self.inner
            .write()
            .type_links
            .insert(Arc::from(name.as_ref()), token);
        self.bump();
    }

    /// Resolves a forward type name, if linked.
    pub fn resolve_link(&self, name: &str) -> Option<TypeToken> {
        self.inner.read().type_links.get(name).cloned()
    }

    pub(crate) fn declare_blueprint(&self, key: Key, blueprint: Blueprint) {
        self.inner.write().blueprints.insert(key, Arc::new(blueprint));
        self.bump();
    }

    pub(crate) fn blueprint(&self, key: &Key) -> Option<Arc<Blueprint>> {
        self.inner.read().blueprints.get(key).cloned()
    }

    /// Registers a concrete implementation for a generic origin.
    pub fn register_generic(&self, binding: GenericBinding) {
        self.inner.write().generics.insert(binding);
        self.bump();
    }

    pub(crate) fn generic_bindings(&self, origin: &str) -> Vec<GenericBinding> {
        self.inner.read().generics.bindings(origin)
    }

    /// Declares that `child` subtypes `parent`, feeding the
    /// compatible-match rule of generic scoring.
    pub fn link_subtype(&self, child: impl AsRef<str>, parent: impl AsRef<str>) {
        self.inner
            .write()
            .subtypes
            .entry(Arc::from(child.as_ref()))
            .or_default()
            .push(Arc::from(parent.as_ref()));
        self.bump();
    }

    pub(crate) fn subtype_parents(&self, child: &str) -> Vec<Arc<str>> {
        self.inner
            .read()
            .subtypes
            .get(child)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::Registration;

    struct Widget;

    fn widget_descriptor(tag: &str) -> (ComponentDescriptor, bool) {
        Registration::instance(Widget).tag(tag).into_parts()
    }

    #[test]
    fn duplicate_registration_leaves_state_unchanged() {
        let registry = ComponentRegistry::new();
        let (first, _) = widget_descriptor("a");
        registry.register(first, false).unwrap();
        let before = registry.epoch();

        let (second, _) = widget_descriptor("b");
        let err = registry.register(second, false).unwrap_err();
        assert!(matches!(err, DiError::AlreadyRegistered { .. }));
        assert_eq!(registry.epoch(), before);
        assert_eq!(registry.find_by_tag("a").len(), 1);
        assert!(registry.find_by_tag("b").is_empty());
    }

    #[test]
    fn override_replaces_indices() {
        let registry = ComponentRegistry::new();
        let (first, _) = widget_descriptor("a");
        registry.register(first, false).unwrap();
        let (second, _) = widget_descriptor("b");
        registry.register(second, true).unwrap();

        assert!(registry.find_by_tag("a").is_empty());
        assert_eq!(registry.find_by_tag("b").len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn has_matches_get() {
        let registry = ComponentRegistry::new();
        let key = Key::of::<Widget>();
        assert!(!registry.has(&key));
        let (descriptor, _) = widget_descriptor("t");
        registry.register(descriptor, false).unwrap();
        assert_eq!(registry.has(&key), registry.get(&key).is_some());
    }

    #[test]
    fn false_condition_hides_everywhere() {
        let registry = ComponentRegistry::new();
        let (descriptor, _) = Registration::instance(Widget)
            .tag("infra")
            .condition(|| false)
            .into_parts();
        registry.register(descriptor, false).unwrap();

        let key = Key::of::<Widget>();
        assert!(registry.get(&key).is_none());
        assert!(!registry.has(&key));
        assert!(registry.find_by_type("Widget").is_empty());
        assert!(registry.find_by_tag("infra").is_empty());
        assert!(registry.find_by_lifetime(Lifetime::Transient).is_empty());
        assert!(registry.list_all().is_empty());
        // Still physically present.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_cleans_reverse_indices() {
        let registry = ComponentRegistry::new();
        let (descriptor, _) = widget_descriptor("x");
        registry.register(descriptor, false).unwrap();
        let key = Key::of::<Widget>();

        assert!(registry.remove(&key));
        assert!(!registry.remove(&key));
        assert!(registry.find_by_tag("x").is_empty());
        assert!(registry.find_by_type("Widget").is_empty());
        assert_eq!(registry.len(), 0);
    }
}
