//! Component descriptors: the registry's rows.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::provider::{AnyArc, HookSet, ProviderImpl, ProviderKind};
use crate::token::TypeToken;

/// Nullary predicate gating a descriptor's visibility, evaluated at
/// every lookup.
pub type Condition = Arc<dyn Fn() -> bool + Send + Sync>;

/// Adapter turning a stored concrete value into a capability value
/// (`Arc<dyn Trait>` boxed back into the erased storage form).
pub(crate) type CapabilityCast = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;

/// Complete metadata for one registered component.
///
/// The single source of truth for how a component is keyed, provided,
/// scoped, tagged, and torn down. Descriptors are immutable once
/// registered; replacing one requires `allow_override`.
pub struct ComponentDescriptor {
    pub(crate) key: Key,
    pub(crate) component_type: TypeToken,
    pub(crate) provider: ProviderImpl,
    pub(crate) hooks: HookSet,
    pub(crate) lifetime: Lifetime,
    pub(crate) scope_name: Option<Arc<str>>,
    pub(crate) name: Option<Arc<str>>,
    pub(crate) condition: Option<Condition>,
    pub(crate) tags: Vec<Arc<str>>,
    pub(crate) lazy: bool,
    pub(crate) metadata: AHashMap<String, String>,
    /// Capability names this component satisfies, with their casts.
    pub(crate) capabilities: Vec<(Arc<str>, CapabilityCast)>,
}

impl ComponentDescriptor {
    /// The canonical key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The type token this descriptor provides.
    pub fn component_type(&self) -> &TypeToken {
        &self.component_type
    }

    /// The derived provider classification.
    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// The component lifetime.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// The scope name, present iff the lifetime is [`Lifetime::Scoped`].
    pub fn scope_name(&self) -> Option<&str> {
        self.scope_name.as_deref()
    }

    /// The optional disambiguating name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether this is a named alternate.
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Whether construction is deferred behind a thunk.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Evaluates the visibility condition; unconditional descriptors are
    /// always visible.
    pub fn matches_condition(&self) -> bool {
        match &self.condition {
            Some(cond) => cond(),
            None => true,
        }
    }

    /// Whether the descriptor carries a specific tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| &**t == tag)
    }

    /// Whether the descriptor carries any of the given tags.
    pub fn has_any_tag<'a>(&self, tags: impl IntoIterator<Item = &'a str>) -> bool {
        tags.into_iter().any(|t| self.has_tag(t))
    }

    /// Whether the descriptor carries all of the given tags.
    pub fn has_all_tags<'a>(&self, tags: impl IntoIterator<Item = &'a str>) -> bool {
        tags.into_iter().all(|t| self.has_tag(t))
    }

    /// The descriptor's tags.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|t| &**t)
    }

    /// A metadata value, e.g. `priority`.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|v| v.as_str())
    }

    /// Capability names this component declares it satisfies.
    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(|(name, _)| &**name)
    }

    pub(crate) fn capability_cast(&self, capability: &str) -> Option<&CapabilityCast> {
        self.capabilities
            .iter()
            .find(|(name, _)| &**name == capability)
            .map(|(_, cast)| cast)
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("key", &self.key)
            .field("type", &self.component_type.name())
            .field("provider", &self.provider.kind())
            .field("lifetime", &self.lifetime)
            .field("scope_name", &self.scope_name)
            .field("lazy", &self.lazy)
            .finish()
    }
}
