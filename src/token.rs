//! Registration-time type tokens.
//!
//! Rust has no runtime type introspection, so every type a component
//! mentions is captured at registration time as a [`TypeToken`]: a
//! canonical name plus a [`TokenShape`] describing what the analyzer
//! needs to know about it (primitive, container, optional, union,
//! capability, concrete, forward name, generic).

use std::any::TypeId;
use std::sync::Arc;

use ahash::AHashSet;
use once_cell::sync::Lazy as OnceLazy;

use crate::key::{simple_name, Key};

/// The shape of a type as seen by the analyzer.
#[derive(Clone, Debug)]
pub enum TokenShape {
    /// No type annotation was declared for the parameter.
    Untyped,
    /// A built-in primitive: data, not a service.
    Primitive,
    /// A parametric container with arguments (`Vec<T>`, `HashMap<K, V>`).
    Container {
        /// The container origin name, e.g. `Vec`.
        origin: Arc<str>,
        /// The type arguments.
        args: Vec<TypeToken>,
    },
    /// `Option<T>`: injected when available, `None` otherwise.
    Optional(Box<TypeToken>),
    /// A sum of several candidate types.
    Union(Vec<TypeToken>),
    /// An abstract capability (trait object).
    Capability {
        /// Method names the capability requires, used by generic scoring.
        methods: Vec<Arc<str>>,
    },
    /// A user-defined concrete type.
    Concrete,
    /// A late-bound name resolved through the registry's type links.
    Forward(Arc<str>),
    /// A parameterized service type `G<T>` resolved through the
    /// generic-implementation table.
    Generic {
        /// The generic origin name, e.g. `Repository`.
        origin: Arc<str>,
        /// The type arguments.
        args: Vec<TypeToken>,
    },
    /// A deferred slot: the dependency is delivered as a lazy handle.
    Deferred(Box<TypeToken>),
}

/// A type description the analyzer can make injection decisions about.
///
/// # Examples
///
/// ```rust
/// use cask_di::TypeToken;
///
/// struct Database;
///
/// let plain = TypeToken::of::<Database>();
/// assert_eq!(plain.name(), "Database");
///
/// let opt = TypeToken::of::<Database>().optional();
/// assert_eq!(opt.name(), "Option<Database>");
/// ```
#[derive(Clone, Debug)]
pub struct TypeToken {
    name: Arc<str>,
    full_path: Option<&'static str>,
    type_id: Option<TypeId>,
    shape: TokenShape,
}

static PRIMITIVE_IDS: OnceLazy<AHashSet<TypeId>> = OnceLazy::new(|| {
    let mut set = AHashSet::new();
    set.insert(TypeId::of::<bool>());
    set.insert(TypeId::of::<char>());
    set.insert(TypeId::of::<i8>());
    set.insert(TypeId::of::<i16>());
    set.insert(TypeId::of::<i32>());
    set.insert(TypeId::of::<i64>());
    set.insert(TypeId::of::<i128>());
    set.insert(TypeId::of::<isize>());
    set.insert(TypeId::of::<u8>());
    set.insert(TypeId::of::<u16>());
    set.insert(TypeId::of::<u32>());
    set.insert(TypeId::of::<u64>());
    set.insert(TypeId::of::<u128>());
    set.insert(TypeId::of::<usize>());
    set.insert(TypeId::of::<f32>());
    set.insert(TypeId::of::<f64>());
    set.insert(TypeId::of::<String>());
    set.insert(TypeId::of::<&'static str>());
    set.insert(TypeId::of::<Vec<u8>>());
    set.insert(TypeId::of::<()>());
    set
});

const STD_ROOTS: &[&str] = &["std::", "core::", "alloc::"];

impl TypeToken {
    /// Token for a concrete type, classified automatically.
    ///
    /// Built-in primitives land on [`TokenShape::Primitive`]; everything
    /// else is [`TokenShape::Concrete`] with the module path retained so
    /// the analyzer can apply the standard-library rule.
    pub fn of<T: 'static>() -> Self {
        let full = std::any::type_name::<T>();
        let id = TypeId::of::<T>();
        let shape = if PRIMITIVE_IDS.contains(&id) {
            TokenShape::Primitive
        } else {
            TokenShape::Concrete
        };
        TypeToken {
            name: Arc::from(simple_name(full)),
            full_path: Some(full),
            type_id: Some(id),
            shape,
        }
    }

    /// Token for a parameter with no type annotation.
    pub fn untyped() -> Self {
        TypeToken {
            name: Arc::from("_"),
            full_path: None,
            type_id: None,
            shape: TokenShape::Untyped,
        }
    }

    /// Token for an abstract capability (trait object).
    pub fn capability<C: ?Sized + 'static>() -> Self {
        let full = std::any::type_name::<C>();
        TypeToken {
            name: Arc::from(simple_name(full)),
            full_path: Some(full),
            type_id: None,
            shape: TokenShape::Capability { methods: Vec::new() },
        }
    }

    /// Token for a capability known only by name.
    pub fn capability_named(name: impl AsRef<str>) -> Self {
        TypeToken {
            name: Arc::from(name.as_ref()),
            full_path: None,
            type_id: None,
            shape: TokenShape::Capability { methods: Vec::new() },
        }
    }

    /// Declares the method names this capability requires. Feeds the
    /// generic-implementation scoring.
    pub fn requiring(mut self, methods: impl IntoIterator<Item = &'static str>) -> Self {
        if let TokenShape::Capability { methods: m } = &mut self.shape {
            m.extend(methods.into_iter().map(Arc::from));
        }
        self
    }

    /// Wraps this token as `Option<T>`.
    pub fn optional(self) -> Self {
        TypeToken {
            name: Arc::from(format!("Option<{}>", self.name)),
            full_path: None,
            type_id: None,
            shape: TokenShape::Optional(Box::new(self)),
        }
    }

    /// Wraps this token as a lazily-delivered slot.
    pub fn deferred(self) -> Self {
        TypeToken {
            name: Arc::from(format!("Lazy<{}>", self.name)),
            full_path: None,
            type_id: None,
            shape: TokenShape::Deferred(Box::new(self)),
        }
    }

    /// A sum type over several candidates.
    pub fn union(members: impl IntoIterator<Item = TypeToken>) -> Self {
        let members: Vec<TypeToken> = members.into_iter().collect();
        let name = members
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(" | ");
        TypeToken {
            name: Arc::from(name),
            full_path: None,
            type_id: None,
            shape: TokenShape::Union(members),
        }
    }

    /// An ordered-sequence container of `inner` (never auto-injected).
    pub fn sequence_of(inner: TypeToken) -> Self {
        TypeToken {
            name: Arc::from(format!("Vec<{}>", inner.name)),
            full_path: None,
            type_id: None,
            shape: TokenShape::Container { origin: Arc::from("Vec"), args: vec![inner] },
        }
    }

    /// A key/value mapping container (never auto-injected).
    pub fn mapping_of(key: TypeToken, value: TypeToken) -> Self {
        let name = format!("HashMap<{}, {}>", key.name, value.name);
        TypeToken {
            name: Arc::from(name),
            full_path: None,
            type_id: None,
            shape: TokenShape::Container {
                origin: Arc::from("HashMap"),
                args: vec![key, value],
            },
        }
    }

    /// A late-bound type name, resolved through the registry's type-link
    /// table at analysis time.
    pub fn forward(name: impl AsRef<str>) -> Self {
        let name: Arc<str> = Arc::from(name.as_ref());
        TypeToken {
            name: name.clone(),
            full_path: None,
            type_id: None,
            shape: TokenShape::Forward(name),
        }
    }

    /// A parameterized service type `G<T1, ..>` resolved through the
    /// generic-implementation table.
    pub fn generic(origin: impl AsRef<str>, args: impl IntoIterator<Item = TypeToken>) -> Self {
        let origin: Arc<str> = Arc::from(origin.as_ref());
        let args: Vec<TypeToken> = args.into_iter().collect();
        let rendered = format!(
            "{}<{}>",
            origin,
            args.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ")
        );
        TypeToken {
            name: Arc::from(rendered),
            full_path: None,
            type_id: None,
            shape: TokenShape::Generic { origin, args },
        }
    }

    /// The canonical display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shape driving analyzer decisions.
    pub fn shape(&self) -> &TokenShape {
        &self.shape
    }

    /// The canonical registry key for this token.
    pub fn key(&self) -> Key {
        Key::new(&*self.name)
    }

    pub(crate) fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Whether this token's type lives in the standard library namespace.
    pub(crate) fn is_std_type(&self) -> bool {
        match self.full_path {
            Some(path) => STD_ROOTS.iter().any(|root| path.starts_with(root)),
            None => false,
        }
    }

    /// Identity comparison: TypeId when both sides carry one, canonical
    /// name otherwise.
    pub(crate) fn same_type(&self, other: &TypeToken) -> bool {
        match (self.type_id, other.type_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.name == other.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Service;
    trait Greeter {}

    #[test]
    fn primitives_are_classified() {
        assert!(matches!(TypeToken::of::<u32>().shape(), TokenShape::Primitive));
        assert!(matches!(TypeToken::of::<String>().shape(), TokenShape::Primitive));
        assert!(matches!(TypeToken::of::<Service>().shape(), TokenShape::Concrete));
    }

    #[test]
    fn std_types_carry_their_path() {
        let token = TypeToken::of::<std::time::Duration>();
        assert!(token.is_std_type());
        assert!(!TypeToken::of::<Service>().is_std_type());
    }

    #[test]
    fn capability_tokens_drop_dyn_prefix() {
        let token = TypeToken::capability::<dyn Greeter>();
        assert_eq!(token.name(), "Greeter");
    }

    #[test]
    fn generic_tokens_render_arguments() {
        let token = TypeToken::generic("Repository", [TypeToken::of::<Service>()]);
        assert_eq!(token.name(), "Repository<Service>");
        assert_eq!(token.key().as_str(), "Repository<Service>");
    }

    #[test]
    fn union_tokens_list_members() {
        let token = TypeToken::union([TypeToken::of::<Service>(), TypeToken::of::<u32>()]);
        assert_eq!(token.name(), "Service | u32");
    }
}
