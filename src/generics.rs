//! Generic-implementation table and compatibility scoring.
//!
//! Parameterized service types (`Repository<User>`) resolve against a
//! table of declared concrete implementations. Multiple matches are
//! disambiguated by a compatibility score; a tie is ambiguous and
//! surfaces to the caller rather than being guessed.

use std::sync::Arc;

use ahash::AHashMap;

use crate::key::Key;
use crate::token::{TokenShape, TypeToken};

/// Variance of one generic parameter, driving the compatible-match rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    /// A binding for `G<Sub>` satisfies a request for `G<Super>`.
    Covariant,
    /// A binding for `G<Super>` satisfies a request for `G<Sub>`.
    Contravariant,
    /// Only exact argument matches are compatible.
    Invariant,
}

/// One declared concrete implementation for a generic origin.
///
/// A binding with no bound arguments is "open" and matches any argument
/// list for its origin, at a lower score than an exact match.
#[derive(Clone)]
pub struct GenericBinding {
    pub(crate) origin: Arc<str>,
    pub(crate) args: Vec<TypeToken>,
    pub(crate) concrete: TypeToken,
    pub(crate) variance: Vec<Variance>,
    pub(crate) methods: Vec<Arc<str>>,
}

impl GenericBinding {
    /// A binding of `origin` to the given concrete type.
    pub fn new(origin: impl AsRef<str>, concrete: TypeToken) -> Self {
        GenericBinding {
            origin: Arc::from(origin.as_ref()),
            args: Vec::new(),
            concrete,
            variance: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Binds a type argument position.
    pub fn arg(mut self, token: TypeToken) -> Self {
        self.args.push(token);
        self
    }

    /// Sets the variance for each bound parameter, in order. Unset
    /// positions are invariant.
    pub fn variance(mut self, variance: impl IntoIterator<Item = Variance>) -> Self {
        self.variance = variance.into_iter().collect();
        self
    }

    /// Declares a method this implementation provides, feeding the
    /// structural part of the score.
    pub fn method(mut self, name: &'static str) -> Self {
        self.methods.push(Arc::from(name));
        self
    }

    fn variance_at(&self, index: usize) -> Variance {
        self.variance.get(index).copied().unwrap_or(Variance::Invariant)
    }
}

#[derive(Default)]
pub(crate) struct GenericTable {
    bindings: AHashMap<Arc<str>, Vec<GenericBinding>>,
}

impl GenericTable {
    pub(crate) fn insert(&mut self, binding: GenericBinding) {
        self.bindings
            .entry(binding.origin.clone())
            .or_default()
            .push(binding);
    }

    pub(crate) fn bindings(&self, origin: &str) -> Vec<GenericBinding> {
        self.bindings.get(origin).cloned().unwrap_or_default()
    }
}

/// Outcome of a generic-table lookup.
pub(crate) enum GenericMatch {
    Unique(TypeToken),
    Ambiguous(Vec<Key>),
    None,
}

/// Scores one binding against the requested argument list.
///
/// Exact type-argument match +10, compatible (variance-aware subtype or
/// generic-origin) match +5, registered concrete +3, each declared
/// method required by a capability argument +1. Open bindings score +2.
fn score_binding(
    binding: &GenericBinding,
    requested: &[TypeToken],
    is_registered: &dyn Fn(&Key) -> bool,
    is_subtype: &dyn Fn(&str, &str) -> bool,
) -> i32 {
    let mut score = 0i32;

    if binding.args.is_empty() {
        score += 2;
    } else {
        if binding.args.len() != requested.len() {
            return 0;
        }
        for (index, (bound, wanted)) in binding.args.iter().zip(requested).enumerate() {
            if bound.same_type(wanted) {
                score += 10;
                continue;
            }
            let compatible = match binding.variance_at(index) {
                Variance::Covariant => is_subtype(bound.name(), wanted.name()),
                Variance::Contravariant => is_subtype(wanted.name(), bound.name()),
                Variance::Invariant => false,
            };
            let origin_match = matches!(
                (bound.shape(), wanted.shape()),
                (
                    TokenShape::Generic { origin: a, .. },
                    TokenShape::Generic { origin: b, .. }
                ) if a == b
            );
            if compatible || origin_match {
                score += 5;
            }
        }
    }

    if is_registered(&binding.concrete.key()) {
        score += 3;
    }

    for method in &binding.methods {
        let required = requested.iter().any(|token| match token.shape() {
            TokenShape::Capability { methods } => methods.iter().any(|m| m == method),
            _ => false,
        });
        if required {
            score += 1;
        }
    }

    score
}

pub(crate) fn resolve_generic(
    bindings: &[GenericBinding],
    requested: &[TypeToken],
    is_registered: &dyn Fn(&Key) -> bool,
    is_subtype: &dyn Fn(&str, &str) -> bool,
) -> GenericMatch {
    let mut scored: Vec<(i32, &GenericBinding)> = bindings
        .iter()
        .map(|b| (score_binding(b, requested, is_registered, is_subtype), b))
        .filter(|(score, _)| *score > 0)
        .collect();

    if scored.is_empty() {
        return GenericMatch::None;
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    if scored.len() == 1 || scored[0].0 > scored[1].0 {
        return GenericMatch::Unique(scored[0].1.concrete.clone());
    }

    let top = scored[0].0;
    let mut candidates: Vec<Key> = scored
        .iter()
        .take_while(|(score, _)| *score == top)
        .map(|(_, b)| b.concrete.key())
        .collect();
    candidates.sort();
    GenericMatch::Ambiguous(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct User;
    struct Order;
    struct UserRepo;
    struct OrderRepo;

    fn no_registry(_: &Key) -> bool {
        false
    }

    fn no_subtypes(_: &str, _: &str) -> bool {
        false
    }

    #[test]
    fn exact_match_beats_open_binding() {
        let bindings = vec![
            GenericBinding::new("Repository", TypeToken::of::<OrderRepo>()),
            GenericBinding::new("Repository", TypeToken::of::<UserRepo>())
                .arg(TypeToken::of::<User>()),
        ];
        let requested = [TypeToken::of::<User>()];
        match resolve_generic(&bindings, &requested, &no_registry, &no_subtypes) {
            GenericMatch::Unique(token) => assert_eq!(token.name(), "UserRepo"),
            _ => panic!("expected unique match"),
        }
    }

    #[test]
    fn tie_is_ambiguous() {
        let bindings = vec![
            GenericBinding::new("Repository", TypeToken::of::<UserRepo>())
                .arg(TypeToken::of::<User>()),
            GenericBinding::new("Repository", TypeToken::of::<OrderRepo>())
                .arg(TypeToken::of::<User>()),
        ];
        let requested = [TypeToken::of::<User>()];
        match resolve_generic(&bindings, &requested, &no_registry, &no_subtypes) {
            GenericMatch::Ambiguous(candidates) => {
                assert_eq!(candidates.len(), 2);
            }
            _ => panic!("expected ambiguity"),
        }
    }

    #[test]
    fn registered_concrete_breaks_tie() {
        let bindings = vec![
            GenericBinding::new("Repository", TypeToken::of::<UserRepo>())
                .arg(TypeToken::of::<User>()),
            GenericBinding::new("Repository", TypeToken::of::<OrderRepo>())
                .arg(TypeToken::of::<User>()),
        ];
        let requested = [TypeToken::of::<User>()];
        let registered = |key: &Key| key.as_str() == "OrderRepo";
        match resolve_generic(&bindings, &requested, &registered, &no_subtypes) {
            GenericMatch::Unique(token) => assert_eq!(token.name(), "OrderRepo"),
            _ => panic!("expected unique match"),
        }
    }

    #[test]
    fn covariant_subtype_scores_compatible() {
        let bindings = vec![GenericBinding::new("Repository", TypeToken::of::<UserRepo>())
            .arg(TypeToken::of::<User>())
            .variance([Variance::Covariant])];
        let requested = [TypeToken::of::<Order>()];
        let subtype = |child: &str, parent: &str| child == "User" && parent == "Order";
        match resolve_generic(&bindings, &requested, &no_registry, &subtype) {
            GenericMatch::Unique(token) => assert_eq!(token.name(), "UserRepo"),
            _ => panic!("expected compatible match"),
        }
    }
}
