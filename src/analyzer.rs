//! The type analyzer: the injection decision engine.
//!
//! For every declared parameter the analyzer produces an
//! [`InjectResult`] saying whether the resolver should inject the slot,
//! skip it, inject it optionally, or fail with an ambiguity. Decisions
//! follow a fixed rule order so outcomes stay predictable; results are
//! cached and the cache is wiped whenever any registry in the lookup
//! chain mutates.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;

use crate::generics::{resolve_generic, GenericMatch};
use crate::key::Key;
use crate::provider::{ParamSpec, Signature};
use crate::registry::ComponentRegistry;
use crate::token::{TokenShape, TypeToken};

/// Bound on auto-creation recursion and subtype walks.
const MAX_ANALYSIS_DEPTH: usize = 8;

/// Possible outcomes of injection analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectDecision {
    /// Definitely inject this parameter.
    Inject,
    /// Never inject this parameter.
    Skip,
    /// Inject when available, pass `None` otherwise.
    Optional,
    /// Cannot decide; resolution of this slot fails.
    Ambiguous,
}

/// Result of injection analysis for one parameter.
#[derive(Debug, Clone)]
pub struct InjectResult {
    /// The decision.
    pub decision: InjectDecision,
    /// For `Optional` and resolved unions/generics: the effective inner
    /// type that should be provided.
    pub inner: Option<TypeToken>,
    /// The registry key the resolver should ask for, when it differs
    /// from the declared token's own key.
    pub target: Option<Key>,
    /// For `Ambiguous`: every discovered candidate, sorted.
    pub candidates: Vec<Key>,
    /// Human-readable rationale, used in diagnostics.
    pub reason: String,
}

impl InjectResult {
    fn skip(reason: impl Into<String>) -> Self {
        InjectResult {
            decision: InjectDecision::Skip,
            inner: None,
            target: None,
            candidates: Vec::new(),
            reason: reason.into(),
        }
    }

    fn inject(reason: impl Into<String>) -> Self {
        InjectResult {
            decision: InjectDecision::Inject,
            inner: None,
            target: None,
            candidates: Vec::new(),
            reason: reason.into(),
        }
    }

    fn ambiguous(candidates: Vec<Key>, reason: impl Into<String>) -> Self {
        InjectResult {
            decision: InjectDecision::Ambiguous,
            inner: None,
            target: None,
            candidates,
            reason: reason.into(),
        }
    }

    /// Whether the resolver should attempt to provide this slot.
    pub fn should_provide(&self) -> bool {
        matches!(self.decision, InjectDecision::Inject | InjectDecision::Optional)
    }
}

struct CacheState {
    epoch: u64,
    results: AHashMap<(Arc<str>, &'static str), InjectResult>,
}

/// Analyzes declared types against a registry lookup chain (own registry
/// first, then parents) and decides injection behavior.
pub struct TypeAnalyzer {
    registries: Vec<Arc<ComponentRegistry>>,
    cache: Mutex<CacheState>,
}

impl TypeAnalyzer {
    pub(crate) fn new(registries: Vec<Arc<ComponentRegistry>>) -> Self {
        TypeAnalyzer {
            registries,
            cache: Mutex::new(CacheState { epoch: 0, results: AHashMap::new() }),
        }
    }

    fn chain_epoch(&self) -> u64 {
        self.registries.iter().map(|r| r.epoch()).sum()
    }

    fn chain_has(&self, key: &Key) -> bool {
        self.registries.iter().any(|r| r.has(key))
    }

    fn chain_resolve_link(&self, name: &str) -> Option<TypeToken> {
        self.registries.iter().find_map(|r| r.resolve_link(name))
    }

    fn chain_has_blueprint(&self, key: &Key) -> bool {
        self.registries.iter().any(|r| r.blueprint(key).is_some())
    }

    pub(crate) fn chain_blueprint(&self, key: &Key) -> Option<Arc<crate::registry::Blueprint>> {
        self.registries.iter().find_map(|r| r.blueprint(key))
    }

    fn chain_implementers(&self, capability: &str) -> Vec<Key> {
        let mut seen = AHashSet::new();
        let mut keys = Vec::new();
        for registry in &self.registries {
            for key in registry.implementers_of(capability) {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        keys
    }

    fn chain_is_subtype(&self, child: &str, parent: &str) -> bool {
        if child == parent {
            return true;
        }
        let mut frontier = vec![Arc::<str>::from(child)];
        let mut seen: AHashSet<Arc<str>> = AHashSet::new();
        for _ in 0..MAX_ANALYSIS_DEPTH {
            let mut next = Vec::new();
            for name in frontier.drain(..) {
                for registry in &self.registries {
                    for p in registry.subtype_parents(&name) {
                        if &*p == parent {
                            return true;
                        }
                        if seen.insert(p.clone()) {
                            next.push(p);
                        }
                    }
                }
            }
            if next.is_empty() {
                return false;
            }
            frontier = next;
        }
        false
    }

    /// Analyzes one declared parameter, applying the full rule order.
    ///
    /// Rule 1 (a declared default always skips) and rule 2 (no
    /// annotation skips) are decided here; everything else is cached by
    /// `(type, parameter name)`.
    pub fn analyze_param(&self, param: &ParamSpec) -> InjectResult {
        if param.has_default() {
            return InjectResult::skip("has default value");
        }
        if matches!(param.token().shape(), TokenShape::Untyped) {
            return InjectResult::skip("no type annotation");
        }

        let cache_key = (Arc::<str>::from(param.token().name()), param.name());
        {
            let mut cache = self.cache.lock();
            let epoch = self.chain_epoch();
            if cache.epoch != epoch {
                cache.results.clear();
                cache.epoch = epoch;
            }
            if let Some(hit) = cache.results.get(&cache_key) {
                return hit.clone();
            }
        }

        let result = self.analyze_token(param.token());

        let mut cache = self.cache.lock();
        // A mutation may have raced the analysis; only cache results
        // computed against the current epoch.
        if cache.epoch == self.chain_epoch() {
            cache.results.insert(cache_key, result.clone());
        }
        result
    }

    /// Analyzes a bare type token (rules 3 through 10).
    pub fn analyze_token(&self, token: &TypeToken) -> InjectResult {
        let mut visiting = AHashSet::new();
        self.analyze_shape(token, 0, &mut visiting)
    }

    fn analyze_shape(
        &self,
        token: &TypeToken,
        depth: usize,
        visiting: &mut AHashSet<Key>,
    ) -> InjectResult {
        if depth > MAX_ANALYSIS_DEPTH {
            return InjectResult::skip("analysis depth exceeded");
        }
        match token.shape() {
            TokenShape::Untyped => InjectResult::skip("no type annotation"),
            TokenShape::Primitive => InjectResult::skip("built-in type"),
            TokenShape::Container { origin, .. } => {
                InjectResult::skip(format!("parametric container {origin}"))
            }
            TokenShape::Optional(inner) => {
                let inner_result = self.analyze_shape(inner, depth + 1, visiting);
                InjectResult {
                    decision: InjectDecision::Optional,
                    target: inner_result.target,
                    inner: Some((**inner).clone()),
                    candidates: Vec::new(),
                    reason: format!("optional type; inject {} if available", inner.name()),
                }
            }
            TokenShape::Union(members) => self.analyze_union(members),
            TokenShape::Forward(name) => match self.chain_resolve_link(name) {
                Some(linked) => {
                    let mut result = self.analyze_shape(&linked, depth + 1, visiting);
                    // Resolution must target the linked type, not the
                    // forward name.
                    if result.should_provide() {
                        if result.target.is_none() {
                            result.target = Some(linked.key());
                        }
                        if result.inner.is_none() {
                            result.inner = Some(linked);
                        }
                    }
                    result
                }
                None => InjectResult::ambiguous(
                    Vec::new(),
                    format!("cannot resolve forward reference '{name}'"),
                ),
            },
            TokenShape::Deferred(inner) => self.analyze_shape(inner, depth + 1, visiting),
            TokenShape::Capability { .. } => self.analyze_capability(token),
            TokenShape::Generic { origin, args } => self.analyze_generic(token, origin, args),
            TokenShape::Concrete => self.analyze_concrete(token, depth, visiting),
        }
    }

    fn analyze_union(&self, members: &[TypeToken]) -> InjectResult {
        let registered: Vec<&TypeToken> = members
            .iter()
            .filter(|m| self.chain_has(&m.key()))
            .collect();
        match registered.len() {
            0 => InjectResult::skip("union with no registered members"),
            1 => {
                let member = registered[0];
                InjectResult {
                    decision: InjectDecision::Inject,
                    inner: Some(member.clone()),
                    target: Some(member.key()),
                    candidates: Vec::new(),
                    reason: format!("union with single registered member {}", member.name()),
                }
            }
            _ => {
                let mut candidates: Vec<Key> = registered.iter().map(|m| m.key()).collect();
                candidates.sort();
                InjectResult::ambiguous(candidates, "union with multiple registered members")
            }
        }
    }

    fn analyze_capability(&self, token: &TypeToken) -> InjectResult {
        let key = token.key();
        if self.chain_has(&key) {
            return InjectResult::inject("registered capability");
        }
        let implementers = self.chain_implementers(token.name());
        match implementers.len() {
            0 => InjectResult::skip("no capability implementation registered"),
            1 => InjectResult {
                decision: InjectDecision::Inject,
                inner: None,
                target: Some(implementers[0].clone()),
                candidates: Vec::new(),
                reason: format!("single capability implementation {}", implementers[0]),
            },
            _ => InjectResult::ambiguous(implementers, "multiple capability implementations"),
        }
    }

    fn analyze_generic(&self, token: &TypeToken, origin: &str, args: &[TypeToken]) -> InjectResult {
        if self.chain_has(&token.key()) {
            return InjectResult::inject("registered generic type");
        }

        let mut bindings = Vec::new();
        for registry in &self.registries {
            bindings.extend(registry.generic_bindings(origin));
        }
        if !bindings.is_empty() {
            let registered = |key: &Key| self.chain_has(key) || self.chain_has_blueprint(key);
            let subtype = |child: &str, parent: &str| self.chain_is_subtype(child, parent);
            match resolve_generic(&bindings, args, &registered, &subtype) {
                GenericMatch::Unique(concrete) => {
                    return InjectResult {
                        decision: InjectDecision::Inject,
                        target: Some(concrete.key()),
                        reason: format!("generic implementation {}", concrete.name()),
                        inner: Some(concrete),
                        candidates: Vec::new(),
                    };
                }
                GenericMatch::Ambiguous(candidates) => {
                    return InjectResult::ambiguous(
                        candidates,
                        "generic implementations tied on compatibility score",
                    );
                }
                GenericMatch::None => {}
            }
        }

        let origin_key = Key::new(origin);
        if self.chain_has(&origin_key) {
            return InjectResult {
                decision: InjectDecision::Inject,
                inner: None,
                target: Some(origin_key),
                candidates: Vec::new(),
                reason: format!("generic origin {origin} registered"),
            };
        }
        InjectResult::skip(format!("generic type {} not registered", token.name()))
    }

    fn analyze_concrete(
        &self,
        token: &TypeToken,
        depth: usize,
        visiting: &mut AHashSet<Key>,
    ) -> InjectResult {
        let key = token.key();
        if self.chain_has(&key) {
            return InjectResult::inject("registered user type");
        }
        if token.is_std_type() {
            return InjectResult::skip("standard library type, not registered");
        }
        if self.can_auto_create_inner(&key, depth, visiting) {
            return InjectResult::inject("unregistered type, auto-creation possible");
        }
        InjectResult::skip("unregistered type")
    }

    /// Whether an unregistered concrete type can be auto-created: a
    /// blueprint is declared and every required parameter is itself
    /// auto-satisfiable. Recursive, bounded by depth and a visiting set.
    pub fn can_auto_create(&self, key: &Key) -> bool {
        let mut visiting = AHashSet::new();
        self.can_auto_create_inner(key, 0, &mut visiting)
    }

    fn can_auto_create_inner(
        &self,
        key: &Key,
        depth: usize,
        visiting: &mut AHashSet<Key>,
    ) -> bool {
        if depth > MAX_ANALYSIS_DEPTH || !visiting.insert(key.clone()) {
            return false;
        }
        let Some(blueprint) = self.chain_blueprint(key) else {
            visiting.remove(key);
            return false;
        };
        let creatable = blueprint.signature.params().iter().all(|param| {
            if param.has_default() {
                return true;
            }
            let result = self.analyze_shape(param.token(), depth + 1, visiting);
            result.should_provide()
        });
        visiting.remove(key);
        creatable
    }

    /// The per-parameter injection plan for a signature.
    pub fn injection_plan(&self, signature: &Signature) -> Vec<InjectResult> {
        signature
            .params()
            .iter()
            .map(|param| self.analyze_param(param))
            .collect()
    }

    /// Analyzer-level circular-dependency precheck: walks declared
    /// constructor parameter types from `root` up to `max_depth` and
    /// reports the first repeated type on the walk path.
    ///
    /// This is a diagnostic; the resolver detects cycles on the actual
    /// resolution stack regardless.
    pub fn detect_cycle(&self, root: &TypeToken, max_depth: usize) -> Option<Vec<Key>> {
        let mut path = Vec::new();
        self.walk_cycle(&root.key(), max_depth, &mut path)
    }

    fn walk_cycle(&self, key: &Key, budget: usize, path: &mut Vec<Key>) -> Option<Vec<Key>> {
        if let Some(position) = path.iter().position(|k| k == key) {
            let mut cycle = path[position..].to_vec();
            cycle.push(key.clone());
            return Some(cycle);
        }
        if budget == 0 {
            return None;
        }

        let signature = self
            .registries
            .iter()
            .find_map(|r| r.get(key))
            .and_then(|d| d.provider.signature().cloned())
            .or_else(|| self.chain_blueprint(key).map(|b| b.signature.clone()))?;

        path.push(key.clone());
        for param in signature.params() {
            if let Some(dep) = dependency_key(param.token()) {
                if let Some(cycle) = self.walk_cycle(&dep, budget - 1, path) {
                    path.pop();
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }
}

/// Extracts the key of the concrete dependency a token stands for, if
/// one can be determined statically.
fn dependency_key(token: &TypeToken) -> Option<Key> {
    match token.shape() {
        TokenShape::Concrete | TokenShape::Capability { .. } => Some(token.key()),
        TokenShape::Optional(inner) | TokenShape::Deferred(inner) => dependency_key(inner),
        TokenShape::Union(members) if members.len() == 1 => dependency_key(&members[0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiResult;
    use crate::provider::{Injectable, ResolvedArgs};
    use crate::registration::Registration;

    struct Cache;
    impl Injectable for Cache {
        fn signature() -> Signature {
            Signature::empty()
        }
        fn construct(_args: &ResolvedArgs) -> DiResult<Self> {
            Ok(Cache)
        }
    }

    fn analyzer_with(registry: Arc<ComponentRegistry>) -> TypeAnalyzer {
        TypeAnalyzer::new(vec![registry])
    }

    fn register_cache(registry: &ComponentRegistry) {
        let (descriptor, _) = Registration::for_type::<Cache>().into_parts();
        registry.register(descriptor, false).unwrap();
    }

    #[test]
    fn default_always_skips_regardless_of_type() {
        let registry = Arc::new(ComponentRegistry::new());
        register_cache(&registry);
        let analyzer = analyzer_with(registry);

        let param = ParamSpec::with_default("cache", TypeToken::of::<Cache>());
        let result = analyzer.analyze_param(&param);
        assert_eq!(result.decision, InjectDecision::Skip);
        assert_eq!(result.reason, "has default value");
    }

    #[test]
    fn primitives_and_containers_skip() {
        let analyzer = analyzer_with(Arc::new(ComponentRegistry::new()));
        assert_eq!(
            analyzer.analyze_token(&TypeToken::of::<u32>()).decision,
            InjectDecision::Skip
        );
        let seq = TypeToken::sequence_of(TypeToken::of::<Cache>());
        assert_eq!(analyzer.analyze_token(&seq).decision, InjectDecision::Skip);
    }

    #[test]
    fn optional_reports_inner_type() {
        let registry = Arc::new(ComponentRegistry::new());
        register_cache(&registry);
        let analyzer = analyzer_with(registry);

        let token = TypeToken::of::<Cache>().optional();
        let result = analyzer.analyze_token(&token);
        assert_eq!(result.decision, InjectDecision::Optional);
        assert_eq!(result.inner.unwrap().name(), "Cache");
    }

    #[test]
    fn union_follows_registration_count() {
        struct Other;
        let registry = Arc::new(ComponentRegistry::new());
        let analyzer = analyzer_with(registry.clone());
        let union = TypeToken::union([TypeToken::of::<Cache>(), TypeToken::of::<Other>()]);

        assert_eq!(analyzer.analyze_token(&union).decision, InjectDecision::Skip);

        register_cache(&registry);
        let result = analyzer.analyze_token(&union);
        assert_eq!(result.decision, InjectDecision::Inject);
        assert_eq!(result.target.unwrap().as_str(), "Cache");

        let (descriptor, _) = Registration::instance(Other).into_parts();
        registry.register(descriptor, false).unwrap();
        let result = analyzer.analyze_token(&union);
        assert_eq!(result.decision, InjectDecision::Ambiguous);
        assert_eq!(result.candidates.len(), 2);
    }

    #[test]
    fn unlinked_forward_reference_is_surfaced() {
        let registry = Arc::new(ComponentRegistry::new());
        let analyzer = analyzer_with(registry.clone());
        let token = TypeToken::forward("LateBound");
        assert_eq!(
            analyzer.analyze_token(&token).decision,
            InjectDecision::Ambiguous
        );

        registry.link_type("LateBound", TypeToken::of::<Cache>());
        register_cache(&registry);
        assert_eq!(
            analyzer.analyze_token(&token).decision,
            InjectDecision::Inject
        );
    }

    #[test]
    fn stdlib_type_skips_unless_registered() {
        let registry = Arc::new(ComponentRegistry::new());
        let analyzer = analyzer_with(registry.clone());
        let token = TypeToken::of::<std::time::Duration>();
        assert_eq!(analyzer.analyze_token(&token).decision, InjectDecision::Skip);

        let (descriptor, _) =
            Registration::instance(std::time::Duration::from_secs(1)).into_parts();
        registry.register(descriptor, false).unwrap();
        assert_eq!(
            analyzer.analyze_token(&token).decision,
            InjectDecision::Inject
        );
    }

    #[test]
    fn analysis_is_deterministic_and_cached() {
        let registry = Arc::new(ComponentRegistry::new());
        register_cache(&registry);
        let analyzer = analyzer_with(registry);
        let param = ParamSpec::new("cache", TypeToken::of::<Cache>());

        let first = analyzer.analyze_param(&param);
        let second = analyzer.analyze_param(&param);
        assert_eq!(first.decision, second.decision);
        assert_eq!(first.reason, second.reason);
    }

    #[test]
    fn cache_invalidates_on_registry_mutation() {
        let registry = Arc::new(ComponentRegistry::new());
        let analyzer = analyzer_with(registry.clone());
        let param = ParamSpec::new("cache", TypeToken::of::<Cache>());

        assert_eq!(analyzer.analyze_param(&param).decision, InjectDecision::Skip);
        register_cache(&registry);
        assert_eq!(
            analyzer.analyze_param(&param).decision,
            InjectDecision::Inject
        );
    }
}
