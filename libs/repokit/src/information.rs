//! Repository information: the flattened method view, base-class signature
//! matching, and the classification partition.
//!
//! [`RepositoryInformation`] layers base-class awareness onto
//! [`RepositoryMetadata`]: every method reachable from the repository
//! interface is classified into exactly one [`RouteKind`] - base-class,
//! custom, or query - and interface methods are mapped onto the base-class
//! methods that implement them via generic-substitution-aware signature
//! matching. Match results are cached per method; repeated lookups return
//! the same `Arc` without re-running the matcher.

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::descriptor::{BaseClassDecl, InterfaceDecl, MethodDecl, MethodSig, TypeRef};
use crate::error::ConfigurationError;
use crate::metadata::RepositoryMetadata;
use crate::typeargs::{DomainTypeBinding, ResolvedType};

/// A method as seen from the repository interface: inherited type variables
/// are substituted with the arguments the interface supplies on the way down.
#[derive(Clone, Debug)]
pub struct RepositoryMethod {
    decl: Arc<MethodDecl>,
    declared_by: &'static str,
    params: Vec<ResolvedType>,
}

impl RepositoryMethod {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.decl.name()
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.decl.arity()
    }

    /// Parameter types after substitution; positions the hierarchy never
    /// pins down stay [`ResolvedType::Unresolved`].
    #[inline]
    #[must_use]
    pub fn params(&self) -> &[ResolvedType] {
        &self.params
    }

    /// Name of the interface that declared this method.
    #[inline]
    #[must_use]
    pub fn declared_by(&self) -> &'static str {
        self.declared_by
    }

    /// The original declaration.
    #[inline]
    #[must_use]
    pub fn decl(&self) -> &Arc<MethodDecl> {
        &self.decl
    }
}

/// Where an invocation of a method is routed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RouteKind {
    /// Implemented by the generic CRUD base class.
    BaseClass,
    /// Supplied by the caller's custom implementation object.
    Custom,
    /// Resolved into an executable query.
    Query,
}

/// Result of mapping an interface method onto the base class: the matching
/// base-class method, or the interface method itself when nothing matches.
#[derive(Debug)]
pub enum BaseMethodResolution {
    Base(Arc<MethodDecl>),
    Interface(Arc<RepositoryMethod>),
}

impl BaseMethodResolution {
    #[inline]
    #[must_use]
    pub fn is_base(&self) -> bool {
        matches!(self, BaseMethodResolution::Base(_))
    }

    /// The matched base-class method, if any.
    #[must_use]
    pub fn base_method(&self) -> Option<&Arc<MethodDecl>> {
        match self {
            BaseMethodResolution::Base(method) => Some(method),
            BaseMethodResolution::Interface(_) => None,
        }
    }
}

/// Decides whether a base-class method implements an interface method,
/// under generic-variable substitution.
struct SignatureMatcher {
    interface: &'static str,
    marker: &'static str,
    base: Arc<BaseClassDecl>,
    first_var: Option<&'static str>,
    second_var: Option<&'static str>,
    binding: DomainTypeBinding,
    strict_unresolved: bool,
    runs: AtomicUsize,
}

impl SignatureMatcher {
    /// Find the first base-class method matching `method`.
    ///
    /// A base method matches iff names and arities are equal and every
    /// parameter position matches: a concrete base parameter must equal the
    /// interface parameter exactly; a base parameter naming the marker's
    /// first (second) type variable must equal the resolved domain (id)
    /// type. An unresolved binding never satisfies a variable position -
    /// unless strict mode is on, in which case attempting it is an error.
    fn find_base_method(
        &self,
        method: &RepositoryMethod,
    ) -> Result<Option<Arc<MethodDecl>>, ConfigurationError> {
        self.runs.fetch_add(1, Ordering::Relaxed);

        for candidate in self.base.methods() {
            if candidate.name() != method.name() || candidate.arity() != method.arity() {
                continue;
            }
            if self.params_match(candidate, method)? {
                tracing::trace!(
                    interface = self.interface,
                    method = method.name(),
                    base = self.base.name(),
                    "matched base-class method"
                );
                return Ok(Some(candidate.clone()));
            }
        }
        Ok(None)
    }

    fn params_match(
        &self,
        candidate: &MethodDecl,
        method: &RepositoryMethod,
    ) -> Result<bool, ConfigurationError> {
        for (base_param, iface_param) in candidate.params().iter().zip(method.params()) {
            let required = match base_param {
                TypeRef::Concrete(key) => ResolvedType::Known(*key),
                TypeRef::Var(var) => {
                    let slot = if Some(*var) == self.first_var {
                        self.binding.domain()
                    } else if Some(*var) == self.second_var {
                        self.binding.id()
                    } else {
                        // Variable the marker does not declare; nothing to
                        // substitute, the position cannot match.
                        return Ok(false);
                    };
                    if !slot.is_known() {
                        if self.strict_unresolved {
                            return Err(ConfigurationError::UnresolvedDomainType {
                                interface: self.interface,
                                marker: self.marker,
                            });
                        }
                        return Ok(false);
                    }
                    slot
                }
            };
            match iface_param {
                ResolvedType::Known(_) if *iface_param == required => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}

type MethodKey = (&'static str, usize);

/// Base-class-aware view of a repository interface.
pub struct RepositoryInformation {
    metadata: Arc<RepositoryMetadata>,
    marker: Arc<InterfaceDecl>,
    base_class: Arc<BaseClassDecl>,
    custom_methods: Option<Vec<MethodSig>>,
    methods: Vec<Arc<RepositoryMethod>>,
    matcher: SignatureMatcher,
    base_cache: DashMap<MethodKey, Arc<BaseMethodResolution>>,
}

impl RepositoryInformation {
    /// Build the information view.
    ///
    /// `custom_methods` is the advertised method set of the custom
    /// implementation, when one is supplied; it participates in
    /// classification the same way the original system consulted the custom
    /// implementation class.
    ///
    /// # Errors
    /// Returns [`ConfigurationError`] when the base class references type
    /// variables the marker does not declare.
    pub fn new(
        metadata: Arc<RepositoryMetadata>,
        marker: Arc<InterfaceDecl>,
        base_class: Arc<BaseClassDecl>,
        custom_methods: Option<Vec<MethodSig>>,
        strict_unresolved: bool,
    ) -> Result<Self, ConfigurationError> {
        validate_base_class(&base_class, &marker)?;

        let methods = flatten_methods(metadata.repository_interface());
        let interface = metadata.repository_interface().name();
        let matcher = SignatureMatcher {
            interface,
            marker: marker.name(),
            base: base_class.clone(),
            first_var: marker.vars().first().copied(),
            second_var: marker.vars().get(1).copied(),
            binding: metadata.binding(),
            strict_unresolved,
            runs: AtomicUsize::new(0),
        };
        tracing::debug!(
            interface,
            methods = methods.len(),
            base = base_class.name(),
            "repository information built"
        );

        Ok(Self {
            metadata,
            marker,
            base_class,
            custom_methods,
            methods,
            matcher,
            base_cache: DashMap::new(),
        })
    }

    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Arc<RepositoryMetadata> {
        &self.metadata
    }

    #[inline]
    #[must_use]
    pub fn base_class(&self) -> &Arc<BaseClassDecl> {
        &self.base_class
    }

    /// Every method reachable from the repository interface, child
    /// declarations shadowing inherited ones of the same name and arity.
    #[inline]
    #[must_use]
    pub fn methods(&self) -> &[Arc<RepositoryMethod>] {
        &self.methods
    }

    /// Look up a reachable method by name and arity.
    #[must_use]
    pub fn method(&self, name: &str, arity: usize) -> Option<&Arc<RepositoryMethod>> {
        self.methods
            .iter()
            .find(|m| m.name() == name && m.arity() == arity)
    }

    /// Resolve (and cache) the base-class method implementing `method`.
    ///
    /// The resolution is computed once per method; later calls return the
    /// identical `Arc`. An unmatched method resolves to itself.
    ///
    /// # Errors
    /// Propagates strict-mode unresolved-binding errors from the matcher.
    pub fn base_class_method(
        &self,
        method: &Arc<RepositoryMethod>,
    ) -> Result<Arc<BaseMethodResolution>, ConfigurationError> {
        let key = (method.name(), method.arity());
        if let Some(hit) = self.base_cache.get(&key) {
            return Ok(Arc::clone(&hit));
        }

        let resolution = match self.matcher.find_base_method(method)? {
            Some(base) => BaseMethodResolution::Base(base),
            None => BaseMethodResolution::Interface(Arc::clone(method)),
        };
        let entry = self
            .base_cache
            .entry(key)
            .or_insert_with(|| Arc::new(resolution));
        Ok(Arc::clone(&entry))
    }

    /// Whether `method` is (or overrides) part of the marker interface's own
    /// contract.
    #[must_use]
    pub fn is_marker_method(&self, method: &RepositoryMethod) -> bool {
        if method.declared_by() == self.marker.name() {
            return true;
        }
        self.marker.methods().iter().any(|marker_method| {
            marker_method.name() == method.name()
                && marker_method.arity() == method.arity()
                && self.marker_params_equal(marker_method, method)
        })
    }

    fn marker_params_equal(&self, marker_method: &MethodDecl, method: &RepositoryMethod) -> bool {
        let binding = self.metadata.binding();
        let first = self.marker.vars().first().copied();
        let second = self.marker.vars().get(1).copied();
        marker_method
            .params()
            .iter()
            .zip(method.params())
            .all(|(marker_param, iface_param)| {
                let substituted = match marker_param {
                    TypeRef::Concrete(key) => ResolvedType::Known(*key),
                    TypeRef::Var(var) if Some(*var) == first => binding.domain(),
                    TypeRef::Var(var) if Some(*var) == second => binding.id(),
                    TypeRef::Var(_) => ResolvedType::Unresolved,
                };
                substituted.is_known() && substituted == *iface_param
            })
    }

    /// Classify `method` into its single dispatch category.
    ///
    /// Marker-contract and base-matched methods are base-class methods; of
    /// the rest, methods the custom implementation advertises are custom
    /// (custom always wins over query resolution); everything else is a
    /// query candidate.
    ///
    /// # Errors
    /// Propagates strict-mode unresolved-binding errors from the matcher.
    pub fn classify(&self, method: &Arc<RepositoryMethod>) -> Result<RouteKind, ConfigurationError> {
        if self.is_marker_method(method) || self.base_class_method(method)?.is_base() {
            return Ok(RouteKind::BaseClass);
        }
        if self.custom_covers(method) {
            return Ok(RouteKind::Custom);
        }
        Ok(RouteKind::Query)
    }

    /// Whether `method` is backed by the custom implementation rather than
    /// the marker contract or the base class.
    ///
    /// # Errors
    /// Propagates strict-mode unresolved-binding errors from the matcher.
    pub fn is_custom_method(&self, method: &Arc<RepositoryMethod>) -> Result<bool, ConfigurationError> {
        Ok(self.classify(method)? == RouteKind::Custom)
    }

    /// Whether this is a typed repository interface with at least one custom
    /// method.
    ///
    /// # Errors
    /// Propagates strict-mode unresolved-binding errors from the matcher.
    pub fn has_custom_methods(&self) -> Result<bool, ConfigurationError> {
        if !self.metadata.repository_interface().vars().is_empty() {
            return Ok(false);
        }
        for method in &self.methods {
            if self.classify(method)? == RouteKind::Custom {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The methods classified as queries, to be resolved through the lookup
    /// strategy.
    ///
    /// # Errors
    /// Propagates strict-mode unresolved-binding errors from the matcher.
    pub fn query_methods(&self) -> Result<Vec<Arc<RepositoryMethod>>, ConfigurationError> {
        let mut result = Vec::new();
        for method in &self.methods {
            if self.classify(method)? == RouteKind::Query {
                result.push(Arc::clone(method));
            }
        }
        Ok(result)
    }

    fn custom_covers(&self, method: &RepositoryMethod) -> bool {
        let Some(custom) = &self.custom_methods else {
            return false;
        };
        custom.iter().any(|sig| {
            sig.name() == method.name()
                && sig.arity() == method.arity()
                && sig
                    .params()
                    .iter()
                    .zip(method.params())
                    .all(|(key, param)| *param == ResolvedType::Known(*key))
        })
    }

    #[cfg(test)]
    fn matcher_runs(&self) -> usize {
        self.matcher.runs.load(Ordering::Relaxed)
    }
}

fn validate_base_class(
    base: &BaseClassDecl,
    marker: &InterfaceDecl,
) -> Result<(), ConfigurationError> {
    for method in base.methods() {
        for param in method.params() {
            if let TypeRef::Var(var) = *param {
                if !marker.vars().contains(&var) {
                    return Err(ConfigurationError::Descriptor(
                        crate::descriptor::DescriptorError::UnboundTypeVariable {
                            interface: base.name(),
                            var,
                        },
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Collect every method reachable from `iface`, breadth-first, substituting
/// type variables along each `extends` edge. The first declaration of a
/// (name, arity) pair wins, so child interfaces shadow what they inherit.
fn flatten_methods(iface: &Arc<InterfaceDecl>) -> Vec<Arc<RepositoryMethod>> {
    type Subst = HashMap<&'static str, ResolvedType>;

    let mut result: Vec<Arc<RepositoryMethod>> = Vec::new();
    let mut seen: HashSet<MethodKey> = HashSet::new();
    let mut visited: HashSet<&'static str> = HashSet::new();
    let mut queue: VecDeque<(Arc<InterfaceDecl>, Subst)> = VecDeque::new();

    let root_subst: Subst = iface
        .vars()
        .iter()
        .map(|var| (*var, ResolvedType::Unresolved))
        .collect();
    queue.push_back((Arc::clone(iface), root_subst));

    while let Some((current, subst)) = queue.pop_front() {
        if !visited.insert(current.name()) {
            continue;
        }

        for decl in current.methods() {
            if !seen.insert((decl.name(), decl.arity())) {
                continue;
            }
            let params = decl
                .params()
                .iter()
                .map(|param| match param {
                    TypeRef::Concrete(key) => ResolvedType::Known(*key),
                    TypeRef::Var(var) => {
                        subst.get(var).copied().unwrap_or(ResolvedType::Unresolved)
                    }
                })
                .collect();
            result.push(Arc::new(RepositoryMethod {
                decl: Arc::clone(decl),
                declared_by: current.name(),
                params,
            }));
        }

        for clause in current.extends() {
            let parent_subst: Subst = clause
                .parent()
                .vars()
                .iter()
                .zip(clause.args())
                .map(|(var, arg)| {
                    let value = match arg {
                        TypeRef::Concrete(key) => ResolvedType::Known(*key),
                        TypeRef::Var(v) => {
                            subst.get(v).copied().unwrap_or(ResolvedType::Unresolved)
                        }
                    };
                    (*var, value)
                })
                .collect();
            queue.push_back((Arc::clone(clause.parent()), parent_subst));
        }
    }

    result
}
