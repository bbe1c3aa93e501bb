//! Generic type-argument resolution over interface declarations.
//!
//! Answers one question: as seen from a given interface, which concrete types
//! are bound to a parameterized ancestor's type variables? The walk follows
//! `extends` edges, substituting type variables level by level, and is
//! resilient to any number of intermediate parameterized interfaces.
//!
//! Resolution is total: an interface that never reaches the ancestor, or that
//! leaves arguments unbound (raw), yields [`ResolvedType::Unresolved`] slots
//! instead of an error. Callers decide how to treat that.

use std::collections::HashMap;

use crate::descriptor::{InterfaceDecl, TypeKey, TypeRef};

/// A type argument after substitution: a concrete type, or unresolved when
/// the declaration chain never pins it down.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ResolvedType {
    Known(TypeKey),
    Unresolved,
}

impl ResolvedType {
    #[inline]
    #[must_use]
    pub fn is_known(&self) -> bool {
        matches!(self, ResolvedType::Known(_))
    }

    /// The concrete type key, if resolved.
    #[inline]
    #[must_use]
    pub fn known(&self) -> Option<TypeKey> {
        match self {
            ResolvedType::Known(key) => Some(*key),
            ResolvedType::Unresolved => None,
        }
    }
}

impl std::fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedType::Known(key) => std::fmt::Display::fmt(key, f),
            ResolvedType::Unresolved => f.write_str("<unresolved>"),
        }
    }
}

/// The arguments bound to an ancestor interface's type variables, in the
/// ancestor's declaration order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TypeArguments {
    values: Vec<ResolvedType>,
}

impl TypeArguments {
    /// All-unresolved arguments for an ancestor with `arity` variables.
    #[must_use]
    pub fn unresolved(arity: usize) -> Self {
        Self {
            values: vec![ResolvedType::Unresolved; arity],
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> ResolvedType {
        self.values
            .get(index)
            .copied()
            .unwrap_or(ResolvedType::Unresolved)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The (domain, identifier) pair a repository interface binds on the marker.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DomainTypeBinding {
    domain: ResolvedType,
    id: ResolvedType,
}

impl DomainTypeBinding {
    /// Interpret marker type arguments as (domain, id), slot 0 and slot 1.
    #[must_use]
    pub fn from_arguments(args: &TypeArguments) -> Self {
        Self {
            domain: args.get(0),
            id: args.get(1),
        }
    }

    #[inline]
    #[must_use]
    pub fn domain(&self) -> ResolvedType {
        self.domain
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResolvedType {
        self.id
    }

    /// Both slots resolved to concrete types.
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.domain.is_known() && self.id.is_known()
    }
}

type Substitution = HashMap<&'static str, ResolvedType>;

/// Resolve the type arguments `iface` binds on `marker`, walking the
/// interface hierarchy and substituting variables at each level.
///
/// Returns all-unresolved arguments when `iface` does not reach `marker`,
/// or when `iface` is itself still generic over the relevant positions.
#[must_use]
pub fn resolve_type_arguments(iface: &InterfaceDecl, marker: &InterfaceDecl) -> TypeArguments {
    // The starting interface's own variables are unbound by definition: a
    // still-generic interface cannot pin the marker's arguments.
    let subst: Substitution = iface
        .vars()
        .iter()
        .map(|var| (*var, ResolvedType::Unresolved))
        .collect();

    let resolved = walk(iface, &subst, marker.name());
    match resolved {
        Some(args) => {
            tracing::trace!(
                interface = iface.name(),
                marker = marker.name(),
                "resolved marker type arguments"
            );
            args
        }
        None => TypeArguments::unresolved(marker.vars().len()),
    }
}

fn walk(current: &InterfaceDecl, subst: &Substitution, marker_name: &str) -> Option<TypeArguments> {
    for clause in current.extends() {
        let args: Vec<ResolvedType> = clause
            .args()
            .iter()
            .map(|arg| match arg {
                TypeRef::Concrete(key) => ResolvedType::Known(*key),
                TypeRef::Var(var) => subst.get(var).copied().unwrap_or(ResolvedType::Unresolved),
            })
            .collect();

        let parent = clause.parent();
        if parent.name() == marker_name {
            return Some(TypeArguments { values: args });
        }

        let parent_subst: Substitution = parent
            .vars()
            .iter()
            .zip(args)
            .map(|(var, value)| (*var, value))
            .collect();
        if let Some(found) = walk(parent, &parent_subst, marker_name) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::InterfaceDecl;
    use std::sync::Arc;

    struct Account;

    fn marker() -> Arc<InterfaceDecl> {
        Arc::new(InterfaceDecl::new("Repo").with_var("T").with_var("ID"))
    }

    #[test]
    fn direct_extension_resolves() {
        let marker = marker();
        let repo = InterfaceDecl::new("AccountRepo").with_extends(
            marker.clone(),
            vec![TypeRef::of::<Account>(), TypeRef::of::<i64>()],
        );

        let args = resolve_type_arguments(&repo, &marker);
        assert_eq!(args.get(0), ResolvedType::Known(TypeKey::of::<Account>()));
        assert_eq!(args.get(1), ResolvedType::Known(TypeKey::of::<i64>()));
    }

    #[test]
    fn two_level_substitution_resolves() {
        // AccountRepo extends Intermediate<Account>, Intermediate<X> extends Repo<X, i64>.
        let marker = marker();
        let intermediate = Arc::new(
            InterfaceDecl::new("Intermediate")
                .with_var("X")
                .with_extends(marker.clone(), vec![TypeRef::var("X"), TypeRef::of::<i64>()]),
        );
        let repo = InterfaceDecl::new("AccountRepo")
            .with_extends(intermediate, vec![TypeRef::of::<Account>()]);

        let args = resolve_type_arguments(&repo, &marker);
        assert_eq!(args.get(0), ResolvedType::Known(TypeKey::of::<Account>()));
        assert_eq!(args.get(1), ResolvedType::Known(TypeKey::of::<i64>()));
    }

    #[test]
    fn three_level_substitution_with_reordered_vars() {
        let marker = marker();
        let lower = Arc::new(
            InterfaceDecl::new("Lower")
                .with_var("A")
                .with_var("B")
                .with_extends(marker.clone(), vec![TypeRef::var("B"), TypeRef::var("A")]),
        );
        let upper = Arc::new(
            InterfaceDecl::new("Upper")
                .with_var("K")
                .with_extends(lower, vec![TypeRef::var("K"), TypeRef::of::<Account>()]),
        );
        let repo = InterfaceDecl::new("AccountRepo").with_extends(upper, vec![TypeRef::of::<i64>()]);

        let args = resolve_type_arguments(&repo, &marker);
        // Upper<K=i64> -> Lower<A=i64, B=Account> -> Repo<T=B=Account, ID=A=i64>
        assert_eq!(args.get(0), ResolvedType::Known(TypeKey::of::<Account>()));
        assert_eq!(args.get(1), ResolvedType::Known(TypeKey::of::<i64>()));
    }

    #[test]
    fn raw_generic_interface_stays_unresolved() {
        // Intermediate<X> extends Repo<X, i64>; asked directly, X is unbound.
        let marker = marker();
        let intermediate = InterfaceDecl::new("Intermediate")
            .with_var("X")
            .with_extends(marker.clone(), vec![TypeRef::var("X"), TypeRef::of::<i64>()]);

        let args = resolve_type_arguments(&intermediate, &marker);
        assert_eq!(args.get(0), ResolvedType::Unresolved);
        assert_eq!(args.get(1), ResolvedType::Known(TypeKey::of::<i64>()));
    }

    #[test]
    fn unrelated_interface_is_fully_unresolved() {
        let marker = marker();
        let other = InterfaceDecl::new("Unrelated");

        let args = resolve_type_arguments(&other, &marker);
        assert_eq!(args.len(), 2);
        assert_eq!(args.get(0), ResolvedType::Unresolved);
        assert_eq!(args.get(1), ResolvedType::Unresolved);
    }

    #[test]
    fn first_marker_path_wins_across_multiple_parents() {
        let marker = marker();
        let fragment = Arc::new(InterfaceDecl::new("AccountOps"));
        let repo = InterfaceDecl::new("AccountRepo")
            .with_extends(fragment, vec![])
            .with_extends(
                marker.clone(),
                vec![TypeRef::of::<Account>(), TypeRef::of::<i64>()],
            );

        let args = resolve_type_arguments(&repo, &marker);
        assert_eq!(args.get(0), ResolvedType::Known(TypeKey::of::<Account>()));
    }

    #[test]
    fn binding_reports_resolution_state() {
        let marker = marker();
        let repo = InterfaceDecl::new("AccountRepo").with_extends(
            marker.clone(),
            vec![TypeRef::of::<Account>(), TypeRef::of::<i64>()],
        );

        let binding = DomainTypeBinding::from_arguments(&resolve_type_arguments(&repo, &marker));
        assert!(binding.is_resolved());
        assert_eq!(binding.domain().known(), Some(TypeKey::of::<Account>()));
        assert_eq!(binding.id().known(), Some(TypeKey::of::<i64>()));

        let raw = InterfaceDecl::new("Raw");
        let raw_binding =
            DomainTypeBinding::from_arguments(&resolve_type_arguments(&raw, &marker));
        assert!(!raw_binding.is_resolved());
    }
}
