//! Repository metadata and its process-wide registry.
//!
//! [`RepositoryMetadata`] is a pure function of the interface declaration:
//! the interface itself plus the (domain, id) binding it establishes on the
//! marker. Because it is pure, it is memoized globally in a
//! [`MetadataRegistry`] - an explicit registry object handed to consumers by
//! reference, so tests can build their own instead of sharing hidden state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::descriptor::{DescriptorError, InterfaceDecl};
use crate::typeargs::{resolve_type_arguments, DomainTypeBinding, ResolvedType};

/// An interface declaration paired with its resolved marker binding.
#[derive(Clone, Debug)]
pub struct RepositoryMetadata {
    interface: Arc<InterfaceDecl>,
    binding: DomainTypeBinding,
}

impl RepositoryMetadata {
    /// Build metadata for `interface` against `marker`.
    ///
    /// The declaration (and its ancestors) are validated first; binding
    /// resolution itself never fails - unresolved slots are represented as
    /// [`ResolvedType::Unresolved`].
    ///
    /// # Errors
    /// Returns [`DescriptorError`] when the declaration is malformed.
    pub fn new(
        interface: Arc<InterfaceDecl>,
        marker: &InterfaceDecl,
    ) -> Result<Self, DescriptorError> {
        interface.validate()?;
        let args = resolve_type_arguments(&interface, marker);
        let binding = DomainTypeBinding::from_arguments(&args);
        tracing::debug!(
            interface = interface.name(),
            domain = %binding.domain(),
            id = %binding.id(),
            "repository metadata built"
        );
        Ok(Self { interface, binding })
    }

    /// The repository interface this metadata describes. Never absent.
    #[inline]
    #[must_use]
    pub fn repository_interface(&self) -> &Arc<InterfaceDecl> {
        &self.interface
    }

    /// The resolved domain type, or unresolved if the binding failed.
    #[inline]
    #[must_use]
    pub fn domain_type(&self) -> ResolvedType {
        self.binding.domain()
    }

    /// The resolved identifier type, same resolution policy as the domain.
    #[inline]
    #[must_use]
    pub fn id_type(&self) -> ResolvedType {
        self.binding.id()
    }

    #[inline]
    #[must_use]
    pub fn binding(&self) -> DomainTypeBinding {
        self.binding
    }
}

/// Registry memoizing [`RepositoryMetadata`] per interface name.
///
/// Construct one per process (or per test) and pass it by reference;
/// metadata for a given interface is computed once and shared as an `Arc`.
pub struct MetadataRegistry {
    marker: Arc<InterfaceDecl>,
    map: RwLock<HashMap<&'static str, Arc<RepositoryMetadata>>>,
}

impl MetadataRegistry {
    #[must_use]
    pub fn new(marker: Arc<InterfaceDecl>) -> Self {
        Self {
            marker,
            map: RwLock::new(HashMap::new()),
        }
    }

    /// The marker interface all repositories in this registry extend.
    #[inline]
    #[must_use]
    pub fn marker(&self) -> &Arc<InterfaceDecl> {
        &self.marker
    }

    /// Fetch or build metadata for `interface`.
    ///
    /// # Errors
    /// Returns [`DescriptorError`] when the declaration is malformed; failed
    /// declarations are not cached, so a corrected declaration under the same
    /// name resolves on the next call.
    pub fn metadata_for(
        &self,
        interface: &Arc<InterfaceDecl>,
    ) -> Result<Arc<RepositoryMetadata>, DescriptorError> {
        if let Some(hit) = self.map.read().get(interface.name()) {
            return Ok(hit.clone());
        }

        let built = Arc::new(RepositoryMetadata::new(interface.clone(), &self.marker)?);
        let mut w = self.map.write();
        // Another caller may have raced us here; first write wins.
        let entry = w.entry(interface.name()).or_insert(built);
        Ok(entry.clone())
    }

    /// Introspection: number of memoized interfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Clear everything (useful in tests).
    pub fn clear(&self) {
        self.map.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{MethodDecl, TypeKey, TypeRef};

    struct Account;

    fn marker() -> Arc<InterfaceDecl> {
        Arc::new(
            InterfaceDecl::new("Repo")
                .with_var("T")
                .with_var("ID")
                .with_method(MethodDecl::new("save", vec![TypeRef::var("T")]))
                .with_method(MethodDecl::new("find_by_id", vec![TypeRef::var("ID")])),
        )
    }

    fn account_repo(marker: &Arc<InterfaceDecl>) -> Arc<InterfaceDecl> {
        Arc::new(InterfaceDecl::new("AccountRepo").with_extends(
            marker.clone(),
            vec![TypeRef::of::<Account>(), TypeRef::of::<i64>()],
        ))
    }

    #[test]
    fn metadata_exposes_domain_and_id() {
        let marker = marker();
        let metadata = RepositoryMetadata::new(account_repo(&marker), &marker).unwrap();

        assert_eq!(metadata.repository_interface().name(), "AccountRepo");
        assert_eq!(metadata.domain_type().known(), Some(TypeKey::of::<Account>()));
        assert_eq!(metadata.id_type().known(), Some(TypeKey::of::<i64>()));
    }

    #[test]
    fn unresolved_binding_is_reported_not_raised() {
        let marker = marker();
        let raw = Arc::new(InterfaceDecl::new("RawRepo"));
        let metadata = RepositoryMetadata::new(raw, &marker).unwrap();

        assert!(!metadata.domain_type().is_known());
        assert!(!metadata.id_type().is_known());
        assert!(!metadata.binding().is_resolved());
    }

    #[test]
    fn malformed_declaration_is_rejected() {
        let marker = marker();
        let broken = Arc::new(
            InterfaceDecl::new("Broken").with_extends(marker.clone(), vec![TypeRef::of::<Account>()]),
        );
        assert!(RepositoryMetadata::new(broken, &marker).is_err());
    }

    #[test]
    fn registry_memoizes_per_interface() {
        let marker = marker();
        let registry = MetadataRegistry::new(marker.clone());
        let repo = account_repo(&marker);

        let first = registry.metadata_for(&repo).unwrap();
        let second = registry.metadata_for(&repo).unwrap();
        assert!(Arc::ptr_eq(&first, &second), "metadata should be computed once");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_clear_forgets_entries() {
        let marker = marker();
        let registry = MetadataRegistry::new(marker.clone());
        registry.metadata_for(&account_repo(&marker)).unwrap();
        assert!(!registry.is_empty());

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_does_not_cache_failures() {
        let marker = marker();
        let registry = MetadataRegistry::new(marker.clone());
        let broken = Arc::new(
            InterfaceDecl::new("Broken").with_extends(marker.clone(), vec![TypeRef::of::<Account>()]),
        );
        assert!(registry.metadata_for(&broken).is_err());
        assert!(registry.is_empty());
    }
}
