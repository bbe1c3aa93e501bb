//! Repository proxy construction and method dispatch.
//!
//! `repokit` turns a declared data-access interface into a runtime proxy.
//! Given an interface declaration that (possibly transitively) extends a
//! generic marker interface, the engine recovers the concrete domain and
//! identifier types from the declaration chain, classifies every reachable
//! method into exactly one dispatch target - custom implementation, resolved
//! query, or generic CRUD base class - and builds a proxy that routes each
//! invocation to that target with the original arguments and the target's
//! original errors.
//!
//! The building blocks, bottom-up:
//!
//! - [`descriptor`] - the explicit declaration model (interfaces, type
//!   variables, methods, the CRUD base class).
//! - [`typeargs`] - type-argument resolution along `extends` chains.
//! - [`metadata`] - per-interface metadata and its memoizing registry.
//! - [`information`] - base-class signature matching and the method
//!   classification partition.
//! - [`query`] - the pluggable query lookup boundary.
//! - [`factory`] - proxy assembly and the dispatch interceptor.
//!
//! ```
//! use std::sync::Arc;
//! use repokit::{InterfaceDecl, MetadataRegistry, MethodDecl, TypeRef};
//!
//! struct Account;
//!
//! let marker = Arc::new(
//!     InterfaceDecl::new("Repo")
//!         .with_var("T")
//!         .with_var("ID")
//!         .with_method(MethodDecl::new("save", vec![TypeRef::var("T")])),
//! );
//! let accounts = Arc::new(InterfaceDecl::new("AccountRepo").with_extends(
//!     marker.clone(),
//!     vec![TypeRef::of::<Account>(), TypeRef::of::<i64>()],
//! ));
//!
//! let registry = MetadataRegistry::new(marker);
//! let metadata = registry.metadata_for(&accounts).unwrap();
//! assert!(metadata.domain_type().is_known());
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod information;
pub mod invoke;
pub mod metadata;
pub mod query;
pub mod typeargs;

pub use config::{
    repository_config_or_default, repository_config_required, ConfigError, ConfigProvider,
    RepokitConfig,
};
pub use descriptor::{
    BaseClassDecl, DescriptorError, ExtendsClause, InterfaceDecl, MethodDecl, MethodSig, TypeKey,
    TypeRef,
};
pub use error::{ConfigurationError, InvocationError, TargetError};
pub use factory::{
    CrudTargetFactory, DispatchInterceptor, ProxyAssembly, ProxyPostProcessor, RepositoryFactory,
    RepositoryProxy,
};
pub use information::{
    BaseMethodResolution, RepositoryInformation, RepositoryMethod, RouteKind,
};
pub use invoke::{
    downcast, CallInterceptor, CallOutcome, CallValue, CrudTarget, CustomImplementation,
    InvokeResult, Invoker, MethodInvocation,
};
pub use metadata::{MetadataRegistry, RepositoryMetadata};
pub use query::{NullQueryLookup, QueryLookupKey, QueryLookupStrategy, RepositoryQuery};
pub use typeargs::{
    resolve_type_arguments, DomainTypeBinding, ResolvedType, TypeArguments,
};
