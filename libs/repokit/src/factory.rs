//! Proxy construction and dispatch.
//!
//! [`RepositoryFactory`] turns a repository interface declaration into a
//! [`RepositoryProxy`]. Construction is phased: validate the binding, create
//! the CRUD target through the supplied [`CrudTargetFactory`], resolve every
//! query method once through the lookup strategy, run the ordered
//! post-processors, and only then attach the dispatch interceptor. All
//! routing decisions are made here, once; dispatch itself is a single table
//! lookup per call.
//!
//! Routing priority per method: a custom implementation wins over a resolved
//! query, and a resolved query wins over the base-class forward. A method
//! that none of the three can serve fails proxy construction.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RepokitConfig;
use crate::descriptor::{BaseClassDecl, InterfaceDecl, MethodDecl};
use crate::error::{ConfigurationError, InvocationError};
use crate::information::{RepositoryInformation, RouteKind};
use crate::invoke::{
    CallInterceptor, CallValue, CrudTarget, CustomImplementation, InvokeResult, Invoker,
    MethodInvocation,
};
use crate::metadata::MetadataRegistry;
use crate::query::QueryLookupStrategy;
use crate::query::RepositoryQuery;

type RouteKey = (&'static str, usize);

/// Creates the CRUD support target for a repository, bound to its resolved
/// domain/id types. Supplied by the concrete subsystem.
pub trait CrudTargetFactory: Send + Sync {
    /// # Errors
    /// A target that cannot be created is a construction-time defect.
    fn create_target(
        &self,
        information: &RepositoryInformation,
    ) -> Result<Arc<dyn CrudTarget>, ConfigurationError>;
}

/// Mutable view of the proxy under assembly, handed to post-processors
/// before the dispatch interceptor is attached.
pub struct ProxyAssembly {
    interceptors: Vec<Arc<dyn CallInterceptor>>,
}

impl ProxyAssembly {
    fn new() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }

    /// Attach wrapping advice. Interceptors run in attachment order, all of
    /// them ahead of dispatch.
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn CallInterceptor>) {
        self.interceptors.push(interceptor);
    }

    #[must_use]
    pub fn interceptors(&self) -> &[Arc<dyn CallInterceptor>] {
        &self.interceptors
    }
}

/// Hook invoked after the base proxy is assembled and before the dispatch
/// interceptor is attached. Collaborators use this to wrap invocations
/// (e.g. transactional advice).
pub trait ProxyPostProcessor: Send + Sync {
    fn post_process(&self, assembly: &mut ProxyAssembly, information: &RepositoryInformation);
}

enum Route {
    Custom(Arc<dyn CustomImplementation>),
    Query(Arc<dyn RepositoryQuery>),
    Base(Arc<MethodDecl>),
}

impl Route {
    fn kind(&self) -> RouteKind {
        match self {
            Route::Custom(_) => RouteKind::Custom,
            Route::Query(_) => RouteKind::Query,
            Route::Base(_) => RouteKind::BaseClass,
        }
    }
}

/// Terminal interceptor: routes each invocation to its one target.
///
/// Owns the per-proxy route table (including the resolved query objects)
/// built at construction time; immutable afterwards, so concurrent
/// invocation needs no locking.
pub struct DispatchInterceptor {
    interface: &'static str,
    routes: HashMap<RouteKey, Route>,
    target: Arc<dyn CrudTarget>,
}

impl DispatchInterceptor {
    fn dispatch(&self, invocation: MethodInvocation) -> InvokeResult {
        let (method, args) = invocation.into_parts();
        let Some(route) = self.routes.get(&(method.name(), method.arity())) else {
            return Err(InvocationError::UnknownMethod {
                interface: self.interface,
                method: method.name().to_owned(),
                arity: method.arity(),
            });
        };

        tracing::trace!(
            repository = self.interface,
            method = method.name(),
            kind = ?route.kind(),
            "dispatching"
        );
        match route {
            Route::Custom(custom) => custom
                .invoke(method.name(), args)
                .map_err(InvocationError::target),
            Route::Query(query) => query.execute(args).map_err(InvocationError::target),
            Route::Base(base) => self
                .target
                .invoke(base, args)
                .map_err(InvocationError::target),
        }
    }

    fn route_kind(&self, method: &str, arity: usize) -> Option<RouteKind> {
        // RouteKey borrows &'static str; compare by fields instead.
        self.routes
            .iter()
            .find(|((name, a), _)| *name == method && *a == arity)
            .map(|(_, route)| route.kind())
    }
}

impl Invoker for DispatchInterceptor {
    fn proceed(&self, invocation: MethodInvocation) -> InvokeResult {
        self.dispatch(invocation)
    }
}

struct Chain<'a> {
    rest: &'a [Arc<dyn CallInterceptor>],
    dispatch: &'a DispatchInterceptor,
}

impl Invoker for Chain<'_> {
    fn proceed(&self, invocation: MethodInvocation) -> InvokeResult {
        match self.rest.split_first() {
            Some((head, tail)) => head.invoke(
                invocation,
                &Chain {
                    rest: tail,
                    dispatch: self.dispatch,
                },
            ),
            None => self.dispatch.dispatch(invocation),
        }
    }
}

/// The runtime object implementing a repository interface.
///
/// Every state it carries is built during construction; invoking it from
/// multiple threads afterwards is safe without locking.
pub struct RepositoryProxy {
    information: Arc<RepositoryInformation>,
    interceptors: Vec<Arc<dyn CallInterceptor>>,
    dispatch: DispatchInterceptor,
}

impl core::fmt::Debug for RepositoryProxy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RepositoryProxy")
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

impl RepositoryProxy {
    /// Invoke a repository method by name with type-erased arguments.
    ///
    /// # Errors
    /// [`InvocationError::UnknownMethod`] when the interface has no such
    /// method; otherwise whatever the routed target produced.
    pub fn invoke(&self, method: &str, args: Vec<CallValue>) -> InvokeResult {
        let Some(found) = self.information.method(method, args.len()) else {
            return Err(InvocationError::UnknownMethod {
                interface: self
                    .information
                    .metadata()
                    .repository_interface()
                    .name(),
                method: method.to_owned(),
                arity: args.len(),
            });
        };
        let invocation = MethodInvocation::new(Arc::clone(found), args);
        Chain {
            rest: &self.interceptors,
            dispatch: &self.dispatch,
        }
        .proceed(invocation)
    }

    #[inline]
    #[must_use]
    pub fn information(&self) -> &Arc<RepositoryInformation> {
        &self.information
    }

    /// Read-only view of the routing decision for a method.
    #[must_use]
    pub fn route_kind(&self, method: &str, arity: usize) -> Option<RouteKind> {
        self.dispatch.route_kind(method, arity)
    }
}

/// Builds repository proxies from interface declarations.
pub struct RepositoryFactory {
    registry: Arc<MetadataRegistry>,
    base_class: Arc<BaseClassDecl>,
    target_factory: Arc<dyn CrudTargetFactory>,
    lookup: Arc<dyn QueryLookupStrategy>,
    config: RepokitConfig,
    post_processors: Vec<Arc<dyn ProxyPostProcessor>>,
}

impl RepositoryFactory {
    #[must_use]
    pub fn new(
        registry: Arc<MetadataRegistry>,
        base_class: Arc<BaseClassDecl>,
        target_factory: Arc<dyn CrudTargetFactory>,
        lookup: Arc<dyn QueryLookupStrategy>,
    ) -> Self {
        Self {
            registry,
            base_class,
            target_factory,
            lookup,
            config: RepokitConfig::default(),
            post_processors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RepokitConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a post-processor. Processors run in registration order.
    #[must_use]
    pub fn with_post_processor(mut self, processor: Arc<dyn ProxyPostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    /// Build a proxy for `interface` without a custom implementation.
    ///
    /// # Errors
    /// Any [`ConfigurationError`] detected while assembling the proxy.
    pub fn repository(
        &self,
        interface: &Arc<InterfaceDecl>,
    ) -> Result<RepositoryProxy, ConfigurationError> {
        self.build(interface, None)
    }

    /// Build a proxy for `interface` backed by a custom implementation.
    ///
    /// # Errors
    /// Any [`ConfigurationError`] detected while assembling the proxy.
    pub fn repository_with_custom(
        &self,
        interface: &Arc<InterfaceDecl>,
        custom: Arc<dyn CustomImplementation>,
    ) -> Result<RepositoryProxy, ConfigurationError> {
        self.build(interface, Some(custom))
    }

    fn build(
        &self,
        interface_decl: &Arc<InterfaceDecl>,
        custom: Option<Arc<dyn CustomImplementation>>,
    ) -> Result<RepositoryProxy, ConfigurationError> {
        let metadata = self.registry.metadata_for(interface_decl)?;
        let interface = metadata.repository_interface().name();
        tracing::debug!(repository = interface, "building repository proxy");

        if !metadata.domain_type().is_known() {
            return Err(ConfigurationError::UnresolvedDomainType {
                interface,
                marker: self.registry.marker().name(),
            });
        }

        let custom_sigs = custom.as_ref().map(|c| c.methods());
        let information = Arc::new(RepositoryInformation::new(
            metadata,
            Arc::clone(self.registry.marker()),
            Arc::clone(&self.base_class),
            custom_sigs,
            self.config.strict_unresolved_matching,
        )?);

        let target = self.target_factory.create_target(&information)?;
        let routes = self.build_routes(&information, custom.as_ref())?;

        let mut assembly = ProxyAssembly::new();
        for processor in &self.post_processors {
            processor.post_process(&mut assembly, &information);
        }
        tracing::debug!(
            repository = interface,
            routes = routes.len(),
            interceptors = assembly.interceptors.len(),
            "repository proxy assembled"
        );

        Ok(RepositoryProxy {
            information,
            interceptors: assembly.interceptors,
            dispatch: DispatchInterceptor {
                interface,
                routes,
                target,
            },
        })
    }

    fn build_routes(
        &self,
        information: &Arc<RepositoryInformation>,
        custom: Option<&Arc<dyn CustomImplementation>>,
    ) -> Result<HashMap<RouteKey, Route>, ConfigurationError> {
        let interface = information.metadata().repository_interface().name();
        let mut routes = HashMap::new();

        for method in information.methods() {
            let route = match information.classify(method)? {
                RouteKind::Custom => match custom {
                    Some(custom_impl) => Route::Custom(Arc::clone(custom_impl)),
                    None => {
                        return Err(ConfigurationError::UnroutableMethod {
                            interface,
                            method: method.name(),
                        })
                    }
                },
                RouteKind::Query => {
                    let resolved = self
                        .lookup
                        .resolve_query(method, information, self.config.query_lookup)
                        .map_err(|source| ConfigurationError::QueryResolution {
                            interface,
                            method: method.name(),
                            source,
                        })?;
                    match resolved {
                        Some(query) => Route::Query(query),
                        // Not a recognized query; the method falls back to
                        // custom, which nothing satisfies.
                        None if custom.is_some() => {
                            return Err(ConfigurationError::UnroutableMethod {
                                interface,
                                method: method.name(),
                            })
                        }
                        None => {
                            return Err(ConfigurationError::MissingCustomImplementation {
                                interface,
                                method: method.name(),
                            })
                        }
                    }
                }
                RouteKind::BaseClass => {
                    let resolution = information.base_class_method(method)?;
                    match resolution.base_method() {
                        Some(base) => Route::Base(Arc::clone(base)),
                        None => {
                            return Err(ConfigurationError::UnroutableMethod {
                                interface,
                                method: method.name(),
                            })
                        }
                    }
                }
            };
            routes.insert((method.name(), method.arity()), route);
        }

        Ok(routes)
    }
}
