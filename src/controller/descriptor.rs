use http::Method;
use std::fmt;
use std::sync::Arc;

use super::core::Controller;

/// Namespace used when a controller does not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Creates a fresh controller instance per request.
pub type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

/// Static metadata for one controller type: routes, namespace, declared
/// filters, which verbs complete asynchronously, and how to instantiate it.
///
/// Built once at startup and immutable afterwards.
///
/// ```rust
/// use http::Method;
/// use strest::controller::{Controller, ControllerDescriptor};
///
/// #[derive(Default)]
/// struct Feed;
/// impl Controller for Feed {}
///
/// let descriptor = ControllerDescriptor::of::<Feed>("feed")
///     .route("/feed/:user")
///     .in_namespace("api")
///     .filter("auth")
///     .async_method(Method::GET);
///
/// assert!(descriptor.is_async(&Method::GET));
/// assert_eq!(descriptor.namespace(), "api");
/// ```
#[derive(Clone)]
pub struct ControllerDescriptor {
    name: Arc<str>,
    routes: Vec<String>,
    namespace: String,
    filters: Vec<String>,
    async_methods: Vec<Method>,
    factory: ControllerFactory,
}

impl ControllerDescriptor {
    pub fn new<F, C>(name: &str, factory: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Controller + 'static,
    {
        Self {
            name: Arc::from(name),
            routes: Vec::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            filters: Vec::new(),
            async_methods: Vec::new(),
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Controller>),
        }
    }

    /// Descriptor for a controller built with `Default`.
    #[must_use]
    pub fn of<C: Controller + Default + 'static>(name: &str) -> Self {
        Self::new(name, C::default)
    }

    #[must_use]
    pub fn route(mut self, pattern: &str) -> Self {
        self.routes.push(pattern.to_string());
        self
    }

    #[must_use]
    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Declare a filter by its registered name. Declared filters run before
    /// the namespace defaults, in declaration order.
    #[must_use]
    pub fn filter(mut self, name: &str) -> Self {
        if !self.filters.iter().any(|f| f == name) {
            self.filters.push(name.to_string());
        }
        self
    }

    /// Mark a verb as asynchronous: the action returns before the response is
    /// ready and completes it later through a
    /// [`TransactionHandle`](super::TransactionHandle).
    #[must_use]
    pub fn async_method(mut self, method: Method) -> Self {
        if !self.async_methods.contains(&method) {
            self.async_methods.push(method);
        }
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn filter_names(&self) -> &[String] {
        &self.filters
    }

    #[must_use]
    pub fn is_async(&self, method: &Method) -> bool {
        self.async_methods.contains(method)
    }

    #[must_use]
    pub fn instantiate(&self) -> Box<dyn Controller> {
        (self.factory)()
    }
}

impl fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("name", &self.name)
            .field("routes", &self.routes)
            .field("namespace", &self.namespace)
            .field("filters", &self.filters)
            .field("async_methods", &self.async_methods)
            .finish_non_exhaustive()
    }
}
