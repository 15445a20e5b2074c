use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::builtin::{LoggingFilter, MetricsFilter};
use super::core::ControllerFilter;
use crate::controller::{ControllerDescriptor, FilterChain, DEFAULT_NAMESPACE};

type FilterFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn ControllerFilter>> + Send + Sync>;

/// Named filter factories, the lazily built instance cache, and the default
/// filter names per namespace.
///
/// Each name is instantiated at most once. If two requests race on the first
/// use of a name, both may run the factory but only the first instance
/// published is kept and handed out.
pub struct FilterRegistry {
    factories: DashMap<String, FilterFactory>,
    instances: DashMap<String, Arc<dyn ControllerFilter>>,
    defaults: ArcSwap<HashMap<String, Arc<[String]>>>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self {
            factories: DashMap::new(),
            instances: DashMap::new(),
            defaults: ArcSwap::from_pointee(HashMap::new()),
        }
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("FilterRegistry")
            .field("filters", &names)
            .field("instantiated", &self.instances.len())
            .field("defaults", &**self.defaults.load())
            .finish()
    }
}

impl FilterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `logging` and `metrics` filters registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(LoggingFilter::NAME, LoggingFilter::default);
        registry.register(MetricsFilter::NAME, MetricsFilter::default);
        registry
    }

    /// Register a filter factory under `name`. Replaces an earlier factory of
    /// the same name, but not an instance already built from it.
    pub fn register<F, T>(&self, name: &str, factory: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: ControllerFilter + 'static,
    {
        self.register_fallible(name, move || {
            Ok(Arc::new(factory()) as Arc<dyn ControllerFilter>)
        });
    }

    /// Register a factory that may fail. A failed instantiation is logged,
    /// the filter is skipped for that request, and the next use tries again.
    pub fn register_fallible<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn ControllerFilter>> + Send + Sync + 'static,
    {
        debug!(filter = %name, "Filter registered");
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Register an already built instance under `name`.
    pub fn register_instance(&self, name: &str, filter: Arc<dyn ControllerFilter>) {
        let published = Arc::clone(&filter);
        let factory: FilterFactory = Arc::new(move || Ok(Arc::clone(&published)));
        self.factories.insert(name.to_string(), factory);
        self.instances.insert(name.to_string(), filter);
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// The shared instance for `name`, instantiating it on first use.
    ///
    /// Unknown names and failed instantiations are logged and yield `None`.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ControllerFilter>> {
        if let Some(instance) = self.instances.get(name) {
            return Some(Arc::clone(instance.value()));
        }

        // Clone the factory out so no shard lock is held while it runs.
        let Some(factory) = self.factories.get(name).map(|f| Arc::clone(f.value())) else {
            warn!(filter = %name, "Unknown filter, skipping");
            return None;
        };

        let created = match factory() {
            Ok(filter) => filter,
            Err(e) => {
                warn!(filter = %name, error = %e, "Filter instantiation failed, skipping");
                return None;
            }
        };

        let published = self
            .instances
            .entry(name.to_string())
            .or_insert(created);
        debug!(filter = %name, "Filter instance published");
        Some(Arc::clone(published.value()))
    }

    /// Replace the default filters of a namespace. `None` is the default
    /// namespace. Names are resolved when a request needs them, so filters
    /// may be registered after their names are listed here.
    pub fn set_default_filters<S: AsRef<str>>(&self, namespace: Option<&str>, names: &[S]) {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE).to_string();
        let names: Arc<[String]> = names.iter().map(|n| n.as_ref().to_string()).collect();
        info!(namespace = %namespace, filters = ?names, "Default filters set");
        self.defaults.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(namespace.clone(), Arc::clone(&names));
            next
        });
    }

    /// Default filter names for a namespace, empty if none were set.
    #[must_use]
    pub fn namespace_filters(&self, namespace: &str) -> Vec<String> {
        self.defaults
            .load()
            .get(namespace)
            .map(|names| names.to_vec())
            .unwrap_or_default()
    }

    /// The filter chain for one request to `descriptor`: its declared filters
    /// in declaration order, then its namespace defaults.
    #[must_use]
    pub fn filters_for(&self, descriptor: &ControllerDescriptor) -> FilterChain {
        let defaults = self.defaults.load();
        let namespace_names = defaults
            .get(descriptor.namespace())
            .map(|names| &names[..])
            .unwrap_or_default();

        descriptor
            .filter_names()
            .iter()
            .chain(namespace_names.iter())
            .filter_map(|name| self.resolve(name))
            .collect()
    }
}
