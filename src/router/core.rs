use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::pattern::{split_path, ParamVec, RoutePattern};

/// Result of successfully matching a path against the table.
pub struct RouteMatch<H> {
    /// The handler registered for the matched pattern
    pub handler: Arc<H>,
    /// The pattern that matched (e.g. `/hello/:name`)
    pub pattern: Arc<str>,
    /// Parameters captured from the path (e.g. `:name` -> `{"name": "Earth"}`)
    pub path_params: ParamVec,
}

impl<H> RouteMatch<H> {
    /// Get a path parameter by name.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Convert path_params to a HashMap.
    #[must_use]
    pub fn path_params_map(&self) -> HashMap<String, String> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

impl<H> fmt::Debug for RouteMatch<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.pattern)
            .field("path_params", &self.path_params)
            .finish_non_exhaustive()
    }
}

struct RouteEntry<H> {
    pattern: RoutePattern,
    handler: Arc<H>,
    order: usize,
}

impl<H> Clone for RouteEntry<H> {
    fn clone(&self) -> Self {
        Self {
            pattern: self.pattern.clone(),
            handler: Arc::clone(&self.handler),
            order: self.order,
        }
    }
}

/// Path pattern -> handler registry.
///
/// Entries are kept sorted by specificity: fewer `:name` segments first, and
/// among equally specific patterns, registration order. `find` returns the
/// first entry that matches, so `/hello/world` beats `/hello/:name` whichever
/// was registered first.
///
/// Reads go through an [`ArcSwap`] snapshot and never block; registration
/// copies the table and publishes the new one. Registration is meant for
/// startup, before traffic.
pub struct RouteTable<H> {
    routes: ArcSwap<Vec<RouteEntry<H>>>,
    next_order: AtomicUsize,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self {
            routes: ArcSwap::from_pointee(Vec::new()),
            next_order: AtomicUsize::new(0),
        }
    }
}

impl<H> RouteTable<H> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pattern` for `handler`.
    pub fn add_route(&self, pattern: &str, handler: Arc<H>) {
        let order = self.next_order.fetch_add(1, Ordering::Relaxed);
        let entry = RouteEntry {
            pattern: RoutePattern::parse(pattern),
            handler,
            order,
        };

        self.routes.rcu(|current| {
            let mut routes: Vec<RouteEntry<H>> = current.iter().cloned().collect();
            routes.push(entry.clone());
            routes.sort_by_key(|r| (r.pattern.param_count(), r.order));
            routes
        });

        info!(
            pattern = %pattern,
            routes_count = self.len(),
            "Route registered"
        );
    }

    /// Find the handler for a URI. The query string is ignored.
    #[must_use]
    pub fn find(&self, uri: &str) -> Option<RouteMatch<H>> {
        let segments: Vec<&str> = split_path(uri).collect();
        let routes = self.routes.load();

        debug!(
            uri = %uri,
            segments = segments.len(),
            candidates = routes.len(),
            "Route match attempt"
        );

        for entry in routes.iter() {
            if let Some(path_params) = entry.pattern.matches(&segments) {
                debug!(
                    uri = %uri,
                    route_pattern = %entry.pattern,
                    path_params = ?path_params,
                    "Route matched"
                );
                return Some(RouteMatch {
                    handler: Arc::clone(&entry.handler),
                    pattern: Arc::clone(entry.pattern.raw()),
                    path_params,
                });
            }
        }

        warn!(uri = %uri, "No route matched");
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered patterns in match order.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.routes
            .load()
            .iter()
            .map(|r| r.pattern.as_str().to_string())
            .collect()
    }

    /// Log all registered routes at info level.
    pub fn dump_routes(&self) {
        let routes = self.routes.load();
        info!(count = routes.len(), "Routing table");
        for entry in routes.iter() {
            info!(
                route_pattern = %entry.pattern,
                params = ?entry.pattern.param_names(),
                "Route"
            );
        }
    }
}
