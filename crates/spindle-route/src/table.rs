//! Route table and path matching.
//!
//! The route table receives finished `(method, absolute path, handler chain)`
//! tuples from route groups and answers lookups for incoming requests.
//! Patterns use `:name` for a single-segment parameter and `*name` for a
//! catch-all matching the rest of the path.
//!
//! # Example
//!
//! ```rust
//! use spindle_core::handler;
//! use spindle_route::table::RouteTable;
//! use http::Method;
//!
//! let table = RouteTable::new(63);
//! let h = handler(|_ctx| Box::pin(async {}));
//!
//! table.add_route(Method::GET, "/users/:id", vec![h]).unwrap();
//!
//! let found = table.lookup(&Method::GET, "/users/42").unwrap();
//! assert_eq!(found.pattern, "/users/:id");
//! assert_eq!(found.params, vec![("id".to_string(), "42".to_string())]);
//! ```

use std::sync::Arc;

use http::Method;
use parking_lot::RwLock;
use spindle_core::{HandlerNames, HandlersChain, RouteError};

/// A segment of a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    /// A literal segment (e.g., "users")
    Literal(String),

    /// A parameter segment (e.g., ":id")
    Param(String),

    /// A catch-all segment (e.g., "*filepath"); always last
    CatchAll(String),
}

/// A registered route.
#[derive(Clone)]
struct Route {
    method: Method,
    pattern: String,
    segments: Vec<PathSegment>,
    handlers: Arc<HandlersChain>,
}

impl Route {
    fn new(method: Method, pattern: &str, handlers: HandlersChain) -> Self {
        Self {
            method,
            pattern: pattern.to_string(),
            segments: Self::parse_segments(pattern),
            handlers: Arc::new(handlers),
        }
    }

    fn parse_segments(pattern: &str) -> Vec<PathSegment> {
        pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if let Some(name) = s.strip_prefix(':') {
                    PathSegment::Param(name.to_string())
                } else if let Some(name) = s.strip_prefix('*') {
                    PathSegment::CatchAll(name.to_string())
                } else {
                    PathSegment::Literal(s.to_string())
                }
            })
            .collect()
    }

    /// Attempts to match this route against a path, returning the extracted
    /// parameters.
    fn match_path(&self, path: &str) -> Option<Vec<(String, String)>> {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Vec::new();

        for (position, pattern) in self.segments.iter().enumerate() {
            match pattern {
                PathSegment::CatchAll(name) => {
                    let rest = path_segments.get(position..).unwrap_or_default().join("/");
                    params.push((name.clone(), rest));
                    return Some(params);
                }
                PathSegment::Literal(expected) => {
                    if path_segments.get(position) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    let actual = path_segments.get(position)?;
                    params.push((name.clone(), (*actual).to_string()));
                }
            }
        }

        (path_segments.len() == self.segments.len()).then_some(params)
    }
}

/// A route found by [`RouteTable::lookup`].
#[derive(Clone)]
pub struct RouteMatch {
    /// The registered pattern.
    pub pattern: String,
    /// Extracted path parameters, in pattern order.
    pub params: Vec<(String, String)>,
    /// The merged handler chain.
    pub handlers: Arc<HandlersChain>,
}

impl std::fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.pattern)
            .field("params", &self.params)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Summary of a registered route, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// HTTP method.
    pub method: Method,
    /// Absolute path pattern.
    pub path: String,
    /// Name of the last handler in the chain.
    pub handler: String,
    /// Length of the handler chain.
    pub handler_count: usize,
}

/// The engine's route table, shared by every route group of one engine.
pub struct RouteTable {
    routes: RwLock<Vec<Route>>,
    names: HandlerNames,
    max_handlers: usize,
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes.read().len())
            .field("max_handlers", &self.max_handlers)
            .finish_non_exhaustive()
    }
}

impl RouteTable {
    /// Creates an empty table whose chains must stay below `max_handlers`.
    #[must_use]
    pub fn new(max_handlers: usize) -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            names: HandlerNames::new(),
            max_handlers,
        }
    }

    /// Returns the handler chain limit.
    #[must_use]
    pub fn max_handlers(&self) -> usize {
        self.max_handlers
    }

    /// Returns the handler naming side-table.
    #[must_use]
    pub fn names(&self) -> &HandlerNames {
        &self.names
    }

    /// Adds a route.
    ///
    /// # Errors
    ///
    /// Fails if the path is not absolute, the chain is empty, or the method
    /// and path are already registered.
    pub fn add_route(
        &self,
        method: Method,
        path: &str,
        handlers: HandlersChain,
    ) -> Result<(), RouteError> {
        if !path.starts_with('/') {
            return Err(RouteError::PathNotAbsolute(path.to_string()));
        }
        let Some(last) = handlers.last() else {
            return Err(RouteError::NoHandlers {
                method: method.to_string(),
                path: path.to_string(),
            });
        };

        let mut routes = self.routes.write();
        if routes.iter().any(|r| r.method == method && r.pattern == path) {
            return Err(RouteError::DuplicateRoute {
                method: method.to_string(),
                path: path.to_string(),
            });
        }

        tracing::debug!(
            method = %method,
            path = %path,
            handler = %self.names.name_or_anonymous(last),
            handlers = handlers.len(),
            "registered route"
        );
        routes.push(Route::new(method, path, handlers));
        Ok(())
    }

    /// Finds the first route matching `method` and `path`.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.routes
            .read()
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route.match_path(path).map(|params| RouteMatch {
                    pattern: route.pattern.clone(),
                    params,
                    handlers: Arc::clone(&route.handlers),
                })
            })
    }

    /// Returns the handler chain registered for exactly this method and
    /// pattern.
    #[must_use]
    pub fn handlers(&self, method: &Method, pattern: &str) -> Option<Arc<HandlersChain>> {
        self.routes
            .read()
            .iter()
            .find(|r| r.method == *method && r.pattern == pattern)
            .map(|r| Arc::clone(&r.handlers))
    }

    /// Lists every registered route in registration order.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes
            .read()
            .iter()
            .map(|route| RouteInfo {
                method: route.method.clone(),
                path: route.pattern.clone(),
                handler: route
                    .handlers
                    .last()
                    .map(|h| self.names.name_or_anonymous(h))
                    .unwrap_or_default(),
                handler_count: route.handlers.len(),
            })
            .collect()
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }
}
