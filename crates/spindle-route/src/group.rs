//! Route groups.
//!
//! A [`RouterGroup`] accumulates a path prefix and a middleware chain. Every
//! route registered through it gets the prefix joined onto its path and the
//! middleware prepended to its handlers; sub-groups inherit both.
//!
//! The registration API lives on the [`Routes`] trait, which is implemented
//! by both [`RouterGroup`] and the [`Engine`](crate::engine::Engine). Calls
//! return the receiver itself so registrations chain on whichever view they
//! started from.
//!
//! # Example
//!
//! ```rust
//! use spindle_core::{handler, Options};
//! use spindle_route::{Engine, Routes};
//!
//! # fn main() -> Result<(), spindle_core::RouteError> {
//! let mut engine = Engine::new(Options::default());
//! let auth = handler(|ctx| Box::pin(async move { ctx.next().await }));
//! let list = handler(|_ctx| Box::pin(async {}));
//!
//! let mut api = engine.use_middleware([auth]).group("/api", [])?;
//! api.get("/users", [list])?;
//!
//! assert_eq!(engine.routes()[0].path, "/api/users");
//! assert_eq!(engine.routes()[0].handler_count, 2);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use http::Method;
use spindle_core::{handler, HandlerFunc, HandlersChain, RouteError};

use crate::fs::Fs;
use crate::path;
use crate::table::RouteTable;

/// Methods registered by [`Routes::any`], in registration order.
pub const ANY_METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
    Method::DELETE,
    Method::CONNECT,
    Method::TRACE,
];

/// Combines two handler chains into a freshly allocated one.
///
/// The result never shares storage with `existing`, so appending to a
/// parent group later cannot change a chain that was already combined.
///
/// # Errors
///
/// Returns [`RouteError::TooManyHandlers`] if the combined length reaches
/// `limit`.
pub fn combine_handlers(
    existing: &[HandlerFunc],
    additional: &[HandlerFunc],
    limit: usize,
) -> Result<HandlersChain, RouteError> {
    let count = existing.len() + additional.len();
    if count >= limit {
        return Err(RouteError::TooManyHandlers { count, limit });
    }

    let mut merged = Vec::with_capacity(count);
    merged.extend_from_slice(existing);
    merged.extend_from_slice(additional);
    Ok(merged)
}

/// A path prefix plus middleware chain bound to an engine's route table.
#[derive(Clone)]
pub struct RouterGroup {
    handlers: HandlersChain,
    base_path: String,
    table: Arc<RouteTable>,
}

impl std::fmt::Debug for RouterGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterGroup")
            .field("base_path", &self.base_path)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl RouterGroup {
    /// Creates the root group of `table`, based at `/` with no middleware.
    #[must_use]
    pub fn root(table: Arc<RouteTable>) -> Self {
        Self {
            handlers: Vec::new(),
            base_path: "/".to_string(),
            table,
        }
    }

    fn register(
        &self,
        method: Method,
        relative: &str,
        handlers: &[HandlerFunc],
    ) -> Result<(), RouteError> {
        let absolute = path::join_paths(&self.base_path, relative)?;
        let chain = combine_handlers(&self.handlers, handlers, self.table.max_handlers())?;
        self.table.add_route(method, &absolute, chain)
    }

    fn register_get_head(&self, relative: &str, endpoint: HandlerFunc) -> Result<(), RouteError> {
        let chain = [endpoint];
        self.register(Method::GET, relative, &chain)?;
        self.register(Method::HEAD, relative, &chain)
    }
}

/// Route registration shared by the engine (root view) and route groups.
pub trait Routes: Sized {
    /// Returns the group behind this view.
    fn as_group(&self) -> &RouterGroup;

    /// Returns the group behind this view, mutably.
    fn as_group_mut(&mut self) -> &mut RouterGroup;

    /// Returns the absolute path prefix of this group.
    fn base_path(&self) -> &str {
        &self.as_group().base_path
    }

    /// Returns the middleware chain of this group.
    fn handlers(&self) -> &[HandlerFunc] {
        &self.as_group().handlers
    }

    /// Appends middleware to this group.
    ///
    /// Only routes registered and sub-groups created afterwards see it.
    fn use_middleware(&mut self, middleware: impl IntoIterator<Item = HandlerFunc>) -> &mut Self {
        self.as_group_mut().handlers.extend(middleware);
        self
    }

    /// Creates a sub-group below `relative` with additional middleware.
    ///
    /// # Errors
    ///
    /// Fails if the combined middleware chain reaches the handler limit.
    fn group(
        &self,
        relative: &str,
        middleware: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<RouterGroup, RouteError> {
        let parent = self.as_group();
        let middleware: HandlersChain = middleware.into_iter().collect();
        Ok(RouterGroup {
            handlers: combine_handlers(&parent.handlers, &middleware, parent.table.max_handlers())?,
            base_path: path::join_paths(&parent.base_path, relative)?,
            table: Arc::clone(&parent.table),
        })
    }

    /// Registers handlers for an arbitrary method token.
    ///
    /// The method must be one or more uppercase ASCII letters. Non-standard
    /// tokens such as `LINK` are accepted.
    ///
    /// # Errors
    ///
    /// Fails on an invalid method token or when registration fails.
    fn handle(
        &mut self,
        method: &str,
        relative: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<&mut Self, RouteError> {
        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(RouteError::InvalidMethod(method.to_string()));
        }
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| RouteError::InvalidMethod(method.to_string()))?;
        let handlers: HandlersChain = handlers.into_iter().collect();
        self.as_group().register(method, relative, &handlers)?;
        Ok(self)
    }

    /// Registers a `GET` route.
    ///
    /// # Errors
    ///
    /// Fails when the chain reaches the handler limit or the route table
    /// rejects the route.
    fn get(
        &mut self,
        relative: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<&mut Self, RouteError> {
        register_verb(self, Method::GET, relative, handlers)
    }

    /// Registers a `POST` route.
    ///
    /// # Errors
    ///
    /// See [`Routes::get`].
    fn post(
        &mut self,
        relative: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<&mut Self, RouteError> {
        register_verb(self, Method::POST, relative, handlers)
    }

    /// Registers a `PUT` route.
    ///
    /// # Errors
    ///
    /// See [`Routes::get`].
    fn put(
        &mut self,
        relative: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<&mut Self, RouteError> {
        register_verb(self, Method::PUT, relative, handlers)
    }

    /// Registers a `PATCH` route.
    ///
    /// # Errors
    ///
    /// See [`Routes::get`].
    fn patch(
        &mut self,
        relative: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<&mut Self, RouteError> {
        register_verb(self, Method::PATCH, relative, handlers)
    }

    /// Registers a `DELETE` route.
    ///
    /// # Errors
    ///
    /// See [`Routes::get`].
    fn delete(
        &mut self,
        relative: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<&mut Self, RouteError> {
        register_verb(self, Method::DELETE, relative, handlers)
    }

    /// Registers an `OPTIONS` route.
    ///
    /// # Errors
    ///
    /// See [`Routes::get`].
    fn options(
        &mut self,
        relative: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<&mut Self, RouteError> {
        register_verb(self, Method::OPTIONS, relative, handlers)
    }

    /// Registers a `HEAD` route.
    ///
    /// # Errors
    ///
    /// See [`Routes::get`].
    fn head(
        &mut self,
        relative: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<&mut Self, RouteError> {
        register_verb(self, Method::HEAD, relative, handlers)
    }

    /// Registers the same chain for every method in [`ANY_METHODS`].
    ///
    /// Registration is not atomic: when one method fails, the methods
    /// registered before it stay registered and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first registration failure.
    fn any(
        &mut self,
        relative: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<&mut Self, RouteError> {
        let handlers: HandlersChain = handlers.into_iter().collect();
        for method in ANY_METHODS {
            self.as_group().register(method, relative, &handlers)?;
        }
        Ok(self)
    }

    /// Serves a single file for `GET` and `HEAD` requests on `relative`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::StaticFileParams`] if `relative` contains `:`
    /// or `*`.
    fn static_file(
        &mut self,
        relative: &str,
        file_path: impl Into<PathBuf>,
    ) -> Result<&mut Self, RouteError> {
        if relative.contains([':', '*']) {
            return Err(RouteError::StaticFileParams(relative.to_string()));
        }

        let file = Arc::new(file_path.into());
        let endpoint = handler(move |ctx| {
            let file = Arc::clone(&file);
            Box::pin(async move { ctx.file(&file).await })
        });
        self.as_group().register_get_head(relative, endpoint)?;
        Ok(self)
    }

    /// Serves files below `root` for `GET` and `HEAD` requests under
    /// `relative`.
    ///
    /// # Errors
    ///
    /// See [`Routes::static_fs`].
    fn static_dir(
        &mut self,
        relative: &str,
        root: impl Into<PathBuf>,
    ) -> Result<&mut Self, RouteError> {
        self.static_fs(relative, Fs::new(root))
    }

    /// Mounts a filesystem adapter under `relative`.
    ///
    /// The adapter receives the remainder of the path as the `filepath`
    /// parameter.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::StaticDirParams`] if `relative` contains `:`
    /// or `*`.
    fn static_fs(&mut self, relative: &str, fs: Fs) -> Result<&mut Self, RouteError> {
        if relative.contains([':', '*']) {
            return Err(RouteError::StaticDirParams(relative.to_string()));
        }

        let pattern = path::join(relative, "/*filepath");
        self.as_group().register_get_head(&pattern, fs.new_request_handler())?;
        Ok(self)
    }

    /// Names `endpoint` and registers it with [`Routes::get`].
    ///
    /// # Errors
    ///
    /// See [`Routes::get`].
    fn get_ex(
        &mut self,
        relative: &str,
        endpoint: HandlerFunc,
        name: &str,
    ) -> Result<&mut Self, RouteError> {
        name_handler(self, &endpoint, name);
        self.get(relative, [endpoint])
    }

    /// Names `endpoint` and registers it with [`Routes::post`].
    ///
    /// # Errors
    ///
    /// See [`Routes::get`].
    fn post_ex(
        &mut self,
        relative: &str,
        endpoint: HandlerFunc,
        name: &str,
    ) -> Result<&mut Self, RouteError> {
        name_handler(self, &endpoint, name);
        self.post(relative, [endpoint])
    }

    /// Names `endpoint` and registers it with [`Routes::put`].
    ///
    /// # Errors
    ///
    /// See [`Routes::get`].
    fn put_ex(
        &mut self,
        relative: &str,
        endpoint: HandlerFunc,
        name: &str,
    ) -> Result<&mut Self, RouteError> {
        name_handler(self, &endpoint, name);
        self.put(relative, [endpoint])
    }

    /// Names `endpoint` and registers it with [`Routes::delete`].
    ///
    /// # Errors
    ///
    /// See [`Routes::get`].
    fn delete_ex(
        &mut self,
        relative: &str,
        endpoint: HandlerFunc,
        name: &str,
    ) -> Result<&mut Self, RouteError> {
        name_handler(self, &endpoint, name);
        self.delete(relative, [endpoint])
    }

    /// Names `endpoint` and registers it with [`Routes::head`].
    ///
    /// # Errors
    ///
    /// See [`Routes::get`].
    fn head_ex(
        &mut self,
        relative: &str,
        endpoint: HandlerFunc,
        name: &str,
    ) -> Result<&mut Self, RouteError> {
        name_handler(self, &endpoint, name);
        self.head(relative, [endpoint])
    }

    /// Names `endpoint` and registers it with [`Routes::any`].
    ///
    /// # Errors
    ///
    /// See [`Routes::any`].
    fn any_ex(
        &mut self,
        relative: &str,
        endpoint: HandlerFunc,
        name: &str,
    ) -> Result<&mut Self, RouteError> {
        name_handler(self, &endpoint, name);
        self.any(relative, [endpoint])
    }

    /// Names `endpoint` and registers it with [`Routes::handle`].
    ///
    /// # Errors
    ///
    /// See [`Routes::handle`].
    fn handle_ex(
        &mut self,
        method: &str,
        relative: &str,
        endpoint: HandlerFunc,
        name: &str,
    ) -> Result<&mut Self, RouteError> {
        name_handler(self, &endpoint, name);
        self.handle(method, relative, [endpoint])
    }
}

fn register_verb<'r, R: Routes>(
    routes: &'r mut R,
    method: Method,
    relative: &str,
    handlers: impl IntoIterator<Item = HandlerFunc>,
) -> Result<&'r mut R, RouteError> {
    let handlers: HandlersChain = handlers.into_iter().collect();
    routes.as_group().register(method, relative, &handlers)?;
    Ok(routes)
}

fn name_handler<R: Routes>(routes: &R, endpoint: &HandlerFunc, name: &str) {
    routes.as_group().table.names().set(endpoint, name);
}

impl Routes for RouterGroup {
    fn as_group(&self) -> &RouterGroup {
        self
    }

    fn as_group_mut(&mut self) -> &mut RouterGroup {
        self
    }
}
