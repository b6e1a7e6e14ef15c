//! Error types for Spindle.
//!
//! Errors fall into two disjoint classes:
//!
//! - [`RouteError`]: configuration-time mistakes in the route tree. These are
//!   programmer errors and are reported before any request traffic exists.
//! - [`ServerError`]: operational failures while the server runs or shuts
//!   down. These are logged and become the reason the process exits.

use thiserror::Error;

use crate::registry::RegistryError;

/// A route tree was configured incorrectly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The method token is not made only of uppercase ASCII letters.
    #[error("http method {0} is not valid")]
    InvalidMethod(String),

    /// Combining handler chains would reach the reserved abort index.
    #[error("too many handlers: {count} handlers reach the limit of {limit}")]
    TooManyHandlers {
        /// Length of the combined chain.
        count: usize,
        /// Configured limit the chain must stay below.
        limit: usize,
    },

    /// A static file route contains a parameter or wildcard marker.
    #[error("URL parameters can not be used when serving a static file: {0}")]
    StaticFileParams(String),

    /// A static directory route contains a parameter or wildcard marker.
    #[error("URL parameters can not be used when serving a static folder: {0}")]
    StaticDirParams(String),

    /// An empty path reached path composition.
    #[error("the length of the path can't be 0")]
    EmptyPath,

    /// A route path does not begin with `/`.
    #[error("path must begin with '/': {0}")]
    PathNotAbsolute(String),

    /// A route was registered without any handler.
    #[error("there must be at least one handler for {method} {path}")]
    NoHandlers {
        /// HTTP method of the route.
        method: String,
        /// Absolute path of the route.
        path: String,
    },

    /// Handlers are already registered for this method and path.
    #[error("handlers are already registered for {method} {path}")]
    DuplicateRoute {
        /// HTTP method of the route.
        method: String,
        /// Absolute path of the route.
        path: String,
    },
}

/// A lifecycle hook failed.
#[derive(Error, Debug)]
pub enum HookError {
    /// An on-run hook failed; the engine does not start serving.
    #[error("on-run hook '{hook}' failed: {message}")]
    Run {
        /// Hook name.
        hook: String,
        /// Failure description.
        message: String,
    },

    /// Generic hook error with source.
    #[error("lifecycle hook error: {message}")]
    Failed {
        /// Error message
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl HookError {
    /// Creates a new hook error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new hook error with a source.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// An operational failure while running or stopping the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configured listen address could not be parsed.
    #[error("invalid listen address '{addr}': {reason}")]
    InvalidAddr {
        /// The configured address.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// Binding the listener failed.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// Address that was bound.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Registering with or deregistering from the service registry failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A signal requested an immediate exit.
    #[error("received signal {0}")]
    Signal(String),

    /// Graceful shutdown did not finish before its deadline.
    #[error("graceful shutdown did not finish before the deadline")]
    ShutdownTimeout,

    /// `run` was called on an engine that already left its initial state.
    #[error("engine is already running")]
    AlreadyRunning,

    /// `shutdown` was called on an engine that is not running.
    #[error("engine is not running")]
    NotRunning,

    /// A lifecycle hook failed.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Transport-specific failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ServerError {
    /// Returns `true` if this error was caused by a shutdown deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ShutdownTimeout)
    }
}
