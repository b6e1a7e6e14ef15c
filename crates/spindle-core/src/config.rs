//! Engine and lifecycle configuration.
//!
//! Options are built with [`Options::builder()`] and are read-only once the
//! engine is constructed.
//!
//! # Example
//!
//! ```rust
//! use spindle_core::Options;
//! use std::time::Duration;
//!
//! let options = Options::builder()
//!     .http_addr("127.0.0.1:8080")
//!     .exit_wait_timeout(Duration::from_secs(10))
//!     .build();
//!
//! assert_eq!(options.http_addr(), "127.0.0.1:8080");
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::registry::{Info, NoopRegistry, Registry};
use crate::ABORT_INDEX;

/// Default HTTP bind address.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8888";

/// Default graceful exit timeout in seconds.
pub const DEFAULT_EXIT_WAIT_TIMEOUT_SECS: u64 = 5;

/// Default delay before registering with the service registry, in seconds.
pub const DEFAULT_REGISTER_DELAY_SECS: u64 = 1;

/// Engine configuration.
#[derive(Clone)]
pub struct Options {
    http_addr: String,
    exit_wait_timeout: Duration,
    max_handlers: usize,
    register_delay: Duration,
    registry: Arc<dyn Registry>,
    registry_info: Option<Info>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("http_addr", &self.http_addr)
            .field("exit_wait_timeout", &self.exit_wait_timeout)
            .field("max_handlers", &self.max_handlers)
            .field("register_delay", &self.register_delay)
            .field("registry_info", &self.registry_info)
            .finish_non_exhaustive()
    }
}

impl Options {
    /// Creates a new options builder.
    #[must_use]
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Returns the HTTP bind address.
    #[must_use]
    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// Parses and returns the HTTP address as a `SocketAddr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be parsed.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.http_addr.parse()
    }

    /// Returns how long graceful shutdown may take.
    #[must_use]
    pub fn exit_wait_timeout(&self) -> Duration {
        self.exit_wait_timeout
    }

    /// Returns the limit every handler chain must stay strictly below.
    #[must_use]
    pub fn max_handlers(&self) -> usize {
        self.max_handlers
    }

    /// Returns the delay between startup and registry registration.
    #[must_use]
    pub fn register_delay(&self) -> Duration {
        self.register_delay
    }

    /// Returns the registry client.
    #[must_use]
    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// Returns the instance information announced to the registry.
    #[must_use]
    pub fn registry_info(&self) -> Option<&Info> {
        self.registry_info.as_ref()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`Options`].
#[derive(Clone)]
pub struct OptionsBuilder {
    http_addr: String,
    exit_wait_timeout: Duration,
    max_handlers: usize,
    register_delay: Duration,
    registry: Arc<dyn Registry>,
    registry_info: Option<Info>,
}

impl OptionsBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            exit_wait_timeout: Duration::from_secs(DEFAULT_EXIT_WAIT_TIMEOUT_SECS),
            max_handlers: ABORT_INDEX,
            register_delay: Duration::from_secs(DEFAULT_REGISTER_DELAY_SECS),
            registry: Arc::new(NoopRegistry),
            registry_info: None,
        }
    }

    /// Sets the HTTP bind address (e.g. "0.0.0.0:8888", "127.0.0.1:0").
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = addr.into();
        self
    }

    /// Sets how long graceful shutdown may take before it fails with a
    /// timeout.
    #[must_use]
    pub fn exit_wait_timeout(mut self, timeout: Duration) -> Self {
        self.exit_wait_timeout = timeout;
        self
    }

    /// Sets the handler chain limit.
    ///
    /// The value is clamped to [`ABORT_INDEX`] so that an aborted chain
    /// position can never collide with a real handler index.
    #[must_use]
    pub fn max_handlers(mut self, limit: usize) -> Self {
        self.max_handlers = limit.min(ABORT_INDEX);
        self
    }

    /// Sets the delay before registering with the service registry.
    #[must_use]
    pub fn register_delay(mut self, delay: Duration) -> Self {
        self.register_delay = delay;
        self
    }

    /// Sets the registry client.
    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the instance information announced to the registry.
    #[must_use]
    pub fn registry_info(mut self, info: Info) -> Self {
        self.registry_info = Some(info);
        self
    }

    /// Builds the [`Options`].
    #[must_use]
    pub fn build(self) -> Options {
        Options {
            http_addr: self.http_addr,
            exit_wait_timeout: self.exit_wait_timeout,
            max_handlers: self.max_handlers,
            register_delay: self.register_delay,
            registry: self.registry,
            registry_info: self.registry_info,
        }
    }
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
