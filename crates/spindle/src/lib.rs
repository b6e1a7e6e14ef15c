//! # Spindle
//!
//! Route groups and a service lifecycle for async HTTP servers.
//!
//! - **Route groups** - nested prefixes with accumulated middleware chains
//! - **Static files** - single files, directories and configurable filesystems
//! - **Lifecycle** - signal-driven graceful or forced shutdown
//! - **Service discovery** - deferred registration, deregistration on shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spindle::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::with_defaults(Options::default());
//!
//!     let mut v1 = server.group("/v1", [])?;
//!     v1.get("/ping", [handler(|ctx| {
//!         Box::pin(async move { ctx.string(http::StatusCode::OK, "pong") })
//!     })])?;
//!
//!     server.spin().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Exit triggers
//!
//! ```text
//! SIGINT / SIGHUP / run loop returned Ok  ->  graceful shutdown (bounded by exit_wait_timeout)
//! SIGTERM / run or registration error     ->  immediate close
//! ```

#![doc(html_root_url = "https://docs.rs/spindle/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use spindle_core as core;

// Re-export routing and engine types
pub use spindle_route as route;

// Re-export server lifecycle types
pub use spindle_server as server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use spindle_core::{
        handler, HandlerFunc, HandlersChain, Info, Options, Registry, RequestContext, RouteError,
        ServerError,
    };

    pub use spindle_route::{Engine, Fs, RouterGroup, Routes};

    pub use spindle_server::{LogConfig, Server, SpinExit};
}
