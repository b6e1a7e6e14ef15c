//! # Spindle Route
//!
//! Route-group composition and the engine that serves the resulting routes.
//!
//! ## Modules
//!
//! - [`path`] - lexical joining of group prefixes and route paths
//! - [`group`] - middleware chain merging, [`RouterGroup`] and the [`Routes`] API
//! - [`table`] - the route table and request matching
//! - [`engine`] - the [`Engine`]: root group, hooks, status and transporter
//! - [`hooks`] - on-run and on-shutdown hooks
//! - [`transport`] - the [`Transporter`] trait, [`Dispatcher`] and the hyper transporter
//! - [`shutdown`] - shutdown signal and connection tracking
//! - [`fs`] - static filesystem adapter
//!
//! ## Example
//!
//! ```rust
//! use spindle_core::{handler, Options};
//! use spindle_route::{Engine, Routes};
//! use http::StatusCode;
//!
//! # fn main() -> Result<(), spindle_core::RouteError> {
//! let mut engine = Engine::new(Options::default());
//!
//! let v1 = engine.group("/v1", [])?;
//! let mut users = v1.group("users", [])?;
//! users.get(":id", [handler(|ctx| {
//!     Box::pin(async move {
//!         let id = ctx.param("id").unwrap_or_default().to_string();
//!         ctx.string(StatusCode::OK, id);
//!     })
//! })])?;
//!
//! assert_eq!(engine.routes()[0].path, "/v1/users/:id");
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/spindle-route/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod fs;
pub mod group;
pub mod hooks;
pub mod path;
pub mod shutdown;
pub mod table;
pub mod transport;

pub use engine::{Engine, EngineStatus};
pub use fs::Fs;
pub use group::{combine_handlers, RouterGroup, Routes, ANY_METHODS};
pub use hooks::Hooks;
pub use shutdown::ShutdownSignal;
pub use table::{RouteInfo, RouteTable};
pub use transport::{Dispatcher, HyperTransporter, Transporter};
