//! # Spindle Server
//!
//! Runs an [`Engine`](spindle_route::Engine) until the process is told to
//! stop, then drains or closes it.
//!
//! - [`Server`] - an engine plus signal handling; [`Server::spin`] is the entry point
//! - [`signal`] - OS signals and the background error collector
//! - [`recovery()`] - panic-to-500 middleware installed by [`Server::with_defaults`]
//! - [`logging`] - `tracing-subscriber` initialisation
//!
//! ## Example
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use spindle_core::{handler, Options};
//! use spindle_server::{Routes, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = Options::builder().http_addr("0.0.0.0:8888").build();
//!     let mut server = Server::with_defaults(options);
//!     server.get("/ping", [handler(|ctx| {
//!         Box::pin(async move { ctx.string(StatusCode::OK, "pong") })
//!     })])?;
//!
//!     server.spin().await;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/spindle-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod logging;
mod recovery;
mod server;
pub mod signal;

pub use logging::{init_logging, LogConfig, LoggingError};
pub use recovery::recovery;
pub use server::{Server, SignalWaiter, SpinExit};
pub use signal::{error_collector, wait_signal, ErrorReporter, RunErrors};
pub use spindle_route::Routes;
