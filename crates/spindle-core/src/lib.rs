//! # Spindle Core
//!
//! Core types shared by every Spindle crate:
//!
//! - [`HandlerFunc`] / [`HandlersChain`] - the opaque handler values a route group composes
//! - [`HandlerNames`] - side-table giving handlers a human-readable name
//! - [`RequestContext`] - per-request state, chain execution and response building
//! - [`Options`] - engine and lifecycle configuration
//! - [`Registry`] - service-discovery registration contract
//! - [`RouteError`] / [`ServerError`] - configuration-time and operational errors

#![doc(html_root_url = "https://docs.rs/spindle-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
mod context;
mod error;
mod handler;
mod mime;
pub mod registry;

use std::future::Future;
use std::pin::Pin;

pub use config::{Options, OptionsBuilder};
pub use context::{RequestContext, RequestId};
pub use error::{HookError, RouteError, ServerError};
pub use handler::{handler, HandlerFunc, HandlerNames, HandlersChain};
pub use registry::{Info, NoopRegistry, Registry, RegistryError};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reserved handler index meaning "skip every remaining handler".
///
/// A handler chain must always stay strictly shorter than this value so that
/// an aborted chain can never be mistaken for a real position.
pub const ABORT_INDEX: usize = i8::MAX as usize / 2;
