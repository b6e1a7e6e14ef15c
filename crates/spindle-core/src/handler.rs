//! Handler values and the handler naming side-table.
//!
//! A [`HandlerFunc`] is an opaque, cheaply clonable async function over a
//! [`RequestContext`]. Middleware and endpoint handlers share this one type;
//! only their position in a [`HandlersChain`] distinguishes them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{BoxFuture, RequestContext};

/// A request handler or middleware.
pub type HandlerFunc =
    Arc<dyn for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync + 'static>;

/// Ordered handler sequence, middleware first and endpoint handler last.
pub type HandlersChain = Vec<HandlerFunc>;

/// Wraps a closure into a [`HandlerFunc`].
///
/// # Example
///
/// ```
/// use spindle_core::{handler, RequestContext};
/// use http::StatusCode;
///
/// let ping = handler(|ctx: &mut RequestContext| {
///     Box::pin(async move {
///         ctx.string(StatusCode::OK, "pong");
///     })
/// });
/// # let _ = ping;
/// ```
pub fn handler<F>(f: F) -> HandlerFunc
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Identity of a handler value: the address of its shared allocation.
fn handler_key(handler: &HandlerFunc) -> usize {
    Arc::as_ptr(handler).cast::<()>() as usize
}

/// Side-table associating handler values with human-readable names.
///
/// Closures cannot be introspected for a stable name, so diagnostics look
/// names up here. Naming has no effect on routing.
#[derive(Debug, Default)]
pub struct HandlerNames {
    names: RwLock<HashMap<usize, String>>,
}

impl HandlerNames {
    /// Creates an empty side-table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `name` with `handler`, replacing any previous name.
    pub fn set(&self, handler: &HandlerFunc, name: impl Into<String>) {
        self.names.write().insert(handler_key(handler), name.into());
    }

    /// Returns the name recorded for `handler`, if any.
    #[must_use]
    pub fn get(&self, handler: &HandlerFunc) -> Option<String> {
        self.names.read().get(&handler_key(handler)).cloned()
    }

    /// Returns the recorded name or `"<anonymous>"`.
    #[must_use]
    pub fn name_or_anonymous(&self, handler: &HandlerFunc) -> String {
        self.get(handler).unwrap_or_else(|| "<anonymous>".to_string())
    }

    /// Number of named handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    /// Returns `true` if no handler has been named.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> HandlerFunc {
        handler(|_ctx| Box::pin(async {}))
    }

    #[test]
    fn test_names_follow_handler_identity() {
        let names = HandlerNames::new();
        let first = noop();
        let second = noop();

        names.set(&first, "listUsers");

        assert_eq!(names.get(&first).as_deref(), Some("listUsers"));
        assert_eq!(names.get(&Arc::clone(&first)).as_deref(), Some("listUsers"));
        assert_eq!(names.get(&second), None);
        assert_eq!(names.name_or_anonymous(&second), "<anonymous>");
    }

    #[test]
    fn test_set_replaces_name() {
        let names = HandlerNames::new();
        let h = noop();

        names.set(&h, "old");
        names.set(&h, "new");

        assert_eq!(names.len(), 1);
        assert_eq!(names.get(&h).as_deref(), Some("new"));
    }

    #[test]
    fn test_empty_table() {
        let names = HandlerNames::default();
        assert!(names.is_empty());
    }
}
