//! Panic recovery middleware.
//!
//! Installed first in the chain by [`Server::with_defaults`](crate::Server::with_defaults).
//! A panic anywhere downstream is logged and turned into a 500 response
//! instead of tearing down the connection.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::StatusCode;
use spindle_core::{handler, HandlerFunc};

/// Returns the recovery middleware.
#[must_use]
pub fn recovery() -> HandlerFunc {
    handler(|ctx| {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(ctx.next()).catch_unwind().await;
            if let Err(payload) = outcome {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    method = %ctx.method(),
                    path = %ctx.path(),
                    panic = %panic_message(payload.as_ref()),
                    "handler panicked"
                );
                ctx.string(StatusCode::INTERNAL_SERVER_ERROR, "500 internal server error");
                ctx.abort();
            }
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use spindle_core::RequestContext;
    use std::sync::Arc;

    fn run(chain: Vec<HandlerFunc>) -> RequestContext {
        let mut ctx =
            RequestContext::new(Method::GET, "/boom").with_route("/boom", vec![], Arc::new(chain));
        tokio_test::block_on(ctx.next());
        ctx
    }

    #[test]
    fn test_panic_becomes_500() {
        let boom = handler(|_ctx| Box::pin(async { panic!("database exploded") }));

        let ctx = run(vec![recovery(), boom]);

        assert_eq!(ctx.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(ctx.is_aborted());
    }

    #[test]
    fn test_no_panic_passes_through() {
        let ok = handler(|ctx| Box::pin(async move { ctx.string(StatusCode::OK, "fine") }));

        let ctx = run(vec![recovery(), ok]);

        assert_eq!(ctx.status(), StatusCode::OK);
        assert_eq!(ctx.response_body().as_ref(), b"fine");
        assert!(!ctx.is_aborted());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
