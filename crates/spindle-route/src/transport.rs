//! Transport layer.
//!
//! A [`Transporter`] accepts connections and hands every request to a
//! [`Dispatcher`], which looks the route up and runs its handler chain. The
//! engine only talks to the trait, so tests can substitute their own
//! transporter; [`HyperTransporter`] is the HTTP/1.1 implementation used by
//! default.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use spindle_core::{BoxFuture, RequestContext, ServerError};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

use crate::shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
use crate::table::RouteTable;

/// Accepts connections and feeds requests to a dispatcher.
pub trait Transporter: Send + Sync + 'static {
    /// Serves until shut down or closed.
    fn serve(&self, dispatcher: Dispatcher) -> BoxFuture<'_, Result<(), ServerError>>;

    /// Stops accepting and waits for in-flight connections until `deadline`.
    fn shutdown(&self, deadline: Instant) -> BoxFuture<'_, Result<(), ServerError>>;

    /// Stops immediately, dropping open connections.
    fn close(&self) -> BoxFuture<'_, Result<(), ServerError>>;
}

/// Routes requests through the engine's route table.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: Arc<RouteTable>,
}

impl Dispatcher {
    /// Creates a dispatcher over `table`.
    #[must_use]
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    /// Runs the matching handler chain and returns its response.
    ///
    /// Unmatched requests get a plain-text 404.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<Full<Bytes>> {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path().to_string();

        let Some(found) = self.table.lookup(&parts.method, &path) else {
            tracing::debug!(method = %parts.method, path = %path, "no route matched");
            let mut ctx = RequestContext::new(parts.method, path);
            ctx.string(StatusCode::NOT_FOUND, "404 page not found");
            return ctx.into_response();
        };

        let mut ctx = RequestContext::new(parts.method, path)
            .with_headers(parts.headers)
            .with_body(body)
            .with_route(found.pattern, found.params, found.handlers);

        tracing::trace!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            route = %ctx.full_path(),
            "dispatching request"
        );
        ctx.next().await;
        ctx.into_response()
    }

    async fn handle(&self, request: Request<Incoming>) -> Response<Full<Bytes>> {
        let (parts, body) = request.into_parts();
        match body.collect().await {
            Ok(collected) => {
                self.dispatch(Request::from_parts(parts, collected.to_bytes()))
                    .await
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %parts.uri.path(), "failed to read request body");
                let mut ctx = RequestContext::new(parts.method, parts.uri.path());
                ctx.string(StatusCode::BAD_REQUEST, "400 bad request");
                ctx.into_response()
            }
        }
    }
}

/// HTTP/1.1 transporter built on hyper.
#[derive(Debug)]
pub struct HyperTransporter {
    addr: String,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown: ShutdownSignal,
    close: ShutdownSignal,
    tracker: ConnectionTracker,
}

impl HyperTransporter {
    /// Creates a transporter that will listen on `addr`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            local_addr: Mutex::new(None),
            shutdown: ShutdownSignal::new(),
            close: ShutdownSignal::new(),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Returns the bound address once serving has started.
    ///
    /// Useful with port `0` to discover the port the OS picked.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.tracker.active_connections()
    }

    async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr: SocketAddr = self.addr.parse().map_err(|e: std::net::AddrParseError| {
            ServerError::InvalidAddr {
                addr: self.addr.clone(),
                reason: e.to_string(),
            }
        })?;

        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: self.addr.clone(),
            source,
        })?;
        let bound = listener.local_addr()?;
        *self.local_addr.lock() = Some(bound);

        tracing::info!(addr = %bound, "server listening");
        Ok(listener)
    }

    async fn accept_loop(&self, listener: TcpListener, dispatcher: Dispatcher) {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        tokio::spawn(serve_connection(
                            stream,
                            remote_addr,
                            dispatcher.clone(),
                            self.shutdown.clone(),
                            self.close.clone(),
                            self.tracker.acquire(),
                        ));
                    }
                    Err(e) => accept_failed(&e).await,
                },
                () = self.shutdown.recv() => {
                    tracing::info!("stopped accepting connections");
                    break;
                }
                () = self.close.recv() => {
                    tracing::info!("listener closed");
                    break;
                }
            }
        }
    }
}

impl Transporter for HyperTransporter {
    fn serve(&self, dispatcher: Dispatcher) -> BoxFuture<'_, Result<(), ServerError>> {
        Box::pin(async move {
            let listener = self.bind().await?;
            self.accept_loop(listener, dispatcher).await;
            Ok(())
        })
    }

    fn shutdown(&self, deadline: Instant) -> BoxFuture<'_, Result<(), ServerError>> {
        Box::pin(async move {
            self.shutdown.trigger();
            tracing::info!(
                connections = self.tracker.active_connections(),
                "waiting for connections to finish"
            );

            if tokio::time::timeout_at(deadline, self.tracker.wait_idle())
                .await
                .is_err()
            {
                tracing::warn!(
                    connections = self.tracker.active_connections(),
                    "connections still open at the shutdown deadline"
                );
                return Err(ServerError::ShutdownTimeout);
            }
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ServerError>> {
        Box::pin(async move {
            self.close.trigger();
            Ok(())
        })
    }
}

/// Pause after a failed `accept`, e.g. when file descriptors run out.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

async fn accept_failed(error: &std::io::Error) {
    tracing::error!(error = %error, "failed to accept connection");
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    dispatcher: Dispatcher,
    shutdown: ShutdownSignal,
    close: ShutdownSignal,
    _token: ConnectionToken,
) {
    let service = service_fn(move |request: Request<Incoming>| {
        let dispatcher = dispatcher.clone();
        async move { Ok::<_, Infallible>(dispatcher.handle(request).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                tracing::debug!(remote = %remote_addr, error = %e, "connection error");
            }
            return;
        }
        () = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
        }
        () = close.recv() => {
            tracing::debug!(remote = %remote_addr, "connection dropped on close");
            return;
        }
    }

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                tracing::debug!(remote = %remote_addr, error = %e, "connection error during drain");
            }
        }
        () = close.recv() => {
            tracing::debug!(remote = %remote_addr, "connection dropped on close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{header, Method};
    use spindle_core::handler;

    fn table_with_echo() -> Arc<RouteTable> {
        let table = Arc::new(RouteTable::new(63));
        let echo = handler(|ctx| {
            Box::pin(async move {
                let body = ctx.request_body().clone();
                let id = ctx.param("id").unwrap_or_default().to_string();
                ctx.header(header::HeaderName::from_static("x-user"), &id);
                ctx.data(StatusCode::OK, "application/octet-stream", body);
            })
        });
        table.add_route(Method::POST, "/users/:id", vec![echo]).unwrap();
        table
    }

    #[tokio::test]
    async fn test_dispatch_runs_chain() {
        let dispatcher = Dispatcher::new(table_with_echo());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/users/7")
            .body(Bytes::from_static(b"payload"))
            .unwrap();

        let response = dispatcher.dispatch(request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-user").unwrap(), "7");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_dispatch_not_found() {
        let dispatcher = Dispatcher::new(table_with_echo());
        let request = Request::builder()
            .method(Method::GET)
            .uri("/users/7")
            .body(Bytes::new())
            .unwrap();

        let response = dispatcher.dispatch(request).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"404 page not found");
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let transporter = HyperTransporter::new("not-an-address");
        let err = transporter
            .serve(Dispatcher::new(Arc::new(RouteTable::new(63))))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidAddr { .. }));
        assert!(transporter.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_without_connections() {
        let transporter = HyperTransporter::new("127.0.0.1:0");
        let deadline = Instant::now() + Duration::from_millis(50);
        assert!(transporter.shutdown(deadline).await.is_ok());

        // A shut down transporter stops right after binding.
        let dispatcher = Dispatcher::new(Arc::new(RouteTable::new(63)));
        tokio::time::timeout(Duration::from_secs(1), transporter.serve(dispatcher))
            .await
            .expect("serve should return")
            .unwrap();
    }

    #[tokio::test]
    async fn test_accept_failure_backs_off() {
        let error = std::io::Error::new(std::io::ErrorKind::Other, "too many open files");
        let started = Instant::now();

        accept_failed(&error).await;

        assert!(started.elapsed() >= ACCEPT_ERROR_BACKOFF);
    }
}
