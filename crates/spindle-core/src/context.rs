//! Request context types.
//!
//! The [`RequestContext`] carries all per-request state through the handler
//! chain: the incoming request, matched path parameters, the response being
//! built, and the chain position used by [`RequestContext::next`] and
//! [`RequestContext::abort`].

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use uuid::Uuid;

use crate::{mime, BoxFuture, HandlersChain, ABORT_INDEX};

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines for one request easy to
/// correlate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-request state shared by every handler in a chain.
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    path: String,
    full_path: String,
    params: Vec<(String, String)>,
    request_headers: HeaderMap,
    request_body: Bytes,

    status: StatusCode,
    response_headers: HeaderMap,
    response_body: Bytes,

    handlers: Arc<HandlersChain>,
    /// Position of the next handler to run; `ABORT_INDEX` once aborted.
    index: usize,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("full_path", &self.full_path)
            .field("status", &self.status)
            .field("handlers", &self.handlers.len())
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    /// Creates a context for `method` and `path` with an empty chain.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: path.into(),
            full_path: String::new(),
            params: Vec::new(),
            request_headers: HeaderMap::new(),
            request_body: Bytes::new(),
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            response_body: Bytes::new(),
            handlers: Arc::new(Vec::new()),
            index: 0,
        }
    }

    /// Sets the request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.request_headers = headers;
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.request_body = body;
        self
    }

    /// Attaches the matched route: its pattern, parameters and handler chain.
    #[must_use]
    pub fn with_route(
        mut self,
        full_path: impl Into<String>,
        params: Vec<(String, String)>,
        handlers: Arc<HandlersChain>,
    ) -> Self {
        self.full_path = full_path.into();
        self.params = params;
        self.handlers = handlers;
        self.index = 0;
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the registered pattern that matched, e.g. `/users/:id`.
    #[must_use]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Returns a path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the request headers.
    #[must_use]
    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    /// Returns the request body.
    #[must_use]
    pub fn request_body(&self) -> &Bytes {
        &self.request_body
    }

    /// Number of handlers in the matched chain.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Runs the remaining handlers of the chain.
    ///
    /// Middleware calls this to execute everything after it and then
    /// continue with its own post-processing. Handlers that never call it are
    /// followed by the next one automatically.
    pub fn next(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            while self.index < self.handlers.len() {
                let handler = Arc::clone(&self.handlers[self.index]);
                self.index += 1;
                handler(&mut *self).await;
            }
        })
    }

    /// Prevents the remaining handlers from running.
    pub fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    /// Aborts the chain and sets the response status.
    pub fn abort_with_status(&mut self, status: StatusCode) {
        self.status = status;
        self.abort();
    }

    /// Returns `true` if the chain was aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    /// Returns the response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the response status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Sets a response header, ignoring values that are not valid header text.
    pub fn header(&mut self, name: header::HeaderName, value: &str) {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.response_headers.insert(name, value);
        }
    }

    /// Returns the response headers.
    #[must_use]
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Returns the response body.
    #[must_use]
    pub fn response_body(&self) -> &Bytes {
        &self.response_body
    }

    /// Writes raw bytes with the given content type.
    pub fn data(&mut self, status: StatusCode, content_type: &str, body: impl Into<Bytes>) {
        self.status = status;
        self.header(header::CONTENT_TYPE, content_type);
        self.response_body = body.into();
    }

    /// Writes a plain-text response.
    pub fn string(&mut self, status: StatusCode, body: impl Into<String>) {
        self.data(status, "text/plain; charset=utf-8", body.into());
    }

    /// Writes a JSON response.
    ///
    /// Serialization failures produce a 500 response instead.
    pub fn json<T: Serialize>(&mut self, status: StatusCode, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => self.data(status, "application/json; charset=utf-8", body),
            Err(e) => {
                tracing::error!(error = %e, path = %self.path, "failed to serialize JSON response");
                self.string(StatusCode::INTERNAL_SERVER_ERROR, "500 internal server error");
            }
        }
    }

    /// Serves the file at `path`.
    ///
    /// Missing files and directories produce a 404 response.
    pub async fn file(&mut self, path: &Path) {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => {
                self.string(StatusCode::NOT_FOUND, "404 page not found");
                return;
            }
        };

        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(error = %e, file = %path.display(), "failed to read file");
                self.string(StatusCode::INTERNAL_SERVER_ERROR, "500 internal server error");
                return;
            }
        };

        if let Ok(modified) = metadata.modified() {
            self.header(header::LAST_MODIFIED, &httpdate::fmt_http_date(modified));
        }
        self.header(header::CONTENT_LENGTH, &metadata.len().to_string());
        self.data(StatusCode::OK, mime::detect(path), content);
    }

    /// Builds the HTTP response, consuming the context.
    ///
    /// `HEAD` responses keep their headers but drop the body.
    #[must_use]
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let body = if self.method == Method::HEAD {
            Bytes::new()
        } else {
            self.response_body
        };

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.response_headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> crate::HandlerFunc {
        let log = Arc::clone(log);
        handler(move |_ctx| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().push(label);
            })
        })
    }

    fn routed(chain: HandlersChain) -> RequestContext {
        RequestContext::new(Method::GET, "/").with_route("/", vec![], Arc::new(chain))
    }

    #[tokio::test]
    async fn test_next_runs_chain_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![recorder(&log, "a"), recorder(&log, "b"), recorder(&log, "c")];
        let mut ctx = routed(chain);

        ctx.next().await;

        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_middleware_wraps_downstream() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let outer_log = Arc::clone(&log);
        let outer = handler(move |ctx| {
            let log = Arc::clone(&outer_log);
            Box::pin(async move {
                log.lock().push("before");
                ctx.next().await;
                log.lock().push("after");
            })
        });
        let chain = vec![outer, recorder(&log, "endpoint")];
        let mut ctx = routed(chain);

        ctx.next().await;

        assert_eq!(*log.lock(), vec!["before", "endpoint", "after"]);
    }

    #[tokio::test]
    async fn test_abort_skips_remaining_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let guard = handler(|ctx| {
            Box::pin(async move {
                ctx.abort_with_status(StatusCode::UNAUTHORIZED);
            })
        });
        let chain = vec![guard, recorder(&log, "endpoint")];
        let mut ctx = routed(chain);

        ctx.next().await;

        assert!(ctx.is_aborted());
        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_params_lookup() {
        let ctx = RequestContext::new(Method::GET, "/users/42").with_route(
            "/users/:id",
            vec![("id".to_string(), "42".to_string())],
            Arc::new(Vec::new()),
        );

        assert_eq!(ctx.param("id"), Some("42"));
        assert_eq!(ctx.param("name"), None);
        assert_eq!(ctx.full_path(), "/users/:id");
    }

    #[test]
    fn test_json_response() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.json(StatusCode::CREATED, &serde_json::json!({"id": 7}));

        let response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_file_serves_content_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favicon.ico");
        std::fs::write(&path, [0u8, 1, 2, 3]).unwrap();

        let mut ctx = RequestContext::new(Method::GET, "/favicon.ico");
        ctx.file(&path).await;

        assert_eq!(ctx.status(), StatusCode::OK);
        assert_eq!(ctx.response_body().as_ref(), &[0u8, 1, 2, 3]);
        assert_eq!(
            ctx.response_headers().get(header::CONTENT_TYPE).unwrap(),
            "image/x-icon"
        );
        assert_eq!(ctx.response_headers().get(header::CONTENT_LENGTH).unwrap(), "4");
        assert!(ctx.response_headers().contains_key(header::LAST_MODIFIED));
    }

    #[tokio::test]
    async fn test_file_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = RequestContext::new(Method::GET, "/missing");

        ctx.file(&dir.path().join("missing.txt")).await;
        assert_eq!(ctx.status(), StatusCode::NOT_FOUND);

        let mut ctx = RequestContext::new(Method::GET, "/dir");
        ctx.file(dir.path()).await;
        assert_eq!(ctx.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_head_response_has_no_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();

        let mut ctx = RequestContext::new(Method::HEAD, "/a.txt");
        ctx.file(&path).await;
        let response = ctx.into_response();

        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "5");
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert!(body.is_empty());
    }

    #[test]
    fn test_request_id_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
