//! Static filesystem adapter.
//!
//! [`Fs`] turns a directory into a request handler. It is mounted by
//! [`Routes::static_fs`](crate::group::Routes::static_fs) on a
//! `/*filepath` pattern and resolves that parameter beneath its root.
//!
//! # Security
//!
//! - `..` segments are rejected with 403 before touching the filesystem
//! - Hidden files (names starting with `.`) are rejected unless enabled
//! - Directories are only served through a configured index file
//!
//! # Example
//!
//! ```rust
//! use spindle_core::Options;
//! use spindle_route::{Engine, Fs, Routes};
//!
//! # fn main() -> Result<(), spindle_core::RouteError> {
//! let mut engine = Engine::new(Options::default());
//! engine.static_fs("/public", Fs::new("./public").index("index.html"))?;
//! # Ok(())
//! # }
//! ```

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use http::StatusCode;
use spindle_core::{handler, HandlerFunc, RequestContext};
use thiserror::Error;

/// Name of the route parameter carrying the requested file path.
pub const FILEPATH_PARAM: &str = "filepath";

/// Why a request could not be mapped to a file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
enum ResolveError {
    #[error("403 forbidden: {0}")]
    Forbidden(&'static str),

    #[error("404 page not found")]
    NotFound,
}

impl ResolveError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

/// Serves files from a root directory.
#[derive(Debug, Clone)]
pub struct Fs {
    root: PathBuf,
    index_names: Vec<String>,
    serve_hidden: bool,
}

impl Fs {
    /// Creates an adapter for `root` with no index files and hidden files
    /// disabled.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_names: Vec::new(),
            serve_hidden: false,
        }
    }

    /// Adds an index file name tried, in order, when a directory is
    /// requested.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index_names.push(name.into());
        self
    }

    /// Allows serving files and directories whose name starts with `.`.
    #[must_use]
    pub fn serve_hidden(mut self, enabled: bool) -> Self {
        self.serve_hidden = enabled;
        self
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the configured index file names.
    #[must_use]
    pub fn index_names(&self) -> &[String] {
        &self.index_names
    }

    /// Converts the adapter into a handler reading the `filepath` parameter.
    #[must_use]
    pub fn new_request_handler(self) -> HandlerFunc {
        let fs = Arc::new(self);
        handler(move |ctx| {
            let fs = Arc::clone(&fs);
            Box::pin(async move { fs.serve(ctx).await })
        })
    }

    async fn serve(&self, ctx: &mut RequestContext) {
        let requested = ctx.param(FILEPATH_PARAM).unwrap_or_default().to_string();

        match self.resolve(&requested).await {
            Ok(file) => ctx.file(&file).await,
            Err(e) => {
                tracing::debug!(path = %requested, error = %e, "static file not served");
                ctx.string(e.status(), e.to_string());
            }
        }
    }

    async fn resolve(&self, requested: &str) -> Result<PathBuf, ResolveError> {
        let relative = requested.trim_start_matches('/');

        for component in Path::new(relative).components() {
            match component {
                Component::ParentDir => {
                    return Err(ResolveError::Forbidden("directory traversal not allowed"));
                }
                Component::Normal(name)
                    if !self.serve_hidden && name.to_str().is_some_and(|n| n.starts_with('.')) =>
                {
                    return Err(ResolveError::Forbidden("hidden files not allowed"));
                }
                _ => {}
            }
        }

        let full_path = self.root.join(relative);
        let metadata = tokio::fs::metadata(&full_path)
            .await
            .map_err(|_| ResolveError::NotFound)?;

        if !metadata.is_dir() {
            return Ok(full_path);
        }

        for name in &self.index_names {
            let candidate = full_path.join(name);
            if tokio::fs::metadata(&candidate)
                .await
                .is_ok_and(|m| m.is_file())
            {
                return Ok(candidate);
            }
        }
        Err(ResolveError::Forbidden("directory index is forbidden"))
    }
}
