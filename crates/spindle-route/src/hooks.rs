//! Engine lifecycle hooks.
//!
//! On-run hooks execute in registration order right before the transporter
//! starts serving; the first failure stops the engine from starting.
//! On-shutdown hooks execute concurrently with connection draining during a
//! graceful shutdown; failures are logged and collected.
//!
//! # Example
//!
//! ```rust
//! use spindle_route::hooks::Hooks;
//!
//! let mut hooks = Hooks::new();
//! hooks.on_run("warmup", || Box::pin(async { Ok(()) }));
//! hooks.on_shutdown("flush", || Box::pin(async { Ok(()) }));
//!
//! assert_eq!(hooks.run_hook_count(), 1);
//! assert_eq!(hooks.shutdown_hook_count(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use spindle_core::{BoxFuture, HookError};

/// A lifecycle hook callback.
pub type Hook = Arc<dyn Fn() -> BoxFuture<'static, Result<(), HookError>> + Send + Sync>;

/// Named on-run and on-shutdown hooks of one engine.
#[derive(Clone, Default)]
pub struct Hooks {
    run_hooks: Vec<(String, Hook)>,
    shutdown_hooks: Vec<(String, Hook)>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("run_hooks", &self.run_hooks.len())
            .field("shutdown_hooks", &self.shutdown_hooks.len())
            .finish()
    }
}

impl Hooks {
    /// Creates an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook run before serving starts.
    pub fn on_run<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn() -> BoxFuture<'static, Result<(), HookError>> + Send + Sync + 'static,
    {
        self.run_hooks.push((name.into(), Arc::new(hook)));
    }

    /// Registers a hook run during graceful shutdown.
    pub fn on_shutdown<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn() -> BoxFuture<'static, Result<(), HookError>> + Send + Sync + 'static,
    {
        self.shutdown_hooks.push((name.into(), Arc::new(hook)));
    }

    /// Number of on-run hooks.
    #[must_use]
    pub fn run_hook_count(&self) -> usize {
        self.run_hooks.len()
    }

    /// Names of the on-run hooks, in the order they run.
    pub fn run_hook_names(&self) -> impl Iterator<Item = &str> {
        self.run_hooks.iter().map(|(name, _)| name.as_str())
    }

    /// Number of on-shutdown hooks.
    #[must_use]
    pub fn shutdown_hook_count(&self) -> usize {
        self.shutdown_hooks.len()
    }

    /// Runs the on-run hooks in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Run`] naming the failed hook.
    pub async fn run_all(&self) -> Result<(), HookError> {
        for (name, hook) in &self.run_hooks {
            tracing::debug!(hook = %name, "running on-run hook");
            if let Err(e) = hook().await {
                tracing::error!(hook = %name, error = %e, "on-run hook failed");
                return Err(HookError::Run {
                    hook: name.clone(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Runs every on-shutdown hook concurrently and returns the failures.
    ///
    /// The returned future is `'static` so it can be spawned and awaited
    /// against a deadline.
    pub fn shutdown_all(&self) -> BoxFuture<'static, Vec<(String, HookError)>> {
        let hooks = self.shutdown_hooks.clone();
        Box::pin(async move {
            let mut tasks = tokio::task::JoinSet::new();
            for (name, hook) in hooks {
                tasks.spawn(async move { (name, hook().await) });
            }

            let mut failures = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => {
                        tracing::debug!(hook = %name, "on-shutdown hook completed");
                    }
                    Ok((name, Err(e))) => {
                        tracing::error!(hook = %name, error = %e, "on-shutdown hook failed");
                        failures.push((name, e));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "on-shutdown hook panicked");
                        let err = HookError::with_source("hook panicked", e);
                        failures.push(("<panicked>".to_string(), err));
                    }
                }
            }
            failures
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording(
        log: &Arc<Mutex<Vec<u32>>>,
        value: u32,
    ) -> impl Fn() -> BoxFuture<'static, Result<(), HookError>> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move || -> BoxFuture<'static, Result<(), HookError>> {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().push(value);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_empty_hooks() {
        let hooks = Hooks::new();
        assert!(hooks.run_all().await.is_ok());
        assert!(hooks.shutdown_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_run_hooks_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        hooks.on_run("first", recording(&log, 1));
        hooks.on_run("second", recording(&log, 2));
        hooks.on_run("third", recording(&log, 3));

        hooks.run_all().await.unwrap();

        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_run_hooks_stop_on_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        hooks.on_run("first", recording(&log, 1));
        hooks.on_run("broken", || {
            Box::pin(async { Err(HookError::new("no database")) })
        });
        hooks.on_run("third", recording(&log, 3));

        let err = hooks.run_all().await.unwrap_err();

        assert!(matches!(err, HookError::Run { ref hook, .. } if hook == "broken"));
        assert!(err.to_string().contains("no database"));
        assert_eq!(*log.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_shutdown_hooks_all_run_and_collect_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        hooks.on_shutdown("first", recording(&log, 1));
        hooks.on_shutdown("broken", || {
            Box::pin(async { Err(HookError::new("flush failed")) })
        });
        hooks.on_shutdown("third", recording(&log, 3));

        let failures = hooks.shutdown_all().await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "broken");
        let mut ran = log.lock().clone();
        ran.sort_unstable();
        assert_eq!(ran, vec![1, 3]);
    }

    #[test]
    fn test_debug() {
        let mut hooks = Hooks::new();
        hooks.on_run("warmup", || Box::pin(async { Ok(()) }));
        let debug = format!("{hooks:?}");
        assert!(debug.contains("run_hooks: 1"));
    }
}
