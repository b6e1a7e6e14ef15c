//! The engine.
//!
//! [`Engine`] owns the route table, the root route group, lifecycle hooks
//! and the transporter. It is the root view of the route tree: it
//! implements [`Routes`] and registration calls on it return the engine.
//!
//! # Status
//!
//! ```text
//! Init --run--> Running --shutdown--> Shutdown
//!   \______________\___________close___________--> Closed
//! ```
//!
//! `run` only starts from `Init`; `shutdown` only acts on a running engine
//! and fails with [`ServerError::NotRunning`] otherwise.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use spindle_core::{BoxFuture, HookError, Options, ServerError};
use tokio::time::Instant;

use crate::group::{RouterGroup, Routes};
use crate::hooks::Hooks;
use crate::table::{RouteInfo, RouteTable};
use crate::transport::{Dispatcher, HyperTransporter, Transporter};

/// Lifecycle status of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Constructed, not yet running.
    Init,
    /// Serving requests.
    Running,
    /// Graceful shutdown started.
    Shutdown,
    /// Closed.
    Closed,
}

/// Route tree root plus the machinery to serve it.
pub struct Engine {
    root: RouterGroup,
    table: Arc<RouteTable>,
    options: Options,
    hooks: Hooks,
    status: Arc<Mutex<EngineStatus>>,
    transporter: Arc<dyn Transporter>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .field("routes", &self.table.route_count())
            .field("hooks", &self.hooks)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine serving HTTP/1.1 on the configured address.
    #[must_use]
    pub fn new(options: Options) -> Self {
        let transporter = Arc::new(HyperTransporter::new(options.http_addr()));
        Self::with_transporter(options, transporter)
    }

    /// Creates an engine with a custom transporter.
    #[must_use]
    pub fn with_transporter(options: Options, transporter: Arc<dyn Transporter>) -> Self {
        let table = Arc::new(RouteTable::new(options.max_handlers()));
        Self {
            root: RouterGroup::root(Arc::clone(&table)),
            table,
            options,
            hooks: Hooks::new(),
            status: Arc::new(Mutex::new(EngineStatus::Init)),
            transporter,
        }
    }

    /// Returns the engine options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Returns the route table.
    #[must_use]
    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// Lists the registered routes.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.table.routes()
    }

    /// Returns a dispatcher over this engine's routes.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.table))
    }

    /// Returns the transporter.
    #[must_use]
    pub fn transporter(&self) -> &Arc<dyn Transporter> {
        &self.transporter
    }

    /// Registers a hook run before the transporter starts.
    pub fn on_run<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn() -> BoxFuture<'static, Result<(), HookError>> + Send + Sync + 'static,
    {
        self.hooks.on_run(name, hook);
        self
    }

    /// Registers a hook run during graceful shutdown.
    pub fn on_shutdown<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn() -> BoxFuture<'static, Result<(), HookError>> + Send + Sync + 'static,
    {
        self.hooks.on_shutdown(name, hook);
        self
    }

    /// Returns the lifecycle hooks.
    #[must_use]
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Runs the on-run hooks and then serves until shut down or closed.
    ///
    /// The engine moves to `Running` when this is called, not when the
    /// returned future is first polled, so a `shutdown` or `close` issued in
    /// between is seen by the future and serving never starts. The future
    /// owns everything it needs, so it can be spawned while the engine stays
    /// available for `shutdown` and `close`.
    ///
    /// # Errors
    ///
    /// [`ServerError::AlreadyRunning`] if the engine left `Init`, a hook
    /// failure, or the transporter's error.
    pub fn run(&self) -> BoxFuture<'static, Result<(), ServerError>> {
        {
            let mut status = self.status.lock();
            if *status != EngineStatus::Init {
                return Box::pin(async { Err(ServerError::AlreadyRunning) });
            }
            *status = EngineStatus::Running;
        }

        let status = Arc::clone(&self.status);
        let hooks = self.hooks.clone();
        let transporter = Arc::clone(&self.transporter);
        let dispatcher = self.dispatcher();

        Box::pin(async move {
            hooks.run_all().await?;

            let current = *status.lock();
            if current != EngineStatus::Running {
                tracing::info!(status = ?current, "engine stopped before serving started");
                return Ok(());
            }
            transporter.serve(dispatcher).await
        })
    }

    /// Shuts the engine down gracefully.
    ///
    /// On-shutdown hooks start concurrently, the instance is deregistered
    /// when registry info is configured, the transporter drains its
    /// connections until `deadline`, and finally the hooks get until
    /// `deadline` to finish. Reaching the deadline while draining is logged,
    /// not returned. A failed deregistration does not stop the drain.
    ///
    /// # Errors
    ///
    /// [`ServerError::NotRunning`] unless the engine is `Running`, then the
    /// deregistration failure or a transporter error other than the
    /// deadline.
    pub async fn shutdown(&self, deadline: Instant) -> Result<(), ServerError> {
        {
            let mut status = self.status.lock();
            if *status != EngineStatus::Running {
                return Err(ServerError::NotRunning);
            }
            *status = EngineStatus::Shutdown;
        }

        let hooks = tokio::spawn(self.hooks.shutdown_all());
        let deregistered = self.deregister().await;
        let drained = self.drain(deadline).await;

        match tokio::time::timeout_at(deadline, hooks).await {
            Ok(Ok(failures)) if failures.is_empty() => {
                tracing::info!("on-shutdown hooks finished");
            }
            Ok(Ok(failures)) => {
                tracing::warn!(failed = failures.len(), "on-shutdown hooks finished with failures");
            }
            Ok(Err(e)) => tracing::error!(error = %e, "on-shutdown hooks task failed"),
            Err(_) => tracing::warn!("on-shutdown hooks did not finish before the deadline"),
        }

        deregistered.and(drained)
    }

    async fn deregister(&self) -> Result<(), ServerError> {
        let Some(info) = self.options.registry_info() else {
            return Ok(());
        };
        self.options
            .registry()
            .deregister(Some(info))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, service = %info.service_name, "deregistration failed");
                ServerError::from(e)
            })
    }

    async fn drain(&self, deadline: Instant) -> Result<(), ServerError> {
        match self.transporter.shutdown(deadline).await {
            Err(e) if e.is_timeout() => {
                tracing::warn!(error = %e, "graceful shutdown reached its deadline");
                Ok(())
            }
            other => other,
        }
    }

    /// Closes the transporter immediately.
    ///
    /// # Errors
    ///
    /// The transporter's close error.
    pub async fn close(&self) -> Result<(), ServerError> {
        *self.status.lock() = EngineStatus::Closed;
        self.transporter.close().await
    }
}

impl Routes for Engine {
    fn as_group(&self) -> &RouterGroup {
        &self.root
    }

    fn as_group_mut(&mut self) -> &mut RouterGroup {
        &mut self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use spindle_core::registry::{Info, Registry, RegistryError};
    use spindle_core::{handler, HandlerFunc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Transporter that serves until closed or shut down.
    #[derive(Default)]
    struct StubTransporter {
        stop: crate::shutdown::ShutdownSignal,
        serve_calls: AtomicUsize,
        closed: AtomicBool,
        shutdown_result: Mutex<Option<ServerError>>,
    }

    impl Transporter for StubTransporter {
        fn serve(&self, _dispatcher: Dispatcher) -> BoxFuture<'_, Result<(), ServerError>> {
            self.serve_calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                self.stop.recv().await;
                Ok(())
            })
        }

        fn shutdown(&self, _deadline: Instant) -> BoxFuture<'_, Result<(), ServerError>> {
            self.stop.trigger();
            let result = self.shutdown_result.lock().take();
            Box::pin(async move { result.map_or(Ok(()), Err) })
        }

        fn close(&self) -> BoxFuture<'_, Result<(), ServerError>> {
            self.closed.store(true, Ordering::SeqCst);
            self.stop.trigger();
            Box::pin(async { Ok(()) })
        }
    }

    struct FailingRegistry;

    impl Registry for FailingRegistry {
        fn register<'a>(
            &'a self,
            _info: Option<&'a Info>,
        ) -> BoxFuture<'a, Result<(), RegistryError>> {
            Box::pin(async { Ok(()) })
        }

        fn deregister<'a>(
            &'a self,
            _info: Option<&'a Info>,
        ) -> BoxFuture<'a, Result<(), RegistryError>> {
            Box::pin(async { Err(RegistryError::Unavailable("registry down".into())) })
        }
    }

    fn noop() -> HandlerFunc {
        handler(|_ctx| Box::pin(async {}))
    }

    fn engine_with_stub(options: Options) -> (Engine, Arc<StubTransporter>) {
        let stub = Arc::new(StubTransporter::default());
        let engine = Engine::with_transporter(options, Arc::clone(&stub) as Arc<dyn Transporter>);
        (engine, stub)
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(1)
    }

    #[test]
    fn test_engine_is_root_group() {
        let (engine, _) = engine_with_stub(Options::default());
        assert_eq!(engine.base_path(), "/");
        assert!(engine.handlers().is_empty());
        assert_eq!(engine.status(), EngineStatus::Init);
    }

    #[test]
    fn test_end_to_end_chain_composition() {
        let (mut engine, _) = engine_with_stub(Options::default());
        let (auth, log, h) = (noop(), noop(), noop());

        engine.use_middleware([auth.clone()]);
        let mut api = engine.group("/api", [log.clone()]).unwrap();
        api.get("/users", [h.clone()]).unwrap();

        let chain = engine.table().handlers(&Method::GET, "/api/users").unwrap();
        assert_eq!(chain.len(), 3);
        assert!(Arc::ptr_eq(&chain[0], &auth));
        assert!(Arc::ptr_eq(&chain[1], &log));
        assert!(Arc::ptr_eq(&chain[2], &h));
    }

    #[test]
    fn test_registration_chains_on_engine() {
        let (mut engine, _) = engine_with_stub(Options::default());

        engine
            .get("/a", [noop()])
            .unwrap()
            .use_middleware([noop()])
            .post("/b", [noop()])
            .unwrap();

        let routes = engine.routes();
        assert_eq!(routes[0].handler_count, 1);
        assert_eq!(routes[1].handler_count, 2);
    }

    #[test]
    fn test_max_handlers_comes_from_options() {
        let options = Options::builder().max_handlers(2).build();
        let (mut engine, _) = engine_with_stub(options);
        engine.use_middleware([noop()]);

        assert!(matches!(
            engine.get("/x", [noop()]).unwrap_err(),
            spindle_core::RouteError::TooManyHandlers { count: 2, limit: 2 }
        ));
    }

    #[tokio::test]
    async fn test_run_twice_fails() {
        let (engine, stub) = engine_with_stub(Options::default());

        let running = tokio::spawn(engine.run());
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(matches!(engine.run().await, Err(ServerError::AlreadyRunning)));
        assert_eq!(stub.serve_calls.load(Ordering::SeqCst), 1);

        engine.close().await.unwrap();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_executes_hooks_before_serving() {
        let (mut engine, stub) = engine_with_stub(Options::default());
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        engine.on_run("warmup", move || {
            let flag = Arc::clone(&flag);
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
        });

        let running = tokio::spawn(engine.run());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(stub.serve_calls.load(Ordering::SeqCst), 1);
        engine.close().await.unwrap();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failing_run_hook_prevents_serving() {
        let (mut engine, stub) = engine_with_stub(Options::default());
        engine.on_run("broken", || Box::pin(async { Err(HookError::new("boom")) }));

        let err = engine.run().await.unwrap_err();

        assert!(matches!(err, ServerError::Hook(HookError::Run { .. })));
        assert_eq!(stub.serve_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_fails_unless_running() {
        let (engine, stub) = engine_with_stub(Options::default());

        let err = engine.shutdown(deadline()).await.unwrap_err();

        assert!(matches!(err, ServerError::NotRunning));
        assert_eq!(engine.status(), EngineStatus::Init);
        assert!(!stub.stop.is_triggered());
    }

    #[tokio::test]
    async fn test_run_marks_running_before_first_poll() {
        let (engine, stub) = engine_with_stub(Options::default());

        let run = engine.run();
        assert_eq!(engine.status(), EngineStatus::Running);

        engine.shutdown(deadline()).await.unwrap();
        run.await.unwrap();

        assert_eq!(engine.status(), EngineStatus::Shutdown);
        assert_eq!(stub.serve_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_before_first_poll_skips_serving() {
        let (engine, stub) = engine_with_stub(Options::default());

        let run = engine.run();
        engine.close().await.unwrap();
        run.await.unwrap();

        assert_eq!(stub.serve_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_runs_hooks_and_stops_serving() {
        let (mut engine, _) = engine_with_stub(Options::default());
        let hook_ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&hook_ran);
        engine.on_shutdown("flush", move || {
            let flag = Arc::clone(&flag);
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
        });

        let running = tokio::spawn(engine.run());
        tokio::time::sleep(Duration::from_millis(10)).await;

        engine.shutdown(deadline()).await.unwrap();

        assert_eq!(engine.status(), EngineStatus::Shutdown);
        assert!(hook_ran.load(Ordering::SeqCst));
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_swallows_deadline() {
        let (engine, stub) = engine_with_stub(Options::default());
        *stub.shutdown_result.lock() = Some(ServerError::ShutdownTimeout);

        let running = tokio::spawn(engine.run());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(engine.shutdown(deadline()).await.is_ok());
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_reports_deregistration_failure_after_draining() {
        let options = Options::builder()
            .registry(Arc::new(FailingRegistry))
            .registry_info(Info::new("orders", "127.0.0.1:8888"))
            .build();
        let (engine, stub) = engine_with_stub(options);

        let running = tokio::spawn(engine.run());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = engine.shutdown(deadline()).await.unwrap_err();
        assert!(matches!(err, ServerError::Registry(RegistryError::Unavailable(_))));
        assert!(stub.stop.is_triggered());
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_skips_deregistration_without_info() {
        let options = Options::builder().registry(Arc::new(FailingRegistry)).build();
        let (engine, stub) = engine_with_stub(options);

        let running = tokio::spawn(engine.run());
        tokio::time::sleep(Duration::from_millis(10)).await;

        engine.shutdown(deadline()).await.unwrap();
        assert!(stub.stop.is_triggered());
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_close() {
        let (engine, stub) = engine_with_stub(Options::default());

        engine.close().await.unwrap();

        assert_eq!(engine.status(), EngineStatus::Closed);
        assert!(stub.closed.load(Ordering::SeqCst));
        assert!(matches!(engine.run().await, Err(ServerError::AlreadyRunning)));
    }
}
