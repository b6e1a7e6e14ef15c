//! The server and its run/shutdown orchestration.
//!
//! [`Server::spin`] starts the engine, waits for an exit trigger, and then
//! either drains gracefully or closes immediately:
//!
//! 1. An on-run hook named `registry` schedules registration with the
//!    service registry after `register_delay`.
//! 2. The engine runs on its own task; its outcome goes to the error
//!    collector.
//! 3. The signal waiter resolves on the first OS signal or reported outcome,
//!    and a still-pending registration is cancelled.
//! 4. `Ok` leads to [`Engine::shutdown`] bounded by `exit_wait_timeout`;
//!    an error leads to [`Engine::close`].

use std::fmt;
use std::sync::Arc;

use spindle_core::{BoxFuture, HookError, Options, ServerError};
use spindle_route::{Engine, RouterGroup, Routes, ShutdownSignal, Transporter};
use tokio::time::Instant;

use crate::recovery::recovery;
use crate::signal::{error_collector, wait_signal, ErrorReporter, RunErrors};

/// Custom signal waiter installed with [`Server::set_custom_signal_waiter`].
pub type SignalWaiter =
    Box<dyn for<'a> Fn(&'a mut RunErrors) -> BoxFuture<'a, Result<(), ServerError>> + Send + Sync>;

/// How [`Server::spin`] ended.
#[derive(Debug)]
pub enum SpinExit {
    /// Graceful shutdown was attempted.
    Graceful,
    /// The engine was closed because of this error.
    Forced(ServerError),
}

impl SpinExit {
    /// Returns `true` for a graceful exit.
    #[must_use]
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::Graceful)
    }
}

/// An engine plus its signal handling.
pub struct Server {
    engine: Engine,
    signal_waiter: Option<SignalWaiter>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("engine", &self.engine)
            .field("custom_signal_waiter", &self.signal_waiter.is_some())
            .finish()
    }
}

impl Server {
    /// Creates a server without any middleware.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self::from_engine(Engine::new(options))
    }

    /// Creates a server with the recovery middleware installed.
    #[must_use]
    pub fn with_defaults(options: Options) -> Self {
        let mut server = Self::new(options);
        server.use_middleware([recovery()]);
        server
    }

    /// Creates a server on a custom transporter.
    #[must_use]
    pub fn with_transporter(options: Options, transporter: Arc<dyn Transporter>) -> Self {
        Self::from_engine(Engine::with_transporter(options, transporter))
    }

    fn from_engine(engine: Engine) -> Self {
        Self {
            engine,
            signal_waiter: None,
        }
    }

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns the engine mutably, e.g. to add lifecycle hooks.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Replaces the default signal waiter.
    ///
    /// The waiter resolves `Ok(())` to shut down gracefully or `Err(_)` to
    /// close immediately. It receives the error collector so it can still
    /// react to run and registration failures.
    pub fn set_custom_signal_waiter<F>(&mut self, waiter: F)
    where
        F: for<'a> Fn(&'a mut RunErrors) -> BoxFuture<'a, Result<(), ServerError>>
            + Send
            + Sync
            + 'static,
    {
        self.signal_waiter = Some(Box::new(waiter));
    }

    /// Runs the server until a signal or an error ends it.
    pub async fn spin(mut self) -> SpinExit {
        let (reporter, mut errors) = error_collector();
        let cancel = ShutdownSignal::new();
        self.init_on_run_hooks(&reporter, &cancel);

        let run = self.engine.run();
        tokio::spawn(async move { reporter.report(run.await) });

        let outcome = match &self.signal_waiter {
            Some(waiter) => waiter(&mut errors).await,
            None => wait_signal(&mut errors).await,
        };
        cancel.trigger();

        match outcome {
            Err(cause) => {
                tracing::error!(error = %cause, "Receive close signal");
                if let Err(e) = self.engine.close().await {
                    tracing::error!(error = %e, "Close error");
                }
                SpinExit::Forced(cause)
            }
            Ok(()) => {
                let timeout = self.engine.options().exit_wait_timeout();
                tracing::info!(
                    timeout_secs = timeout.as_secs(),
                    "Begin graceful shutdown, waiting for in-flight requests"
                );
                if let Err(e) = self.engine.shutdown(Instant::now() + timeout).await {
                    tracing::error!(error = %e, "Shutdown error");
                }
                SpinExit::Graceful
            }
        }
    }

    fn init_on_run_hooks(&mut self, reporter: &ErrorReporter, cancel: &ShutdownSignal) {
        let options = self.engine.options();
        let registry = Arc::clone(options.registry());
        let info = options.registry_info().cloned();
        let delay = options.register_delay();
        let reporter = reporter.clone();
        let cancel = cancel.clone();

        self.engine.on_run("registry", move || {
            let registry = Arc::clone(&registry);
            let info = info.clone();
            let reporter = reporter.clone();
            let cancel = cancel.clone();

            tokio::spawn(async move {
                let register = async {
                    tokio::time::sleep(delay).await;
                    registry.register(info.as_ref()).await
                };

                tokio::select! {
                    () = cancel.recv() => {
                        tracing::debug!("registry registration cancelled");
                    }
                    result = register => match result {
                        Ok(()) => tracing::info!("registered with service registry"),
                        Err(e) => {
                            tracing::error!(error = %e, "Register error");
                            reporter.report(Err(e.into()));
                        }
                    },
                }
            });
            Box::pin(async { Ok(()) })
        });
    }
}

impl Routes for Server {
    fn as_group(&self) -> &RouterGroup {
        self.engine.as_group()
    }

    fn as_group_mut(&mut self) -> &mut RouterGroup {
        self.engine.as_group_mut()
    }
}

impl Server {
    /// Registers a hook run before the transporter starts.
    ///
    /// Hooks run in registration order. The `registry` hook is appended by
    /// [`Server::spin`], so hooks registered before it run first.
    pub fn on_run<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn() -> BoxFuture<'static, Result<(), HookError>> + Send + Sync + 'static,
    {
        self.engine.on_run(name, hook);
        self
    }

    /// Registers a hook run during graceful shutdown.
    pub fn on_shutdown<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn() -> BoxFuture<'static, Result<(), HookError>> + Send + Sync + 'static,
    {
        self.engine.on_shutdown(name, hook);
        self
    }
}
