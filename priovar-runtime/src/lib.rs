//! Async plumbing for the PrioVar client: a Tokio runtime with a shared
//! shutdown signal, and a minimal actor mailbox used by the terminal UI.
pub mod actor;
pub mod system;

use anyhow::Result;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};

pub use system::{ActorSystem, ShutdownHandle};

pub struct PortalRuntime {
    runtime: Runtime,
    shutdown: ShutdownHandle,
}

impl PortalRuntime {
    /// Multi-threaded runtime; `worker_threads` of `None` uses Tokio's default.
    ///
    /// ```
    /// use priovar_runtime::PortalRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = PortalRuntime::build("doctest-runtime", Some(1)).unwrap();
    /// assert_eq!(runtime.block_on(async { 2 + 2 }), 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);
        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }
        Ok(Self {
            runtime: builder.build()?,
            shutdown: ShutdownHandle::new(),
        })
    }

    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Signals shutdown, then gives outstanding tasks `graceful` to finish.
    ///
    /// ```
    /// use priovar_runtime::PortalRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = PortalRuntime::build("shutdown-example", Some(1)).unwrap();
    /// let signal = runtime.shutdown_handle();
    /// runtime.shutdown(Duration::from_millis(5));
    /// assert!(signal.is_signalled());
    /// ```
    pub fn shutdown(self, graceful: Duration) {
        self.shutdown.signal();
        self.runtime.shutdown_timeout(graceful);
    }
}
