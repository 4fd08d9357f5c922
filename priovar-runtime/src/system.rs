//! Task tracking and cooperative shutdown.
//!
//! Every actor started through [`ActorSystem`] watches the same
//! [`ShutdownHandle`]; [`ActorSystem::run_until_shutdown`] waits for CTRL-C or
//! an explicit signal, then joins all tracked tasks.
use anyhow::Result;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::actor::{Actor, Addr, spawn_actor};

#[derive(Clone, Debug, Default)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.token.cancel();
    }

    pub fn is_signalled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`signal`](Self::signal) has been called.
    pub async fn signalled(&self) {
        self.token.cancelled().await
    }
}

#[derive(Default)]
pub struct ActorSystem {
    joinset: JoinSet<Result<()>>,
    shutdown: ShutdownHandle,
}

impl ActorSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shutdown(shutdown: ShutdownHandle) -> Self {
        Self {
            joinset: JoinSet::new(),
            shutdown,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Starts `actor` under this system's shutdown signal.
    pub fn spawn<A: Actor>(&mut self, actor: A, mailbox: usize) -> Addr<A> {
        let handle = spawn_actor(actor, mailbox, Some(self.shutdown.clone()));
        self.joinset.spawn(async move { handle.task.await? });
        handle.addr
    }

    pub fn track(&mut self, fut: impl std::future::Future<Output = Result<()>> + Send + 'static) {
        self.joinset.spawn(fut);
    }

    /// Signals shutdown and waits for every tracked task. The first task
    /// error (or panic) is returned after all tasks have finished.
    pub async fn graceful_shutdown(mut self) -> Result<()> {
        self.shutdown.signal();
        let mut first_err = None;
        while let Some(res) = self.joinset.join_next().await {
            let res = res.map_err(anyhow::Error::from).and_then(|r| r);
            if let Err(e) = res {
                tracing::warn!(error = %e, "runtime.task.failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Blocks until CTRL-C or an explicit signal, then shuts down.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("runtime.ctrl_c");
            }
            _ = shutdown.signalled() => {}
        }
        self.graceful_shutdown().await
    }
}
