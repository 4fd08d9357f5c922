use anyhow::Result;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::system::ShutdownHandle;

/// A task that owns its state and processes one message at a time.
#[async_trait::async_trait]
pub trait Actor: Send + Sized + 'static {
    type Msg: Send + 'static;

    /// Handle a single message. Returning `Err` stops the actor.
    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()>;
}

pub struct Context<A: Actor> {
    addr: Addr<A>,
    stop: bool,
}

impl<A: Actor> Context<A> {
    /// Address of the running actor, for handing to spawned work.
    pub fn addr(&self) -> Addr<A> {
        self.addr.clone()
    }

    /// Stop after the current message.
    pub fn stop(&mut self) {
        self.stop = true;
    }
}

pub struct Addr<A: Actor>(mpsc::Sender<A::Msg>);

impl<A: Actor> Clone for Addr<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A: Actor> Addr<A> {
    /// Waits for mailbox space. Hands the message back if the actor is gone.
    pub async fn send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.send(msg).await.map_err(|e| e.0)
    }

    /// For use off the async runtime, e.g. from a blocking reader thread.
    pub fn blocking_send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.blocking_send(msg).map_err(|e| e.0)
    }

    /// Hands the message back if the mailbox is full or closed.
    pub fn try_send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.try_send(msg).map_err(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.0.max_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

pub struct ActorHandle<A: Actor> {
    pub addr: Addr<A>,
    pub task: JoinHandle<Result<()>>,
}

/// Spawns `actor` with a bounded mailbox.
///
/// The actor stops when `handle` returns `Err`, when `ctx.stop()` is called,
/// or when `shutdown` is signalled. Messages already queued are handled
/// before a shutdown signal is honoured.
///
/// ```
/// # use anyhow::Result;
/// # use async_trait::async_trait;
/// # use priovar_runtime::actor::{self, Actor, Context};
/// struct Sum(u32);
///
/// #[async_trait]
/// impl Actor for Sum {
///     type Msg = u32;
///     async fn handle(&mut self, msg: u32, ctx: &mut Context<Self>) -> Result<()> {
///         self.0 += msg;
///         if self.0 >= 5 {
///             ctx.stop();
///         }
///         Ok(())
///     }
/// }
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let actor::ActorHandle { addr, task } = actor::spawn_actor(Sum(0), 4, None);
///     addr.send(2).await.unwrap();
///     addr.send(3).await.unwrap();
///     task.await.unwrap().unwrap();
/// });
/// ```
pub fn spawn_actor<A: Actor>(
    mut actor: A,
    capacity: usize,
    shutdown: Option<ShutdownHandle>,
) -> ActorHandle<A> {
    let (tx, mut rx) = mpsc::channel::<A::Msg>(capacity.max(1));
    let addr = Addr(tx);
    let mut ctx = Context {
        addr: addr.clone(),
        stop: false,
    };
    let shutdown = shutdown.unwrap_or_default();

    let task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                biased;
                maybe = rx.recv() => match maybe {
                    Some(msg) => msg,
                    None => break,
                },
                _ = shutdown.signalled() => break,
            };
            if let Err(e) = actor.handle(msg, &mut ctx).await {
                tracing::error!(error = ?e, actor = std::any::type_name::<A>(), "runtime.actor.failed");
                return Err(e);
            }
            if ctx.stop {
                break;
            }
        }
        Ok(())
    });

    ActorHandle { addr, task }
}
