use crate::tui::{TuiActor, TuiMsg};
use priovar_runtime::{ShutdownHandle, actor::Addr};
use std::time::Duration;
use tokio::time;

const INPUT_POLL: Duration = Duration::from_millis(100);

/// Starts the input reader, the redraw tick and (when `poll` is set) the
/// periodic list refetch. All of them stop once `shutdown` is signalled.
pub fn spawn_tui_feeders(
    tui: Addr<TuiActor>,
    shutdown: ShutdownHandle,
    tick: Duration,
    poll: Option<Duration>,
) {
    let tui_in = tui.clone();
    let shutdown_input = shutdown.clone();
    let spawned = std::thread::Builder::new()
        .name("priovar-input".into())
        .spawn(move || {
            while !shutdown_input.is_signalled() {
                match crossterm::event::poll(INPUT_POLL) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        let _ = tui_in.blocking_send(TuiMsg::OpError(format!("input: {e}")));
                        break;
                    }
                }
                let msg = match crossterm::event::read() {
                    Ok(ev) => TuiMsg::InputEvent(ev),
                    Err(e) => TuiMsg::OpError(format!("input: {e}")),
                };
                if tui_in.blocking_send(msg).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "tui.input.spawn_failed");
    }

    let tui_tick = tui.clone();
    let shutdown_tick = shutdown.clone();
    tokio::spawn(async move {
        let mut interval = time::interval(tick);
        loop {
            tokio::select! {
                _ = shutdown_tick.signalled() => break,
                _ = interval.tick() => {
                    let _ = tui_tick.try_send(TuiMsg::Tick);
                }
            }
        }
    });

    if let Some(every) = poll {
        tokio::spawn(async move {
            let mut interval = time::interval(every);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
            // The first tick fires immediately and Start already loads.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.signalled() => break,
                    _ = interval.tick() => {
                        let _ = tui.try_send(TuiMsg::Poll);
                    }
                }
            }
        });
    }
}
