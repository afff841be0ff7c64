//! Background autosave tasks
//!
//! Two tasks can run per manager:
//!
//! - **debounce**: every change notification pushes the save deadline out
//!   to `interval` from now, so a burst of edits produces one write once
//!   the document has been quiet for the whole interval
//! - **periodic**: saves unconditionally every `interval`, first tick one
//!   interval after start
//!
//! Tasks hold only a `Weak` reference to their target and exit when it is
//! gone, when the handle is shut down, or when the handle is dropped. A
//! save that has already started is awaited to completion before the task
//! looks at the shutdown signal again.

use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Something the autosave tasks can persist
#[async_trait]
pub trait SaveTarget: Send + Sync + 'static {
    /// Persist the current state; failures are reported by the target
    async fn autosave(&self);
}

/// Handle to the running autosave tasks
#[derive(Debug)]
pub struct AutoSaveHandle {
    change_tx: mpsc::UnboundedSender<()>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl AutoSaveHandle {
    /// Signal that the target changed
    pub fn notify_changed(&self) {
        // Fails only once the debounce task has exited
        let _ = self.change_tx.send(());
    }

    /// Ask every task to stop
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop the tasks and wait until they have exited
    pub async fn join(mut self) {
        self.shutdown();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|task| task.is_finished())
    }
}

/// Spawn the autosave tasks for `target`
///
/// Must be called from within a tokio runtime.
pub fn spawn_autosave<T: SaveTarget>(
    target: Weak<T>,
    interval: Duration,
    periodic: bool,
) -> AutoSaveHandle {
    let (change_tx, change_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = vec![tokio::spawn(debounce_loop(
        target.clone(),
        interval,
        change_rx,
        shutdown_rx.clone(),
    ))];
    if periodic {
        tasks.push(tokio::spawn(periodic_loop(target, interval, shutdown_rx)));
    }

    debug!(
        "Autosave started (interval {:?}, periodic {})",
        interval, periodic
    );

    AutoSaveHandle {
        change_tx,
        shutdown_tx,
        tasks,
    }
}

async fn debounce_loop<T: SaveTarget>(
    target: Weak<T>,
    interval: Duration,
    mut change_rx: mpsc::UnboundedReceiver<()>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            // Err means the handle was dropped
            _ = shutdown_rx.changed() => break,
            change = change_rx.recv() => match change {
                Some(()) => deadline = Some(Instant::now() + interval),
                None => break,
            },
            _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                let Some(target) = target.upgrade() else { break };
                debug!("Debounced autosave firing");
                target.autosave().await;
            }
        }
    }

    debug!("Debounce task stopped");
}

async fn periodic_loop<T: SaveTarget>(
    target: Weak<T>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {
                let Some(target) = target.upgrade() else { break };
                target.autosave().await;
            }
        }
    }

    debug!("Periodic autosave task stopped");
}
