//! Port registry
//!
//! Polls the OS for serial ports at a fixed interval and publishes each result
//! as an immutable snapshot. Consumers read the snapshot or subscribe to
//! changes; the polling task never touches consumer state directly.

use super::error::SessionError;
use super::transport::{DeviceError, PortDescriptor, PortEnumerator};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Immutable list of ports from one poll
pub type PortSnapshot = Arc<Vec<PortDescriptor>>;

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct PollState {
    task: Option<PollTask>,
    retired: bool,
}

/// Periodically refreshed snapshot of available ports
pub struct PortRegistry {
    enumerator: Arc<dyn PortEnumerator>,
    snapshot: watch::Sender<PortSnapshot>,
    poll: Mutex<PollState>,
}

impl PortRegistry {
    /// Create a registry with an empty snapshot
    pub fn new(enumerator: Arc<dyn PortEnumerator>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            enumerator,
            snapshot,
            poll: Mutex::new(PollState::default()),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> PortSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receive every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<PortSnapshot> {
        self.snapshot.subscribe()
    }

    /// Enumerate once and publish the result
    pub fn refresh(&self) -> Result<PortSnapshot, SessionError> {
        let ports = self
            .enumerator
            .list_ports()
            .map_err(SessionError::EnumerationFailed)?;
        let ports = Arc::new(ports);
        self.snapshot.send_replace(ports.clone());
        Ok(ports)
    }

    /// Whether the polling loop is alive
    pub fn is_running(&self) -> bool {
        self.poll
            .lock()
            .task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Start polling every `interval`.
    ///
    /// If enumeration fails the loop calls `on_error` once and ends; restarting
    /// is up to the caller. Returns `false` if a loop is already running or
    /// the registry was retired.
    pub fn start<F>(&self, interval: Duration, on_error: F) -> bool
    where
        F: FnOnce(DeviceError) + Send + 'static,
    {
        let mut poll = self.poll.lock();
        if poll.retired || poll.task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let enumerator = self.enumerator.clone();
        let snapshot = self.snapshot.clone();

        info!("Port polling started ({:?} interval)", interval);
        let handle = tokio::spawn(async move {
            loop {
                let listed = {
                    let enumerator = enumerator.clone();
                    tokio::task::spawn_blocking(move || enumerator.list_ports()).await
                };

                match listed {
                    Ok(Ok(ports)) => {
                        debug!("Port poll found {} ports", ports.len());
                        snapshot.send_replace(Arc::new(ports));
                    }
                    Ok(Err(e)) => {
                        warn!("Port polling stopped: {}", e);
                        on_error(e);
                        return;
                    }
                    Err(e) => {
                        warn!("Port polling task failed: {}", e);
                        on_error(DeviceError::Enumeration(e.to_string()));
                        return;
                    }
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Port polling stopped");
        });

        poll.task = Some(PollTask { cancel, handle });
        true
    }

    /// Signal the loop to end after its current tick; idempotent
    pub fn stop(&self) {
        if let Some(task) = self.poll.lock().task.as_ref() {
            task.cancel.cancel();
        }
    }

    /// Refuse every later `start`; a running loop is left to `stop`/`join`
    pub fn retire(&self) {
        self.poll.lock().retired = true;
    }

    /// Stop the loop and wait for it to exit
    pub async fn join(&self) -> Result<(), SessionError> {
        let task = self.poll.lock().task.take();
        if let Some(task) = task {
            task.cancel.cancel();
            task.handle.await?;
        }
        Ok(())
    }
}

impl Drop for PortRegistry {
    fn drop(&mut self) {
        self.stop();
    }
}
