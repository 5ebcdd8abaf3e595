//! Connection session
//!
//! A [`ConnectionSession`] is the sole owner of the device handle and the only
//! mutator of [`SessionState`]. It coordinates opening and closing the device,
//! the line reader bound to each open device, the background port registry and
//! the UI-facing control state.
//!
//! `connect` has toggle semantics: it opens when disconnected and disconnects
//! when connected, mirroring a single Connect/Disconnect button.

use super::error::{ReaderError, SessionError};
use super::output::{MessageTag, OutputSink};
use super::reader::{share, LineReader, ReaderConfig, SharedDevice};
use super::registry::{PortRegistry, PortSnapshot};
use super::retention::{Release, ViewCounter};
use super::selector::{resolve, Platform, PortSelector, Resolution};
use super::state_machine::{SessionState, SessionStateMachine, StateTransition};
use super::transport::{DeviceError, DeviceProvider, PortDescriptor, Providers};
use crate::config::{available_baud_rates, BaudRate, ConnectionConfig};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session events
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// State changed
    StateChanged {
        /// Previous state
        from: SessionState,
        /// New state
        to: SessionState,
    },
    /// Line read from the device
    LineReceived(String),
    /// Message written to the device (without terminator)
    DataSent(String),
    /// The reader hit an unrecoverable error; no more lines will arrive
    StreamEnded {
        /// Reader error
        error: String,
    },
    /// The open device vanished and the session tore itself down
    DeviceLost {
        /// Port that was lost
        port: String,
    },
    /// A reader has fully exited
    ReaderStopped {
        /// Generation of the stopped reader
        generation: u64,
    },
    /// A new port snapshot was published
    PortsUpdated {
        /// Ports in the snapshot
        count: usize,
    },
    /// Port polling failed and will be restarted
    PortRefreshFailed {
        /// Enumeration error
        error: String,
    },
    /// The session was closed for good
    Closed,
}

/// Label of the connect toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleLabel {
    /// Pressing the toggle opens the port
    Connect,
    /// Pressing the toggle closes the port
    Disconnect,
}

/// UI-facing state derived from the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    /// A device is open
    pub is_open: bool,
    /// Port and baud selectors accept input
    pub selectors_enabled: bool,
    /// The reader is delivering lines
    pub streaming: bool,
    /// Toggle label
    pub toggle: ToggleLabel,
}

impl ControlState {
    fn disconnected() -> Self {
        Self {
            is_open: false,
            selectors_enabled: true,
            streaming: false,
            toggle: ToggleLabel::Connect,
        }
    }

    fn connected() -> Self {
        Self {
            is_open: true,
            selectors_enabled: false,
            streaming: true,
            toggle: ToggleLabel::Disconnect,
        }
    }
}

/// Device and reader of the current connect cycle
struct ActiveConnection {
    port: PortDescriptor,
    address: String,
    device: SharedDevice,
    reader: LineReader,
}

struct SessionInner {
    id: Uuid,
    config: RwLock<ConnectionConfig>,
    machine: Mutex<SessionStateMachine>,
    /// Held for the whole of every connect, disconnect, send and close
    lifecycle: tokio::sync::Mutex<Option<ActiveConnection>>,
    registry: PortRegistry,
    devices: Arc<dyn DeviceProvider>,
    platform: Platform,
    output: OutputSink,
    events: broadcast::Sender<SessionEvent>,
    controls: watch::Sender<ControlState>,
    views: ViewCounter,
    generation: AtomicU64,
    closed: AtomicBool,
    shutdown: CancellationToken,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

/// Active serial session
///
/// Clones share the same session.
#[derive(Clone)]
pub struct ConnectionSession {
    inner: Arc<SessionInner>,
}

impl ConnectionSession {
    /// Create a session on the current platform.
    ///
    /// Enumerates ports once, validates the configured selector, starts port
    /// polling if `auto_refresh` is set and connects if `auto_connect` is set.
    pub async fn new(config: ConnectionConfig, providers: Providers) -> Result<Self, SessionError> {
        Self::with_platform(config, providers, Platform::current()).await
    }

    /// Create a session with an explicit port addressing rule
    pub async fn with_platform(
        config: ConnectionConfig,
        providers: Providers,
        platform: Platform,
    ) -> Result<Self, SessionError> {
        let registry = PortRegistry::new(providers.ports);
        let ports = registry.refresh()?;

        if let Some(selector) = &config.port_selector {
            resolve(Some(selector), &ports).map_err(resolution_error)?;
        }

        let (events, _) = broadcast::channel(1024);
        let (controls, _) = watch::channel(ControlState::disconnected());
        let auto_connect = config.auto_connect;
        let auto_refresh = config.auto_refresh;

        let inner = Arc::new(SessionInner {
            id: Uuid::new_v4(),
            config: RwLock::new(config),
            machine: Mutex::new(SessionStateMachine::new()),
            lifecycle: tokio::sync::Mutex::new(None),
            registry,
            devices: providers.devices,
            platform,
            output: OutputSink::new(),
            events,
            controls,
            views: ViewCounter::new(),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            watcher: Mutex::new(None),
        });

        info!("Session {} created ({} ports visible)", inner.id, ports.len());

        if auto_refresh {
            inner.start_polling();
        }
        let watcher = spawn_port_watcher(&inner);
        *inner.watcher.lock() = Some(watcher);

        let session = Self { inner };
        if auto_connect {
            info!("Auto-connecting session {}", session.id());
            if let Err(e) = session.connect().await {
                session.close().await?;
                return Err(e);
            }
        }

        Ok(session)
    }

    /// Get session ID
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.inner.machine.lock().state()
    }

    /// Whether a device is open
    pub fn is_open(&self) -> bool {
        self.inner.controls.borrow().is_open
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Current control state
    pub fn controls(&self) -> ControlState {
        *self.inner.controls.borrow()
    }

    /// Observe control state changes
    pub fn watch_controls(&self) -> watch::Receiver<ControlState> {
        self.inner.controls.subscribe()
    }

    /// The output log
    pub fn output(&self) -> &OutputSink {
        &self.inner.output
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Latest port snapshot
    pub fn ports(&self) -> PortSnapshot {
        self.inner.registry.snapshot()
    }

    /// Observe port snapshots
    pub fn watch_ports(&self) -> watch::Receiver<PortSnapshot> {
        self.inner.registry.subscribe()
    }

    /// Whether background port polling is running
    pub fn is_polling(&self) -> bool {
        self.inner.registry.is_running()
    }

    /// Copy of the connection configuration
    pub fn config(&self) -> ConnectionConfig {
        self.inner.config.read().clone()
    }

    /// Baud rates to offer, including a non-standard configured rate
    pub fn available_baud_rates(&self) -> Vec<u32> {
        available_baud_rates(self.inner.config.read().baud_rate)
    }

    /// Recorded state transitions, oldest first
    pub fn history(&self) -> Vec<StateTransition> {
        self.inner.machine.lock().history().cloned().collect()
    }

    /// Port of the current connection
    pub async fn active_port(&self) -> Option<PortDescriptor> {
        self.inner
            .lifecycle
            .lock()
            .await
            .as_ref()
            .map(|conn| conn.port.clone())
    }

    /// Change the port selector; only allowed while disconnected
    pub fn set_port_selector(&self, selector: Option<PortSelector>) -> Result<(), SessionError> {
        self.inner.edit_selection(|config| config.port_selector = selector)
    }

    /// Change the baud rate; only allowed while disconnected
    pub fn set_baud_rate(&self, rate: BaudRate) -> Result<(), SessionError> {
        self.inner.edit_selection(|config| config.baud_rate = rate)
    }

    /// Toggle the connection using the configured selector.
    ///
    /// Returns the state the session settled in.
    pub async fn connect(&self) -> Result<SessionState, SessionError> {
        let selector = self.inner.config.read().port_selector.clone();
        self.inner.toggle(selector, false).await
    }

    /// Toggle the connection, opening the port `selector` resolves to.
    ///
    /// When already connected this disconnects, whatever `selector` says.
    pub async fn connect_to(&self, selector: PortSelector) -> Result<SessionState, SessionError> {
        self.inner.toggle(Some(selector), true).await
    }

    /// Write `data` followed by the line terminator and log it as sent
    pub async fn send(&self, data: impl AsRef<[u8]>) -> Result<(), SessionError> {
        self.inner.send(data.as_ref()).await
    }

    /// Enumerate ports now and publish the snapshot
    pub fn refresh_ports(&self) -> Result<PortSnapshot, SessionError> {
        self.inner.registry.refresh()
    }

    /// Tear down if the open device is no longer valid.
    ///
    /// Runs on every published port snapshot; embedders without port polling
    /// may call it directly. Returns `true` if the session was torn down.
    pub async fn check_device(&self) -> bool {
        self.inner.check_device().await
    }

    /// Stop port polling, disconnect and retire the session; idempotent
    pub async fn close(&self) -> Result<(), SessionError> {
        self.inner.close().await
    }

    /// Register one more external view
    pub fn retain_view(&self) -> usize {
        self.inner.views.retain()
    }

    /// Unregister an external view.
    ///
    /// Releasing the last view closes the session when `auto_disconnect` is
    /// set. Returns `true` if this call closed it.
    pub async fn release_view(&self) -> Result<bool, SessionError> {
        match self.inner.views.release() {
            Release::LastReleased if self.inner.config.read().auto_disconnect => {
                if self.is_closed() {
                    return Ok(false);
                }
                info!("Last view of session {} released, closing", self.id());
                self.close().await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Number of external views
    pub fn view_count(&self) -> usize {
        self.inner.views.count()
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SessionInner {
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn transition(&self, to: SessionState, reason: &str) -> Result<(), SessionError> {
        let change = self.machine.lock().transition(to, Some(reason))?;
        debug!("Session {}: {:?} -> {:?} ({})", self.id, change.from, change.to, reason);
        self.emit(SessionEvent::StateChanged {
            from: change.from,
            to: change.to,
        });
        Ok(())
    }

    fn edit_selection<F>(&self, edit: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut ConnectionConfig),
    {
        // Connecting is entered under the machine lock and reads the config
        // afterwards, so an edit either lands first or sees the new state
        let machine = self.machine.lock();
        let state = machine.state();
        if !state.selection_unlocked() {
            return Err(SessionError::SelectionLocked(state));
        }
        edit(&mut *self.config.write());
        Ok(())
    }

    fn start_polling(self: &Arc<Self>) {
        let interval = self.config.read().poll_interval;
        let restart = restart_on_error(Arc::downgrade(self), interval);
        self.registry.start(interval, restart);
    }

    async fn toggle(
        self: &Arc<Self>,
        selector: Option<PortSelector>,
        remember: bool,
    ) -> Result<SessionState, SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::SessionClosed);
        }

        let mut active = self.lifecycle.lock().await;
        if let Some(conn) = active.take() {
            // Toggle wins over any physical-state check
            self.teardown(conn, "toggled off").await?;
            return Ok(SessionState::Disconnected);
        }

        if remember {
            self.config.write().port_selector = selector.clone();
        }

        self.transition(SessionState::Connecting, "connect requested")?;
        match self.open(selector.as_ref()).await {
            Ok(conn) => {
                info!("Session {} connected to {}", self.id, conn.address);
                *active = Some(conn);
                self.controls.send_replace(ControlState::connected());
                self.transition(SessionState::Connected, "device opened")?;
                Ok(SessionState::Connected)
            }
            Err(e) => {
                warn!("Session {} failed to connect: {}", self.id, e);
                self.transition(SessionState::Disconnected, &e.to_string())?;
                Err(e)
            }
        }
    }

    async fn open(
        self: &Arc<Self>,
        selector: Option<&PortSelector>,
    ) -> Result<ActiveConnection, SessionError> {
        let snapshot = self.registry.snapshot();
        let port = resolve(selector, &snapshot)
            .map_err(resolution_error)?
            .clone();
        let address = self.platform.device_address(&port);
        let (baud_rate, reader_config) = {
            let config = self.config.read();
            (config.baud_rate, config.reader)
        };

        info!("Opening {} @ {} baud", address, baud_rate);
        let devices = self.devices.clone();
        let target = address.clone();
        let device = tokio::task::spawn_blocking(move || {
            devices.open(&target, baud_rate.value(), reader_config.read_timeout)
        })
        .await?
        .map_err(SessionError::OpenFailed)?;

        let device = share(device);
        self.output.clear();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let reader = self.start_reader(generation, device.clone(), reader_config);

        Ok(ActiveConnection {
            port,
            address,
            device,
            reader,
        })
    }

    fn start_reader(
        &self,
        generation: u64,
        device: SharedDevice,
        config: ReaderConfig,
    ) -> LineReader {
        let on_line = {
            let output = self.output.clone();
            let events = self.events.clone();
            move |line: String| {
                output.append(&line, MessageTag::Received);
                let _ = events.send(SessionEvent::LineReceived(line));
            }
        };

        let on_error = {
            let output = self.output.clone();
            let events = self.events.clone();
            let controls = self.controls.clone();
            move |err: ReaderError| {
                warn!("Serial reader #{} stopped: {}", generation, err);
                output.append(&format!("Serial reader stopped: {}", err), MessageTag::Error);
                controls.send_modify(|c| c.streaming = false);
                let _ = events.send(SessionEvent::StreamEnded {
                    error: err.to_string(),
                });
            }
        };

        LineReader::start(generation, device, config, on_line, on_error)
    }

    /// Connected -> Closing -> Disconnected; the reader is joined before the
    /// device is closed.
    async fn teardown(&self, conn: ActiveConnection, reason: &str) -> Result<(), SessionError> {
        self.transition(SessionState::Closing, reason)?;

        let generation = conn.reader.generation();
        let joined = conn.reader.join().await;
        self.emit(SessionEvent::ReaderStopped { generation });

        let device = conn.device;
        let closed = tokio::task::spawn_blocking(move || {
            let result = device.lock().close();
            result
        })
        .await?;
        if let Err(e) = closed {
            warn!("Closing {} failed: {}", conn.address, e);
        }

        self.controls.send_replace(ControlState::disconnected());
        self.transition(SessionState::Disconnected, reason)?;
        info!("Session {} disconnected from {} ({})", self.id, conn.address, reason);

        joined
    }

    async fn send(&self, data: &[u8]) -> Result<(), SessionError> {
        let active = self.lifecycle.lock().await;
        let conn = active.as_ref().ok_or(SessionError::NotConnected)?;

        let mut payload = data.to_vec();
        payload.extend_from_slice(self.config.read().line_terminator.as_bytes());

        let device = conn.device.clone();
        let written = tokio::task::spawn_blocking(move || {
            let result = device.lock().write(&payload);
            result
        })
        .await?;

        if let Err(e) = written {
            warn!("Write to {} failed: {}", conn.address, e);
            return Err(SessionError::WriteFailed(e));
        }

        let text = String::from_utf8_lossy(data).into_owned();
        self.output.append(&text, MessageTag::Sent);
        self.emit(SessionEvent::DataSent(text));
        Ok(())
    }

    async fn check_device(&self) -> bool {
        let mut active = self.lifecycle.lock().await;
        let Some(device) = active.as_ref().map(|conn| conn.device.clone()) else {
            return false;
        };

        let valid = tokio::task::spawn_blocking(move || {
            let open = device.lock().is_open();
            open
        })
        .await
        .unwrap_or(false);
        if valid {
            return false;
        }

        let Some(conn) = active.take() else {
            return false;
        };
        warn!("Device {} vanished, tearing down session {}", conn.address, self.id);
        self.emit(SessionEvent::DeviceLost {
            port: conn.port.name.clone(),
        });
        if let Err(e) = self.teardown(conn, "device lost").await {
            warn!("Teardown after device loss failed: {}", e);
        }
        true
    }

    async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Closing session {}", self.id);

        self.shutdown.cancel();
        self.registry.retire();
        self.registry.join().await?;

        {
            let mut active = self.lifecycle.lock().await;
            if let Some(conn) = active.take() {
                self.teardown(conn, "session closed").await?;
            }
        }

        let watcher = self.watcher.lock().take();
        if let Some(watcher) = watcher {
            watcher.await?;
        }

        self.emit(SessionEvent::Closed);
        Ok(())
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.registry.stop();
        if let Some(conn) = self.lifecycle.get_mut().as_ref() {
            conn.reader.stop();
        }
    }
}

fn resolution_error(resolution: Resolution) -> SessionError {
    match resolution {
        Resolution::NotFound(selector) => SessionError::NotFound(selector),
        Resolution::Ambiguous(selector, count) => SessionError::Ambiguous { selector, count },
    }
}

/// Registry error policy: report, then restart polling one interval later
/// unless the session is gone or closed.
fn restart_on_error(
    session: Weak<SessionInner>,
    interval: Duration,
) -> Box<dyn FnOnce(DeviceError) + Send> {
    Box::new(move |err| {
        let Some(inner) = session.upgrade() else {
            return;
        };
        inner.emit(SessionEvent::PortRefreshFailed {
            error: err.to_string(),
        });
        let shutdown = inner.shutdown.clone();
        drop(inner);

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(interval) => {
                    if let Some(inner) = session.upgrade() {
                        if !inner.closed.load(Ordering::SeqCst) {
                            info!("Restarting port polling for session {}", inner.id);
                            inner.start_polling();
                        }
                    }
                }
            }
        });
    })
}

/// Re-check the open device on every published snapshot
fn spawn_port_watcher(inner: &Arc<SessionInner>) -> JoinHandle<()> {
    let session = Arc::downgrade(inner);
    let shutdown = inner.shutdown.clone();
    let mut ports = inner.registry.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = ports.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let count = ports.borrow_and_update().len();
                    let Some(inner) = session.upgrade() else {
                        break;
                    };
                    inner.emit(SessionEvent::PortsUpdated { count });
                    inner.check_device().await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::simulator::Simulator;

    fn fast_config(selector: Option<PortSelector>) -> ConnectionConfig {
        ConnectionConfig::new(selector)
            .auto_refresh(false)
            .reader(ReaderConfig {
                read_timeout: Duration::from_millis(5),
                poll_interval: Duration::from_millis(1),
            })
    }

    #[tokio::test]
    async fn test_unknown_initial_selector_fails_construction() {
        let sim = Simulator::new(vec![PortDescriptor::new("sim0")]);
        let err = ConnectionSession::new(fast_config(Some(PortSelector::name("nope"))), sim.providers())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_controls_follow_toggle() {
        let sim = Simulator::new(vec![PortDescriptor::new("sim0")]);
        let session = ConnectionSession::with_platform(fast_config(None), sim.providers(), Platform::Other)
            .await
            .unwrap();
        assert_eq!(session.controls(), ControlState::disconnected());

        session.connect().await.unwrap();
        let controls = session.controls();
        assert!(controls.is_open);
        assert!(!controls.selectors_enabled);
        assert_eq!(controls.toggle, ToggleLabel::Disconnect);
        assert_eq!(session.active_port().await.unwrap().name, "sim0");

        session.connect().await.unwrap();
        assert_eq!(session.controls(), ControlState::disconnected());
        assert!(session.active_port().await.is_none());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_selection_locked_while_connected() {
        let sim = Simulator::new(vec![PortDescriptor::new("sim0")]);
        let session = ConnectionSession::with_platform(fast_config(None), sim.providers(), Platform::Other)
            .await
            .unwrap();

        session.set_baud_rate(BaudRate::new(250000).unwrap()).unwrap();
        assert_eq!(session.available_baud_rates().last(), Some(&250000));

        session.connect().await.unwrap();
        assert!(matches!(
            session.set_baud_rate(BaudRate::default()),
            Err(SessionError::SelectionLocked(SessionState::Connected))
        ));
        assert!(session.set_port_selector(None).is_err());
        assert_eq!(sim.devices.opens(), vec![("sim0".to_string(), 250000)]);

        session.close().await.unwrap();
        assert!(matches!(session.connect().await, Err(SessionError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_selection_open_while_disconnected_and_lifecycle_busy() {
        let sim = Simulator::new(vec![PortDescriptor::new("sim0")]);
        let session = ConnectionSession::with_platform(fast_config(None), sim.providers(), Platform::Other)
            .await
            .unwrap();

        // A device check or rejected send holds the lifecycle lock briefly
        let busy = session.inner.lifecycle.lock().await;
        session.set_baud_rate(BaudRate::new(57600).unwrap()).unwrap();
        session
            .set_port_selector(Some(PortSelector::name("sim0")))
            .unwrap();
        drop(busy);

        assert_eq!(session.config().baud_rate.value(), 57600);
        assert_eq!(session.config().port_selector, Some(PortSelector::name("sim0")));
    }

    #[tokio::test]
    async fn test_close_retires_port_polling() {
        let sim = Simulator::new(vec![PortDescriptor::new("sim0")]);
        let config = fast_config(None)
            .auto_refresh(true)
            .poll_interval(Duration::from_millis(5));
        let session = ConnectionSession::with_platform(config, sim.providers(), Platform::Other)
            .await
            .unwrap();
        assert!(session.is_polling());

        session.close().await.unwrap();
        // A restart that lost the race with close must not revive polling
        session.inner.start_polling();
        assert!(!session.is_polling());
    }

    #[tokio::test]
    async fn test_reader_error_ends_stream_but_stays_connected() {
        let sim = Simulator::new(vec![PortDescriptor::new("sim0")]);
        let session = ConnectionSession::with_platform(fast_config(None), sim.providers(), Platform::Other)
            .await
            .unwrap();
        let mut events = session.subscribe();

        session.connect().await.unwrap();
        sim.devices.device("sim0").push_bytes(&[0xc3, 0x28, b'\n']);

        loop {
            match events.recv().await.unwrap() {
                SessionEvent::StreamEnded { .. } => break,
                _ => continue,
            }
        }
        assert_eq!(session.state(), SessionState::Connected);
        assert!(!session.controls().streaming);
        assert_eq!(session.output().count(MessageTag::Error), 1);

        assert_eq!(session.connect().await.unwrap(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_history_records_cycle() {
        let sim = Simulator::new(vec![PortDescriptor::new("sim0")]);
        let session = ConnectionSession::with_platform(fast_config(None), sim.providers(), Platform::Other)
            .await
            .unwrap();

        session.connect().await.unwrap();
        session.connect().await.unwrap();

        let states: Vec<SessionState> = session.history().iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![
                SessionState::Connecting,
                SessionState::Connected,
                SessionState::Closing,
                SessionState::Disconnected,
            ]
        );
    }
}
