//! Session lifecycle against simulated devices

use serialbridge_core::core::simulator::DeviceState;
use serialbridge_core::{
    ConnectionConfig, ConnectionSession, MessageTag, OpenFailure, Platform, PortDescriptor,
    PortSelector, ReaderConfig, SessionError, SessionEvent, SessionState, Simulator,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn config(selector: Option<PortSelector>) -> ConnectionConfig {
    ConnectionConfig::new(selector)
        .auto_refresh(false)
        .reader(ReaderConfig {
            read_timeout: Duration::from_millis(5),
            poll_interval: Duration::from_micros(200),
        })
}

async fn session_with(sim: &Simulator, config: ConnectionConfig) -> ConnectionSession {
    ConnectionSession::with_platform(config, sim.providers(), Platform::Other)
        .await
        .unwrap()
}

fn single_port() -> (Simulator, Arc<DeviceState>) {
    let sim = Simulator::new(vec![PortDescriptor::new("sim0").with_serial_number("SN0")]);
    let device = sim.devices.device("sim0");
    (sim, device)
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

#[tokio::test(flavor = "multi_thread")]
async fn toggle_alternates_connected_and_disconnected() {
    let (sim, device) = single_port();
    let session = session_with(&sim, config(None)).await;

    assert_eq!(session.connect().await.unwrap(), SessionState::Connected);
    assert!(session.is_open());
    assert_eq!(session.connect().await.unwrap(), SessionState::Disconnected);
    assert!(!session.is_open());
    assert_eq!(device.closes(), 1);

    assert_eq!(session.connect().await.unwrap(), SessionState::Connected);
    assert_eq!(sim.devices.opens().len(), 2);
    session.close().await.unwrap();
    assert_eq!(device.closes(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_serial_number_is_not_found() {
    let sim = Simulator::new(vec![
        PortDescriptor::new("ttyUSB0").with_serial_number("A1"),
        PortDescriptor::new("ttyUSB1").with_serial_number("B2"),
    ]);
    let session = session_with(&sim, config(None)).await;

    let err = session
        .connect_to(PortSelector::serial_number("Z9"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(sim.devices.opens().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn connect_by_serial_number_opens_matching_port() {
    let sim = Simulator::new(vec![
        PortDescriptor::new("ttyUSB0").with_serial_number("A1"),
        PortDescriptor::new("ttyUSB1").with_serial_number("B2"),
    ]);
    let session = ConnectionSession::with_platform(config(None), sim.providers(), Platform::Posix)
        .await
        .unwrap();

    session
        .connect_to(PortSelector::serial_number("B2"))
        .await
        .unwrap();
    assert_eq!(sim.devices.opens(), vec![("/dev/ttyUSB1".to_string(), 9600)]);
    assert_eq!(
        session.config().port_selector,
        Some(PortSelector::serial_number("B2"))
    );
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_selector_with_several_ports_is_ambiguous() {
    let sim = Simulator::new(vec![PortDescriptor::new("ttyS0"), PortDescriptor::new("ttyS1")]);
    let session = session_with(&sim, config(None)).await;

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, SessionError::Ambiguous { count: 2, .. }));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(sim.devices.opens().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn open_failure_returns_to_disconnected() {
    let (sim, _device) = single_port();
    let session = session_with(&sim, config(None)).await;
    sim.devices.fail_opens(Some(OpenFailure::PermissionDenied));

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, SessionError::OpenFailed(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(session.controls().selectors_enabled);

    sim.devices.fail_opens(None);
    assert_eq!(session.connect().await.unwrap(), SessionState::Connected);
}

#[tokio::test(flavor = "multi_thread")]
async fn no_lines_after_disconnect_returns() {
    let (sim, device) = single_port();
    let session = session_with(&sim, config(None)).await;

    session.connect().await.unwrap();
    device.push_line("before");
    wait_until(|| session.output().count(MessageTag::Received) == 1).await;

    session.connect().await.unwrap();
    let logged = session.output().len();
    device.push_line("after");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.output().len(), logged);
    assert_eq!(device.pending(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn lines_arrive_in_order_including_empty_ones() {
    let (sim, device) = single_port();
    let session = session_with(&sim, config(None)).await;

    let expected: Vec<String> = (0..1200)
        .map(|i| if i % 10 == 0 { String::new() } else { format!("line {}", i) })
        .collect();
    for line in &expected {
        device.push_line(line);
    }

    session.connect().await.unwrap();
    wait_until(|| session.output().count(MessageTag::Received) == expected.len()).await;

    let received: Vec<String> = session
        .output()
        .entries()
        .into_iter()
        .filter(|e| e.tag == MessageTag::Received)
        .map(|e| e.text)
        .collect();
    assert_eq!(received, expected);
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn send_writes_terminator_and_logs_once() {
    let (sim, device) = single_port();
    let session = session_with(&sim, config(None)).await;
    let mut events = session.subscribe();

    session.connect().await.unwrap();
    session.send("PING").await.unwrap();

    assert_eq!(device.written(), vec![b"PING\n".to_vec()]);
    assert_eq!(session.output().count(MessageTag::Sent), 1);
    assert!(session.output().text().contains("TX PING"));
    assert!(drain(&mut events).contains(&SessionEvent::DataSent("PING".into())));
}

#[tokio::test(flavor = "multi_thread")]
async fn send_requires_connection() {
    let (sim, device) = single_port();
    let session = session_with(&sim, config(None)).await;

    assert!(matches!(session.send("x").await, Err(SessionError::NotConnected)));
    assert!(device.written().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn write_failure_keeps_session_connected() {
    let (sim, device) = single_port();
    let session = session_with(&sim, config(None)).await;

    session.connect().await.unwrap();
    device.set_fail_writes(true);

    let err = session.send("PING").await.unwrap_err();
    assert!(matches!(err, SessionError::WriteFailed(_)));
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.output().count(MessageTag::Sent), 0);

    device.set_fail_writes(false);
    session.send("PING").await.unwrap();
    assert_eq!(device.written().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn echo_round_trip() {
    let (sim, device) = single_port();
    let session = session_with(&sim, config(None)).await;
    device.set_echo(true);

    session.connect().await.unwrap();
    session.send("hello").await.unwrap();
    wait_until(|| session.output().count(MessageTag::Received) == 1).await;

    let text = session.output().text();
    assert!(text.contains("TX hello\n"));
    assert!(text.contains("RX hello\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unplugged_device_tears_down_once() {
    let (sim, device) = single_port();
    let polled = config(None)
        .auto_refresh(true)
        .poll_interval(Duration::from_millis(10));
    let session = session_with(&sim, polled).await;
    let mut events = session.subscribe();

    session.connect().await.unwrap();
    device.unplug();
    sim.ports.remove("sim0");

    wait_until(|| session.state() == SessionState::Disconnected).await;
    // Let a few more snapshots go by
    tokio::time::sleep(Duration::from_millis(60)).await;

    let seen = drain(&mut events);
    let lost = seen
        .iter()
        .filter(|e| matches!(e, SessionEvent::DeviceLost { .. }))
        .count();
    let stopped = seen
        .iter()
        .filter(|e| matches!(e, SessionEvent::ReaderStopped { .. }))
        .count();
    let disconnected = seen
        .iter()
        .filter(|e| matches!(e, SessionEvent::StateChanged { to: SessionState::Disconnected, .. }))
        .count();
    assert_eq!(lost, 1);
    assert_eq!(stopped, 1);
    assert_eq!(disconnected, 1);

    assert!(matches!(session.send("x").await, Err(SessionError::NotConnected)));
    assert!(device.written().is_empty());
    assert!(session.controls().selectors_enabled);
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn toggle_wins_over_vanished_device() {
    let (sim, device) = single_port();
    let session = session_with(&sim, config(None)).await;

    session.connect().await.unwrap();
    device.unplug();

    assert_eq!(session.connect().await.unwrap(), SessionState::Disconnected);
    assert!(!session.check_device().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn manual_refresh_detects_vanished_device() {
    let (sim, device) = single_port();
    let session = session_with(&sim, config(None)).await;
    assert!(!session.is_polling());

    session.connect().await.unwrap();
    device.unplug();
    sim.ports.remove("sim0");

    let snapshot = session.refresh_ports().unwrap();
    assert!(snapshot.is_empty());
    wait_until(|| session.state() == SessionState::Disconnected).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn last_view_release_closes_exactly_once() {
    let (sim, device) = single_port();
    let session = session_with(&sim, config(None)).await;
    let mut events = session.subscribe();

    session.retain_view();
    session.retain_view();
    session.connect().await.unwrap();

    assert!(!session.release_view().await.unwrap());
    assert!(session.is_open());

    assert!(session.release_view().await.unwrap());
    assert!(session.is_closed());
    assert_eq!(session.state(), SessionState::Disconnected);

    assert!(!session.release_view().await.unwrap());
    session.close().await.unwrap();

    assert_eq!(device.closes(), 1);
    let closed = drain(&mut events)
        .into_iter()
        .filter(|e| *e == SessionEvent::Closed)
        .count();
    assert_eq!(closed, 1);
    assert!(matches!(session.connect().await, Err(SessionError::SessionClosed)));
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_disconnect_off_keeps_session_alive() {
    let (sim, _device) = single_port();
    let session = session_with(&sim, config(None).auto_disconnect(false)).await;

    session.retain_view();
    session.connect().await.unwrap();
    assert!(!session.release_view().await.unwrap());
    assert!(session.is_open());
    assert!(!session.is_closed());
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_connect_at_construction() {
    let (sim, _device) = single_port();
    let session = session_with(&sim, config(Some(PortSelector::name("sim0"))).auto_connect(true)).await;

    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(sim.devices.opens().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_auto_connect_fails_construction() {
    let (sim, _device) = single_port();
    sim.devices.fail_opens(Some(OpenFailure::Busy));

    let err = ConnectionSession::with_platform(
        config(None).auto_connect(true),
        sim.providers(),
        Platform::Other,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SessionError::OpenFailed(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn enumeration_failure_fails_construction() {
    let (sim, _device) = single_port();
    sim.ports.fail_next(1);

    let err = ConnectionSession::with_platform(config(None), sim.providers(), Platform::Other)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::EnumerationFailed(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn polling_restarts_after_enumeration_failure() {
    let (sim, _device) = single_port();
    let polled = config(None)
        .auto_refresh(true)
        .poll_interval(Duration::from_millis(10));
    let session = session_with(&sim, polled).await;
    let mut events = session.subscribe();

    sim.ports.fail_next(1);
    let failed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(SessionEvent::PortRefreshFailed { .. }) = events.recv().await {
                break;
            }
        }
    })
    .await;
    assert!(failed.is_ok());

    let calls = sim.ports.calls();
    wait_until(|| sim.ports.calls() > calls + 2).await;
    assert!(session.is_polling());

    session.close().await.unwrap();
    assert!(!session.is_polling());
    let after_close = sim.ports.calls();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sim.ports.calls(), after_close);
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_starts_with_fresh_output() {
    let (sim, device) = single_port();
    let session = session_with(&sim, config(None)).await;

    session.connect().await.unwrap();
    device.push_line("first");
    wait_until(|| session.output().count(MessageTag::Received) == 1).await;
    session.connect().await.unwrap();

    session.connect().await.unwrap();
    assert!(session.output().is_empty());
}
