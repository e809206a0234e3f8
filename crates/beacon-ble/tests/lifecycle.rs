//! Integration tests for the advertising lifecycle
//!
//! Drives a spawned controller through the simulated backend, the same way a
//! host application drives a real platform backend.

use beacon_ble::advertising::simulated::{NativeCall, SimulatedAdvertiser, SimulatorControl};
use beacon_ble::command::{START_ADVERTISING, STOP_ADVERTISING};
use beacon_ble::{
    advertiser_events, spawn, AdvertiserConfig, AdvertisingController, AdvertisingHandle,
    AdvertisingRequest, CommandInterface, MethodCall, MethodResponse, RadioMonitor, RadioState,
    ReadinessGate, SessionStatus, SessionTransition,
};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::{timeout, Duration};

const UUID_A: &str = "12345678-1234-1234-1234-123456789abc";
const UUID_B: &str = "0000feed-0000-1000-8000-00805f9b34fb";

struct Host {
    handle: AdvertisingHandle,
    control: SimulatorControl,
    monitor: RadioMonitor,
    transitions: broadcast::Receiver<SessionTransition>,
}

fn host(gate: ReadinessGate, auto_confirm: bool) -> Host {
    let config = AdvertiserConfig::default();
    let (monitor, reporter) = RadioMonitor::new();
    let (events_tx, events_rx) = advertiser_events();
    let advertiser =
        SimulatedAdvertiser::new(gate, events_tx, reporter).with_auto_confirm(auto_confirm);
    let control = advertiser.control();
    let controller = AdvertisingController::new(advertiser, monitor.clone())
        .with_event_capacity(config.event_capacity);
    let (handle, _task) = spawn(controller, events_rx, &config);
    let transitions = handle.subscribe();
    Host {
        handle,
        control,
        monitor,
        transitions,
    }
}

/// Wait for the next transition into `to`, skipping others
async fn expect_transition(host: &mut Host, to: SessionStatus) -> SessionTransition {
    timeout(Duration::from_secs(2), async {
        loop {
            let transition = host
                .transitions
                .recv()
                .await
                .expect("transition channel closed");
            if transition.to == to {
                return transition;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no transition to {}", to))
}

#[tokio::test]
async fn test_immediate_platform_goes_active() {
    let mut host = host(ReadinessGate::Immediate, true);
    host.control.set_radio(RadioState::PoweredOn);

    host.handle
        .start(AdvertisingRequest::new(UUID_A))
        .await
        .expect("start accepted");

    let active = expect_transition(&mut host, SessionStatus::Active).await;
    assert_eq!(active.from, Some(SessionStatus::Pending));
    assert_eq!(active.service_uuid.to_string(), UUID_A);

    match &host.control.calls()[..] {
        [NativeCall::Start { data, .. }] => {
            assert_eq!(data.len(), 28);
            assert!(data.ends_with(b"\x77\x13b2tech"));
        }
        other => panic!("unexpected native calls {:?}", other),
    }
}

#[tokio::test]
async fn test_deferred_platform_starts_on_power_on() {
    let mut host = host(ReadinessGate::AwaitPoweredOn, true);
    host.control.set_radio(RadioState::PoweredOff);

    host.handle
        .start(AdvertisingRequest::new(UUID_A))
        .await
        .expect("start accepted");
    let snapshot = host.handle.status().await.expect("session exists");
    assert_eq!(snapshot.status, SessionStatus::Pending);
    assert!(host.control.calls().is_empty());

    // Toggling off again is not readiness
    host.control.set_radio(RadioState::Unknown);
    host.control.set_radio(RadioState::PoweredOff);
    host.control.set_radio(RadioState::PoweredOn);

    expect_transition(&mut host, SessionStatus::Active).await;
    assert_eq!(host.control.started_handles().len(), 1);
    assert_eq!(host.monitor.listener_count(), 0);
}

#[tokio::test]
async fn test_cancelled_session_is_not_resurrected() {
    let mut host = host(ReadinessGate::AwaitPoweredOn, true);
    host.control.set_radio(RadioState::PoweredOff);

    host.handle
        .start(AdvertisingRequest::new(UUID_A))
        .await
        .unwrap();
    host.handle.stop().await.unwrap();
    expect_transition(&mut host, SessionStatus::Stopped).await;

    host.control.set_radio(RadioState::PoweredOn);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(host.control.calls().is_empty());
    assert!(host.handle.status().await.is_none());
    assert_eq!(host.monitor.listener_count(), 0);
}

#[tokio::test]
async fn test_second_start_supersedes_first() {
    let mut host = host(ReadinessGate::Immediate, false);
    host.control.set_radio(RadioState::PoweredOn);

    host.handle
        .start(AdvertisingRequest::new(UUID_A))
        .await
        .unwrap();
    host.handle
        .start(AdvertisingRequest::new(UUID_B))
        .await
        .unwrap();

    let handles = host.control.started_handles();
    assert_eq!(handles.len(), 2);
    assert_eq!(host.control.live_handles(), vec![handles[1]]);

    host.control.confirm_start(handles[0]);
    host.control.confirm_start(handles[1]);
    let active = expect_transition(&mut host, SessionStatus::Active).await;
    assert_eq!(active.service_uuid.to_string(), UUID_B);

    let snapshot = host.handle.status().await.unwrap();
    assert_eq!(snapshot.native, Some(handles[1]));
}

#[tokio::test]
async fn test_concurrent_starts_leave_one_session() {
    let host = host(ReadinessGate::Immediate, true);
    host.control.set_radio(RadioState::PoweredOn);

    let mut tasks = Vec::new();
    for i in 0..8u32 {
        let handle = host.handle.clone();
        tasks.push(tokio::spawn(async move {
            let uuid = format!("{:08x}-0000-1000-8000-00805f9b34fb", i);
            handle.start(AdvertisingRequest::new(uuid)).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(host.control.started_handles().len(), 8);
    assert_eq!(host.control.live_handles().len(), 1);
    let snapshot = host.handle.status().await.unwrap();
    assert_eq!(snapshot.native, host.control.live_handles().first().copied());
}

#[tokio::test]
async fn test_radio_loss_while_active_fails_session() {
    let mut host = host(ReadinessGate::Immediate, true);
    host.control.set_radio(RadioState::PoweredOn);
    host.handle
        .start(AdvertisingRequest::new(UUID_A))
        .await
        .unwrap();
    expect_transition(&mut host, SessionStatus::Active).await;

    host.control.set_radio(RadioState::PoweredOff);
    let failed = expect_transition(&mut host, SessionStatus::Failed).await;
    assert!(failed.reason.is_some());
    assert!(host.handle.status().await.is_none());
}

#[tokio::test]
async fn test_command_interface_end_to_end() {
    let mut host = host(ReadinessGate::AwaitPoweredOn, true);
    let interface = CommandInterface::new(host.handle.clone());
    host.control.set_radio(RadioState::PoweredOff);

    let response = interface
        .handle(&MethodCall::new(START_ADVERTISING, json!({ "uuid": UUID_A })))
        .await;
    assert_eq!(response, MethodResponse::Success);

    host.control.set_radio(RadioState::PoweredOn);
    expect_transition(&mut host, SessionStatus::Active).await;

    let response = interface
        .handle(&MethodCall::new(STOP_ADVERTISING, serde_json::Value::Null))
        .await;
    assert_eq!(response, MethodResponse::Success);
    expect_transition(&mut host, SessionStatus::Stopped).await;
    assert!(host.control.live_handles().is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_advertising() {
    let mut host = host(ReadinessGate::Immediate, true);
    host.control.set_radio(RadioState::PoweredOn);
    host.handle
        .start(AdvertisingRequest::new(UUID_A))
        .await
        .unwrap();
    expect_transition(&mut host, SessionStatus::Active).await;

    host.handle.shutdown().await;
    assert!(host.control.live_handles().is_empty());
    assert!(matches!(
        host.control.calls().last(),
        Some(NativeCall::Stop { .. })
    ));
}
