//! macOS BLE advertising implementation using Core Bluetooth

use std::time::Duration;

use cocoa::base::{id, nil};
use objc::runtime::{Class, BOOL, YES};
use objc::{msg_send, sel, sel_impl};
use objc_foundation::{INSString, NSString};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AdvertiserConfig;
use crate::error::AdvertiserError;
use crate::payload::AdvertisementPayload;
use crate::protocol::manufacturer_data_bytes;
use crate::radio::{RadioReporter, RadioState};

use super::{AdvertiserEvent, AdvertiserEventSender, BleAdvertiser, NativeHandle, ReadinessGate};

// ----------------------------------------------------------------------------
// Peripheral Manager
// ----------------------------------------------------------------------------

/// Retained `CBPeripheralManager` pointer
#[derive(Clone, Copy)]
struct PeripheralManager(id);

// Core Bluetooth serializes calls on the manager's own queue
unsafe impl Send for PeripheralManager {}
unsafe impl Sync for PeripheralManager {}

impl PeripheralManager {
    fn create() -> Result<Self, AdvertiserError> {
        unsafe {
            let class = Class::get("CBPeripheralManager").ok_or_else(|| {
                AdvertiserError::AdapterUnavailable(
                    "CBPeripheralManager class not available - Core Bluetooth framework missing"
                        .into(),
                )
            })?;

            let manager: id = msg_send![class, alloc];
            let manager: id = msg_send![manager,
                initWithDelegate: nil
                queue: nil
                options: nil
            ];
            if manager == nil {
                return Err(AdvertiserError::AdapterUnavailable(
                    "Failed to create CBPeripheralManager instance".into(),
                ));
            }
            Ok(Self(manager))
        }
    }

    fn radio_state(self) -> RadioState {
        let raw: isize = unsafe { msg_send![self.0, state] };
        match raw {
            5 => RadioState::PoweredOn,
            4 => RadioState::PoweredOff,
            2 | 3 => RadioState::Unavailable, // unsupported, unauthorized
            _ => RadioState::Unknown,         // unknown, resetting
        }
    }

    fn is_advertising(self) -> bool {
        let advertising: BOOL = unsafe { msg_send![self.0, isAdvertising] };
        advertising == YES
    }

    fn start(self, payload: &AdvertisementPayload) -> Result<(), AdvertiserError> {
        unsafe {
            let class = |name: &str| {
                Class::get(name).ok_or_else(|| {
                    AdvertiserError::Rejected(format!("{} class not available", name))
                })
            };
            let nsdictionary_class = class("NSDictionary")?;
            let nsarray_class = class("NSArray")?;
            let nsdata_class = class("NSData")?;
            let cbuuid_class = class("CBUUID")?;

            let service_uuids_key = NSString::from_str("kCBAdvDataServiceUUIDs");
            let uuid_string = NSString::from_str(&payload.service_uuid().to_string());
            let service_uuid: id = msg_send![cbuuid_class, UUIDWithString: ns_id(&uuid_string)];
            let service_uuids = [service_uuid];
            let service_uuids_array: id = msg_send![nsarray_class,
                arrayWithObjects: service_uuids.as_ptr() count: 1usize
            ];

            let manufacturer_key = NSString::from_str("kCBAdvDataManufacturerData");
            let bytes = manufacturer_data_bytes();
            let manufacturer_data: id = msg_send![nsdata_class,
                dataWithBytes: bytes.as_ptr() length: bytes.len()
            ];

            let keys: [id; 2] = [ns_id(&service_uuids_key), ns_id(&manufacturer_key)];
            let values: [id; 2] = [service_uuids_array, manufacturer_data];
            let advertising_data: id = msg_send![nsdictionary_class,
                dictionaryWithObjects: values.as_ptr()
                forKeys: keys.as_ptr()
                count: 2usize
            ];

            // Core Bluetooth picks tx power and interval itself
            let _: () = msg_send![self.0, startAdvertising: advertising_data];
        }
        Ok(())
    }

    fn stop(self) {
        unsafe {
            let _: () = msg_send![self.0, stopAdvertising];
        }
    }
}

fn ns_id(string: &NSString) -> id {
    string as *const NSString as id
}

// ----------------------------------------------------------------------------
// macOS Implementation
// ----------------------------------------------------------------------------

pub struct MacOSAdvertiser {
    manager: PeripheralManager,
    events: AdvertiserEventSender,
    reporter: RadioReporter,
    current: Option<NativeHandle>,
    next_handle: u64,
    poll_interval: Duration,
    confirmation_timeout: Duration,
    confirmation: Option<JoinHandle<()>>,
    state_poller: JoinHandle<()>,
}

impl MacOSAdvertiser {
    pub fn new(
        config: &AdvertiserConfig,
        events: AdvertiserEventSender,
        reporter: RadioReporter,
    ) -> Result<Self, AdvertiserError> {
        let manager = PeripheralManager::create()?;
        let state_poller = tokio::spawn(poll_radio_state(
            manager,
            reporter.clone(),
            config.radio_poll_interval,
        ));
        info!("macOS CBPeripheralManager initialized");

        Ok(Self {
            manager,
            events,
            reporter,
            current: None,
            next_handle: 1,
            poll_interval: config.radio_poll_interval,
            confirmation_timeout: config.start_confirmation_timeout,
            confirmation: None,
            state_poller,
        })
    }
}

impl Drop for MacOSAdvertiser {
    fn drop(&mut self) {
        self.state_poller.abort();
        if let Some(task) = self.confirmation.take() {
            task.abort();
        }
        if self.current.is_some() {
            self.manager.stop();
        }
    }
}

/// Core Bluetooth only reveals power changes through the delegate; poll instead
async fn poll_radio_state(manager: PeripheralManager, reporter: RadioReporter, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        reporter.report(manager.radio_state());
    }
}

/// Wait for `isAdvertising` and report the outcome as the started callback
async fn await_started(
    manager: PeripheralManager,
    handle: NativeHandle,
    events: AdvertiserEventSender,
    every: Duration,
    timeout: Duration,
) {
    let confirmed = tokio::time::timeout(timeout, async {
        while !manager.is_advertising() {
            tokio::time::sleep(every).await;
        }
    })
    .await
    .is_ok();

    let outcome = if confirmed {
        info!("macOS BLE advertising set {} is live", handle);
        Ok(())
    } else {
        Err(format!("not advertising after {:?}", timeout))
    };
    if events.send(AdvertiserEvent::Started { handle, outcome }).is_err() {
        debug!("Advertising confirmation dropped, controller is gone");
    }
}

#[async_trait::async_trait]
impl BleAdvertiser for MacOSAdvertiser {
    fn readiness_gate(&self) -> ReadinessGate {
        ReadinessGate::AwaitPoweredOn
    }

    async fn probe_radio(&mut self) -> RadioState {
        let state = self.manager.radio_state();
        self.reporter.report(state);
        state
    }

    async fn start_advertising(
        &mut self,
        payload: &AdvertisementPayload,
    ) -> Result<NativeHandle, AdvertiserError> {
        if let Some(previous) = self.current.take() {
            warn!("Replacing macOS advertising set {}", previous);
            self.manager.stop();
        }
        if let Some(task) = self.confirmation.take() {
            task.abort();
        }

        self.manager.start(payload)?;
        let handle = NativeHandle::new(self.next_handle);
        self.next_handle += 1;
        self.current = Some(handle);
        info!(
            "Requested macOS BLE advertising set {} for {}",
            handle,
            payload.service_uuid()
        );

        self.confirmation = Some(tokio::spawn(await_started(
            self.manager,
            handle,
            self.events.clone(),
            self.poll_interval,
            self.confirmation_timeout,
        )));
        Ok(handle)
    }

    async fn stop_advertising(&mut self, handle: NativeHandle) -> Result<(), AdvertiserError> {
        if self.current != Some(handle) {
            return Err(AdvertiserError::UnknownHandle(handle.as_u64()));
        }
        if let Some(task) = self.confirmation.take() {
            task.abort();
        }
        self.manager.stop();
        self.current = None;
        info!("Stopped macOS BLE advertising set {}", handle);
        Ok(())
    }
}
