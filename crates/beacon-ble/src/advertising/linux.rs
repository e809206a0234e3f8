//! Linux BLE advertising implementation using bluer (BlueZ)

use std::collections::{BTreeMap, HashMap};

use bluer::adv::{Advertisement, AdvertisementHandle, Type};
use bluer::{AdapterEvent, AdapterProperty};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AdvertiserConfig;
use crate::error::AdvertiserError;
use crate::payload::AdvertisementPayload;
use crate::protocol::encode_advertising_data;
use crate::radio::{RadioReporter, RadioState};

use super::{AdvertiserEvent, AdvertiserEventSender, BleAdvertiser, NativeHandle, ReadinessGate};

// ----------------------------------------------------------------------------
// Linux Implementation
// ----------------------------------------------------------------------------

pub struct LinuxAdvertiser {
    _session: bluer::Session,
    adapter: bluer::Adapter,
    events: AdvertiserEventSender,
    reporter: RadioReporter,
    advertisement_handles: HashMap<NativeHandle, AdvertisementHandle>,
    next_handle: u64,
    power_watcher: JoinHandle<()>,
}

impl LinuxAdvertiser {
    pub async fn new(
        config: &AdvertiserConfig,
        events: AdvertiserEventSender,
        reporter: RadioReporter,
    ) -> Result<Self, AdvertiserError> {
        let session = bluer::Session::new()
            .await
            .map_err(|e| AdvertiserError::AdapterUnavailable(format!("BlueZ session: {}", e)))?;

        let adapter = match &config.adapter_name {
            Some(name) => session.adapter(name),
            None => session.default_adapter().await,
        }
        .map_err(|e| AdvertiserError::AdapterUnavailable(format!("BLE adapter: {}", e)))?;

        // Only touch power when asked; otherwise wait for the user to enable it
        if config.power_on_adapter && !adapter.is_powered().await.unwrap_or(false) {
            adapter.set_powered(true).await.map_err(|e| {
                AdvertiserError::Rejected(format!("Failed to power on adapter: {}", e))
            })?;
        }

        let power_watcher = tokio::spawn(watch_power(adapter.clone(), reporter.clone()));
        info!("Linux BLE adapter {} initialized for advertising", adapter.name());

        Ok(Self {
            _session: session,
            adapter,
            events,
            reporter,
            advertisement_handles: HashMap::new(),
            next_handle: 1,
            power_watcher,
        })
    }

    fn emit(&self, event: AdvertiserEvent) {
        if self.events.send(event).is_err() {
            debug!("Advertising confirmation dropped, controller is gone");
        }
    }
}

impl Drop for LinuxAdvertiser {
    fn drop(&mut self) {
        self.power_watcher.abort();
    }
}

/// Forward adapter `Powered` property changes to the radio monitor
async fn watch_power(adapter: bluer::Adapter, reporter: RadioReporter) {
    let events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            warn!("Cannot watch power state of {}: {}", adapter.name(), e);
            return;
        }
    };
    futures::pin_mut!(events);

    while let Some(event) = events.next().await {
        if let AdapterEvent::PropertyChanged(AdapterProperty::Powered(powered)) = event {
            reporter.report(if powered {
                RadioState::PoweredOn
            } else {
                RadioState::PoweredOff
            });
        }
    }

    // The event stream ends when the adapter disappears
    warn!("Adapter {} removed", adapter.name());
    reporter.report(RadioState::Unavailable);
}

#[async_trait::async_trait]
impl BleAdvertiser for LinuxAdvertiser {
    fn readiness_gate(&self) -> ReadinessGate {
        ReadinessGate::Immediate
    }

    async fn probe_radio(&mut self) -> RadioState {
        let state = match self.adapter.is_powered().await {
            Ok(true) => RadioState::PoweredOn,
            Ok(false) => RadioState::PoweredOff,
            Err(e) => {
                warn!("Failed to query adapter {}: {}", self.adapter.name(), e);
                RadioState::Unavailable
            }
        };
        self.reporter.report(state);
        state
    }

    async fn start_advertising(
        &mut self,
        payload: &AdvertisementPayload,
    ) -> Result<NativeHandle, AdvertiserError> {
        let handle = NativeHandle::new(self.next_handle);
        self.next_handle += 1;

        let mut manufacturer_data = BTreeMap::new();
        manufacturer_data.insert(
            payload.manufacturer_code(),
            payload.manufacturer_bytes().to_vec(),
        );

        let interval = payload.interval_profile().interval();
        let advertisement = Advertisement {
            advertisement_type: Type::Broadcast,
            service_uuids: std::iter::once(*payload.service_uuid()).collect(),
            manufacturer_data,
            local_name: None,
            min_interval: Some(interval),
            max_interval: Some(interval),
            tx_power: Some(payload.tx_power_profile().dbm()),
            ..Default::default()
        };
        debug!(
            "Advertising set {} data {}",
            handle,
            hex::encode(encode_advertising_data(payload))
        );

        // BlueZ answers the registration itself; report it as the started callback
        match self.adapter.advertise(advertisement).await {
            Ok(advertisement_handle) => {
                self.advertisement_handles.insert(handle, advertisement_handle);
                info!(
                    "Started BLE advertising set {} for {}",
                    handle,
                    payload.service_uuid()
                );
                self.emit(AdvertiserEvent::Started {
                    handle,
                    outcome: Ok(()),
                });
            }
            Err(e) => {
                self.emit(AdvertiserEvent::Started {
                    handle,
                    outcome: Err(e.to_string()),
                });
            }
        }

        Ok(handle)
    }

    async fn stop_advertising(&mut self, handle: NativeHandle) -> Result<(), AdvertiserError> {
        match self.advertisement_handles.remove(&handle) {
            Some(advertisement_handle) => {
                drop(advertisement_handle); // Dropping the handle stops advertising
                info!("Stopped BLE advertising set {}", handle);
                Ok(())
            }
            None => Err(AdvertiserError::UnknownHandle(handle.as_u64())),
        }
    }
}
