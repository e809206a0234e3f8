//! In-memory advertising backend
//!
//! Behaves like a radio-backed platform without touching hardware. The
//! paired [`SimulatorControl`] plays the hardware side: it toggles the radio,
//! delivers or fails confirmations, and records every native call.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::AdvertiserError;
use crate::payload::AdvertisementPayload;
use crate::protocol::encode_advertising_data;
use crate::radio::{RadioReporter, RadioState};

use super::{AdvertiserEvent, AdvertiserEventSender, BleAdvertiser, NativeHandle, ReadinessGate};

// ----------------------------------------------------------------------------
// Recorded Calls
// ----------------------------------------------------------------------------

/// A native call as the simulated platform received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    Start {
        handle: NativeHandle,
        payload: AdvertisementPayload,
        data: Vec<u8>,
    },
    Stop {
        handle: NativeHandle,
    },
}

#[derive(Debug)]
struct SimState {
    radio: RadioState,
    next_handle: u64,
    live: BTreeSet<NativeHandle>,
    calls: Vec<NativeCall>,
    reject_start: Option<String>,
    reject_stop: Option<String>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<SimState>,
    events: AdvertiserEventSender,
    reporter: RadioReporter,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: AdvertiserEvent) {
        if self.events.send(event).is_err() {
            debug!("Simulated confirmation dropped, controller is gone");
        }
    }
}

// ----------------------------------------------------------------------------
// Simulated Advertiser
// ----------------------------------------------------------------------------

pub struct SimulatedAdvertiser {
    gate: ReadinessGate,
    auto_confirm: bool,
    stop_confirmation: bool,
    shared: Arc<Shared>,
}

impl SimulatedAdvertiser {
    /// Create a backend with the radio in [`RadioState::Unknown`]
    pub fn new(gate: ReadinessGate, events: AdvertiserEventSender, reporter: RadioReporter) -> Self {
        Self {
            gate,
            auto_confirm: false,
            stop_confirmation: false,
            shared: Arc::new(Shared {
                state: Mutex::new(SimState {
                    radio: RadioState::Unknown,
                    next_handle: 1,
                    live: BTreeSet::new(),
                    calls: Vec::new(),
                    reject_start: None,
                    reject_stop: None,
                }),
                events,
                reporter,
            }),
        }
    }

    /// Confirm every start as soon as it is issued
    pub fn with_auto_confirm(mut self, enabled: bool) -> Self {
        self.auto_confirm = enabled;
        self
    }

    /// Deliver a `Stopped` confirmation after each accepted stop
    pub fn with_stop_confirmation(mut self, enabled: bool) -> Self {
        self.stop_confirmation = enabled;
        self
    }

    /// Hardware-side handle for this backend
    pub fn control(&self) -> SimulatorControl {
        SimulatorControl {
            shared: self.shared.clone(),
        }
    }
}

#[async_trait::async_trait]
impl BleAdvertiser for SimulatedAdvertiser {
    fn readiness_gate(&self) -> ReadinessGate {
        self.gate
    }

    async fn probe_radio(&mut self) -> RadioState {
        let radio = self.shared.lock().radio;
        self.shared.reporter.report(radio);
        radio
    }

    async fn start_advertising(
        &mut self,
        payload: &AdvertisementPayload,
    ) -> Result<NativeHandle, AdvertiserError> {
        let mut state = self.shared.lock();
        if let Some(reason) = state.reject_start.take() {
            return Err(AdvertiserError::Rejected(reason));
        }
        if state.radio != RadioState::PoweredOn {
            return Err(AdvertiserError::Rejected(format!("radio {}", state.radio)));
        }

        let handle = NativeHandle::new(state.next_handle);
        state.next_handle += 1;
        state.live.insert(handle);
        state.calls.push(NativeCall::Start {
            handle,
            payload: payload.clone(),
            data: encode_advertising_data(payload).to_vec(),
        });
        debug!("Simulated advertising set {} issued", handle);

        if self.auto_confirm {
            self.shared.emit(AdvertiserEvent::Started {
                handle,
                outcome: Ok(()),
            });
        }
        Ok(handle)
    }

    async fn stop_advertising(&mut self, handle: NativeHandle) -> Result<(), AdvertiserError> {
        let mut state = self.shared.lock();
        state.calls.push(NativeCall::Stop { handle });

        if let Some(reason) = state.reject_stop.clone() {
            return Err(AdvertiserError::Rejected(reason));
        }
        if !state.live.remove(&handle) {
            return Err(AdvertiserError::UnknownHandle(handle.as_u64()));
        }

        if self.stop_confirmation {
            self.shared.emit(AdvertiserEvent::Stopped {
                handle,
                reason: None,
            });
        }
        Ok(())
    }

    fn confirms_stop(&self) -> bool {
        self.stop_confirmation
    }
}

// ----------------------------------------------------------------------------
// Simulator Control
// ----------------------------------------------------------------------------

/// Hardware side of a [`SimulatedAdvertiser`]
#[derive(Debug, Clone)]
pub struct SimulatorControl {
    shared: Arc<Shared>,
}

impl SimulatorControl {
    /// Change the radio state as a hardware callback would
    ///
    /// Leaving the powered-on state tears down every live advertising set.
    pub fn set_radio(&self, radio: RadioState) {
        let dropped: Vec<NativeHandle> = {
            let mut state = self.shared.lock();
            state.radio = radio;
            if radio == RadioState::PoweredOn {
                Vec::new()
            } else {
                std::mem::take(&mut state.live).into_iter().collect()
            }
        };

        self.shared.reporter.report(radio);
        for handle in dropped {
            self.shared.emit(AdvertiserEvent::Stopped {
                handle,
                reason: Some(format!("radio {}", radio)),
            });
        }
    }

    pub fn radio(&self) -> RadioState {
        self.shared.lock().radio
    }

    /// Deliver the platform's "started" callback
    pub fn confirm_start(&self, handle: NativeHandle) {
        self.shared.emit(AdvertiserEvent::Started {
            handle,
            outcome: Ok(()),
        });
    }

    /// Deliver a failed "started" callback with a platform status
    pub fn fail_start(&self, handle: NativeHandle, status: impl Into<String>) {
        self.shared.lock().live.remove(&handle);
        self.shared.emit(AdvertiserEvent::Started {
            handle,
            outcome: Err(status.into()),
        });
    }

    /// Deliver the platform's "stopped" callback
    pub fn confirm_stop(&self, handle: NativeHandle) {
        self.shared.emit(AdvertiserEvent::Stopped {
            handle,
            reason: None,
        });
    }

    /// Make the next start call fail synchronously
    pub fn reject_next_start(&self, reason: impl Into<String>) {
        self.shared.lock().reject_start = Some(reason.into());
    }

    /// Make stop calls fail until cleared with `None`
    pub fn reject_stops(&self, reason: Option<String>) {
        self.shared.lock().reject_stop = reason;
    }

    /// Every native call in the order it was issued
    pub fn calls(&self) -> Vec<NativeCall> {
        self.shared.lock().calls.clone()
    }

    /// Handles of started calls, oldest first
    pub fn started_handles(&self) -> Vec<NativeHandle> {
        self.shared
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                NativeCall::Start { handle, .. } => Some(*handle),
                NativeCall::Stop { .. } => None,
            })
            .collect()
    }

    /// Advertising sets the platform currently considers live
    pub fn live_handles(&self) -> Vec<NativeHandle> {
        self.shared.lock().live.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertising::advertiser_events;
    use crate::payload::build_payload;
    use crate::radio::RadioMonitor;

    fn payload() -> AdvertisementPayload {
        build_payload(Some("12345678-1234-1234-1234-123456789abc")).unwrap()
    }

    #[tokio::test]
    async fn test_records_calls_and_confirms() {
        let (_monitor, reporter) = RadioMonitor::new();
        let (events, mut rx) = advertiser_events();
        let mut advertiser = SimulatedAdvertiser::new(ReadinessGate::Immediate, events, reporter)
            .with_auto_confirm(true)
            .with_stop_confirmation(true);
        let control = advertiser.control();
        control.set_radio(RadioState::PoweredOn);

        let handle = advertiser.start_advertising(&payload()).await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            AdvertiserEvent::Started {
                handle,
                outcome: Ok(())
            }
        );
        assert_eq!(control.live_handles(), vec![handle]);

        advertiser.stop_advertising(handle).await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            AdvertiserEvent::Stopped {
                handle,
                reason: None
            }
        );
        assert!(control.live_handles().is_empty());
        assert_eq!(control.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_radio_off_tears_down_live_sets() {
        let (monitor, reporter) = RadioMonitor::new();
        let (events, mut rx) = advertiser_events();
        let mut advertiser = SimulatedAdvertiser::new(ReadinessGate::Immediate, events, reporter);
        let control = advertiser.control();

        control.set_radio(RadioState::PoweredOn);
        let handle = advertiser.start_advertising(&payload()).await.unwrap();
        control.set_radio(RadioState::PoweredOff);

        assert_eq!(monitor.current_state(), RadioState::PoweredOff);
        assert!(matches!(
            rx.try_recv().unwrap(),
            AdvertiserEvent::Stopped { handle: h, reason: Some(_) } if h == handle
        ));
    }

    #[tokio::test]
    async fn test_probe_reports_to_monitor() {
        let (monitor, reporter) = RadioMonitor::new();
        let (events, _rx) = advertiser_events();
        let mut advertiser = SimulatedAdvertiser::new(ReadinessGate::Immediate, events, reporter);
        advertiser.control().set_radio(RadioState::PoweredOff);

        assert_eq!(advertiser.probe_radio().await, RadioState::PoweredOff);
        assert_eq!(monitor.current_state(), RadioState::PoweredOff);
    }

    #[tokio::test]
    async fn test_rejections() {
        let (_monitor, reporter) = RadioMonitor::new();
        let (events, _rx) = advertiser_events();
        let mut advertiser = SimulatedAdvertiser::new(ReadinessGate::Immediate, events, reporter);
        let control = advertiser.control();
        control.set_radio(RadioState::PoweredOn);

        control.reject_next_start("ADVERTISE_FAILED_TOO_MANY_ADVERTISERS");
        assert!(advertiser.start_advertising(&payload()).await.is_err());
        let handle = advertiser.start_advertising(&payload()).await.unwrap();

        control.reject_stops(Some("busy".to_string()));
        assert_eq!(
            advertiser.stop_advertising(handle).await,
            Err(AdvertiserError::Rejected("busy".to_string()))
        );
        control.reject_stops(None);
        assert!(advertiser.stop_advertising(handle).await.is_ok());
        assert_eq!(
            advertiser.stop_advertising(handle).await,
            Err(AdvertiserError::UnknownHandle(handle.as_u64()))
        );
    }

    #[tokio::test]
    async fn test_start_rejected_unless_powered_on() {
        let (_monitor, reporter) = RadioMonitor::new();
        let (events, _rx) = advertiser_events();
        let mut advertiser = SimulatedAdvertiser::new(ReadinessGate::Immediate, events, reporter);
        let control = advertiser.control();
        assert_eq!(control.radio(), RadioState::Unknown);

        control.set_radio(RadioState::PoweredOff);
        assert_eq!(
            advertiser.start_advertising(&payload()).await,
            Err(AdvertiserError::Rejected("radio powered off".to_string()))
        );
        assert!(control.calls().is_empty());

        control.set_radio(RadioState::PoweredOn);
        assert_eq!(control.radio(), RadioState::PoweredOn);
        assert!(advertiser.start_advertising(&payload()).await.is_ok());
    }
}
