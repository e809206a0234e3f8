//! Fallback advertising implementation for unsupported platforms

use tracing::warn;

use crate::error::AdvertiserError;
use crate::payload::AdvertisementPayload;
use crate::radio::{RadioReporter, RadioState};

use super::{BleAdvertiser, NativeHandle, ReadinessGate};

// ----------------------------------------------------------------------------
// Fallback Implementation
// ----------------------------------------------------------------------------

/// Backend for hosts without a peripheral-capable adapter
///
/// Reports the radio as permanently unavailable so the controller rejects
/// starts instead of waiting for a power-on that can never come.
pub struct FallbackAdvertiser {
    reporter: RadioReporter,
}

impl FallbackAdvertiser {
    pub fn new(reporter: RadioReporter) -> Self {
        reporter.report(RadioState::Unavailable);
        Self { reporter }
    }
}

#[async_trait::async_trait]
impl BleAdvertiser for FallbackAdvertiser {
    fn readiness_gate(&self) -> ReadinessGate {
        ReadinessGate::Immediate
    }

    async fn probe_radio(&mut self) -> RadioState {
        self.reporter.report(RadioState::Unavailable);
        RadioState::Unavailable
    }

    async fn start_advertising(
        &mut self,
        payload: &AdvertisementPayload,
    ) -> Result<NativeHandle, AdvertiserError> {
        warn!(
            "BLE advertising not supported on this platform. Service {} will not be advertised. \
            Consider using a supported platform (Linux with BlueZ or macOS) for full functionality.",
            payload.service_uuid()
        );
        Err(AdvertiserError::Unsupported)
    }

    async fn stop_advertising(&mut self, handle: NativeHandle) -> Result<(), AdvertiserError> {
        Err(AdvertiserError::UnknownHandle(handle.as_u64()))
    }
}
