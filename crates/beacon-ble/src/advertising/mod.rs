//! Cross-platform advertising trait and platform detection

pub mod fallback;
#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod simulated;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::AdvertiserConfig;
use crate::error::AdvertiserError;
use crate::payload::AdvertisementPayload;
use crate::radio::{RadioReporter, RadioState};

// ----------------------------------------------------------------------------
// Native Handles and Confirmations
// ----------------------------------------------------------------------------

/// Opaque reference to one native advertising set, allocated by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NativeHandle(u64);

impl NativeHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "adv-{}", self.0)
    }
}

/// Asynchronous confirmations from the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvertiserEvent {
    /// Outcome of a previously issued start; `Err` carries the platform status
    Started {
        handle: NativeHandle,
        outcome: Result<(), String>,
    },
    /// The advertising set is gone; `reason` is `None` for a requested stop
    Stopped {
        handle: NativeHandle,
        reason: Option<String>,
    },
}

pub type AdvertiserEventSender = mpsc::UnboundedSender<AdvertiserEvent>;
pub type AdvertiserEventReceiver = mpsc::UnboundedReceiver<AdvertiserEvent>;

/// Channel that carries backend confirmations to the controller task
pub fn advertiser_events() -> (AdvertiserEventSender, AdvertiserEventReceiver) {
    mpsc::unbounded_channel()
}

// ----------------------------------------------------------------------------
// Readiness Gate
// ----------------------------------------------------------------------------

/// When a platform allows the native start call to be issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessGate {
    /// Radio state can be queried on demand; an unknown state is probed
    Immediate,
    /// Readiness is only revealed by a powered-on callback
    AwaitPoweredOn,
}

/// What to do with a start request given the radio state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Issue,
    Defer,
    Reject,
}

impl ReadinessGate {
    pub fn decide(self, state: RadioState) -> GateDecision {
        match state {
            RadioState::PoweredOn => GateDecision::Issue,
            RadioState::Unavailable => GateDecision::Reject,
            RadioState::PoweredOff | RadioState::Unknown => GateDecision::Defer,
        }
    }

    /// Whether an unknown state should be resolved by probing first
    pub fn probes_unknown(self) -> bool {
        matches!(self, ReadinessGate::Immediate)
    }
}

// ----------------------------------------------------------------------------
// Cross-platform Advertising Trait
// ----------------------------------------------------------------------------

/// Trait for BLE advertising functionality across different platforms
///
/// Start and stop only issue the native call. Outcomes arrive later as
/// [`AdvertiserEvent`]s on the channel the backend was built with.
#[async_trait::async_trait]
pub trait BleAdvertiser: Send + Sync {
    /// How this platform gates the native start call
    fn readiness_gate(&self) -> ReadinessGate;

    /// Query the platform for the radio state, reporting it to the monitor
    async fn probe_radio(&mut self) -> RadioState {
        RadioState::Unknown
    }

    /// Issue the native start call
    async fn start_advertising(
        &mut self,
        payload: &AdvertisementPayload,
    ) -> Result<NativeHandle, AdvertiserError>;

    /// Issue the native stop call
    async fn stop_advertising(&mut self, handle: NativeHandle) -> Result<(), AdvertiserError>;

    /// Whether a `Stopped` confirmation follows a successful stop call
    fn confirms_stop(&self) -> bool {
        false
    }
}

// ----------------------------------------------------------------------------
// Platform Detection and Factory
// ----------------------------------------------------------------------------

/// Platform-specific advertiser enum
pub enum PlatformAdvertiser {
    #[cfg(target_os = "linux")]
    Linux(linux::LinuxAdvertiser),
    #[cfg(target_os = "macos")]
    MacOS(macos::MacOSAdvertiser),
    Simulated(simulated::SimulatedAdvertiser),
    Fallback(fallback::FallbackAdvertiser),
}

impl PlatformAdvertiser {
    /// Create the appropriate advertiser for the current platform
    ///
    /// A platform whose adapter cannot be opened degrades to the fallback,
    /// which reports the radio as unavailable.
    pub async fn new(
        config: &AdvertiserConfig,
        events: AdvertiserEventSender,
        reporter: RadioReporter,
    ) -> Self {
        #[cfg(target_os = "linux")]
        {
            match linux::LinuxAdvertiser::new(config, events, reporter.clone()).await {
                Ok(advertiser) => Self::Linux(advertiser),
                Err(e) => {
                    warn!("Linux BLE advertising unavailable: {}", e);
                    Self::Fallback(fallback::FallbackAdvertiser::new(reporter))
                }
            }
        }
        #[cfg(target_os = "macos")]
        {
            match macos::MacOSAdvertiser::new(config, events, reporter.clone()) {
                Ok(advertiser) => Self::MacOS(advertiser),
                Err(e) => {
                    warn!("macOS BLE advertising unavailable: {}", e);
                    Self::Fallback(fallback::FallbackAdvertiser::new(reporter))
                }
            }
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let _ = (config, events);
            warn!("No BLE advertising backend for this platform");
            Self::Fallback(fallback::FallbackAdvertiser::new(reporter))
        }
    }
}

#[async_trait::async_trait]
impl BleAdvertiser for PlatformAdvertiser {
    fn readiness_gate(&self) -> ReadinessGate {
        match self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref advertiser) => advertiser.readiness_gate(),
            #[cfg(target_os = "macos")]
            Self::MacOS(ref advertiser) => advertiser.readiness_gate(),
            Self::Simulated(ref advertiser) => advertiser.readiness_gate(),
            Self::Fallback(ref advertiser) => advertiser.readiness_gate(),
        }
    }

    async fn probe_radio(&mut self) -> RadioState {
        match self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref mut advertiser) => advertiser.probe_radio().await,
            #[cfg(target_os = "macos")]
            Self::MacOS(ref mut advertiser) => advertiser.probe_radio().await,
            Self::Simulated(ref mut advertiser) => advertiser.probe_radio().await,
            Self::Fallback(ref mut advertiser) => advertiser.probe_radio().await,
        }
    }

    async fn start_advertising(
        &mut self,
        payload: &AdvertisementPayload,
    ) -> Result<NativeHandle, AdvertiserError> {
        match self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref mut advertiser) => advertiser.start_advertising(payload).await,
            #[cfg(target_os = "macos")]
            Self::MacOS(ref mut advertiser) => advertiser.start_advertising(payload).await,
            Self::Simulated(ref mut advertiser) => advertiser.start_advertising(payload).await,
            Self::Fallback(ref mut advertiser) => advertiser.start_advertising(payload).await,
        }
    }

    async fn stop_advertising(&mut self, handle: NativeHandle) -> Result<(), AdvertiserError> {
        match self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref mut advertiser) => advertiser.stop_advertising(handle).await,
            #[cfg(target_os = "macos")]
            Self::MacOS(ref mut advertiser) => advertiser.stop_advertising(handle).await,
            Self::Simulated(ref mut advertiser) => advertiser.stop_advertising(handle).await,
            Self::Fallback(ref mut advertiser) => advertiser.stop_advertising(handle).await,
        }
    }

    fn confirms_stop(&self) -> bool {
        match self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref advertiser) => advertiser.confirms_stop(),
            #[cfg(target_os = "macos")]
            Self::MacOS(ref advertiser) => advertiser.confirms_stop(),
            Self::Simulated(ref advertiser) => advertiser.confirms_stop(),
            Self::Fallback(ref advertiser) => advertiser.confirms_stop(),
        }
    }
}
