//! BLE peripheral advertising lifecycle for beacon hosts
//!
//! This crate starts and stops low-power BLE advertising that carries a
//! caller-supplied service UUID and a fixed manufacturer payload, and hides
//! the differences between platforms that can advertise immediately and
//! platforms that must wait for the radio to report power.
//!
//! ## Architecture
//!
//! - [`payload`] - Service identifier validation and the advertised payload
//! - [`protocol`] - Manufacturer constants, profiles and AD encoding
//! - [`radio`] - Radio readiness monitor fed by the platform backend
//! - [`session`] - Advertising session state and transition events
//! - [`controller`] - The lifecycle state machine
//! - [`service`] - Task that owns the controller, and its handle
//! - [`command`] - `startAdvertising` / `stopAdvertising` dispatcher
//! - [`advertising`] - Platform backends behind the [`BleAdvertiser`] trait
//!
//! ## Usage
//!
//! ```rust,no_run
//! use beacon_ble::{
//!     advertiser_events, spawn, AdvertiserConfig, AdvertisingController, AdvertisingRequest,
//!     PlatformAdvertiser, RadioMonitor,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AdvertiserConfig::new();
//! let (monitor, reporter) = RadioMonitor::new();
//! let (events_tx, events_rx) = advertiser_events();
//!
//! let advertiser = PlatformAdvertiser::new(&config, events_tx, reporter).await;
//! let controller = AdvertisingController::new(advertiser, monitor)
//!     .with_event_capacity(config.event_capacity);
//! let (handle, _task) = spawn(controller, events_rx, &config);
//!
//! // Accepted now; advertising begins once the radio is powered on
//! handle
//!     .start(AdvertisingRequest::new("12345678-1234-1234-1234-123456789abc"))
//!     .await?;
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! - **Linux**: `bluer` (BlueZ). Starts immediately; adapter power is watched.
//! - **macOS**: Core Bluetooth via `CBPeripheralManager`. Starts only once the
//!   manager reports powered on.
//! - **Other platforms**: the radio is reported unavailable.
//!
//! A simulated backend ([`advertising::simulated`]) runs the same lifecycle
//! without hardware.

pub mod advertising;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod payload;
pub mod protocol;
pub mod radio;
pub mod service;
pub mod session;

// Public API exports
pub use advertising::{
    advertiser_events, AdvertiserEvent, BleAdvertiser, NativeHandle, PlatformAdvertiser,
    ReadinessGate,
};
pub use command::{CommandInterface, MethodCall, MethodResponse};
pub use config::AdvertiserConfig;
pub use controller::AdvertisingController;
pub use error::{AdvertiserError, StartError, StopError, ValidationError};
pub use payload::{build_payload, AdvertisementPayload, AdvertisingRequest};
pub use radio::{RadioMonitor, RadioReporter, RadioState};
pub use service::{spawn, AdvertisingHandle};
pub use session::{SessionId, SessionSnapshot, SessionStatus, SessionTransition};
