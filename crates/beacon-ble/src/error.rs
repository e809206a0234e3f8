//! Error types for the advertising lifecycle

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Rejections produced while turning a service identifier into a payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("uuid is required")]
    MissingArgument,

    #[error("malformed service UUID: {0:?}")]
    MalformedUuid(String),
}

/// Errors returned by `start`
///
/// Only the payload case is ever surfaced to command-interface callers; the
/// others are absorbed there (see [`crate::command`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("invalid advertising payload: {0}")]
    InvalidPayload(#[from] ValidationError),

    #[error("Bluetooth radio is unavailable")]
    RadioUnavailable,

    #[error("advertising controller is no longer running")]
    ControllerClosed,
}

/// Errors returned by `stop`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StopError {
    #[error("platform rejected the stop request: {0}")]
    NativeStopRejected(String),

    #[error("advertising controller is no longer running")]
    ControllerClosed,
}

/// Failures reported by a platform advertiser backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdvertiserError {
    #[error("BLE adapter not available: {0}")]
    AdapterUnavailable(String),

    #[error("BLE advertising not supported on this platform")]
    Unsupported,

    #[error("unknown advertising handle {0}")]
    UnknownHandle(u64),

    #[error("platform rejected the request: {0}")]
    Rejected(String),
}
