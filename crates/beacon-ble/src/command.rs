//! Host-facing command interface
//!
//! Exactly two methods are understood: `startAdvertising { uuid }` and
//! `stopAdvertising`. Anything else answers [`MethodResponse::NotImplemented`].
//!
//! Integrators should note that only argument problems surface as errors.
//! `startAdvertising` answers success when the radio is unavailable (the
//! condition is logged), and `stopAdvertising` always answers success. Watch
//! [`crate::AdvertisingHandle::subscribe`] to learn whether advertising
//! actually reached the air.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{StartError, ValidationError};
use crate::payload::AdvertisingRequest;
use crate::service::AdvertisingHandle;

pub const START_ADVERTISING: &str = "startAdvertising";
pub const STOP_ADVERTISING: &str = "stopAdvertising";

pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
pub const UNAVAILABLE: &str = "UNAVAILABLE";

// ----------------------------------------------------------------------------
// Wire Types
// ----------------------------------------------------------------------------

/// An inbound method invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    fn argument_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Result of a method invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MethodResponse {
    Success,
    Error { code: String, message: String },
    NotImplemented,
}

impl MethodResponse {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CommandInterface {
    handle: AdvertisingHandle,
}

impl CommandInterface {
    pub fn new(handle: AdvertisingHandle) -> Self {
        Self { handle }
    }

    pub async fn handle(&self, call: &MethodCall) -> MethodResponse {
        match call.method.as_str() {
            START_ADVERTISING => self.start_advertising(call).await,
            STOP_ADVERTISING => self.stop_advertising().await,
            other => {
                debug!("Method {} not implemented", other);
                MethodResponse::NotImplemented
            }
        }
    }

    async fn start_advertising(&self, call: &MethodCall) -> MethodResponse {
        let Some(uuid) = call.argument_str("uuid") else {
            return MethodResponse::error(
                INVALID_ARGUMENT,
                ValidationError::MissingArgument.to_string(),
            );
        };

        match self.handle.start(AdvertisingRequest::new(uuid)).await {
            Ok(()) => MethodResponse::Success,
            Err(StartError::InvalidPayload(e)) => {
                MethodResponse::error(INVALID_ARGUMENT, e.to_string())
            }
            Err(StartError::RadioUnavailable) => {
                warn!(
                    "Bluetooth unavailable, {} for {} answered as success",
                    START_ADVERTISING, uuid
                );
                MethodResponse::Success
            }
            Err(e @ StartError::ControllerClosed) => {
                MethodResponse::error(UNAVAILABLE, e.to_string())
            }
        }
    }

    async fn stop_advertising(&self) -> MethodResponse {
        if let Err(e) = self.handle.stop().await {
            warn!("{} failed: {}", STOP_ADVERTISING, e);
        }
        MethodResponse::Success
    }
}
