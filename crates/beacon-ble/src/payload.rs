//! Advertisement payload builder
//!
//! Turns a caller-supplied service identifier into the immutable payload
//! descriptor every backend advertises. The manufacturer code and token are
//! process-wide constants from [`crate::protocol`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::protocol::{IntervalProfile, TxPowerProfile, MANUFACTURER_ID, MANUFACTURER_TOKEN};

// ----------------------------------------------------------------------------
// Request
// ----------------------------------------------------------------------------

/// A single request to begin advertising a service identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertisingRequest {
    pub service_id: String,
}

impl AdvertisingRequest {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
        }
    }

    /// Validate the identifier and derive the payload
    pub fn build(&self) -> Result<AdvertisementPayload, ValidationError> {
        build_payload(Some(&self.service_id))
    }
}

// ----------------------------------------------------------------------------
// Payload
// ----------------------------------------------------------------------------

/// Platform-neutral description of what gets advertised
///
/// Fields are private so a payload cannot change after construction; a
/// different payload means a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertisementPayload {
    service_uuid: Uuid,
    manufacturer_code: u16,
    manufacturer_bytes: &'static [u8],
    include_device_name: bool,
    tx_power_profile: TxPowerProfile,
    interval_profile: IntervalProfile,
}

impl AdvertisementPayload {
    pub fn service_uuid(&self) -> &Uuid {
        &self.service_uuid
    }

    pub fn manufacturer_code(&self) -> u16 {
        self.manufacturer_code
    }

    pub fn manufacturer_bytes(&self) -> &'static [u8] {
        self.manufacturer_bytes
    }

    pub fn include_device_name(&self) -> bool {
        self.include_device_name
    }

    pub fn tx_power_profile(&self) -> TxPowerProfile {
        self.tx_power_profile
    }

    pub fn interval_profile(&self) -> IntervalProfile {
        self.interval_profile
    }
}

/// Build a payload from an optional service identifier
///
/// `None` is reported as [`ValidationError::MissingArgument`], anything that is
/// not a hyphenated 8-4-4-4-12 UUID as [`ValidationError::MalformedUuid`].
pub fn build_payload(service_id: Option<&str>) -> Result<AdvertisementPayload, ValidationError> {
    let service_id = service_id.ok_or(ValidationError::MissingArgument)?;
    let service_uuid = parse_hyphenated_uuid(service_id)?;

    Ok(AdvertisementPayload {
        service_uuid,
        manufacturer_code: MANUFACTURER_ID,
        manufacturer_bytes: MANUFACTURER_TOKEN,
        include_device_name: false,
        tx_power_profile: TxPowerProfile::UltraLow,
        interval_profile: IntervalProfile::Low,
    })
}

/// Parse only the canonical grouping; `Uuid::parse_str` alone would also
/// take the simple, braced and URN forms.
fn parse_hyphenated_uuid(input: &str) -> Result<Uuid, ValidationError> {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

    let malformed = || ValidationError::MalformedUuid(input.to_string());

    let mut groups = input.split('-');
    for expected in GROUPS {
        let group = groups.next().ok_or_else(malformed)?;
        if group.len() != expected || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed());
        }
    }
    if groups.next().is_some() {
        return Err(malformed());
    }

    Uuid::parse_str(input).map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE_ID: &str = "12345678-1234-1234-1234-123456789abc";

    #[test]
    fn test_valid_uuid_builds_fixed_payload() {
        let payload = build_payload(Some(SERVICE_ID)).unwrap();
        assert_eq!(payload.service_uuid().to_string(), SERVICE_ID);
        assert_eq!(payload.manufacturer_code(), 0x1377);
        assert_eq!(payload.manufacturer_bytes(), b"b2tech");
        assert!(!payload.include_device_name());
        assert_eq!(payload.tx_power_profile(), TxPowerProfile::UltraLow);
        assert_eq!(payload.interval_profile(), IntervalProfile::Low);
    }

    #[test]
    fn test_uppercase_input_is_canonicalized() {
        let payload = build_payload(Some("12345678-1234-1234-1234-123456789ABC")).unwrap();
        assert_eq!(payload.service_uuid().to_string(), SERVICE_ID);
    }

    #[test]
    fn test_missing_identifier() {
        assert_eq!(build_payload(None), Err(ValidationError::MissingArgument));
    }

    #[test]
    fn test_malformed_identifiers() {
        let cases = [
            "",
            "not-a-uuid",
            "12345678123412341234123456789abc",
            "{12345678-1234-1234-1234-123456789abc}",
            "urn:uuid:12345678-1234-1234-1234-123456789abc",
            "12345678-1234-1234-1234-123456789abcd",
            "1234567-81234-1234-1234-123456789abc",
            "12345678-1234-1234-1234-123456789abg",
            "12345678-1234-1234-1234-123456789abc-",
            " 12345678-1234-1234-1234-123456789abc",
        ];
        for case in cases {
            assert_eq!(
                build_payload(Some(case)),
                Err(ValidationError::MalformedUuid(case.to_string())),
                "expected {:?} to be rejected",
                case
            );
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let request = AdvertisingRequest::new(SERVICE_ID);
        assert_eq!(request.build().unwrap(), request.build().unwrap());
    }
}
