//! BLE advertising constants and AD structure encoding

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::payload::AdvertisementPayload;

// ----------------------------------------------------------------------------
// Manufacturer Data
// ----------------------------------------------------------------------------

/// Company identifier carried in the manufacturer-specific AD structure
pub const MANUFACTURER_ID: u16 = 0x1377;

/// Fixed vendor token following the company identifier
pub const MANUFACTURER_TOKEN: &[u8] = b"b2tech";

/// Manufacturer data as a single blob: company id (little-endian) + token
pub fn manufacturer_data_bytes() -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 + MANUFACTURER_TOKEN.len());
    bytes.extend_from_slice(&MANUFACTURER_ID.to_le_bytes());
    bytes.extend_from_slice(MANUFACTURER_TOKEN);
    bytes
}

// ----------------------------------------------------------------------------
// Power and Interval Profiles
// ----------------------------------------------------------------------------

/// Transmit power profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxPowerProfile {
    UltraLow,
}

impl TxPowerProfile {
    /// Requested transmit power in dBm
    pub fn dbm(self) -> i16 {
        match self {
            TxPowerProfile::UltraLow => -21,
        }
    }
}

/// Advertising interval profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntervalProfile {
    Low,
}

impl IntervalProfile {
    /// Interval in controller units of 0.625 ms
    pub fn units(self) -> u32 {
        match self {
            IntervalProfile::Low => 160,
        }
    }

    /// Interval as wall-clock duration
    pub fn interval(self) -> Duration {
        Duration::from_micros(u64::from(self.units()) * 625)
    }
}

// ----------------------------------------------------------------------------
// AD Structures
// ----------------------------------------------------------------------------

/// Complete List of 128-bit Service Class UUIDs
pub const AD_TYPE_COMPLETE_128_BIT_UUIDS: u8 = 0x07;

/// Manufacturer Specific Data
pub const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// Maximum advertising data length of a legacy advertising PDU
pub const LEGACY_ADV_DATA_MAX: usize = 31;

/// Raw advertising data, sized for a legacy PDU
pub type AdvertisingData = SmallVec<[u8; LEGACY_ADV_DATA_MAX]>;

/// Encode the payload as the advertising data a controller would broadcast
///
/// Layout: the service UUID structure, then the manufacturer data structure.
/// Multi-byte fields are little-endian as the Core specification requires.
pub fn encode_advertising_data(payload: &AdvertisementPayload) -> AdvertisingData {
    let mut data = AdvertisingData::new();

    data.push(1 + 16);
    data.push(AD_TYPE_COMPLETE_128_BIT_UUIDS);
    data.extend_from_slice(&uuid_le_bytes(payload.service_uuid()));

    let manufacturer = manufacturer_data_bytes();
    data.push(1 + manufacturer.len() as u8);
    data.push(AD_TYPE_MANUFACTURER_DATA);
    data.extend_from_slice(&manufacturer);

    debug_assert!(data.len() <= LEGACY_ADV_DATA_MAX);
    data
}

/// UUID bytes in over-the-air (fully reversed) order
fn uuid_le_bytes(uuid: &Uuid) -> [u8; 16] {
    let mut bytes = *uuid.as_bytes();
    bytes.reverse();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::build_payload;

    #[test]
    fn test_manufacturer_blob_layout() {
        let blob = manufacturer_data_bytes();
        assert_eq!(&blob[..2], &[0x77, 0x13]);
        assert_eq!(&blob[2..], b"b2tech");
    }

    #[test]
    fn test_profile_values() {
        assert_eq!(TxPowerProfile::UltraLow.dbm(), -21);
        assert_eq!(IntervalProfile::Low.units(), 160);
        assert_eq!(IntervalProfile::Low.interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_advertising_data_layout() {
        let payload = build_payload(Some("12345678-1234-1234-1234-123456789abc")).unwrap();
        let data = encode_advertising_data(&payload);

        assert_eq!(data.len(), 28);
        assert!(!data.spilled());

        // Service UUID structure, last UUID byte first
        assert_eq!(data[0], 17);
        assert_eq!(data[1], AD_TYPE_COMPLETE_128_BIT_UUIDS);
        assert_eq!(data[2], 0xbc);
        assert_eq!(data[17], 0x12);

        // Manufacturer structure
        assert_eq!(data[18], 9);
        assert_eq!(data[19], AD_TYPE_MANUFACTURER_DATA);
        assert_eq!(&data[20..22], &[0x77, 0x13]);
        assert_eq!(&data[22..], b"b2tech");
    }
}
