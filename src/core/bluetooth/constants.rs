//! Constants used by the Bluetooth transport
//! GATT UUIDs, advertisement encoding values and transport limits.

use uuid::Uuid;

/// Standard Bluetooth Service UUIDs
pub const UUID_BATTERY_SERVICE: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/// Standard Bluetooth Characteristic UUIDs
pub const UUID_BATTERY_LEVEL: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// The Bluetooth base UUID; 16-bit UUIDs are aliases into it
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Battery service instances tracked per session (one poll bitmap bit each)
pub const MAX_BATTERY_INSTANCES: usize = 8;

/// RSSI value reported when the platform gives none
pub const RSSI_UNAVAILABLE: i8 = 127;

/// Delay between connection-state polls when connection events are unavailable
pub const CONNECTION_POLL_INTERVAL_MS: u64 = 1000;

/// AD structure types written into advertising reports
pub const AD_TYPE_COMPLETE_16BIT_UUIDS: u8 = 0x03;
pub const AD_TYPE_COMPLETE_128BIT_UUIDS: u8 = 0x07;
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const AD_TYPE_TX_POWER_LEVEL: u8 = 0x0A;
pub const AD_TYPE_SERVICE_DATA_16BIT: u8 = 0x16;
pub const AD_TYPE_SERVICE_DATA_128BIT: u8 = 0x21;
pub const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;
