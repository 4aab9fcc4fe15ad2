//! Bluetooth transport
//! This module handles all bluetooth operations including scanning,
//! connecting, and reading battery levels from peers.

mod advertisement;
mod battery;
mod connection;
mod constants;
mod manager;
mod scanner;
mod types;

// Re-export types that should be publicly accessible
pub use advertisement::{AdPayloadBuilder, short_uuid};
pub use battery::BatteryClient;
pub use connection::ConnectionManager;
pub use constants::*; // Re-export all constants
pub use manager::BluetoothManager;
pub use scanner::BluetoothScanner;
