//! Defines shared data structures for the Bluetooth module.

use std::collections::HashMap;
use std::sync::Arc;

use bluest::{Characteristic, Device};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::address::DeviceAddress;
use crate::core::events::{ConnectionHandle, SessionId};

/// Devices seen while scanning, keyed by their extracted address
pub type DeviceCache = Arc<Mutex<HashMap<DeviceAddress, Device>>>;

/// Established links, keyed by the handle reported to the orchestrator
pub type LinkTable = Arc<Mutex<HashMap<ConnectionHandle, LinkRecord>>>;

/// Open battery service sessions
pub type SessionTable = Arc<Mutex<HashMap<SessionId, SessionRecord>>>;

/// An established link owned by the connection manager.
#[derive(Clone)]
pub struct LinkRecord {
    pub address: DeviceAddress,
    /// The device handle, used for service discovery and disconnecting.
    pub device: Device,
    /// Cancelling this tears the link down.
    pub cancel: CancellationToken,
}

/// A battery level characteristic found on the peer.
#[derive(Clone)]
pub struct BatteryInstance {
    pub characteristic: Characteristic,
    /// True when the characteristic cannot notify and is read periodically.
    pub polled: bool,
}

/// A battery service session, from service-connect until service-disconnect.
pub struct SessionRecord {
    pub handle: ConnectionHandle,
    /// Stops discovery and every notification or poll task of the session.
    pub cancel: CancellationToken,
    /// Empty until discovery completes.
    pub instances: Vec<BatteryInstance>,
}
