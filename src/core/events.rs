//! Inbound events consumed by the orchestrator
//! Link/discovery events and battery service events, plus the identifiers
//! they carry.

use std::fmt;

use crate::core::address::{AddressType, DeviceAddress};
use crate::utils::format_hex;

/// Status code reported for a successful service connection.
pub const STATUS_SUCCESS: u8 = 0x00;
/// The peer does not expose a battery service.
pub const STATUS_UNSUPPORTED_FEATURE: u8 = 0x11;
/// The service handshake failed for any other reason.
pub const STATUS_UNSPECIFIED_ERROR: u8 = 0x1F;

/// ATT status of a successful read.
pub const ATT_SUCCESS: u8 = 0x00;
/// The requested battery instance does not exist in the session.
pub const ATT_INVALID_HANDLE: u8 = 0x01;
/// The read failed in a way the transport cannot classify.
pub const ATT_UNLIKELY_ERROR: u8 = 0x0E;

/// Advertising event type of a connectable undirected advertisement.
pub const ADV_IND: u8 = 0x00;
/// Advertising event type of a non-connectable advertisement.
pub const ADV_NONCONN_IND: u8 = 0x03;

/// Opaque identifier of an established link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(u16);

impl ConnectionHandle {
    pub const INVALID: ConnectionHandle = ConnectionHandle(0xFFFF);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u16 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Opaque identifier of a battery service session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u16);

impl SessionId {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single received advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingReport {
    pub address: DeviceAddress,
    pub address_type: AddressType,
    pub event_type: u8,
    pub rssi: i8,
    /// Raw AD structures; logged, never interpreted by the orchestrator.
    pub data: Vec<u8>,
}

impl AdvertisingReport {
    /// One-line dump of the report and its payload.
    pub fn summary(&self) -> String {
        format!(
            "adv. event: evt-type {}, addr-type {}, addr {}, rssi {}, length adv {}, data: {}",
            self.event_type,
            self.address_type,
            self.address,
            self.rssi,
            self.data.len(),
            format_hex(&self.data)
        )
    }
}

/// Outcome of a battery service handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConnectResult {
    pub session: SessionId,
    pub status: u8,
    /// Battery service instances found on the peer.
    pub instances: u8,
    /// Bit `n` set when instance `n` is polled rather than notified.
    pub poll_bitmap: u8,
}

impl ServiceConnectResult {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// A battery level value, from a read, a poll or a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelReading {
    pub session: SessionId,
    pub instance: u8,
    pub level: u8,
    pub att_status: u8,
}

impl LevelReading {
    pub fn is_success(&self) -> bool {
        self.att_status == ATT_SUCCESS
    }
}

/// Events produced by the link layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The adapter is powered and usable.
    TransportReady,
    Advertisement(AdvertisingReport),
    LinkEstablished { handle: ConnectionHandle },
    /// The link went down, or a connection attempt never came up.
    LinkDisconnected { handle: ConnectionHandle },
    /// Anything else the transport reports; never acted on.
    Other { code: u8 },
}

impl LinkEvent {
    /// Reported when a connection attempt ends before any link came up.
    pub fn attempt_failed() -> Self {
        LinkEvent::LinkDisconnected {
            handle: ConnectionHandle::INVALID,
        }
    }
}

/// Events produced by the battery service client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    Connected(ServiceConnectResult),
    Level(LevelReading),
    Other { code: u8 },
}

/// Events as seen by the orchestrator, after routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    TransportReady,
    Advertisement(AdvertisingReport),
    LinkEstablished(ConnectionHandle),
    LinkDisconnected,
    ServiceConnected(ServiceConnectResult),
    ValueRead(LevelReading),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TransportReady,
    Advertisement,
    LinkEstablished,
    LinkDisconnected,
    ServiceConnected,
    ValueRead,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::TransportReady => EventKind::TransportReady,
            Event::Advertisement(_) => EventKind::Advertisement,
            Event::LinkEstablished(_) => EventKind::LinkEstablished,
            Event::LinkDisconnected => EventKind::LinkDisconnected,
            Event::ServiceConnected(_) => EventKind::ServiceConnected,
            Event::ValueRead(_) => EventKind::ValueRead,
        }
    }
}
