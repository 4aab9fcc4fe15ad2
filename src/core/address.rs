//! Link-layer device addresses
//! Parsing, formatting and platform-id extraction for 48-bit BLE addresses.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 6-byte link-layer address, most significant octet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceAddress([u8; 6]);

/// Address type tag carried alongside an address when connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    #[default]
    Public,
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("expected six colon-separated octets, got {0}")]
    OctetCount(usize),
    #[error("invalid octet {0:?}")]
    InvalidOctet(String),
}

impl DeviceAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Extracts an address from a platform-specific device identifier.
    ///
    /// BlueZ and WinRT ids embed the MAC (`dev_AA_BB_CC_DD_EE_FF`,
    /// `BluetoothLE#...-aa:bb:cc:dd:ee:ff`); CoreBluetooth only exposes a
    /// UUID, whose 12-digit node field is used instead and tagged random.
    ///
    /// Platform ids do not expose the address type, so MAC-form ids are
    /// always tagged public even when the peer advertises a random address.
    /// `bluest` connects through the platform device handle, so the tag only
    /// appears in reports and logs.
    pub fn from_platform_id(id: &str) -> Option<(Self, AddressType)> {
        static MAC: OnceLock<Regex> = OnceLock::new();
        static UUID_NODE: OnceLock<Regex> = OnceLock::new();

        let mac = MAC.get_or_init(|| {
            Regex::new(r"([0-9A-Fa-f]{2})[:_-]([0-9A-Fa-f]{2})[:_-]([0-9A-Fa-f]{2})[:_-]([0-9A-Fa-f]{2})[:_-]([0-9A-Fa-f]{2})[:_-]([0-9A-Fa-f]{2})")
                .expect("static MAC pattern")
        });
        if let Some(caps) = mac.captures_iter(id).last() {
            let mut bytes = [0u8; 6];
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = u8::from_str_radix(&caps[i + 1], 16).ok()?;
            }
            return Some((Self(bytes), AddressType::Public));
        }

        let node = UUID_NODE.get_or_init(|| {
            Regex::new(r"[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-([0-9A-Fa-f]{12})")
                .expect("static UUID pattern")
        });
        let caps = node.captures(id)?;
        let digits = &caps[1];
        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some((Self(bytes), AddressType::Random))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<&str> = s.trim().split(':').collect();
        if octets.len() != 6 {
            return Err(AddressParseError::OctetCount(octets.len()));
        }

        let mut bytes = [0u8; 6];
        for (byte, octet) in bytes.iter_mut().zip(&octets) {
            if octet.is_empty() || octet.len() > 2 {
                return Err(AddressParseError::InvalidOctet(octet.to_string()));
            }
            *byte = u8::from_str_radix(octet, 16)
                .map_err(|_| AddressParseError::InvalidOctet(octet.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Public => f.write_str("public"),
            AddressType::Random => f.write_str("random"),
        }
    }
}
