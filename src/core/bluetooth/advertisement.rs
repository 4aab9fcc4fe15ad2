//! Advertisement payload encoding
//! The platform hands us decoded advertisement fields; advertising reports
//! carry them re-encoded as AD structures (`length, type, data`).

use bluest::AdvertisementData;
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    AD_TYPE_COMPLETE_128BIT_UUIDS, AD_TYPE_COMPLETE_16BIT_UUIDS, AD_TYPE_COMPLETE_LOCAL_NAME,
    AD_TYPE_MANUFACTURER_DATA, AD_TYPE_SERVICE_DATA_128BIT, AD_TYPE_SERVICE_DATA_16BIT,
    AD_TYPE_TX_POWER_LEVEL, BLUETOOTH_BASE_UUID,
};

/// Largest data field an AD structure can describe with its one-byte length.
const MAX_AD_DATA_LEN: usize = u8::MAX as usize - 1;

/// Returns the 16-bit alias of `uuid` when it lies in the Bluetooth base range.
pub fn short_uuid(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let alias = value >> 96;
    if alias <= u16::MAX as u128 && value & !(0xFFFF_FFFF << 96) == BLUETOOTH_BASE_UUID {
        Some(alias as u16)
    } else {
        None
    }
}

/// Builds an advertisement payload one AD structure at a time.
#[derive(Debug, Default)]
pub struct AdPayloadBuilder {
    payload: Vec<u8>,
}

impl AdPayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn structure(&mut self, ad_type: u8, data: &[u8]) -> &mut Self {
        let data = &data[..data.len().min(MAX_AD_DATA_LEN)];
        self.payload.push(data.len() as u8 + 1);
        self.payload.push(ad_type);
        self.payload.extend_from_slice(data);
        self
    }

    pub fn local_name(&mut self, name: &str) -> &mut Self {
        self.structure(AD_TYPE_COMPLETE_LOCAL_NAME, name.as_bytes())
    }

    /// Splits `services` into a 16-bit list and a 128-bit list.
    pub fn services(&mut self, services: &[Uuid]) -> &mut Self {
        let mut short = Vec::new();
        let mut long = Vec::new();
        for uuid in services {
            match short_uuid(uuid) {
                Some(alias) => short.extend_from_slice(&alias.to_le_bytes()),
                None => long.extend_from_slice(&uuid.as_u128().to_le_bytes()),
            }
        }
        if !short.is_empty() {
            self.structure(AD_TYPE_COMPLETE_16BIT_UUIDS, &short);
        }
        if !long.is_empty() {
            self.structure(AD_TYPE_COMPLETE_128BIT_UUIDS, &long);
        }
        self
    }

    pub fn service_data(&mut self, uuid: &Uuid, data: &[u8]) -> &mut Self {
        let mut field = Vec::with_capacity(16 + data.len());
        let ad_type = match short_uuid(uuid) {
            Some(alias) => {
                field.extend_from_slice(&alias.to_le_bytes());
                AD_TYPE_SERVICE_DATA_16BIT
            }
            None => {
                field.extend_from_slice(&uuid.as_u128().to_le_bytes());
                AD_TYPE_SERVICE_DATA_128BIT
            }
        };
        field.extend_from_slice(data);
        self.structure(ad_type, &field)
    }

    pub fn manufacturer_data(&mut self, company_id: u16, data: &[u8]) -> &mut Self {
        let mut field = Vec::with_capacity(2 + data.len());
        field.extend_from_slice(&company_id.to_le_bytes());
        field.extend_from_slice(data);
        self.structure(AD_TYPE_MANUFACTURER_DATA, &field)
    }

    pub fn tx_power(&mut self, dbm: i16) -> &mut Self {
        let dbm = dbm.clamp(i8::MIN as i16, i8::MAX as i16) as i8;
        self.structure(AD_TYPE_TX_POWER_LEVEL, &dbm.to_le_bytes())
    }

    pub fn build(&self) -> Vec<u8> {
        self.payload.clone()
    }
}

/// Re-encodes decoded advertisement fields into raw AD structures.
pub fn encode(adv_data: &AdvertisementData) -> Vec<u8> {
    let mut builder = AdPayloadBuilder::new();
    if let Some(name) = &adv_data.local_name {
        builder.local_name(name);
    }
    builder.services(&adv_data.services);

    let mut service_data: Vec<_> = adv_data.service_data.iter().collect();
    service_data.sort_by_key(|(uuid, _)| **uuid);
    for (uuid, data) in service_data {
        builder.service_data(uuid, data);
    }

    if let Some(manufacturer) = &adv_data.manufacturer_data {
        builder.manufacturer_data(manufacturer.company_id, &manufacturer.data);
    }
    if let Some(dbm) = adv_data.tx_power_level {
        builder.tx_power(dbm);
    }
    builder.build()
}
