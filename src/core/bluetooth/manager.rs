//! Bluetooth manager
//! This module provides the transport the orchestrator drives: scanning,
//! links and battery sessions on the default adapter.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bluest::Adapter;
use log::info;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::actions::{BatteryService, LinkLayer};
use crate::core::address::{AddressType, DeviceAddress};
use crate::core::bluetooth::battery::BatteryClient;
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::dispatcher::EventSink;
use crate::core::events::{ConnectionHandle, LinkEvent, SessionId};

/// Manages Bluetooth operations
pub struct BluetoothManager {
    /// Bluetooth scanner
    scanner: BluetoothScanner,
    /// Connection manager
    connection_manager: ConnectionManager,
    /// Battery service client
    battery_client: BatteryClient,
    /// Parent of every background task's cancellation token
    root: CancellationToken,
}

impl BluetoothManager {
    /// Waits for the default adapter, then reports transport-ready on `sink`.
    pub async fn new(sink: EventSink, config: &AppConfig) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        let root = CancellationToken::new();
        let devices = Arc::new(Mutex::new(HashMap::new()));
        let links = Arc::new(Mutex::new(HashMap::new()));
        let sessions = Arc::new(Mutex::new(HashMap::new()));

        let scanner =
            BluetoothScanner::new(adapter.clone(), devices.clone(), sink.clone(), root.clone());
        let connection_manager = ConnectionManager::new(
            adapter,
            devices,
            links.clone(),
            sink.clone(),
            root.clone(),
            config.fixed_target.retry_delay_ms,
        );
        let battery_client = BatteryClient::new(
            links,
            sessions,
            sink.clone(),
            root.clone(),
            config.battery_poll_interval_ms,
        );

        sink.link(LinkEvent::TransportReady);
        Ok(Self {
            scanner,
            connection_manager,
            battery_client,
            root,
        })
    }
}

#[async_trait]
impl LinkLayer for BluetoothManager {
    async fn start_scan(&mut self) -> Result<()> {
        self.scanner.start_scan().await
    }

    async fn stop_scan(&mut self) -> Result<()> {
        self.scanner.stop_scan().await
    }

    async fn connect(
        &mut self,
        address: DeviceAddress,
        address_type: AddressType,
        attempt: u32,
    ) -> Result<()> {
        self.connection_manager.connect(address, address_type, attempt);
        Ok(())
    }

    async fn disconnect(&mut self, handle: ConnectionHandle) -> Result<()> {
        self.connection_manager.disconnect(handle).await
    }
}

#[async_trait]
impl BatteryService for BluetoothManager {
    async fn connect(&mut self, handle: ConnectionHandle, session: SessionId) -> Result<()> {
        self.battery_client.connect(handle, session).await
    }

    async fn disconnect(&mut self, session: SessionId) -> Result<()> {
        self.battery_client.disconnect(session).await
    }

    async fn read_level(&mut self, session: SessionId, instance: u8) -> Result<()> {
        self.battery_client.read_level(session, instance).await
    }
}

/// Dropping the manager stops every scan, link and session task.
impl Drop for BluetoothManager {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
