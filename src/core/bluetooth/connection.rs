//! Bluetooth connection handling
//! This module connects to peers by address, tracks established links and
//! reports their lifetime as link events.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use bluest::{Adapter, ConnectionEvent, Device};
use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::core::address::{AddressType, DeviceAddress};
use crate::core::bluetooth::constants::CONNECTION_POLL_INTERVAL_MS;
use crate::core::bluetooth::types::{DeviceCache, LinkRecord, LinkTable};
use crate::core::dispatcher::EventSink;
use crate::core::events::{ConnectionHandle, LinkEvent};

/// Connection manager for peer links
#[derive(Clone)]
pub struct ConnectionManager {
    adapter: Adapter,
    devices: DeviceCache,
    links: LinkTable,
    sink: EventSink,
    root: CancellationToken,
    retry_delay: Duration,
    next_handle: Arc<AtomicU16>,
}

impl ConnectionManager {
    pub fn new(
        adapter: Adapter,
        devices: DeviceCache,
        links: LinkTable,
        sink: EventSink,
        root: CancellationToken,
        retry_delay_ms: u64,
    ) -> Self {
        Self {
            adapter,
            devices,
            links,
            sink,
            root,
            retry_delay: Duration::from_millis(retry_delay_ms),
            next_handle: Arc::new(AtomicU16::new(1)),
        }
    }

    /// Starts a connection attempt in the background. The outcome arrives as
    /// link-established or link-disconnected.
    pub fn connect(&self, address: DeviceAddress, address_type: AddressType, attempt: u32) {
        let handle = self.allocate_handle();
        let cancel = self.root.child_token();
        info!(
            "Connecting to {} ({}), handle {}, attempt {}",
            address, address_type, handle, attempt
        );

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_link(handle, address, attempt, cancel).await;
        });
    }

    /// Requests teardown of an established link.
    pub async fn disconnect(&self, handle: ConnectionHandle) -> Result<()> {
        let link = self
            .links
            .lock()
            .await
            .get(&handle)
            .cloned()
            .ok_or_else(|| anyhow!("No link with handle {}", handle))?;

        info!("Disconnecting from device {}", link.address);
        let result = self.adapter.disconnect_device(&link.device).await;
        link.cancel.cancel();
        result?;
        Ok(())
    }

    fn allocate_handle(&self) -> ConnectionHandle {
        loop {
            let handle = ConnectionHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
            if handle.is_valid() {
                return handle;
            }
        }
    }

    async fn run_link(
        self,
        handle: ConnectionHandle,
        address: DeviceAddress,
        attempt: u32,
        cancel: CancellationToken,
    ) {
        if attempt > 0 {
            info!("Retrying connection in {} ms...", self.retry_delay.as_millis());
            tokio::select! {
                _ = tokio::time::sleep(self.retry_delay) => {}
                _ = cancel.cancelled() => {
                    self.sink.link(LinkEvent::attempt_failed());
                    return;
                }
            }
        }

        let established = tokio::select! {
            result = self.try_connect(address) => result,
            _ = cancel.cancelled() => Err(anyhow!("connection attempt cancelled")),
        };
        let device = match established {
            Ok(device) => device,
            Err(e) => {
                warn!("Connection to {} failed: {}", address, e);
                self.sink.link(LinkEvent::attempt_failed());
                return;
            }
        };

        self.links.lock().await.insert(
            handle,
            LinkRecord {
                address,
                device: device.clone(),
                cancel: cancel.clone(),
            },
        );
        self.sink.link(LinkEvent::LinkEstablished { handle });

        self.watch_link(&device, &cancel).await;
        self.links.lock().await.remove(&handle);
        info!("Link {} to {} closed", handle, address);
        self.sink.link(LinkEvent::LinkDisconnected { handle });
    }

    /// Resolves the address to a device and connects to it
    async fn try_connect(&self, address: DeviceAddress) -> Result<Device> {
        let device = self.resolve_device(address).await?;
        if !device.is_connected().await {
            info!("Initiating connection to {}...", device.id());
            self.adapter.connect_device(&device).await?;
        }
        info!("Connection to {} successful", address);
        Ok(device)
    }

    /// Looks the address up among scanned devices, scanning for it on a miss.
    async fn resolve_device(&self, address: DeviceAddress) -> Result<Device> {
        if let Some(device) = self.devices.lock().await.get(&address).cloned() {
            return Ok(device);
        }

        debug!("Cache miss for {}, starting on-demand scan", address);
        let mut scan = self.adapter.scan(&[]).await?;
        while let Some(discovered) = scan.next().await {
            let id = discovered.device.id().to_string();
            if let Some((found, _)) = DeviceAddress::from_platform_id(&id) {
                self.devices
                    .lock()
                    .await
                    .insert(found, discovered.device.clone());
                if found == address {
                    return Ok(discovered.device);
                }
            }
        }
        Err(anyhow!("Scan ended before {} was seen", address))
    }

    /// Waits until the link drops or teardown is requested.
    async fn watch_link(&self, device: &Device, cancel: &CancellationToken) {
        match self.adapter.device_connection_events(device).await {
            Ok(events) => {
                tokio::pin!(events);
                loop {
                    tokio::select! {
                        event = events.next() => match event {
                            Some(ConnectionEvent::Connected) => continue,
                            Some(ConnectionEvent::Disconnected) | None => return,
                        },
                        _ = cancel.cancelled() => return,
                    }
                }
            }
            Err(e) => {
                debug!("Connection events unavailable ({}), polling link state", e);
                let mut ticker =
                    tokio::time::interval(Duration::from_millis(CONNECTION_POLL_INTERVAL_MS));
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if !device.is_connected().await {
                                return;
                            }
                        }
                        _ = cancel.cancelled() => return,
                    }
                }
            }
        }
    }
}
