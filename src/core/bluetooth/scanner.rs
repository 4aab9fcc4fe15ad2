use anyhow::Result;
use bluest::{Adapter, AdvertisingDevice};
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::address::DeviceAddress;
use crate::core::bluetooth::advertisement;
use crate::core::bluetooth::constants::RSSI_UNAVAILABLE;
use crate::core::bluetooth::types::DeviceCache;
use crate::core::dispatcher::EventSink;
use crate::core::events::{ADV_IND, ADV_NONCONN_IND, AdvertisingReport, LinkEvent};

pub struct BluetoothScanner {
    adapter: Adapter,
    devices: DeviceCache,
    sink: EventSink,
    root: CancellationToken,
    cancel_token: CancellationToken,
    scan_task_handle: Option<JoinHandle<()>>,
}

impl BluetoothScanner {
    pub fn new(
        adapter: Adapter,
        devices: DeviceCache,
        sink: EventSink,
        root: CancellationToken,
    ) -> Self {
        Self {
            adapter,
            devices,
            sink,
            cancel_token: root.child_token(),
            root,
            scan_task_handle: None,
        }
    }

    pub async fn start_scan(&mut self) -> Result<()> {
        if self.scan_task_handle.is_some() {
            self.stop_scan().await?;
        }

        self.cancel_token = self.root.child_token();
        let cancel_token_for_task = self.cancel_token.clone();
        let adapter_for_task = self.adapter.clone();
        let devices_for_task = self.devices.clone();
        let sink_for_task = self.sink.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = Self::internal_scan_task(
                adapter_for_task,
                devices_for_task,
                sink_for_task,
                cancel_token_for_task,
            )
            .await
            {
                error!("Bluetooth scan failed: {}", e);
            }
        });
        self.scan_task_handle = Some(handle);

        info!("Device scan task started.");
        Ok(())
    }

    /// Forwards every advertisement as a report until cancelled
    async fn internal_scan_task(
        adapter: Adapter,
        devices: DeviceCache,
        sink: EventSink,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        info!("Starting bluetooth scan");
        let mut scan_stream = adapter.scan(&[]).await?;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            let Some(report) = Self::to_report(&discovered_device) else {
                                debug!(
                                    "Skipping device {} without a usable address",
                                    discovered_device.device.id()
                                );
                                continue;
                            };
                            devices
                                .lock()
                                .await
                                .insert(report.address, discovered_device.device.clone());
                            sink.link(LinkEvent::Advertisement(report));
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
        Ok(())
    }

    pub async fn stop_scan(&mut self) -> Result<()> {
        info!("Stopping Bluetooth scan.");
        self.cancel_token.cancel();

        if let Some(handle) = self.scan_task_handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Scan task finished with an unexpected join error: {:?}", e);
                }
            }
        } else {
            debug!("No active scan task handle found to wait for.");
        }
        Ok(())
    }

    /// Converts a discovered device into an advertising report
    pub fn to_report(discovered: &AdvertisingDevice) -> Option<AdvertisingReport> {
        let id = discovered.device.id().to_string();
        let (address, address_type) = DeviceAddress::from_platform_id(&id)?;
        let adv_data = &discovered.adv_data;

        Some(AdvertisingReport {
            address,
            address_type,
            event_type: if adv_data.is_connectable {
                ADV_IND
            } else {
                ADV_NONCONN_IND
            },
            rssi: discovered.rssi.map(clamp_rssi).unwrap_or(RSSI_UNAVAILABLE),
            data: advertisement::encode(adv_data),
        })
    }
}

fn clamp_rssi(rssi: i16) -> i8 {
    rssi.clamp(i8::MIN as i16, i8::MAX as i16) as i8
}
