//! Battery service client
//! This module discovers battery service instances on an established link,
//! keeps their levels flowing through notifications or polling, and serves
//! explicit level reads.

use std::fmt::Display;
use std::time::Duration;

use anyhow::Result;
use bluest::Device;
use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::constants::{
    MAX_BATTERY_INSTANCES, UUID_BATTERY_LEVEL, UUID_BATTERY_SERVICE,
};
use crate::core::bluetooth::types::{BatteryInstance, LinkTable, SessionRecord, SessionTable};
use crate::core::dispatcher::EventSink;
use crate::core::events::{
    ATT_INVALID_HANDLE, ATT_SUCCESS, ATT_UNLIKELY_ERROR, ConnectionHandle, LevelReading,
    STATUS_SUCCESS, STATUS_UNSPECIFIED_ERROR, STATUS_UNSUPPORTED_FEATURE, ServiceConnectResult,
    ServiceEvent, SessionId,
};

#[derive(Clone)]
pub struct BatteryClient {
    links: LinkTable,
    sessions: SessionTable,
    sink: EventSink,
    root: CancellationToken,
    poll_interval: Duration,
}

impl BatteryClient {
    pub fn new(
        links: LinkTable,
        sessions: SessionTable,
        sink: EventSink,
        root: CancellationToken,
        poll_interval_ms: u64,
    ) -> Self {
        Self {
            links,
            sessions,
            sink,
            root,
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }

    /// Opens a session on `handle`. Discovery runs in the background and ends
    /// with a service-connect result.
    pub async fn connect(&self, handle: ConnectionHandle, session: SessionId) -> Result<()> {
        let device = self
            .links
            .lock()
            .await
            .get(&handle)
            .map(|link| link.device.clone());
        let Some(device) = device else {
            warn!("No link {} for battery session {}", handle, session);
            self.report_connect(session, STATUS_UNSPECIFIED_ERROR, &[]);
            return Ok(());
        };

        let cancel = self.root.child_token();
        self.sessions.lock().await.insert(
            session,
            SessionRecord {
                handle,
                cancel: cancel.clone(),
                instances: Vec::new(),
            },
        );

        let client = self.clone();
        tokio::spawn(async move {
            client.open_session(device, session, cancel).await;
        });
        Ok(())
    }

    pub async fn disconnect(&self, session: SessionId) -> Result<()> {
        match self.sessions.lock().await.remove(&session) {
            Some(record) => {
                info!("Battery session {} on link {} closed", session, record.handle);
                record.cancel.cancel();
            }
            None => debug!("Battery session {} already closed", session),
        }
        Ok(())
    }

    /// Reads one instance; the value arrives as a value-read result.
    pub async fn read_level(&self, session: SessionId, instance: u8) -> Result<()> {
        let characteristic = {
            let sessions = self.sessions.lock().await;
            let Some(record) = sessions.get(&session) else {
                debug!("Read on closed battery session {}", session);
                return Ok(());
            };
            record
                .instances
                .get(instance as usize)
                .map(|found| found.characteristic.clone())
        };

        let Some(characteristic) = characteristic else {
            self.sink.service(ServiceEvent::Level(LevelReading {
                session,
                instance,
                level: 0,
                att_status: ATT_INVALID_HANDLE,
            }));
            return Ok(());
        };

        let sink = self.sink.clone();
        tokio::spawn(async move {
            let value = characteristic.read().await;
            sink.service(ServiceEvent::Level(level_reading(session, instance, value)));
        });
        Ok(())
    }

    async fn open_session(self, device: Device, session: SessionId, cancel: CancellationToken) {
        let discovered = tokio::select! {
            result = discover_instances(&device) => result,
            _ = cancel.cancelled() => return,
        };

        let instances = match discovered {
            Ok(instances) if !instances.is_empty() => instances,
            Ok(_) => {
                info!("No battery service on {}", device.id());
                self.close_failed(session, STATUS_UNSUPPORTED_FEATURE).await;
                return;
            }
            Err(e) => {
                warn!("Battery service discovery on {} failed: {}", device.id(), e);
                self.close_failed(session, STATUS_UNSPECIFIED_ERROR).await;
                return;
            }
        };

        {
            let mut sessions = self.sessions.lock().await;
            let Some(record) = sessions.get_mut(&session) else {
                return;
            };
            record.instances = instances.clone();
        }
        self.report_connect(session, STATUS_SUCCESS, &instances);

        for (index, instance) in instances.into_iter().enumerate() {
            let sink = self.sink.clone();
            let cancel = cancel.clone();
            let poll_interval = self.poll_interval;
            tokio::spawn(async move {
                watch_instance(sink, session, index as u8, instance, poll_interval, cancel).await;
            });
        }
    }

    async fn close_failed(&self, session: SessionId, status: u8) {
        if self.sessions.lock().await.remove(&session).is_some() {
            self.report_connect(session, status, &[]);
        }
    }

    fn report_connect(&self, session: SessionId, status: u8, instances: &[BatteryInstance]) {
        self.sink.service(ServiceEvent::Connected(ServiceConnectResult {
            session,
            status,
            instances: instances.len() as u8,
            poll_bitmap: poll_bitmap(instances),
        }));
    }
}

/// Bit `n` is set when instance `n` is polled.
fn poll_bitmap(instances: &[BatteryInstance]) -> u8 {
    instances
        .iter()
        .take(MAX_BATTERY_INSTANCES)
        .enumerate()
        .filter(|(_, instance)| instance.polled)
        .fold(0, |bitmap, (index, _)| bitmap | (1 << index))
}

async fn discover_instances(device: &Device) -> Result<Vec<BatteryInstance>> {
    let services = device.discover_services_with_uuid(UUID_BATTERY_SERVICE).await?;
    let mut instances = Vec::new();

    for service in services.iter().take(MAX_BATTERY_INSTANCES) {
        let characteristics = service
            .discover_characteristics_with_uuid(UUID_BATTERY_LEVEL)
            .await?;
        let Some(characteristic) = characteristics.into_iter().next() else {
            debug!("Battery service without a level characteristic, skipping");
            continue;
        };
        let polled = !characteristic.properties().await?.notify;
        instances.push(BatteryInstance {
            characteristic,
            polled,
        });
    }
    Ok(instances)
}

/// Streams level updates for one instance until the session is cancelled.
async fn watch_instance(
    sink: EventSink,
    session: SessionId,
    index: u8,
    instance: BatteryInstance,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let characteristic = instance.characteristic;

    if !instance.polled {
        match characteristic.notify().await {
            Ok(stream) => {
                tokio::pin!(stream);
                loop {
                    tokio::select! {
                        value = stream.next() => match value {
                            Some(value) => {
                                sink.service(ServiceEvent::Level(level_reading(session, index, value)));
                            }
                            None => {
                                debug!("Notification stream for instance {} ended", index);
                                return;
                            }
                        },
                        _ = cancel.cancelled() => return,
                    }
                }
            }
            Err(e) => warn!(
                "Subscribing to battery instance {} failed ({}), polling instead",
                index, e
            ),
        }
    }

    let mut ticker = tokio::time::interval(poll_interval);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let value = characteristic.read().await;
                sink.service(ServiceEvent::Level(level_reading(session, index, value)));
            }
            _ = cancel.cancelled() => return,
        }
    }
}

/// Maps a raw characteristic value onto a level reading.
fn level_reading<E: Display>(
    session: SessionId,
    instance: u8,
    value: std::result::Result<Vec<u8>, E>,
) -> LevelReading {
    let (level, att_status) = match value {
        Ok(bytes) => match bytes.first() {
            Some(&level) => (level, ATT_SUCCESS),
            None => (0, ATT_UNLIKELY_ERROR),
        },
        Err(e) => {
            debug!("Battery level read on instance {} failed: {}", instance, e);
            (0, ATT_UNLIKELY_ERROR)
        }
    };
    LevelReading {
        session,
        instance,
        level,
        att_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_takes_first_byte() {
        let reading = level_reading::<String>(SessionId::new(2), 1, Ok(vec![87, 1]));
        assert_eq!(reading.level, 87);
        assert_eq!(reading.instance, 1);
        assert!(reading.is_success());
    }

    #[test]
    fn empty_value_is_an_error() {
        let reading = level_reading::<String>(SessionId::new(2), 0, Ok(Vec::new()));
        assert_eq!(reading.att_status, ATT_UNLIKELY_ERROR);
    }

    #[test]
    fn failed_read_is_an_error() {
        let reading = level_reading(SessionId::new(2), 0, Err("link lost".to_string()));
        assert!(!reading.is_success());
        assert_eq!(reading.level, 0);
    }
}
