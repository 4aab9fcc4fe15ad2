use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Notify;

use gatt_battery_query_lib::config::target_config::{DisconnectPolicy, FixedTargetConfig};
use gatt_battery_query_lib::core::actions::{Action, ActionExecutor, BatteryService, LinkLayer};
use gatt_battery_query_lib::core::address::{AddressType, DeviceAddress};
use gatt_battery_query_lib::core::blacklist::EvictionCache;
use gatt_battery_query_lib::core::dispatcher::{self, EventSink};
use gatt_battery_query_lib::core::error::RunError;
use gatt_battery_query_lib::core::events::{
    ADV_IND, ATT_SUCCESS, AdvertisingReport, ConnectionHandle, LevelReading, LinkEvent,
    STATUS_SUCCESS, STATUS_UNSUPPORTED_FEATURE, ServiceConnectResult, ServiceEvent, SessionId,
};
use gatt_battery_query_lib::core::orchestrator::Orchestrator;

struct Peer {
    address: DeviceAddress,
    battery: Option<u8>,
}

/// Simulated radio environment that answers every action with the events a
/// real transport would produce, and records the actions it was given.
struct SimulatedTransport {
    sink: EventSink,
    peers: Vec<Peer>,
    actions: Vec<Action>,
    links: HashMap<ConnectionHandle, DeviceAddress>,
    next_handle: u16,
    refuse_connections: bool,
    drop_link_after_read: bool,
    level_read: Arc<Notify>,
}

impl SimulatedTransport {
    fn new(sink: EventSink, peers: Vec<Peer>) -> Self {
        Self {
            sink,
            peers,
            actions: Vec::new(),
            links: HashMap::new(),
            next_handle: 1,
            refuse_connections: false,
            drop_link_after_read: false,
            level_read: Arc::new(Notify::new()),
        }
    }

    fn peer(&self, address: DeviceAddress) -> Option<&Peer> {
        self.peers.iter().find(|peer| peer.address == address)
    }
}

#[async_trait]
impl LinkLayer for SimulatedTransport {
    async fn start_scan(&mut self) -> Result<()> {
        self.actions.push(Action::StartScan);
        for peer in &self.peers {
            self.sink.link(LinkEvent::Advertisement(AdvertisingReport {
                address: peer.address,
                address_type: AddressType::Random,
                event_type: ADV_IND,
                rssi: -50,
                data: vec![0x02, 0x01, 0x06],
            }));
        }
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<()> {
        self.actions.push(Action::StopScan);
        Ok(())
    }

    async fn connect(
        &mut self,
        address: DeviceAddress,
        address_type: AddressType,
        attempt: u32,
    ) -> Result<()> {
        self.actions.push(Action::Connect {
            address,
            address_type,
            attempt,
        });
        if self.refuse_connections || self.peer(address).is_none() {
            self.sink.link(LinkEvent::attempt_failed());
            return Ok(());
        }
        let handle = ConnectionHandle::new(self.next_handle);
        self.next_handle += 1;
        self.links.insert(handle, address);
        self.sink.link(LinkEvent::LinkEstablished { handle });
        Ok(())
    }

    async fn disconnect(&mut self, handle: ConnectionHandle) -> Result<()> {
        self.actions.push(Action::Disconnect(handle));
        if self.links.remove(&handle).is_some() {
            self.sink.link(LinkEvent::LinkDisconnected { handle });
        }
        Ok(())
    }
}

#[async_trait]
impl BatteryService for SimulatedTransport {
    async fn connect(&mut self, handle: ConnectionHandle, session: SessionId) -> Result<()> {
        self.actions.push(Action::ServiceConnect { handle, session });
        let has_battery = self
            .links
            .get(&handle)
            .and_then(|address| self.peer(*address))
            .is_some_and(|peer| peer.battery.is_some());
        let (status, instances) = if has_battery {
            (STATUS_SUCCESS, 1)
        } else {
            (STATUS_UNSUPPORTED_FEATURE, 0)
        };
        self.sink.service(ServiceEvent::Connected(ServiceConnectResult {
            session,
            status,
            instances,
            poll_bitmap: 0,
        }));
        Ok(())
    }

    async fn disconnect(&mut self, session: SessionId) -> Result<()> {
        self.actions.push(Action::ServiceDisconnect(session));
        Ok(())
    }

    async fn read_level(&mut self, session: SessionId, instance: u8) -> Result<()> {
        self.actions.push(Action::ReadValue { session, instance });
        let level = self
            .links
            .values()
            .find_map(|address| self.peer(*address).and_then(|peer| peer.battery))
            .unwrap_or(0);
        self.sink.service(ServiceEvent::Level(LevelReading {
            session,
            instance,
            level,
            att_status: ATT_SUCCESS,
        }));
        if self.drop_link_after_read {
            let handles: Vec<_> = self.links.drain().map(|(handle, _)| handle).collect();
            for handle in handles {
                self.sink.link(LinkEvent::LinkDisconnected { handle });
            }
        }
        self.level_read.notify_one();
        Ok(())
    }
}

fn addr(last: u8) -> DeviceAddress {
    DeviceAddress::new([0xD4, 0x36, 0x39, 0x00, 0x00, last])
}

fn fixed_target(policy: DisconnectPolicy, max_retries: u32) -> FixedTargetConfig {
    FixedTargetConfig {
        on_disconnect: policy,
        max_retries,
        retry_delay_ms: 0,
    }
}

#[tokio::test]
async fn scan_skips_device_without_battery_service() {
    let (sink, mut dispatcher) = dispatcher::channel();
    let transport = SimulatedTransport::new(
        sink.clone(),
        vec![
            Peer {
                address: addr(1),
                battery: None,
            },
            Peer {
                address: addr(2),
                battery: Some(77),
            },
        ],
    );
    let level_read = transport.level_read.clone();
    let mut executor = ActionExecutor::new(transport);
    let mut orchestrator =
        Orchestrator::new(None, FixedTargetConfig::default(), EvictionCache::default());

    sink.link(LinkEvent::TransportReady);
    let result = dispatcher
        .run(&mut orchestrator, &mut executor, async move {
            level_read.notified().await
        })
        .await;
    assert_eq!(result, Ok(()));

    let first = ConnectionHandle::new(1);
    let second = ConnectionHandle::new(2);
    assert_eq!(
        executor.transport().actions,
        vec![
            Action::StartScan,
            Action::StopScan,
            Action::Connect {
                address: addr(1),
                address_type: AddressType::Random,
                attempt: 0,
            },
            Action::ServiceConnect {
                handle: first,
                session: SessionId::new(1),
            },
            Action::Disconnect(first),
            Action::StartScan,
            Action::StopScan,
            Action::Connect {
                address: addr(2),
                address_type: AddressType::Random,
                attempt: 0,
            },
            Action::ServiceConnect {
                handle: second,
                session: SessionId::new(2),
            },
            Action::ReadValue {
                session: SessionId::new(2),
                instance: 0,
            },
            Action::ServiceDisconnect(SessionId::new(2)),
            Action::Disconnect(second),
        ]
    );
    assert!(orchestrator.blacklist().contains(&addr(1)));
    assert!(!orchestrator.blacklist().contains(&addr(2)));
}

#[tokio::test]
async fn fixed_target_is_lost_after_remote_disconnect() {
    let (sink, mut dispatcher) = dispatcher::channel();
    let mut transport = SimulatedTransport::new(
        sink.clone(),
        vec![Peer {
            address: addr(9),
            battery: Some(40),
        }],
    );
    transport.drop_link_after_read = true;
    let mut executor = ActionExecutor::new(transport);
    let mut orchestrator = Orchestrator::new(
        Some(addr(9)),
        fixed_target(DisconnectPolicy::Terminate, 5),
        EvictionCache::default(),
    );

    sink.link(LinkEvent::TransportReady);
    let result = dispatcher
        .run(&mut orchestrator, &mut executor, std::future::pending())
        .await;
    assert_eq!(result, Err(RunError::TargetLost { address: addr(9) }));

    let actions = &executor.transport().actions;
    assert_eq!(
        actions.first(),
        Some(&Action::Connect {
            address: addr(9),
            address_type: AddressType::Public,
            attempt: 0,
        })
    );
    assert!(!actions.contains(&Action::StartScan));
    assert_eq!(actions.last(), Some(&Action::ServiceDisconnect(SessionId::new(1))));
    assert!(orchestrator.blacklist().is_empty());
}

#[tokio::test]
async fn fixed_target_retries_then_gives_up() {
    let (sink, mut dispatcher) = dispatcher::channel();
    let mut transport = SimulatedTransport::new(sink.clone(), Vec::new());
    transport.refuse_connections = true;
    let mut executor = ActionExecutor::new(transport);
    let mut orchestrator = Orchestrator::new(
        Some(addr(3)),
        fixed_target(DisconnectPolicy::Retry, 2),
        EvictionCache::default(),
    );

    sink.link(LinkEvent::TransportReady);
    let result = dispatcher
        .run(&mut orchestrator, &mut executor, std::future::pending())
        .await;
    assert_eq!(result, Err(RunError::TargetLost { address: addr(3) }));

    let attempts: Vec<u32> = executor
        .transport()
        .actions
        .iter()
        .filter_map(|action| match action {
            Action::Connect { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![0, 1, 2]);
}

#[tokio::test]
async fn closed_channel_ends_the_run() {
    let (sink, mut dispatcher) = dispatcher::channel();
    let (unrelated, _unrelated_queue) = dispatcher::channel();
    let mut executor = ActionExecutor::new(SimulatedTransport::new(unrelated, Vec::new()));
    let mut orchestrator =
        Orchestrator::new(None, FixedTargetConfig::default(), EvictionCache::default());
    drop(sink);

    let result = dispatcher
        .run(&mut orchestrator, &mut executor, std::future::pending())
        .await;
    assert_eq!(result, Err(RunError::TransportClosed));
    assert!(executor.transport().actions.is_empty());
}

#[tokio::test]
async fn events_before_transport_ready_are_ignored() {
    let (sink, mut dispatcher) = dispatcher::channel();
    let transport = SimulatedTransport::new(
        sink.clone(),
        vec![Peer {
            address: addr(5),
            battery: Some(10),
        }],
    );
    let level_read = transport.level_read.clone();
    let mut executor = ActionExecutor::new(transport);
    let mut orchestrator =
        Orchestrator::new(None, FixedTargetConfig::default(), EvictionCache::default());

    sink.link(LinkEvent::LinkEstablished {
        handle: ConnectionHandle::new(42),
    });
    sink.service(ServiceEvent::Other { code: 0x7f });
    sink.link(LinkEvent::TransportReady);

    let result = dispatcher
        .run(&mut orchestrator, &mut executor, async move {
            level_read.notified().await
        })
        .await;
    assert_eq!(result, Ok(()));
    assert_eq!(executor.transport().actions.first(), Some(&Action::StartScan));
}
