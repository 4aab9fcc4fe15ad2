//! Scan/connect orchestrator
//!
//! Owns the application state, the current candidate and the eviction cache.
//! Each event is matched against the current state in a single transition
//! table; the matching arm updates state and returns the actions to issue.
//! Pairs without an arm are stale and change nothing.

use log::{debug, info, trace, warn};

use crate::config::AppConfig;
use crate::config::target_config::{DisconnectPolicy, FixedTargetConfig};
use crate::core::actions::Action;
use crate::core::address::{AddressType, DeviceAddress};
use crate::core::blacklist::EvictionCache;
use crate::core::events::{
    AdvertisingReport, ConnectionHandle, Event, LevelReading, ServiceConnectResult, SessionId,
};
use crate::state::OrchestratorState;

pub struct Orchestrator {
    state: OrchestratorState,
    /// Operator-supplied address; bypasses scanning when set.
    target: Option<DeviceAddress>,
    fixed_target: FixedTargetConfig,
    blacklist: EvictionCache,
    candidate: Option<AdvertisingReport>,
    handle: ConnectionHandle,
    session: Option<SessionId>,
    next_session: u16,
    /// Consecutive reconnects against the fixed target.
    retries: u32,
    terminated: bool,
}

impl Orchestrator {
    pub fn new(
        target: Option<DeviceAddress>,
        fixed_target: FixedTargetConfig,
        blacklist: EvictionCache,
    ) -> Self {
        Self {
            state: OrchestratorState::Idle,
            target,
            fixed_target,
            blacklist,
            candidate: None,
            handle: ConnectionHandle::INVALID,
            session: None,
            next_session: 1,
            retries: 0,
            terminated: false,
        }
    }

    pub fn from_config(config: &AppConfig, target: Option<DeviceAddress>) -> Self {
        Self::new(
            target,
            config.fixed_target.clone(),
            EvictionCache::new(config.blacklist_capacity),
        )
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn target(&self) -> Option<DeviceAddress> {
        self.target
    }

    pub fn candidate(&self) -> Option<&AdvertisingReport> {
        self.candidate.as_ref()
    }

    pub fn blacklist(&self) -> &EvictionCache {
        &self.blacklist
    }

    pub fn connection_handle(&self) -> ConnectionHandle {
        self.handle
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// True once the run has ended, either after losing the fixed target or
    /// after `shutdown`.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Applies one event and returns the actions to issue, in order.
    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        use OrchestratorState::*;

        if self.terminated {
            trace!("Run finished, dropping {:?}", event.kind());
            return Vec::new();
        }

        match (self.state, event) {
            (Idle, Event::TransportReady) => self.on_transport_ready(),
            (AwaitingScanResult, Event::Advertisement(report)) => self.on_advertisement(report),
            (AwaitingConnection, Event::LinkEstablished(handle)) => {
                self.on_link_established(handle)
            }
            (Connected, Event::ServiceConnected(result)) if self.is_current(result.session) => {
                self.on_service_connected(result)
            }
            (Connected, Event::ValueRead(reading)) if self.is_current(reading.session) => {
                self.on_value_read(reading);
                Vec::new()
            }
            (_, Event::LinkDisconnected) => self.on_link_disconnected(),
            (state, event) => {
                debug!("Dropping stale {:?} in state {}", event.kind(), state);
                Vec::new()
            }
        }
    }

    /// Tears down whatever is in flight and ends the run.
    pub fn shutdown(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.state == OrchestratorState::AwaitingScanResult {
            actions.push(Action::StopScan);
        }
        if let Some(session) = self.session.take() {
            actions.push(Action::ServiceDisconnect(session));
        }
        if self.handle.is_valid() {
            actions.push(Action::Disconnect(self.handle));
        }
        self.state = OrchestratorState::Idle;
        self.terminated = true;
        actions
    }

    fn is_current(&self, session: SessionId) -> bool {
        self.session == Some(session)
    }

    fn on_transport_ready(&mut self) -> Vec<Action> {
        match self.target {
            Some(address) => {
                info!("Connect to {}", address);
                self.state = OrchestratorState::AwaitingConnection;
                vec![Action::Connect {
                    address,
                    address_type: AddressType::Public,
                    attempt: 0,
                }]
            }
            None => {
                info!("Start scanning!");
                self.start_scan()
            }
        }
    }

    fn on_advertisement(&mut self, report: AdvertisingReport) -> Vec<Action> {
        if self.blacklist.contains(&report.address) {
            trace!("Ignoring blacklisted {}", report.address);
            return Vec::new();
        }
        info!("    * {}", report.summary());

        let address = report.address;
        let address_type = report.address_type;
        self.candidate = Some(report);
        self.state = OrchestratorState::AwaitingConnection;

        info!("Stop scan. Connect to device with addr {}.", address);
        vec![
            Action::StopScan,
            Action::Connect {
                address,
                address_type,
                attempt: 0,
            },
        ]
    }

    fn on_link_established(&mut self, handle: ConnectionHandle) -> Vec<Action> {
        let session = self.allocate_session();
        self.handle = handle;
        self.session = Some(session);
        self.state = OrchestratorState::Connected;

        info!("Link {} established, connecting battery service {}.", handle, session);
        vec![Action::ServiceConnect { handle, session }]
    }

    fn on_service_connected(&mut self, result: ServiceConnectResult) -> Vec<Action> {
        if result.is_success() {
            info!(
                "Battery service client connected, found {} services, poll bitmap 0x{:02x}",
                result.instances, result.poll_bitmap
            );
            self.retries = 0;
            return vec![Action::ReadValue {
                session: result.session,
                instance: 0,
            }];
        }

        warn!(
            "Battery service client connection failed, status 0x{:02x}.",
            result.status
        );
        self.session = None;
        // The cache only steers scanning; a fixed target never goes through it.
        if self.target.is_none() {
            if let Some(candidate) = &self.candidate {
                info!("{} added to blacklist (no battery service found).", candidate.address);
                self.blacklist.insert(candidate.address);
            }
        }
        self.state = OrchestratorState::AwaitingConnection;
        vec![Action::Disconnect(self.handle)]
    }

    fn on_value_read(&self, reading: LevelReading) {
        if reading.is_success() {
            info!(
                "Service index: {}, Battery level: {}",
                reading.instance, reading.level
            );
        } else {
            warn!("Battery level read failed, ATT Error 0x{:02x}", reading.att_status);
        }
    }

    fn on_link_disconnected(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.handle = ConnectionHandle::INVALID;
        if let Some(session) = self.session.take() {
            actions.push(Action::ServiceDisconnect(session));
        }

        let Some(address) = self.target else {
            match &self.candidate {
                Some(candidate) => info!("Disconnected {}", candidate.address),
                None => info!("Disconnected"),
            }
            info!("Restart scan.");
            actions.extend(self.start_scan());
            return actions;
        };

        info!("Disconnected {}", address);
        let policy = &self.fixed_target;
        if policy.on_disconnect == DisconnectPolicy::Retry && self.retries < policy.max_retries {
            self.retries += 1;
            info!(
                "Reconnecting to {} (attempt {}/{})",
                address, self.retries, policy.max_retries
            );
            self.state = OrchestratorState::AwaitingConnection;
            actions.push(Action::Connect {
                address,
                address_type: AddressType::Public,
                attempt: self.retries,
            });
        } else {
            self.state = OrchestratorState::Idle;
            self.terminated = true;
        }
        actions
    }

    fn start_scan(&mut self) -> Vec<Action> {
        self.candidate = None;
        self.state = OrchestratorState::AwaitingScanResult;
        vec![Action::StartScan]
    }

    fn allocate_session(&mut self) -> SessionId {
        let session = SessionId::new(self.next_session);
        self.next_session = self.next_session.wrapping_add(1).max(1);
        session
    }
}
