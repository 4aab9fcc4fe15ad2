//! Outbound actions issued by the orchestrator
//! This module contains the actions the orchestrator can request, the
//! transport traits that carry them out, and the executor that maps one
//! onto the other.

use anyhow::Result;
use log::{debug, error};

use crate::core::address::{AddressType, DeviceAddress};
use crate::core::events::{ConnectionHandle, SessionId};

/// Requests from the orchestrator to its collaborators.
///
/// Every action is a non-blocking request; its outcome arrives later as an
/// inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start an unfiltered scan.
    StartScan,
    StopScan,
    /// Connect to a peer. `attempt` is zero for a first attempt and counts
    /// consecutive retries against a fixed target.
    Connect {
        address: DeviceAddress,
        address_type: AddressType,
        attempt: u32,
    },
    Disconnect(ConnectionHandle),
    /// Open a battery service session on an established link.
    ServiceConnect {
        handle: ConnectionHandle,
        session: SessionId,
    },
    ServiceDisconnect(SessionId),
    ReadValue {
        session: SessionId,
        instance: u8,
    },
}

/// Link-layer collaborator: scanning and connection management.
#[async_trait::async_trait]
pub trait LinkLayer: Send {
    async fn start_scan(&mut self) -> Result<()>;

    async fn stop_scan(&mut self) -> Result<()>;

    async fn connect(
        &mut self,
        address: DeviceAddress,
        address_type: AddressType,
        attempt: u32,
    ) -> Result<()>;

    async fn disconnect(&mut self, handle: ConnectionHandle) -> Result<()>;
}

/// Battery service client collaborator.
#[async_trait::async_trait]
pub trait BatteryService: Send {
    async fn connect(&mut self, handle: ConnectionHandle, session: SessionId) -> Result<()>;

    async fn disconnect(&mut self, session: SessionId) -> Result<()>;

    async fn read_level(&mut self, session: SessionId, instance: u8) -> Result<()>;
}

/// Executes orchestrator actions against a transport
pub struct ActionExecutor<T: LinkLayer + BatteryService> {
    transport: T,
}

impl<T: LinkLayer + BatteryService> ActionExecutor<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issue a single action
    pub async fn execute(&mut self, action: Action) -> Result<()> {
        debug!("Issuing {:?}", action);
        match action {
            Action::StartScan => self.transport.start_scan().await,
            Action::StopScan => self.transport.stop_scan().await,
            Action::Connect {
                address,
                address_type,
                attempt,
            } => {
                LinkLayer::connect(&mut self.transport, address, address_type, attempt).await
            }
            Action::Disconnect(handle) => LinkLayer::disconnect(&mut self.transport, handle).await,
            Action::ServiceConnect { handle, session } => {
                BatteryService::connect(&mut self.transport, handle, session).await
            }
            Action::ServiceDisconnect(session) => {
                BatteryService::disconnect(&mut self.transport, session).await
            }
            Action::ReadValue { session, instance } => {
                self.transport.read_level(session, instance).await
            }
        }
    }

    /// Issue actions in order. A failure is logged and does not stop the
    /// remaining actions.
    pub async fn execute_all(&mut self, actions: Vec<Action>) {
        for action in actions {
            if let Err(e) = self.execute(action).await {
                error!("Failed to issue {:?}: {}", action, e);
            }
        }
    }
}
