//! Event dispatcher
//! Link-layer and battery service events share one ordered queue. The
//! dispatcher drains it, hands each event to the orchestrator and issues the
//! resulting actions before taking the next event.

use std::future::Future;

use log::{debug, info, trace};
use tokio::sync::mpsc;

use crate::core::actions::{ActionExecutor, BatteryService, LinkLayer};
use crate::core::error::RunError;
use crate::core::events::{Event, LinkEvent, ServiceEvent};
use crate::core::orchestrator::Orchestrator;

/// An event tagged with the source that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Link(LinkEvent),
    Service(ServiceEvent),
}

/// Cloneable producer handle given to the transport.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl EventSink {
    pub fn link(&self, event: LinkEvent) {
        if self.tx.send(Inbound::Link(event)).is_err() {
            trace!("Dispatcher closed, dropping link event");
        }
    }

    pub fn service(&self, event: ServiceEvent) {
        if self.tx.send(Inbound::Service(event)).is_err() {
            trace!("Dispatcher closed, dropping service event");
        }
    }
}

pub struct EventDispatcher {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

/// Creates the shared queue.
pub fn channel() -> (EventSink, EventDispatcher) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, EventDispatcher { rx })
}

impl EventDispatcher {
    /// Maps a tagged event onto the orchestrator's vocabulary. Event kinds the
    /// orchestrator has no use for map to `None`.
    pub fn route(inbound: Inbound) -> Option<Event> {
        match inbound {
            Inbound::Link(LinkEvent::TransportReady) => Some(Event::TransportReady),
            Inbound::Link(LinkEvent::Advertisement(report)) => Some(Event::Advertisement(report)),
            Inbound::Link(LinkEvent::LinkEstablished { handle }) => {
                Some(Event::LinkEstablished(handle))
            }
            Inbound::Link(LinkEvent::LinkDisconnected { .. }) => Some(Event::LinkDisconnected),
            Inbound::Service(ServiceEvent::Connected(result)) => {
                Some(Event::ServiceConnected(result))
            }
            Inbound::Service(ServiceEvent::Level(reading)) => Some(Event::ValueRead(reading)),
            Inbound::Link(LinkEvent::Other { code })
            | Inbound::Service(ServiceEvent::Other { code }) => {
                trace!("Ignoring event code 0x{:02x}", code);
                None
            }
        }
    }

    /// Next routable event in arrival order, or `None` once every sink is gone.
    pub async fn next_event(&mut self) -> Option<Event> {
        while let Some(inbound) = self.rx.recv().await {
            if let Some(event) = Self::route(inbound) {
                return Some(event);
            }
        }
        None
    }

    /// Runs until `shutdown` resolves, the fixed target is lost, or the
    /// transport goes away.
    pub async fn run<T, F>(
        &mut self,
        orchestrator: &mut Orchestrator,
        executor: &mut ActionExecutor<T>,
        shutdown: F,
    ) -> Result<(), RunError>
    where
        T: LinkLayer + BatteryService,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let event = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    let actions = orchestrator.shutdown();
                    executor.execute_all(actions).await;
                    return Ok(());
                }
                event = self.next_event() => event,
            };

            let Some(event) = event else {
                return Err(RunError::TransportClosed);
            };

            debug!("{:?} in state {}", event.kind(), orchestrator.state());
            let actions = orchestrator.handle(event);
            executor.execute_all(actions).await;

            if orchestrator.is_terminated() {
                return match orchestrator.target() {
                    Some(address) => Err(RunError::TargetLost { address }),
                    None => Ok(()),
                };
            }
        }
    }
}
