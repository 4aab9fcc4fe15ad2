//! Application state
//! The orchestrator's position in the scan/connect cycle.

use std::fmt;

/// Where the orchestrator currently is in the scan/connect cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrchestratorState {
    /// Waiting for the transport to come up, or finished.
    #[default]
    Idle,
    /// Scanning; the next acceptable advertisement becomes the candidate.
    AwaitingScanResult,
    /// A connection was requested, or a teardown is in flight.
    AwaitingConnection,
    /// Link is up and the battery service session was requested.
    Connected,
}

impl OrchestratorState {
    pub const ALL: [OrchestratorState; 4] = [
        OrchestratorState::Idle,
        OrchestratorState::AwaitingScanResult,
        OrchestratorState::AwaitingConnection,
        OrchestratorState::Connected,
    ];
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::AwaitingScanResult => "awaiting-scan-result",
            OrchestratorState::AwaitingConnection => "awaiting-connection",
            OrchestratorState::Connected => "connected",
        };
        f.write_str(name)
    }
}
