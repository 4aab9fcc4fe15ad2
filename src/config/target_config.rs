use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What to do when the link to a fixed target address drops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectPolicy {
    /// Report the disconnect and end the run.
    #[default]
    Terminate,
    /// Reconnect to the same address, up to `max_retries` times in a row.
    Retry,
}

/// Behavior when an address was supplied with `-a/--address`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedTargetConfig {
    pub on_disconnect: DisconnectPolicy,
    /// Consecutive reconnects allowed before the run ends.
    pub max_retries: u32,
    /// Delay before each reconnect attempt, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for FixedTargetConfig {
    fn default() -> Self {
        FixedTargetConfig {
            on_disconnect: DisconnectPolicy::Terminate,
            max_retries: 5,
            retry_delay_ms: 1000,
        }
    }
}
