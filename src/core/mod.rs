//! Core functionality for the battery query tool
//! The orchestrator and its event/action vocabulary, plus the bluest-backed
//! transport that carries the actions out.

pub mod actions;
pub mod address;
pub mod blacklist;
pub mod bluetooth;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod orchestrator;

// Re-export commonly used types
pub use actions::{Action, ActionExecutor, BatteryService, LinkLayer};
pub use address::{AddressType, DeviceAddress};
pub use blacklist::EvictionCache;
pub use bluetooth::BluetoothManager;
pub use dispatcher::{EventDispatcher, EventSink};
pub use error::RunError;
pub use orchestrator::Orchestrator;
