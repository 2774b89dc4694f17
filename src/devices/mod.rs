//! Device controls
//!
//! Typed access to the `/device-controls` endpoints and a poller that
//! keeps the latest state of every device fresh.

mod poller;
mod service;
mod types;

pub use poller::{DevicePollState, DevicePoller};
pub use service::{DeviceControls, DeviceSource};
pub use types::{DeviceError, DeviceKind, DeviceRecord, DeviceSetting, DeviceStates, LED_COLORS};
