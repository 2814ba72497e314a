//! Fan Curve Daemon
//!
//! Drives device fans along temperature curves with hysteresis, and hands
//! control back to the vendor's automatic mode whenever it cannot do so safely.

pub mod args;
pub mod config;
pub mod daemon;
pub mod device;
pub mod errors;
pub mod events;
pub mod fan;
pub mod hardware;
pub mod lock;
pub mod logging;
pub mod sinks;

#[cfg(test)]
pub mod test_utils;

/// Name shown in desktop notifications
pub const APP_NAME: &str = "Fan Curve Daemon";

// Re-export commonly used types
pub use daemon::{CancellationToken, ControlLoop};
pub use device::{CoolingHardware, Device, DeviceConfig, Mode};
pub use errors::{DaemonError, Result};
pub use events::{Event, EventChannel, EventKind, Sink};
pub use fan::FanCurve;
