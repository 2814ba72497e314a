//! Concrete hardware bindings for the supported device families

pub mod hwmon;
pub mod nvidia;

pub use hwmon::HwmonFan;
pub use nvidia::NvidiaSettings;

/// Device type tag of [`NvidiaSettings`] devices in the configuration file
pub const TYPE_NVIDIA: &str = "nvidia";
/// Device type tag of [`HwmonFan`] devices in the configuration file
pub const TYPE_HWMON: &str = "hwmon";
