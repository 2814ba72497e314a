//! Error types for the fan curve daemon

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the fan curve daemon
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Main error type for the fan curve daemon
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration contains no devices")]
    NoDevices,

    #[error("Unsupported device type: {0}")]
    UnsupportedDeviceType(String),

    #[error("Device of type {device_type} is missing required field '{field}'")]
    MissingField {
        device_type: String,
        field: &'static str,
    },

    #[error("Invalid hysteresis {value}°C (allowed 0..=60)")]
    InvalidHysteresis { value: i32 },

    #[error("Invalid warn temperature {value}°C (allowed 0..=120)")]
    InvalidWarn { value: i32 },

    #[error("Invalid curve threshold {value}°C (allowed 0..=120)")]
    InvalidThreshold { value: i32 },

    #[error("Invalid fan speed {speed}% at {threshold}°C (allowed 0..=100)")]
    InvalidFanSpeed { threshold: i32, speed: i64 },

    #[error("Fan speed decreases from {previous}% to {speed}% at {threshold}°C")]
    DecreasingCurve {
        threshold: i32,
        previous: u8,
        speed: u8,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("Command '{command}' failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Instance lock is already held: {}", .0.display())]
    LockHeld(PathBuf),

    #[error("Control loop aborted: {0}")]
    LoopAborted(String),
}
