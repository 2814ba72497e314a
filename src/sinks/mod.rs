//! Concrete event sinks: log output, desktop notifications and audible alerts

mod logger;
mod notify;
mod sound;

pub use logger::LogSink;
pub use notify::NotifySink;
pub use sound::SoundSink;

use crate::errors::{DaemonError, Result};
use crate::events::{EventKind, Throttle};
use log::warn;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::time::Instant;

/// Short human-readable text for the kinds that describe a fault or a warning
pub fn fault_message(kind: EventKind) -> Option<&'static str> {
    match kind {
        EventKind::ConfigFileError => Some("The configuration file is not valid."),
        EventKind::TemperatureReadError => {
            Some("Cannot read the temperature of at least one device.")
        }
        EventKind::AutomaticModeSet => Some("Set at least one device to automatic mode."),
        EventKind::AutomaticModeSetError => {
            Some("Cannot set at least one device to automatic mode.")
        }
        EventKind::ManualModeSetError => Some("Cannot set at least one device to manual mode."),
        EventKind::FanSetError => Some("Cannot set fan speed of at least one device."),
        EventKind::TemperatureWarn => Some("Temperature of at least one device is very high."),
        EventKind::FanSet
        | EventKind::DeviceConfig
        | EventKind::DeviceTerminated
        | EventKind::DeviceTerminatedError => None,
    }
}

fn permitted(throttle: &Mutex<Throttle>, kind: EventKind, now: Instant) -> bool {
    throttle
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .permit_at(kind, now)
}

fn command_failed(program: &str, reason: impl ToString) -> DaemonError {
    DaemonError::CommandFailed {
        command: program.to_string(),
        reason: reason.to_string(),
    }
}

/// Run a short-lived helper program to completion; a non-zero exit is an error.
fn run_helper(program: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| command_failed(program, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(command_failed(
            program,
            format!("{} {}", output.status, stderr.trim()),
        ));
    }
    Ok(())
}

/// Start a long-running helper without waiting for it; a background thread
/// reaps it and logs a failed exit.
fn spawn_detached(program: &str, args: &[&str]) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| command_failed(program, e))?;

    let program = program.to_string();
    std::thread::spawn(move || match child.wait() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("{}", command_failed(&program, status)),
        Err(e) => warn!("{}", command_failed(&program, e)),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_repeatable_kind_has_a_message() {
        for kind in EventKind::ALL {
            if kind.is_repeatable() {
                assert!(fault_message(kind).is_some(), "{:?}", kind);
            }
        }
    }

    #[test]
    fn test_spawn_missing_program_is_an_error() {
        let result = spawn_detached("/nonexistent/fan-curve-daemon-helper", &[]);
        assert!(matches!(result, Err(DaemonError::CommandFailed { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_helper_exit_status_is_reported() {
        assert!(run_helper("true", &[]).is_ok());
        assert!(matches!(
            run_helper("false", &[]),
            Err(DaemonError::CommandFailed { .. })
        ));
        assert!(run_helper("/nonexistent/fan-curve-daemon-helper", &[]).is_err());
    }
}
