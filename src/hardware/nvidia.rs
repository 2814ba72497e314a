//! NVIDIA GPUs driven through NV-CONTROL attributes of `nvidia-settings`
//!
//! Fan control must be enabled in the driver (Coolbits) and an X server has to
//! run on the display the GPU is attached to.

use crate::device::CoolingHardware;
use crate::errors::{DaemonError, Result};
use log::debug;
use std::process::Command;

const DEFAULT_PROGRAM: &str = "nvidia-settings";

/// One GPU and its cooler, addressed by index on an X display
#[derive(Debug, Clone)]
pub struct NvidiaSettings {
    id: u32,
    display: String,
    program: String,
}

impl NvidiaSettings {
    pub fn new(id: u32, display: impl Into<String>) -> Self {
        Self {
            id,
            display: display.into(),
            program: DEFAULT_PROGRAM.to_string(),
        }
    }

    /// Use another executable than `nvidia-settings`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let command = format!("{} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .arg("--ctrl-display")
            .arg(&self.display)
            .args(args)
            .output()
            .map_err(|e| DaemonError::CommandFailed {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);

        // nvidia-settings exits 0 on some attribute errors, but always prints ERROR
        if !output.status.success() || stdout.contains("ERROR") || stderr.contains("ERROR") {
            return Err(DaemonError::CommandFailed {
                command,
                reason: format!("{} {}", output.status, stderr.trim()),
            });
        }
        Ok(stdout)
    }

    fn assign(&self, attribute: &str) -> Result<()> {
        debug!("Assigning {} on {}", attribute, self.display);
        self.run(&["--assign", attribute]).map(|_| ())
    }
}

/// Parse the integer printed by a terse (`-t`) query
pub fn parse_terse_integer(output: &str) -> Result<i32> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    line.parse()
        .map_err(|_| DaemonError::Hardware(format!("Unexpected nvidia-settings output '{}'", line)))
}

impl CoolingHardware for NvidiaSettings {
    fn read_temperature(&mut self) -> Result<i32> {
        let attribute = format!("[gpu:{}]/GPUCoreTemp", self.id);
        let output = self.run(&["--terse", "--query", &attribute])?;
        parse_terse_integer(&output)
    }

    fn write_fan_speed(&mut self, percent: u8) -> Result<()> {
        self.assign(&format!("[fan:{}]/GPUTargetFanSpeed={}", self.id, percent))
    }

    fn enter_manual_mode(&mut self) -> Result<()> {
        self.assign(&format!("[gpu:{}]/GPUFanControlState=1", self.id))
    }

    fn enter_automatic_mode(&mut self) -> Result<()> {
        self.assign(&format!("[gpu:{}]/GPUFanControlState=0", self.id))
    }
}
