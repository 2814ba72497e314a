//! Linux hwmon PWM fan driven through sysfs

use crate::device::CoolingHardware;
use crate::errors::{DaemonError, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// `pwmN_enable` value selecting manual duty control
const PWM_ENABLE_MANUAL: &str = "1";
/// `pwmN_enable` value selecting the chip's automatic control
const PWM_ENABLE_AUTOMATIC: &str = "2";

/// A PWM fan paired with a temperature input of the same (or another) hwmon chip
#[derive(Debug, Clone)]
pub struct HwmonFan {
    temp_input: PathBuf,
    pwm: PathBuf,
    pwm_enable: PathBuf,
}

impl HwmonFan {
    /// `pwm` is the duty file (e.g. `/sys/class/hwmon/hwmon2/pwm1`); its mode
    /// file is the sibling `pwm1_enable`.
    pub fn new(temp_input: impl Into<PathBuf>, pwm: impl Into<PathBuf>) -> Self {
        let pwm = pwm.into();
        let mut enable_name = pwm.file_name().unwrap_or_default().to_os_string();
        enable_name.push("_enable");
        let pwm_enable = pwm.with_file_name(enable_name);
        Self {
            temp_input: temp_input.into(),
            pwm,
            pwm_enable,
        }
    }

    pub fn pwm_enable_path(&self) -> &Path {
        &self.pwm_enable
    }

    fn write(path: &Path, value: &str) -> Result<()> {
        fs::write(path, value).map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                DaemonError::PermissionDenied(format!("{}: {}", path.display(), e))
            } else {
                DaemonError::Io(e)
            }
        })
    }
}

/// Convert a 0-100 percentage to the 0-255 PWM scale, rounding to nearest
pub fn percent_to_pwm(percent: u8) -> u8 {
    let percent = u16::from(percent.min(100));
    ((percent * 255 + 50) / 100) as u8
}

impl CoolingHardware for HwmonFan {
    fn read_temperature(&mut self) -> Result<i32> {
        let content = fs::read_to_string(&self.temp_input)?;

        // hwmon reports millidegrees Celsius
        let millidegrees: i64 = content.trim().parse().map_err(|_| {
            DaemonError::Hardware(format!(
                "Failed to parse temperature '{}' from {}",
                content.trim(),
                self.temp_input.display()
            ))
        })?;

        i32::try_from(millidegrees.div_euclid(1000))
            .map_err(|_| DaemonError::Hardware(format!("Temperature out of range: {}", millidegrees)))
    }

    fn write_fan_speed(&mut self, percent: u8) -> Result<()> {
        let value = percent_to_pwm(percent);
        Self::write(&self.pwm, &value.to_string())?;
        debug!("Set {} to {} ({}%)", self.pwm.display(), value, percent);
        Ok(())
    }

    fn enter_manual_mode(&mut self) -> Result<()> {
        Self::write(&self.pwm_enable, PWM_ENABLE_MANUAL)
    }

    fn enter_automatic_mode(&mut self) -> Result<()> {
        Self::write(&self.pwm_enable, PWM_ENABLE_AUTOMATIC)
    }
}
