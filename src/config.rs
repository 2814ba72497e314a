//! JSON configuration file loading
//!
//! A file holds either one device object or
//! `{"devices": [...], "defaultHysteresis": n, "defaultWarn": n}`. Every
//! integer-named key of a device object is a curve point
//! `"<threshold °C>": <speed %>`.

use crate::device::{CoolingHardware, Device, DeviceConfig};
use crate::errors::{DaemonError, Result};
use crate::events::EventChannel;
use crate::fan::{FanCurve, FULL_SPEED};
use crate::hardware::{HwmonFan, NvidiaSettings, TYPE_HWMON, TYPE_NVIDIA};
use log::{debug, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/etc/fan-curve-daemon.json";
pub const DEFAULT_HYSTERESIS: i32 = 0;
pub const DEFAULT_WARN: i32 = 100;

const DEVICES_KEY: &str = "devices";

fn default_hysteresis() -> i32 {
    DEFAULT_HYSTERESIS
}

fn default_warn() -> i32 {
    DEFAULT_WARN
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Defaults {
    #[serde(default = "default_hysteresis")]
    default_hysteresis: i32,
    #[serde(default = "default_warn")]
    default_warn: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceEntry {
    #[serde(rename = "type", default)]
    device_type: Option<String>,
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    temp_input: Option<PathBuf>,
    #[serde(default)]
    pwm: Option<PathBuf>,
    #[serde(default)]
    hysteresis: Option<i32>,
    #[serde(default)]
    warn: Option<i32>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// How to reach a device's hardware
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Nvidia { display: String },
    Hwmon { temp_input: PathBuf, pwm: PathBuf },
}

/// A parsed, not yet opened, device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredDevice {
    pub config: DeviceConfig,
    pub binding: Binding,
}

impl ConfiguredDevice {
    /// Open the hardware handle for this device
    pub fn open(&self) -> Box<dyn CoolingHardware> {
        match &self.binding {
            Binding::Nvidia { display } => Box::new(NvidiaSettings::new(self.config.id, display.clone())),
            Binding::Hwmon { temp_input, pwm } => Box::new(HwmonFan::new(temp_input, pwm)),
        }
    }
}

fn curve_from_entries(extra: &BTreeMap<String, Value>) -> Result<FanCurve> {
    let mut curve = FanCurve::new();
    for (key, value) in extra {
        let Ok(threshold) = key.parse::<i32>() else {
            debug!("Ignoring configuration key '{}'", key);
            continue;
        };
        let speed = value.as_i64().ok_or_else(|| {
            DaemonError::Config(format!("Fan speed of curve point '{}' is not an integer", key))
        })?;
        let speed = u8::try_from(speed)
            .ok()
            .filter(|s| *s <= FULL_SPEED)
            .ok_or(DaemonError::InvalidFanSpeed { threshold, speed })?;
        curve.add_point(threshold, speed);
    }
    Ok(curve)
}

fn device_from_entry(entry: DeviceEntry, defaults: &Defaults) -> Result<ConfiguredDevice> {
    let device_type = entry.device_type.ok_or_else(|| DaemonError::MissingField {
        device_type: "<unknown>".to_string(),
        field: "type",
    })?;
    let missing = |field: &'static str| DaemonError::MissingField {
        device_type: device_type.clone(),
        field,
    };

    let id = entry.id.ok_or_else(|| missing("id"))?;
    let (binding, target) = match device_type.as_str() {
        TYPE_NVIDIA => {
            let display = entry.display_name.ok_or_else(|| missing("displayName"))?;
            (Binding::Nvidia { display: display.clone() }, display)
        }
        TYPE_HWMON => {
            let temp_input = entry.temp_input.ok_or_else(|| missing("tempInput"))?;
            let pwm = entry.pwm.ok_or_else(|| missing("pwm"))?;
            let target = pwm.display().to_string();
            (Binding::Hwmon { temp_input, pwm }, target)
        }
        other => return Err(DaemonError::UnsupportedDeviceType(other.to_string())),
    };

    let config = DeviceConfig {
        id,
        target,
        hysteresis: entry.hysteresis.unwrap_or(defaults.default_hysteresis),
        warn: entry.warn.unwrap_or(defaults.default_warn),
        curve: curve_from_entries(&entry.extra)?,
        device_type,
    };
    config.validate()?;

    Ok(ConfiguredDevice { config, binding })
}

/// Parse and validate every device of a configuration document
pub fn parse_config(json: &str) -> Result<Vec<ConfiguredDevice>> {
    let root: Value = serde_json::from_str(json)?;
    if !root.is_object() {
        return Err(DaemonError::Config("Top level must be a JSON object".to_string()));
    }
    let defaults = Defaults::deserialize(&root)?;

    let entries: Vec<DeviceEntry> = match root.get(DEVICES_KEY) {
        Some(devices) => Vec::<DeviceEntry>::deserialize(devices)?,
        None => vec![DeviceEntry::deserialize(&root)?],
    };
    if entries.is_empty() {
        return Err(DaemonError::NoDevices);
    }

    entries
        .into_iter()
        .map(|entry| device_from_entry(entry, &defaults))
        .collect()
}

/// Read and validate the configuration file at `path`
pub fn load_config(path: &Path) -> Result<Vec<ConfiguredDevice>> {
    info!("Loading configuration from {}", path.display());
    let json = fs::read_to_string(path)?;
    parse_config(&json)
}

/// Open every device and attach the event channel.
///
/// Every configured device is already validated, so this only fails if a device is
/// rejected by [`Device::new`].
pub fn build_devices(configured: &[ConfiguredDevice], events: &EventChannel) -> Result<Vec<Device>> {
    configured
        .iter()
        .map(|entry| Device::new(entry.config.clone(), entry.open(), events.clone()))
        .collect()
}

/// Example of a single device configuration
pub fn example_single_device(id: u32) -> Value {
    json!({
        "type": TYPE_NVIDIA,
        "id": id,
        "displayName": ":1",
        "hysteresis": 5,
        "warn": 85,
        "20": 0,
        "40": 25,
        "60": 40,
        "75": 60,
        "80": 80,
        "85": 99,
        "90": 100
    })
}

/// Example of a multi device configuration
pub fn example_multi_device() -> Value {
    json!({
        DEVICES_KEY: [
            example_single_device(0),
            {
                "type": TYPE_HWMON,
                "id": 1,
                "tempInput": "/sys/class/hwmon/hwmon1/temp1_input",
                "pwm": "/sys/class/hwmon/hwmon1/pwm1",
                "40": 30,
                "60": 50,
                "80": 100
            }
        ],
        "defaultHysteresis": 5,
        "defaultWarn": 85
    })
}

/// Human-readable description of the configuration file format
pub fn format_help() -> String {
    let single = serde_json::to_string_pretty(&example_single_device(0)).unwrap_or_default();
    let multi = serde_json::to_string_pretty(&example_multi_device()).unwrap_or_default();
    format!(
        "The configuration file must be in the JSON format and has the following structure for a \
         single device configuration:\n\
         required attributes: type (value: \"{nvidia}\" or \"{hwmon}\"), id (value: <id of the device as integer>)\n\
         required for \"{nvidia}\" (fan control must be enabled in the driver): displayName \
         (value: <X display connected to the device as string>)\n\
         required for \"{hwmon}\": tempInput (value: <sysfs temperature file>), pwm (value: <sysfs pwm file>)\n\
         optional attributes: hysteresis (value: <hysteresis in celsius as integer>), warn \
         (value: <warn temperature in celsius as integer>), any number of attributes \
         <temperature in celsius as integer> (value: <fan speed in percent as integer>)\n\
         \n\
         example single device JSON file:\n{single}\n\n\
         The following structure is for a multi device configuration:\n\
         required attributes: devices (value: array with JSON objects described for the single \
         device configuration)\n\
         optional attributes: defaultHysteresis (value: <default hysteresis in celsius as integer>), \
         defaultWarn (value: <default warn temperature in celsius as integer>)\n\
         \n\
         example multi device JSON file:\n{multi}\n",
        nvidia = TYPE_NVIDIA,
        hwmon = TYPE_HWMON,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_single_device_example_parses() {
        let configured = parse_config(&example_single_device(3).to_string()).unwrap();
        assert_eq!(configured.len(), 1);
        let config = &configured[0].config;
        assert_eq!(config.id, 3);
        assert_eq!(config.device_type, "nvidia");
        assert_eq!(config.hysteresis, 5);
        assert_eq!(config.warn, 85);
        assert_eq!(
            config.curve.points().collect::<Vec<_>>(),
            vec![(20, 0), (40, 25), (60, 40), (75, 60), (80, 80), (85, 99), (90, 100)]
        );
        assert_eq!(configured[0].binding, Binding::Nvidia { display: ":1".to_string() });
    }

    #[test]
    fn test_multi_device_applies_defaults() {
        let configured = parse_config(&example_multi_device().to_string()).unwrap();
        assert_eq!(configured.len(), 2);
        assert_eq!(configured[1].config.hysteresis, 5);
        assert_eq!(configured[1].config.warn, 85);
        assert_eq!(
            configured[1].binding,
            Binding::Hwmon {
                temp_input: PathBuf::from("/sys/class/hwmon/hwmon1/temp1_input"),
                pwm: PathBuf::from("/sys/class/hwmon/hwmon1/pwm1"),
            }
        );
    }

    #[test]
    fn test_builtin_defaults() {
        let configured = parse_config(r#"{"type": "nvidia", "id": 0, "displayName": ":0", "50": 40}"#).unwrap();
        assert_eq!(configured[0].config.hysteresis, DEFAULT_HYSTERESIS);
        assert_eq!(configured[0].config.warn, DEFAULT_WARN);
    }

    #[test]
    fn test_rejects_missing_fields() {
        assert!(matches!(
            parse_config(r#"{"id": 0, "displayName": ":0"}"#),
            Err(DaemonError::MissingField { field: "type", .. })
        ));
        assert!(matches!(
            parse_config(r#"{"type": "nvidia", "displayName": ":0"}"#),
            Err(DaemonError::MissingField { field: "id", .. })
        ));
        assert!(matches!(
            parse_config(r#"{"type": "nvidia", "id": 0}"#),
            Err(DaemonError::MissingField { field: "displayName", .. })
        ));
        assert!(matches!(
            parse_config(r#"{"type": "hwmon", "id": 0, "pwm": "/x/pwm1"}"#),
            Err(DaemonError::MissingField { field: "tempInput", .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_type() {
        assert!(matches!(
            parse_config(r#"{"type": "amd", "id": 0}"#),
            Err(DaemonError::UnsupportedDeviceType(t)) if t == "amd"
        ));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            parse_config(r#"{"type": "nvidia", "id": 0, "displayName": ":0", "hysteresis": 61}"#),
            Err(DaemonError::InvalidHysteresis { value: 61 })
        ));
        assert!(matches!(
            parse_config(r#"{"type": "nvidia", "id": 0, "displayName": ":0", "50": 101}"#),
            Err(DaemonError::InvalidFanSpeed { threshold: 50, speed: 101 })
        ));
        assert!(matches!(
            parse_config(r#"{"type": "nvidia", "id": 0, "displayName": ":0", "50": 60, "70": 20}"#),
            Err(DaemonError::DecreasingCurve { .. })
        ));
        assert!(parse_config(r#"{"type": "nvidia", "id": 0, "displayName": ":0", "50": "fast"}"#).is_err());
    }

    #[test]
    fn test_one_bad_device_rejects_all() {
        let json = r#"{"devices": [
            {"type": "nvidia", "id": 0, "displayName": ":0"},
            {"type": "nvidia", "id": 1, "displayName": ":0", "warn": 121}
        ]}"#;
        assert!(matches!(parse_config(json), Err(DaemonError::InvalidWarn { value: 121 })));
    }

    #[test]
    fn test_rejects_empty_and_malformed_documents() {
        assert!(matches!(parse_config(r#"{"devices": []}"#), Err(DaemonError::NoDevices)));
        assert!(matches!(parse_config("{"), Err(DaemonError::Serialization(_))));
        assert!(parse_config("[]").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", example_multi_device()).unwrap();
        let configured = load_config(file.path()).unwrap();
        assert_eq!(configured.len(), 2);

        let events = EventChannel::new();
        let devices = build_devices(&configured, &events).unwrap();
        assert_eq!(devices[0].describe(false), "{\"type\":\"nvidia\", \"id\":0}");
        assert_eq!(devices[1].describe(false), "{\"type\":\"hwmon\", \"id\":1}");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/fan-curve-daemon.json")),
            Err(DaemonError::Io(_))
        ));
    }

    #[test]
    fn test_format_help_mentions_examples() {
        let help = format_help();
        assert!(help.contains("displayName"));
        assert!(help.contains("defaultHysteresis"));
    }
}
