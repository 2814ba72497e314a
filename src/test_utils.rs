//! Test doubles shared by the unit tests

use crate::device::{CoolingHardware, DeviceConfig};
use crate::errors::{DaemonError, Result};
use crate::events::{Event, EventKind, Sink};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareCall {
    ReadTemperature,
    WriteFanSpeed(u8),
    EnterManualMode,
    EnterAutomaticMode,
}

#[derive(Debug, Default)]
struct Script {
    temperatures: VecDeque<Option<i32>>,
    fail_manual: bool,
    fail_automatic: bool,
    fail_fan_write: bool,
    calls: Vec<HardwareCall>,
}

/// Scripted hardware; clones share the script so a test can inspect calls
/// after the device owning one clone has been dropped.
#[derive(Debug, Clone, Default)]
pub struct FakeHardware {
    script: Arc<Mutex<Script>>,
}

impl FakeHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reading; `None` makes that read fail
    pub fn push_temperature(&self, reading: Option<i32>) {
        self.script.lock().unwrap().temperatures.push_back(reading);
    }

    pub fn set_fail_manual(&self, fail: bool) {
        self.script.lock().unwrap().fail_manual = fail;
    }

    pub fn set_fail_automatic(&self, fail: bool) {
        self.script.lock().unwrap().fail_automatic = fail;
    }

    pub fn set_fail_fan_write(&self, fail: bool) {
        self.script.lock().unwrap().fail_fan_write = fail;
    }

    pub fn calls(&self) -> Vec<HardwareCall> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: HardwareCall) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: HardwareCall) -> std::sync::MutexGuard<'_, Script> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(call);
        script
    }
}

impl CoolingHardware for FakeHardware {
    fn read_temperature(&mut self) -> Result<i32> {
        let mut script = self.record(HardwareCall::ReadTemperature);
        script
            .temperatures
            .pop_front()
            .flatten()
            .ok_or_else(|| DaemonError::Hardware("sensor unavailable".to_string()))
    }

    fn write_fan_speed(&mut self, percent: u8) -> Result<()> {
        let script = self.record(HardwareCall::WriteFanSpeed(percent));
        if script.fail_fan_write {
            return Err(DaemonError::Hardware("fan write rejected".to_string()));
        }
        Ok(())
    }

    fn enter_manual_mode(&mut self) -> Result<()> {
        let script = self.record(HardwareCall::EnterManualMode);
        if script.fail_manual {
            return Err(DaemonError::Hardware("manual mode rejected".to_string()));
        }
        Ok(())
    }

    fn enter_automatic_mode(&mut self) -> Result<()> {
        let script = self.record(HardwareCall::EnterAutomaticMode);
        if script.fail_automatic {
            return Err(DaemonError::Hardware("automatic mode rejected".to_string()));
        }
        Ok(())
    }
}

/// Sink that keeps every event it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl Sink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn notify(&self, event: &Event) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Curve `{20:0, 40:25, 60:40, 75:60, 80:80, 85:99, 90:100}`, hysteresis 5, warn 85
pub fn sample_config() -> DeviceConfig {
    DeviceConfig {
        id: 0,
        device_type: "fake".to_string(),
        target: ":0".to_string(),
        hysteresis: 5,
        warn: 85,
        curve: [(20, 0), (40, 25), (60, 40), (75, 60), (80, 80), (85, 99), (90, 100)]
            .into_iter()
            .collect(),
    }
}
