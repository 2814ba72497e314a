//! Per-device fan control state machine

use crate::errors::{DaemonError, Result};
use crate::events::{Event, EventChannel, EventKind};
use crate::fan::{FanCurve, MAX_TEMPERATURE, MIN_TEMPERATURE};
use log::{debug, info, warn};
use std::fmt::Write as _;

/// Largest accepted hysteresis in °C
pub const MAX_HYSTERESIS: i32 = 60;

/// Vendor operations a supported device family must provide.
///
/// Implementations own the hardware handle; it is released when the
/// implementation is dropped.
pub trait CoolingHardware: Send {
    /// Current temperature in °C
    fn read_temperature(&mut self) -> Result<i32>;

    /// Set the fan speed in percent (0-100)
    fn write_fan_speed(&mut self, percent: u8) -> Result<()>;

    fn enter_manual_mode(&mut self) -> Result<()>;

    fn enter_automatic_mode(&mut self) -> Result<()>;
}

/// Who is driving the fan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Vendor default cooling
    #[default]
    Automatic,
    /// Fan speed set by this daemon
    Manual,
}

/// Static configuration of one physical device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub id: u32,
    pub device_type: String,
    /// Display name or sysfs path the hardware binding talks to
    pub target: String,
    pub hysteresis: i32,
    pub warn: i32,
    pub curve: FanCurve,
}

impl DeviceConfig {
    /// Reject configurations the state machine must never run with
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_HYSTERESIS).contains(&self.hysteresis) {
            return Err(DaemonError::InvalidHysteresis {
                value: self.hysteresis,
            });
        }
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&self.warn) {
            return Err(DaemonError::InvalidWarn { value: self.warn });
        }
        self.curve.validate()
    }

    /// Compact `{"type":..., "id":...}` descriptor; `verbose` adds the
    /// hysteresis, warn threshold and every curve point.
    pub fn describe(&self, verbose: bool) -> String {
        let mut s = format!("{{\"type\":\"{}\", \"id\":{}", self.device_type, self.id);
        if verbose {
            let _ = write!(s, ", \"hysteresis\":{}, \"warn\":{}", self.hysteresis, self.warn);
            for (threshold, speed) in self.curve.points() {
                let _ = write!(s, ", \"{}\":{}", threshold, speed);
            }
        }
        s.push('}');
        s
    }
}

/// Mutable control state, only changed by the owning device's tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub mode: Mode,
    /// Last speed written; `None` while in automatic mode or before the first write
    pub current_fan_speed: Option<u8>,
    /// Set by the first successful manual write; teardown must then restore automatic mode
    pub manual_ever_set: bool,
}

/// One supervised device: configuration, state, hardware handle and event channel
pub struct Device {
    config: DeviceConfig,
    state: DeviceState,
    hardware: Option<Box<dyn CoolingHardware>>,
    events: EventChannel,
}

impl Device {
    /// Validate `config` and take ownership of the hardware handle
    pub fn new(
        config: DeviceConfig,
        hardware: Box<dyn CoolingHardware>,
        events: EventChannel,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: DeviceState::default(),
            hardware: Some(hardware),
            events,
        })
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn describe(&self, verbose: bool) -> String {
        self.config.describe(verbose)
    }

    pub fn is_terminated(&self) -> bool {
        self.hardware.is_none()
    }

    /// Emit `DeviceConfig` with the verbose descriptor
    pub fn announce(&self) {
        self.events
            .emit(Event::new(EventKind::DeviceConfig).with_value(self.describe(true)));
    }

    /// Run one control tick: read, pick a speed, write if it changed.
    ///
    /// Every hardware failure is handled here; nothing escapes the tick.
    pub fn evaluate(&mut self) {
        let Some(hardware) = self.hardware.as_mut() else {
            return;
        };

        let temperature = match hardware.read_temperature() {
            Ok(t) if (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&t) => t,
            Ok(t) => {
                debug!("{} reported out of range temperature {}°C", self.config.describe(false), t);
                self.emit(EventKind::TemperatureReadError);
                self.fall_back_to_automatic();
                return;
            }
            Err(e) => {
                debug!("{} temperature read failed: {}", self.config.describe(false), e);
                self.emit(EventKind::TemperatureReadError);
                self.fall_back_to_automatic();
                return;
            }
        };

        if temperature >= self.config.warn {
            self.emit_value(EventKind::TemperatureWarn, temperature);
        }

        let optimal = self.config.curve.optimal_speed(
            temperature,
            self.state.current_fan_speed,
            self.config.hysteresis,
        );
        if self.state.current_fan_speed == Some(optimal) {
            return;
        }

        let Some(hardware) = self.hardware.as_mut() else {
            return;
        };
        match hardware.enter_manual_mode() {
            Ok(()) => {
                self.state.mode = Mode::Manual;
                self.state.manual_ever_set = true;
            }
            Err(e) => {
                // The device may still be in manual mode from an earlier tick
                debug!("{} manual mode failed: {}", self.config.describe(false), e);
                self.emit(EventKind::ManualModeSetError);
            }
        }

        let Some(hardware) = self.hardware.as_mut() else {
            return;
        };
        match hardware.write_fan_speed(optimal) {
            Ok(()) => {
                self.state.mode = Mode::Manual;
                self.state.current_fan_speed = Some(optimal);
                self.state.manual_ever_set = true;
                self.emit_value(EventKind::FanSet, optimal);
            }
            Err(e) => {
                debug!("{} fan write of {}% failed: {}", self.config.describe(false), optimal, e);
                self.emit(EventKind::FanSetError);
                self.fall_back_to_automatic();
            }
        }
    }

    /// Restore vendor cooling after the daemon lost confidence in the fan speed
    fn fall_back_to_automatic(&mut self) {
        let restored = self.state.mode == Mode::Automatic
            || match self.hardware.as_mut().map(|h| h.enter_automatic_mode()) {
                Some(Ok(())) => true,
                Some(Err(e)) => {
                    debug!("{} automatic mode failed: {}", self.config.describe(false), e);
                    false
                }
                None => false,
            };

        if restored {
            self.state.current_fan_speed = None;
            self.state.mode = Mode::Automatic;
            self.emit(EventKind::AutomaticModeSet);
        } else {
            self.emit(EventKind::AutomaticModeSetError);
        }
    }

    /// Restore automatic mode if this daemon ever drove the fan, then
    /// release the hardware handle. Runs at most once.
    pub fn shutdown(&mut self) {
        let Some(mut hardware) = self.hardware.take() else {
            return;
        };

        if !self.state.manual_ever_set {
            debug!("{} was never set to manual mode", self.config.describe(false));
            return;
        }

        match hardware.enter_automatic_mode() {
            Ok(()) => {
                self.state.mode = Mode::Automatic;
                self.state.current_fan_speed = None;
                info!("{} restored to automatic mode", self.config.describe(false));
                self.emit(EventKind::DeviceTerminated);
            }
            Err(e) => {
                warn!("{} could not be restored to automatic mode: {}", self.config.describe(false), e);
                self.emit(EventKind::DeviceTerminatedError);
            }
        }
    }

    fn emit(&self, kind: EventKind) {
        self.events.emit(Event::for_device(kind, self.describe(false)));
    }

    fn emit_value(&self, kind: EventKind, value: impl ToString) {
        self.events
            .emit(Event::for_device(kind, self.describe(false)).with_value(value));
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
