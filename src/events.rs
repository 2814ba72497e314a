//! Event taxonomy and fan-out dispatch to independently throttled sinks

use crate::errors::Result;
use log::warn;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Kinds of state changes reported by devices and the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConfigFileError,
    TemperatureReadError,
    AutomaticModeSet,
    AutomaticModeSetError,
    ManualModeSetError,
    FanSet,
    FanSetError,
    DeviceConfig,
    TemperatureWarn,
    DeviceTerminated,
    DeviceTerminatedError,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::ConfigFileError,
        EventKind::TemperatureReadError,
        EventKind::AutomaticModeSet,
        EventKind::AutomaticModeSetError,
        EventKind::ManualModeSetError,
        EventKind::FanSet,
        EventKind::FanSetError,
        EventKind::DeviceConfig,
        EventKind::TemperatureWarn,
        EventKind::DeviceTerminated,
        EventKind::DeviceTerminatedError,
    ];

    /// Kinds that can fire on every tick and are therefore rate limited by sinks
    pub fn is_repeatable(self) -> bool {
        matches!(
            self,
            EventKind::TemperatureReadError
                | EventKind::AutomaticModeSet
                | EventKind::AutomaticModeSetError
                | EventKind::ManualModeSetError
                | EventKind::FanSetError
                | EventKind::TemperatureWarn
        )
    }
}

/// A single emitted event with its optional payload fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Device descriptor, absent for process-level events
    pub device: Option<String>,
    /// Formatted temperature or fan speed
    pub value: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            device: None,
            value: None,
        }
    }

    pub fn for_device(kind: EventKind, device: impl Into<String>) -> Self {
        Self {
            kind,
            device: Some(device.into()),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = Some(value.to_string());
        self
    }
}

/// A consumer of events.
///
/// Sinks are shared between every device, so implementations keep their
/// mutable state (throttle timestamps) behind interior mutability.
pub trait Sink: Send + Sync {
    fn name(&self) -> &'static str;

    fn notify(&self, event: &Event) -> Result<()>;
}

/// Insertion-ordered broadcast of events to every registered sink
#[derive(Clone, Default)]
pub struct EventChannel {
    sinks: Vec<Arc<dyn Sink>>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Arc<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver `event` to every sink in registration order.
    ///
    /// A failing sink is logged and skipped; it never stops delivery to the
    /// sinks after it.
    pub fn emit(&self, event: Event) {
        for sink in &self.sinks {
            if let Err(e) = sink.notify(&event) {
                warn!("Sink '{}' failed to deliver {:?}: {}", sink.name(), event.kind, e);
            }
        }
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sinks.iter().map(|s| s.name()))
            .finish()
    }
}

/// Per-kind rate limiter owned by one sink
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_emitted: HashMap<EventKind, Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emitted: HashMap::new(),
        }
    }

    /// Returns whether `kind` may be delivered at `now`, recording the
    /// delivery when it may. Non-repeatable kinds are always permitted.
    pub fn permit_at(&mut self, kind: EventKind, now: Instant) -> bool {
        if !kind.is_repeatable() {
            return true;
        }
        match self.last_emitted.get(&kind) {
            Some(last) if now.saturating_duration_since(*last) < self.interval => false,
            _ => {
                self.last_emitted.insert(kind, now);
                true
            }
        }
    }
}
