use super::{fault_message, permitted};
use crate::errors::Result;
use crate::events::{Event, EventKind, Sink, Throttle};
use log::{debug, error, info};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const TARGET: &str = "fan_curve_daemon::events";

/// Writes events through the process logger
#[derive(Debug)]
pub struct LogSink {
    throttle: Mutex<Throttle>,
}

impl LogSink {
    /// `repeat_interval` is the minimum time between two lines of one repeatable kind
    pub fn new(repeat_interval: Duration) -> Self {
        Self {
            throttle: Mutex::new(Throttle::new(repeat_interval)),
        }
    }
}

impl Sink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn notify(&self, event: &Event) -> Result<()> {
        if !permitted(&self.throttle, event.kind, Instant::now()) {
            return Ok(());
        }

        let device = event.device.as_deref().unwrap_or("-");
        let value = event.value.as_deref().unwrap_or("-");
        match event.kind {
            EventKind::FanSet => debug!(target: TARGET, "Fan of {} is set to {}%.", device, value),
            EventKind::DeviceConfig => info!(target: TARGET, "Valid configuration of {}", value),
            EventKind::DeviceTerminated => info!(target: TARGET, "Device {} is terminated.", device),
            EventKind::DeviceTerminatedError => {
                error!(target: TARGET, "Device {} is terminated with errors.", device)
            }
            EventKind::TemperatureWarn => error!(
                target: TARGET,
                "{} ({} at {}°C)",
                fault_message(event.kind).unwrap_or_default(),
                device,
                value
            ),
            kind => match &event.device {
                Some(device) => error!(
                    target: TARGET,
                    "{} ({})",
                    fault_message(kind).unwrap_or_default(),
                    device
                ),
                None => error!(target: TARGET, "{}", fault_message(kind).unwrap_or_default()),
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_sink_accepts_every_kind() {
        let sink = LogSink::new(Duration::from_secs(60));
        for kind in EventKind::ALL {
            assert!(sink.notify(&Event::for_device(kind, "{}").with_value(1)).is_ok());
            assert!(sink.notify(&Event::new(kind)).is_ok());
        }
    }

    #[test]
    fn test_log_sink_throttles_repeated_errors() {
        let sink = LogSink::new(Duration::from_secs(60));
        sink.notify(&Event::for_device(EventKind::FanSetError, "{}")).unwrap();
        let mut throttle = sink.throttle.lock().unwrap();
        assert!(!throttle.permit_at(EventKind::FanSetError, Instant::now()));
    }
}
