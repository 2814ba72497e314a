use super::{fault_message, permitted, run_helper};
use crate::errors::Result;
use crate::events::{Event, Sink, Throttle};
use log::debug;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const NOTIFY_PROGRAM: &str = "notify-send";

/// Raises critical, non-expiring desktop notifications for faults and warnings
#[derive(Debug)]
pub struct NotifySink {
    app_name: String,
    program: String,
    throttle: Mutex<Throttle>,
}

impl NotifySink {
    pub fn new(app_name: impl Into<String>, repeat_interval: Duration) -> Self {
        Self {
            app_name: app_name.into(),
            program: NOTIFY_PROGRAM.to_string(),
            throttle: Mutex::new(Throttle::new(repeat_interval)),
        }
    }

    /// Use another executable than `notify-send`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Message to show for `event` at `now`, if it is both notifiable and not throttled
    fn admit(&self, event: &Event, now: Instant) -> Option<&'static str> {
        let message = fault_message(event.kind)?;
        permitted(&self.throttle, event.kind, now).then_some(message)
    }
}

impl Sink for NotifySink {
    fn name(&self) -> &'static str {
        "notify"
    }

    fn notify(&self, event: &Event) -> Result<()> {
        let Some(message) = self.admit(event, Instant::now()) else {
            return Ok(());
        };

        debug!("Sending desktop notification: {}", message);
        let app_name = format!("--app-name={}", self.app_name);
        // notify-send returns once the server has the notification
        run_helper(
            &self.program,
            &[
                &app_name,
                "--urgency=critical",
                "--expire-time=0",
                &self.app_name,
                message,
            ],
        )
    }
}
