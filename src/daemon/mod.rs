//! Control loop and shutdown handling for the fan curve daemon

use crate::device::Device;
use crate::errors::{DaemonError, Result};
use log::{debug, error, info};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Longest single sleep; bounds how long a cancellation can go unnoticed
pub const MAX_SLEEP_CHUNK: Duration = Duration::from_millis(100);

/// Shared stop flag, set from the signal task and polled by the loop
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cancel `token` on the first SIGINT or SIGTERM.
///
/// The handlers are registered before this returns, so a signal arriving
/// right after startup is not lost.
pub fn install_signal_handlers(token: CancellationToken) -> Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("Received SIGINT, shutting down"),
            _ = terminate.recv() => info!("Received SIGTERM, shutting down"),
        }
        token.cancel();
    }))
}

/// Polls every device at a fixed interval until cancelled
pub struct ControlLoop {
    devices: Vec<Device>,
    interval: Duration,
    token: CancellationToken,
}

impl ControlLoop {
    pub fn new(devices: Vec<Device>, interval: Duration, token: CancellationToken) -> Self {
        Self {
            devices,
            interval,
            token,
        }
    }

    /// Emit `DeviceConfig` for every device, in order
    pub fn announce(&self) {
        for device in &self.devices {
            device.announce();
        }
    }

    /// Evaluate every device once, in registration order
    pub fn tick(&mut self) {
        for device in &mut self.devices {
            device.evaluate();
        }
    }

    /// Run until the token is cancelled, then tear every device down.
    ///
    /// A panic escaping a tick stops the loop; teardown still runs and the
    /// panic is reported as [`DaemonError::LoopAborted`].
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Controlling {} device(s) every {} ms",
            self.devices.len(),
            self.interval.as_millis()
        );

        let outcome = loop {
            if self.token.is_cancelled() {
                break Ok(());
            }

            let started = Instant::now();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.tick())) {
                let reason = panic_message(payload.as_ref());
                error!("Device evaluation panicked: {}", reason);
                break Err(DaemonError::LoopAborted(reason));
            }

            self.pause(started.elapsed()).await;
        };

        self.shutdown();
        outcome
    }

    async fn pause(&self, elapsed: Duration) {
        let mut remaining = self.interval.saturating_sub(elapsed);
        while !remaining.is_zero() && !self.token.is_cancelled() {
            let chunk = remaining.min(MAX_SLEEP_CHUNK);
            sleep(chunk).await;
            remaining -= chunk;
        }
    }

    fn shutdown(&mut self) {
        debug!("Tearing down {} device(s)", self.devices.len());
        for device in &mut self.devices {
            device.shutdown();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
