//! Main entry point for the fan curve daemon

use anyhow::{bail, Context};
use clap::Parser;
use fan_curve_daemon::{
    args::Args,
    config,
    daemon::{self, CancellationToken, ControlLoop},
    events::{Event, EventChannel, EventKind},
    lock::{InstanceLock, LockFile},
    logging,
    sinks::{LogSink, NotifySink, SoundSink},
    APP_NAME,
};
use log::{error, info, warn};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.help_configuration {
        print!("{}", config::format_help());
        return Ok(());
    }

    // Print version and build metadata for binary identity verification
    let pkg_version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let git_desc = option_env!("GIT_DESC").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    eprintln!(
        "fan-curve-daemon v{} (git {} / {}) built {}",
        pkg_version, git_hash, git_desc, build_time
    );

    logging::setup(args.log_level.into(), args.log_path.as_deref())
        .context("Failed to set up logging")?;

    let events = build_sinks(&args);
    let mut lock = LockFile::in_temp_dir();

    if args.remove_lock && lock.exists() && confirm_lock_removal(&lock)? {
        lock.remove_stale()
            .with_context(|| format!("Failed to remove {}", lock.path().display()))?;
    }

    let configured = match config::load_config(&args.configuration) {
        Ok(configured) => configured,
        Err(e) => {
            error!("Invalid configuration {}: {}", args.configuration.display(), e);
            events.emit(Event::new(EventKind::ConfigFileError));
            bail!("Configuration rejected");
        }
    };

    let token = CancellationToken::new();
    daemon::install_signal_handlers(token.clone()).context("Failed to install signal handlers")?;

    if let Err(e) = lock.acquire() {
        error!("{}", e);
        match lock.owner_pid() {
            Some(pid) => error!("Another instance may be running with PID {}", pid),
            None => error!("Another instance may be running"),
        }
        bail!(
            "Cannot lock {}; if no other instance is running, restart with --remove-lock",
            lock.path().display()
        );
    }

    let outcome = match config::build_devices(&configured, &events) {
        Ok(devices) => {
            let control = ControlLoop::new(devices, args.interval(), token);
            control.announce();
            control.run().await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => {
            if let Err(e) = lock.release() {
                warn!("{}", e);
            }
            info!("Exited cleanly");
            Ok(())
        }
        Err(e) => Err(e).context("Control loop failed"),
    }
}

fn build_sinks(args: &Args) -> EventChannel {
    let mut events = EventChannel::new();
    events.register(Arc::new(LogSink::new(args.log_interval())));
    events.register(Arc::new(NotifySink::new(APP_NAME, args.notify_interval())));
    if args.beep || args.sound_file.is_some() {
        events.register(Arc::new(SoundSink::new(
            args.beep,
            args.sound_file.clone(),
            args.begin_over_sound(),
        )));
    }
    events
}

fn confirm_lock_removal(lock: &LockFile) -> anyhow::Result<bool> {
    print!(
        "Remove lock {}? Only do this if no other instance is running [y/N] ",
        lock.path().display()
    );
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
