//! Command line argument parsing for the fan curve daemon

use crate::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

/// Fan Curve Daemon
///
/// Drives GPU and hwmon fans along temperature curves and falls back to the
/// vendor's automatic cooling whenever it cannot control a fan reliably.
#[derive(Parser, Debug)]
#[command(name = "fan-curve-daemon")]
#[command(about = "Fan curve daemon with fail-safe automatic mode restoration")]
#[command(version)]
pub struct Args {
    /// Configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub configuration: PathBuf,

    /// Polling interval in milliseconds
    #[arg(short, long, value_name = "MS", default_value_t = 500,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Minimum seconds between repeated desktop notifications of one kind
    #[arg(short, long, value_name = "S", default_value_t = 60)]
    pub notify_interval: u64,

    /// Minimum seconds between repeated log lines of one kind
    #[arg(short = 'r', long, value_name = "S", default_value_t = 60)]
    pub log_interval: u64,

    /// Also write the log to this file
    #[arg(short = 'p', long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log level
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Beep in critical states
    #[arg(short, long)]
    pub beep: bool,

    /// Play this sound file in critical states
    #[arg(short, long, value_name = "FILE")]
    pub sound_file: Option<PathBuf>,

    /// Minimum seconds before the sound file is played again
    #[arg(short = 'o', long, value_name = "S", default_value_t = 300)]
    pub begin_over_sound: u64,

    /// Print the configuration file format with examples and exit
    #[arg(short = 'f', long)]
    pub help_configuration: bool,

    /// Remove a stale instance lock (asks for confirmation)
    #[arg(long)]
    pub remove_lock: bool,
}

impl Args {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }

    pub fn notify_interval(&self) -> Duration {
        Duration::from_secs(self.notify_interval)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval)
    }

    pub fn begin_over_sound(&self) -> Duration {
        Duration::from_secs(self.begin_over_sound)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}
