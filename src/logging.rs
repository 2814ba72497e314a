//! Logging setup for the fan curve daemon

use fern::Dispatch;
use log::{warn, LevelFilter};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Size at which the log file is moved to its backup
pub const LOG_FILE_MAX_BYTES: u64 = 50_000;

const SYSLOG_PROCESS: &str = "fan-curve-daemon";

/// Log to stdout and syslog and, if `log_file` is given, to a size-limited
/// file with one backup.
///
/// A log file or syslog connection that cannot be opened is reported and skipped.
pub fn setup(level: LevelFilter, log_file: Option<&Path>) -> Result<(), fern::InitError> {
    let mut console = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(std::io::stdout());

    let mut problems = Vec::new();
    if let Some(path) = log_file {
        match RotatingFile::open(path, LOG_FILE_MAX_BYTES) {
            Ok(file) => console = console.chain(Box::new(file) as Box<dyn Write + Send>),
            Err(e) => problems.push(format!("Cannot create file logger at {}: {}", path.display(), e)),
        }
    }

    let mut root = Dispatch::new().level(level).chain(console);
    match syslog_output() {
        Ok(syslog) => root = root.chain(syslog),
        Err(e) => problems.push(format!("Cannot connect to syslog: {}", e)),
    }

    root.apply()?;

    for problem in problems {
        warn!("{}", problem);
    }
    Ok(())
}

/// Syslog adds its own timestamp and process tag, so only the message is sent
fn syslog_output() -> Result<Dispatch, syslog::Error> {
    let formatter = syslog::Formatter3164 {
        facility: syslog::Facility::LOG_DAEMON,
        hostname: None,
        process: SYSLOG_PROCESS.to_string(),
        pid: std::process::id(),
    };
    let logger = syslog::unix(formatter)?;
    Ok(Dispatch::new()
        .format(|out, message, _record| out.finish(format_args!("{}", message)))
        .chain(logger))
}

/// Append-only log file that moves itself to `<name>.1` once it would grow
/// past `max_bytes`.
///
/// Writes are buffered until `flush`, which fern calls after every record, so
/// a record never straddles the two files.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    backup: PathBuf,
    max_bytes: u64,
    file: File,
    written: u64,
    pending: Vec<u8>,
}

impl RotatingFile {
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        let mut backup = path.clone().into_os_string();
        backup.push(".1");
        Ok(Self {
            path,
            backup: backup.into(),
            max_bytes,
            file,
            written,
            pending: Vec::new(),
        })
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        fs::rename(&self.path, &self.backup)?;
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let len = self.pending.len() as u64;
            if self.written > 0 && self.written + len > self.max_bytes {
                self.rotate()?;
            }
            self.file.write_all(&self.pending)?;
            self.written += len;
            self.pending.clear();
        }
        self.file.flush()
    }
}

impl Drop for RotatingFile {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_line(file: &mut RotatingFile, line: &str) {
        writeln!(file, "{}", line).unwrap();
        file.flush().unwrap();
    }

    #[test]
    fn test_syslog_output_connects_to_local_socket() {
        let output = syslog_output();
        if Path::new("/dev/log").exists() {
            assert!(output.is_ok());
        }
    }

    #[test]
    fn test_small_log_stays_in_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.log");
        let mut file = RotatingFile::open(&path, 1000).unwrap();

        log_line(&mut file, "first");
        log_line(&mut file, "second");

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        assert!(!file.backup_path().exists());
    }

    #[test]
    fn test_rotates_into_single_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.log");
        let mut file = RotatingFile::open(&path, 10).unwrap();

        log_line(&mut file, "aaaaaa");
        log_line(&mut file, "bbbbbb");
        log_line(&mut file, "cccccc");

        assert_eq!(file.backup_path(), dir.path().join("daemon.log.1"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "cccccc\n");
        assert_eq!(fs::read_to_string(file.backup_path()).unwrap(), "bbbbbb\n");
    }

    #[test]
    fn test_existing_size_counts_towards_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.log");
        fs::write(&path, "old old old\n").unwrap();
        let mut file = RotatingFile::open(&path, 16).unwrap();

        log_line(&mut file, "new entry");

        assert_eq!(fs::read_to_string(&path).unwrap(), "new entry\n");
        assert_eq!(fs::read_to_string(file.backup_path()).unwrap(), "old old old\n");
    }

    #[test]
    fn test_unflushed_record_is_written_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.log");
        let mut file = RotatingFile::open(&path, 1000).unwrap();
        write!(file, "pending").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        drop(file);

        assert_eq!(fs::read_to_string(&path).unwrap(), "pending");
    }
}
