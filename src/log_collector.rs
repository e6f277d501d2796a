//! Logging backend for the `log` facade.
//!
//! Every record is printed to stderr. When a log directory is configured, the
//! record is also handed to a background writer thread over an unbounded
//! crossbeam channel and appended to a per-run session file.
//!
//! ```text
//! log::info!(..)
//!     |
//! [LogCollector] --> stderr
//!     | (crossbeam unbounded channel)
//!     v
//! [writer thread] --> <log_dir>/<YYYYmmdd_HHMMSS>.log
//! ```

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Prefix of every line printed to stderr
pub const LOG_PREFIX: &str = "[zfs-pkgbuilder]";

/// Internal log line or special marker
enum LogMessage {
    Line(String),
    /// Flush marker; the writer answers once everything before it is on disk
    Flush(std::sync::mpsc::Sender<()>),
}

pub struct LogCollector {
    level: LevelFilter,
    /// Sender into the writer thread, None when not persisting
    tx: Option<Sender<LogMessage>>,
    session_path: Option<PathBuf>,
}

impl LogCollector {
    /// Create a collector printing records up to `level`.
    ///
    /// With `log_dir` set, a session file is created there and a writer
    /// thread appends every record to it.
    pub fn new(level: LevelFilter, log_dir: Option<&Path>) -> Result<Self, String> {
        let Some(log_dir) = log_dir else {
            return Ok(LogCollector {
                level,
                tx: None,
                session_path: None,
            });
        };

        fs::create_dir_all(log_dir)
            .map_err(|e| format!("Failed to create logs directory: {}", e))?;
        let session_path = log_dir.join(format!("{}.log", Local::now().format("%Y%m%d_%H%M%S")));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&session_path)
            .map_err(|e| format!("Failed to open log file {}: {}", session_path.display(), e))?;

        let (tx, rx) = unbounded::<LogMessage>();

        // OS thread, so records emitted from any runtime or thread reach disk.
        std::thread::spawn(move || {
            let mut file: File = file;
            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        if let Err(e) = writeln!(file, "{}", line) {
                            eprintln!("{} ERROR: Failed to write log file: {}", LOG_PREFIX, e);
                        }
                    }
                    LogMessage::Flush(done) => {
                        let _ = file.flush();
                        let _ = file.sync_data();
                        let _ = done.send(());
                    }
                }
            }
        });

        Ok(LogCollector {
            level,
            tx: Some(tx),
            session_path: Some(session_path),
        })
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// The session file, if persisting
    pub fn session_log_path(&self) -> Option<&Path> {
        self.session_path.as_deref()
    }

    /// Block until the writer thread has written every queued record.
    pub fn wait_for_empty(&self) {
        let Some(tx) = &self.tx else { return };
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        if tx.send(LogMessage::Flush(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }

    fn format_console(record: &Record) -> String {
        format!("{} {}: {}", LOG_PREFIX, record.level(), record.args())
    }

    fn format_file(record: &Record) -> String {
        format!(
            "[{}] {:<5} {}",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    }
}

impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        eprintln!("{}", Self::format_console(record));

        if let Some(tx) = &self.tx {
            // Debug and trace from dependencies stay out of the session file.
            if record.level() <= Level::Info || record.target().starts_with("zfs_pkgbuilder") {
                let _ = tx.send(LogMessage::Line(Self::format_file(record)));
            }
        }
    }

    fn flush(&self) {
        self.wait_for_empty();
    }
}

/// Install `collector` as the global logger.
pub fn init(collector: LogCollector) -> Result<&'static LogCollector, log::SetLoggerError> {
    let level = collector.level();
    let collector: &'static LogCollector = Box::leak(Box::new(collector));
    log::set_logger(collector)?;
    log::set_max_level(level);
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record<'a>(level: Level, args: std::fmt::Arguments<'a>) -> Record<'a> {
        Record::builder()
            .level(level)
            .target("zfs_pkgbuilder::test")
            .args(args)
            .build()
    }

    #[test]
    fn test_console_format() {
        let line = LogCollector::format_console(&record(Level::Info, format_args!("[Fetch] ok")));
        assert_eq!(line, "[zfs-pkgbuilder] INFO: [Fetch] ok");
    }

    #[test]
    fn test_level_filter() {
        let collector = LogCollector::new(LevelFilter::Info, None).unwrap();
        let debug = Metadata::builder().level(Level::Debug).build();
        let warn = Metadata::builder().level(Level::Warn).build();
        assert!(!collector.enabled(&debug));
        assert!(collector.enabled(&warn));
        assert!(collector.session_log_path().is_none());
    }

    #[test]
    fn test_session_file_receives_records_after_flush() {
        let dir = TempDir::new().unwrap();
        let collector = LogCollector::new(LevelFilter::Debug, Some(dir.path())).unwrap();

        for i in 0..100 {
            collector.log(&record(Level::Info, format_args!("Log message {}", i)));
        }
        collector.log(&record(Level::Trace, format_args!("filtered")));
        collector.flush();

        let content = fs::read_to_string(collector.session_log_path().unwrap()).unwrap();
        assert_eq!(content.lines().count(), 100);
        assert!(content.contains("Log message 99"));
        assert!(!content.contains("filtered"));
    }
}
