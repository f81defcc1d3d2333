use std::env;
use std::io::{stdout, stderr, Write};
use std::str::FromStr;

use anyhow::Result;
use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;

/// Target used by mount tracing so debug-mode mount calls land on stdout
/// instead of stderr.
pub const MOUNT_TRACE_TARGET: &str = "subsys::mount";

pub static SUBSYS_LOGGER: OnceCell<SubsysLogger> = OnceCell::new();

/// Installs the process-wide logger. `debug` raises the effective level to
/// Debug regardless of the environment, matching the controller's `--debug`
/// flag. A second call is a no-op.
pub fn init(debug: bool) -> Result<()> {
    let level_filter = if debug {
        LevelFilter::Debug
    } else if let Ok(log_level_str) = env::var("SUBSYS_LOG_LEVEL") {
        LevelFilter::from_str(&log_level_str).unwrap_or(LevelFilter::Warn)
    } else {
        LevelFilter::Warn
    };

    let logger = SUBSYS_LOGGER.get_or_init(|| SubsysLogger::new(level_filter.to_level()));
    let _ = log::set_logger(logger).map(|()| log::set_max_level(level_filter));
    Ok(())
}

pub struct SubsysLogger {
    level: Option<log::Level>,
}

impl SubsysLogger {
    pub fn new(level: Option<log::Level>) -> Self {
        Self { level }
    }
}

impl Log for SubsysLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.level {
            Some(level) => metadata.level() <= level,
            None => false,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let log_msg = format!(
            "[{} {}] {}",
            record.level(),
            chrono::Local::now().to_rfc3339(),
            record.args()
        );
        if record.target() == MOUNT_TRACE_TARGET && record.level() == log::Level::Debug {
            let _ = writeln!(stdout(), "{}", log_msg);
        } else {
            let _ = writeln!(stderr(), "{}", log_msg);
        }
    }

    fn flush(&self) {
        let _ = stdout().flush();
        let _ = stderr().flush();
    }
}
