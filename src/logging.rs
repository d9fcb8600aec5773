//! Logger setup
//!
//! Console output goes through `env_logger` at the level picked by `-v`/`-q`.
//! While a run is in progress its log file is attached as a second
//! `env_logger` target, so library diagnostics (retries, copies,
//! provisioning) land in the same file as the run's own records.

use log::{LevelFilter, Log, Metadata, Record};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Target used for records written by the run log itself
pub const RUN_TARGET: &str = "run";

static ACTIVE: Mutex<Option<Arc<env_logger::Logger>>> = Mutex::new(None);

fn active() -> MutexGuard<'static, Option<Arc<env_logger::Logger>>> {
    ACTIVE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Console level for a verbosity count
pub fn console_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Run log file level; never below info
pub fn file_level(verbose: u8) -> LevelFilter {
    console_level(verbose, false).max(LevelFilter::Info)
}

/// Install the global logger
pub fn init(verbose: u8, quiet: bool) {
    let console = env_logger::Builder::new()
        .filter_level(console_level(verbose, quiet))
        .format_timestamp(None)
        .build();

    let max = console.filter().max(file_level(verbose));
    if log::set_boxed_logger(Box::new(Dispatch { console })).is_ok() {
        log::set_max_level(max);
    }
}

/// Forwards every record to the console and the attached run file
struct Dispatch {
    console: env_logger::Logger,
}

impl Log for Dispatch {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.console.enabled(metadata) || active().as_ref().is_some_and(|f| f.enabled(metadata))
    }

    fn log(&self, record: &Record<'_>) {
        self.console.log(record);
        if let Some(file) = active().as_ref() {
            file.log(record);
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(file) = active().as_ref() {
            file.flush();
        }
    }
}

/// Shared handle to a run log file, usable as an `env_logger` pipe
#[derive(Clone)]
pub struct FileTarget(Arc<Mutex<BufWriter<File>>>);

impl FileTarget {
    pub fn new(file: File) -> Self {
        Self(Arc::new(Mutex::new(BufWriter::new(file))))
    }

    fn lock(&self) -> MutexGuard<'_, BufWriter<File>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build a timestamped logger that writes into this file
    pub fn logger(&self, level: LevelFilter) -> env_logger::Logger {
        env_logger::Builder::new()
            .filter_level(level)
            .format_timestamp_millis()
            .format_target(true)
            .write_style(env_logger::WriteStyle::Never)
            .target(env_logger::Target::Pipe(Box::new(self.clone())))
            .build()
    }
}

impl Write for FileTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flush()
    }
}

/// Keeps a run file attached to the global logger until dropped
pub struct Attached(());

/// Route global log records into `logger` as well as the console
pub fn attach(logger: Arc<env_logger::Logger>) -> Attached {
    *active() = Some(logger);
    Attached(())
}

impl Drop for Attached {
    fn drop(&mut self) {
        *active() = None;
    }
}
