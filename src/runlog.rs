//! Run log: timestamped record of a replication run
//!
//! Every engine event is logged to `mediasync-YYYYMMDD-HHMMSS.log` in the
//! log directory and mirrored to the console. Faults carry the service
//! error code and the full error chain. While attached to the global logger
//! (see [`crate::logging::attach`]) the same file also receives library
//! diagnostics.

use crate::logging::{self, FileTarget, RUN_TARGET};
use crate::progress;
use crate::ui;
use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use converge::{EntityOutcome, ReportSink, RunReport, StepOutcome};
use indicatif::ProgressBar;
use log::{Level, Log, Record};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// How much of the run is echoed to the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMode {
    pub quiet: bool,
    pub verbose: u8,
    /// Draw spinners (stderr is a terminal)
    pub spinners: bool,
}

pub struct RunLog {
    path: PathBuf,
    target: FileTarget,
    logger: Arc<env_logger::Logger>,
    console: ConsoleMode,
    spinner: Mutex<Option<ProgressBar>>,
}

impl RunLog {
    /// Create a new log file named after the current local time
    pub fn create(dir: &Path, console: ConsoleMode) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let name = format!("mediasync-{}.log", Local::now().format("%Y%m%d-%H%M%S"));
        let path = dir.join(name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open run log {}", path.display()))?;

        let target = FileTarget::new(file);
        let logger = Arc::new(target.logger(logging::file_level(console.verbose)));

        Ok(Self {
            path,
            target,
            logger,
            console,
            spinner: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File logger, for attaching to the global logger
    pub fn logger(&self) -> Arc<env_logger::Logger> {
        Arc::clone(&self.logger)
    }

    /// Log an informational line
    pub fn info(&self, msg: &str) {
        self.emit(Level::Info, format_args!("{msg}"));
    }

    /// Log a warning line
    pub fn warn(&self, msg: &str) {
        self.emit(Level::Warn, format_args!("{msg}"));
    }

    /// Record a fault: code and message on one line, then the chain
    pub fn fault(&self, context: &str, error: &anyhow::Error) {
        let code = error_code(error).unwrap_or("Error");
        self.emit(Level::Error, format_args!("{context}: {code}: {error}"));
        for (depth, cause) in error.chain().enumerate().skip(1) {
            self.emit(Level::Error, format_args!("  {depth}: {cause}"));
        }
    }

    /// Flush buffered lines to disk
    pub fn flush(&self) -> Result<()> {
        self.target
            .clone()
            .flush()
            .with_context(|| format!("Failed to write run log {}", self.path.display()))
    }

    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        self.logger.log(
            &Record::builder()
                .level(level)
                .target(RUN_TARGET)
                .args(args)
                .build(),
        );
    }

    fn spinner_lock(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.spinner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Print to the console above the active spinner
    fn echo(&self, f: impl FnOnce()) {
        if self.console.quiet {
            return;
        }
        match self.spinner_lock().as_ref() {
            Some(pb) => progress::above(pb, f),
            None => f(),
        }
    }
}

impl ReportSink for RunLog {
    fn on_run_start(&self, total_steps: usize) {
        self.info(&format!("Run started ({total_steps} steps)"));
    }

    fn on_step_start(&self, index: usize, total: usize, label: &str) {
        self.info(&format!("Step {index} of {total}: {label}"));

        if !self.console.quiet {
            ui::step(index, total, label);
            let pb = progress::spinner(&format!("Replicating {label}"), self.console.spinners);
            *self.spinner_lock() = Some(pb);
        }
    }

    fn on_listed(&self, collection: &str, source: usize, destination: usize) {
        self.info(&format!(
            "{collection}: {source} in source, {destination} in destination"
        ));

        if self.console.verbose > 0 {
            self.echo(|| {
                ui::dim(&format!(
                    "{collection}: {source} in source, {destination} in destination"
                ));
            });
        }
    }

    fn on_entity(&self, collection: &str, name: &str, outcome: &EntityOutcome) {
        match outcome {
            EntityOutcome::Failed { error } => {
                self.emit(Level::Error, format_args!("{collection}/{name}: {error}"));
            }
            other => self.info(&format!("{collection}/{name}: {}", describe(other))),
        }

        let show = match outcome {
            EntityOutcome::Existing => self.console.verbose > 0,
            _ => true,
        };
        if !show {
            return;
        }

        self.echo(|| {
            let symbol = match outcome {
                EntityOutcome::Created => outcome.symbol().green(),
                EntityOutcome::Planned => outcome.symbol().cyan(),
                EntityOutcome::Existing => outcome.symbol().dimmed(),
                EntityOutcome::Failed { .. } => outcome.symbol().red(),
            };
            match outcome {
                EntityOutcome::Failed { error } => {
                    println!("  {symbol} {name} {}", format!("({error})").red());
                }
                other => println!("  {symbol} {name} {}", describe(other).dimmed()),
            }
        });
    }

    fn on_step_complete(&self, index: usize, label: &str, outcome: &StepOutcome) {
        if let Some(pb) = self.spinner_lock().take() {
            progress::finish_clear(&pb);
        }

        match outcome {
            StepOutcome::Faulted(e) => self.fault(&format!("Step {index} ({label}) faulted"), e),
            StepOutcome::Failed(_) | StepOutcome::NotAttempted => {
                self.warn(&format!("Step {index} ({label}) {outcome}"));
            }
            _ => self.info(&format!("Step {index} ({label}) {outcome}")),
        }

        if self.console.quiet {
            return;
        }

        match outcome {
            StepOutcome::Succeeded(s) => ui::success(&format!(
                "{label}: {} created, {} existing, {} planned",
                s.total_created(),
                s.entities.existing + s.children.existing,
                s.total_planned(),
            )),
            StepOutcome::Failed(s) => {
                ui::warn(&format!(
                    "{label}: {} failed, {} created",
                    s.entities.failed + s.children.failed,
                    s.total_created()
                ));
                for (name, error) in &s.failures {
                    ui::dim(&format!("{name}: {error}"));
                }
            }
            StepOutcome::Faulted(e) => {
                let code = error_code(e).unwrap_or("Error");
                ui::error(&format!("{label}: {code}: {e}"));
            }
            StepOutcome::Skipped => ui::dim(&format!("{label}: skipped")),
            StepOutcome::NotAttempted => ui::dim(&format!("{label}: not attempted")),
        }
    }

    fn on_run_complete(&self, report: &RunReport) {
        let failed: Vec<&str> = report.failed_steps().map(|s| s.label).collect();
        if failed.is_empty() {
            self.info(&format!(
                "Run finished: {} created, {} planned",
                report.total_created(),
                report.total_planned()
            ));
        } else {
            self.warn(&format!("Run finished with failures: {}", failed.join(", ")));
        }

        if let Err(e) = self.flush() {
            log::warn!("{e:#}");
        }
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        let _ = self.target.flush();
    }
}

fn describe(outcome: &EntityOutcome) -> &'static str {
    match outcome {
        EntityOutcome::Existing => "already exists",
        EntityOutcome::Created => "created",
        EntityOutcome::Planned => "would be created",
        EntityOutcome::Failed { .. } => "failed",
    }
}

/// Service error code of the first media error in the chain
pub fn error_code(error: &anyhow::Error) -> Option<&str> {
    error
        .chain()
        .find_map(|e| e.downcast_ref::<mediakit::Error>())
        .map(mediakit::Error::code)
}
