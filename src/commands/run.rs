//! `mediasync run` / `mediasync plan`

use crate::Context;
use crate::cli::RunArgs;
use crate::config::Config;
use crate::context::RunContext;
use crate::logging;
use crate::paths;
use crate::progress;
use crate::runlog::{ConsoleMode, RunLog};
use crate::steps;
use crate::ui;
use anyhow::{Context as AnyhowContext, Result, bail};
use console::Term;
use converge::{FailurePolicy, RunReport, SyncOptions};
use mediakit::TransferMode;
use std::io::IsTerminal;
use std::path::PathBuf;

/// Effective settings after CLI flags are layered over the file
#[derive(Debug, Clone, PartialEq)]
struct RunPlan {
    sync: SyncOptions,
    policy: FailurePolicy,
    mode: TransferMode,
    log_dir: Option<PathBuf>,
}

impl RunPlan {
    fn new(args: &RunArgs, config: &Config) -> Self {
        let options = &config.options;
        Self {
            sync: SyncOptions {
                dry_run: args.dry_run,
                jobs: args.jobs.unwrap_or(options.jobs).max(1),
            },
            policy: if args.keep_going || options.keep_going {
                FailurePolicy::Continue
            } else {
                FailurePolicy::FailFast
            },
            mode: TransferMode::from_local_network(
                args.local_copy || options.copy_using_local_network,
            ),
            log_dir: args.log_dir.clone().or_else(|| options.log_dir()),
        }
    }
}

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let (config_path, config) = super::load_config(args.config.as_deref())?;
    let plan = RunPlan::new(&args, &config);

    let log_dir = match &plan.log_dir {
        Some(dir) => dir.clone(),
        None => paths::log_dir()?,
    };
    let console = ConsoleMode {
        quiet: ctx.quiet,
        verbose: ctx.verbose,
        spinners: Term::stderr().is_term(),
    };
    let runlog = RunLog::create(&log_dir, console)?;
    let _attached = logging::attach(runlog.logger());

    if !ctx.quiet {
        ui::header(if plan.sync.dry_run {
            "mediasync plan"
        } else {
            "mediasync run"
        });
        ui::kv("Config", &config_path.display().to_string());
        ui::kv("Source", &config.source.account_name);
        ui::kv("Destination", &config.destination.account_name);
        ui::kv("Content", transfer_label(plan.mode));
        ui::kv("Jobs", &plan.sync.jobs.to_string());
        ui::kv("Log", &runlog.path().display().to_string());
        println!();
    }

    runlog.info(&format!(
        "Replicating {} into {} (dry run: {}, jobs: {}, {:?}, {:?})",
        config.source.account_name,
        config.destination.account_name,
        plan.sync.dry_run,
        plan.sync.jobs,
        plan.policy,
        plan.mode,
    ));

    let spinner = progress::spinner("Connecting to both accounts", console.spinners && !ctx.quiet);
    let connected = RunContext::connect(&config, plan.sync.clone(), plan.mode);
    progress::finish_clear(&spinner);

    let run_ctx = match connected {
        Ok(run_ctx) => run_ctx,
        Err(e) => {
            runlog.fault("Connection failed", &e);
            runlog.flush()?;
            return Err(e);
        }
    };

    for account in [run_ctx.source.account(), run_ctx.destination.account()] {
        runlog.info(&format!(
            "Account {} in {} (storage {})",
            account.name, account.location, account.storage_account_name
        ));
    }

    let mut orchestrator = steps::orchestrator(plan.policy);
    if !args.only.is_empty() {
        orchestrator = orchestrator.select(args.only.iter().map(|c| c.key()));
    }

    let report = orchestrator.run(&run_ctx, &runlog);
    runlog.flush()?;

    if !ctx.quiet {
        print_summary(&report, plan.sync.dry_run);
        ui::dim(&format!("Run log: {}", runlog.path().display()));
    }

    if !report.is_success() {
        let failed: Vec<&str> = report.failed_steps().map(|s| s.label).collect();
        bail!(
            "{} did not complete: {}",
            ui::plural(failed.len(), "category", "categories"),
            failed.join(", ")
        );
    }

    if !args.yes && is_attended() {
        acknowledge(plan.sync.dry_run)?;
    }

    Ok(())
}

fn transfer_label(mode: TransferMode) -> &'static str {
    match mode {
        TransferMode::CloudCopy => "server-side copy",
        TransferMode::LocalRelay => "relay through this machine",
    }
}

fn print_summary(report: &RunReport, dry_run: bool) {
    ui::section("Summary");
    for step in &report.steps {
        ui::kv(step.label, &step.outcome.to_string());
    }
    println!();

    if !report.is_success() {
        ui::error("Replication did not complete");
    } else if dry_run {
        ui::info(&format!(
            "{} would be created",
            ui::plural(report.total_planned(), "resource", "resources")
        ));
    } else {
        ui::success(&format!(
            "Replication complete: {} created",
            ui::plural(report.total_created(), "resource", "resources")
        ));
    }
}

/// Both stdin and stdout are terminals
fn is_attended() -> bool {
    console::user_attended() && std::io::stdin().is_terminal()
}

fn acknowledge(dry_run: bool) -> Result<()> {
    let prompt = if dry_run {
        "Plan finished. Acknowledge?"
    } else {
        "Replication finished. Acknowledge?"
    };

    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .context("Failed to read confirmation")?;

    Ok(())
}
