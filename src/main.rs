mod cli;
mod commands;
mod config;
mod context;
mod logging;
mod paths;
mod progress;
mod replicators;
mod runlog;
mod steps;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, RunArgs};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    logging::init(cli.verbose, cli.quiet);

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Run(args) => commands::run::run(&ctx, args),
        Command::Plan(args) => commands::run::run(
            &ctx,
            RunArgs {
                dry_run: true,
                ..args
            },
        ),
        Command::Check(args) => commands::check::run(&ctx, args),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "mediasync", &mut io::stdout());
            Ok(())
        }
    }
}
