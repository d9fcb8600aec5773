//! `mediasync check`

use crate::Context;
use crate::cli::CheckArgs;
use crate::config::AccountConfig;
use crate::progress;
use crate::ui;
use anyhow::{Context as AnyhowContext, Result};
use console::Term;
use mediakit::{ClientOptions, MediaClient};

pub fn run(ctx: &Context, args: CheckArgs) -> Result<()> {
    let (path, config) = super::load_config(args.config.as_deref())?;

    if ctx.quiet && !args.connect {
        return Ok(());
    }

    ui::header("Configuration");
    ui::kv("File", &path.display().to_string());
    ui::kv("Source", &describe(&config.source));
    ui::kv("Destination", &describe(&config.destination));
    ui::kv("Jobs", &config.options.jobs.to_string());
    ui::kv(
        "Content",
        if config.options.copy_using_local_network {
            "relay through this machine"
        } else {
            "server-side copy"
        },
    );
    ui::success("Configuration is valid");

    if !args.connect {
        return Ok(());
    }

    ui::section("Accounts");
    let options = config.options.client_options();
    for (role, account) in [("source", &config.source), ("destination", &config.destination)] {
        connect(role, account, &options, !ctx.quiet)?;
    }

    Ok(())
}

fn describe(account: &AccountConfig) -> String {
    format!("{} ({})", account.account_name, account.resource_group)
}

fn connect(role: &str, account: &AccountConfig, options: &ClientOptions, show: bool) -> Result<()> {
    let spinner = progress::spinner(
        &format!("Signing in to {role} account {}", account.account_name),
        show && Term::stderr().is_term(),
    );
    let connected = MediaClient::connect(&account.to_context(), options);
    progress::finish_clear(&spinner);

    let client = connected
        .with_context(|| format!("Failed to connect to {role} account {}", account.account_name))?;
    let info = client.account();
    ui::success(&format!(
        "{role}: {} in {} (storage account {})",
        info.name, info.location, info.storage_account_name
    ));

    Ok(())
}
