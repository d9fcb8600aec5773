use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediasync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Replicate the configuration of a Media Services account into another account",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replicate every category from the source account into the destination
    Run(RunArgs),

    /// Show what a run would create (same as `run --dry-run`)
    Plan(RunArgs),

    /// Validate the configuration and optionally sign in to both accounts
    Check(CheckArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// List and compare only; create nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the acknowledgement prompt at the end of the run
    #[arg(short, long)]
    pub yes: bool,

    /// Run the remaining categories after one fails
    #[arg(short, long)]
    pub keep_going: bool,

    /// Only replicate these categories (comma-separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub only: Vec<Category>,

    /// Parallel creates per category
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Relay asset content through this machine instead of a server-side copy
    #[arg(long)]
    pub local_copy: bool,

    /// Directory for the run log
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also authenticate against both accounts
    #[arg(long)]
    pub connect: bool,
}

/// Replicated resource categories, in run order
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    AccountFilters,
    Transforms,
    ContentKeyPolicies,
    StreamingEndpoints,
    Assets,
    StreamingLocators,
    LiveEvents,
}

impl Category {
    /// Every category in run order
    pub const ALL: [Category; 7] = [
        Self::AccountFilters,
        Self::Transforms,
        Self::ContentKeyPolicies,
        Self::StreamingEndpoints,
        Self::Assets,
        Self::StreamingLocators,
        Self::LiveEvents,
    ];

    /// Step selection key
    pub fn key(&self) -> &'static str {
        match self {
            Self::AccountFilters => "account-filters",
            Self::Transforms => "transforms",
            Self::ContentKeyPolicies => "content-key-policies",
            Self::StreamingEndpoints => "streaming-endpoints",
            Self::Assets => "assets",
            Self::StreamingLocators => "streaming-locators",
            Self::LiveEvents => "live-events",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AccountFilters => "Account Filters",
            Self::Transforms => "Transforms",
            Self::ContentKeyPolicies => "Content Key Policies",
            Self::StreamingEndpoints => "Streaming Endpoints",
            Self::Assets => "Assets",
            Self::StreamingLocators => "Streaming Locators",
            Self::LiveEvents => "Live Events",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_only_accepts_comma_list() {
        let cli = Cli::try_parse_from([
            "mediasync",
            "run",
            "--only",
            "assets,streaming-locators",
            "--jobs",
            "2",
        ])
        .unwrap();

        match cli.command {
            Command::Run(args) => {
                assert_eq!(
                    args.only,
                    vec![Category::Assets, Category::StreamingLocators]
                );
                assert_eq!(args.jobs, Some(2));
                assert!(!args.dry_run);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_value_names_match_keys() {
        for category in Category::ALL {
            let value = category.to_possible_value().unwrap();
            assert_eq!(value.get_name(), category.key());
        }
    }
}
