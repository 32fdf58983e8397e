use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use ratebook::core::aggregate::Granularity;
use ratebook::core::currency::CurrencyCode;
use ratebook::core::log::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show the conversion rate between two currencies
    Rate {
        /// Currency to convert from
        from: CurrencyCode,
        /// Currency to convert to
        to: CurrencyCode,
        /// Day to look up (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Download exchange rates from the configured source
    Refresh,
    /// Sum a CSV export of transactions per category
    Categories {
        /// CSV file to read
        file: PathBuf,
        /// Display currency, overrides the configured one
        #[arg(long)]
        currency: Option<CurrencyCode>,
    },
    /// Sum a CSV export of transactions per day, week, month or year
    Timeline {
        /// CSV file to read
        file: PathBuf,
        /// Bucket size: day, week, month or year
        #[arg(short, long, default_value = "month")]
        granularity: Granularity,
        /// Display currency, overrides the configured one
        #[arg(long)]
        currency: Option<CurrencyCode>,
    },
}

impl From<Commands> for ratebook::AppCommand {
    fn from(cmd: Commands) -> ratebook::AppCommand {
        match cmd {
            Commands::Rate { from, to, date } => ratebook::AppCommand::Rate { from, to, date },
            Commands::Refresh => ratebook::AppCommand::Refresh,
            Commands::Categories { file, currency } => {
                ratebook::AppCommand::Categories { file, currency }
            }
            Commands::Timeline {
                file,
                granularity,
                currency,
            } => ratebook::AppCommand::Timeline {
                file,
                granularity,
                currency,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => ratebook::cli::setup::setup(),
        Some(cmd) => ratebook::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
