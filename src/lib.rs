pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::aggregate::Granularity;
use crate::core::config::AppConfig;
use crate::core::currency::CurrencyCode;
use crate::core::rates::RateTable;
use crate::core::service::RateService;
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Commands that operate on a loaded configuration and rate archive.
#[derive(Debug, Clone)]
pub enum AppCommand {
    Rate {
        from: CurrencyCode,
        to: CurrencyCode,
        date: Option<NaiveDate>,
    },
    Refresh,
    Categories {
        file: PathBuf,
        currency: Option<CurrencyCode>,
    },
    Timeline {
        file: PathBuf,
        granularity: Granularity,
        currency: Option<CurrencyCode>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("ratebook starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let archive = store::RateArchive::open(&config.default_data_path()?.join("rates"))?;
    let initial = archive
        .load()
        .and_then(|table| table.validate().map(|()| table))
        .unwrap_or_else(|e| {
            warn!("Ignoring unusable rate archive: {e:#}");
            RateTable::default()
        });
    let service = RateService::new(initial);

    match command {
        AppCommand::Rate { from, to, date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            cli::rate::run(&service, &from, &to, date)
        }
        AppCommand::Refresh => cli::refresh::run(&service, &archive, config.rates.as_ref()).await,
        AppCommand::Categories { file, currency } => cli::report::run_categories(
            &service,
            &file,
            &config.import,
            currency.as_ref().unwrap_or(&config.currency),
        ),
        AppCommand::Timeline {
            file,
            granularity,
            currency,
        } => cli::report::run_timeline(
            &service,
            &file,
            &config.import,
            granularity,
            currency.as_ref().unwrap_or(&config.currency),
        ),
    }
}
