use super::ui;
use crate::core::config::RatesSourceConfig;
use crate::core::service::RateService;
use crate::providers;
use crate::store::RateArchive;
use anyhow::{Context, Result, bail};

/// Pulls a fresh table from the configured source, stores it in the archive
/// and republishes the service from the archive.
pub async fn run(
    service: &RateService,
    archive: &RateArchive,
    source_config: Option<&RatesSourceConfig>,
) -> Result<()> {
    let Some(source_config) = source_config else {
        bail!("No rate source configured. Add a `rates` section to the configuration file");
    };
    let source = providers::from_config(source_config);

    let pb = ui::new_spinner("Fetching exchange rates...");
    let fetched = source.fetch_table().await;
    pb.finish_and_clear();

    let table = fetched.context("Failed to fetch exchange rates")?;
    if table.is_empty() {
        bail!("Rate source returned no rates, keeping the archived table");
    }
    table
        .validate()
        .context("Rate source returned an inconsistent table, keeping the archived table")?;
    archive.save(&table)?;
    let days = service.refresh(archive).await?;

    let range = match (table.first_date(), table.last_date()) {
        (Some(first), Some(last)) => format!(" ({first} to {last})"),
        _ => String::new(),
    };
    println!(
        "Stored {} for {} currencies{}",
        ui::style_text(&format!("{days} days of rates"), ui::StyleType::TotalValue),
        table.currencies().len(),
        ui::style_text(&range, ui::StyleType::Subtle)
    );
    Ok(())
}
