use super::ui;
use crate::core::aggregate::{Bucket, Granularity, MoneyRecord, Transaction};
use crate::core::currency::CurrencyCode;
use crate::core::import::{CsvMapping, load_transactions};
use crate::core::rates::RateTable;
use crate::core::service::RateService;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use comfy_table::Cell;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Fails if any currency involved cannot be converted with `table`.
pub fn ensure_supported(
    table: &RateTable,
    records: &[Transaction],
    target: &CurrencyCode,
) -> Result<()> {
    let unsupported: BTreeSet<String> = records
        .iter()
        .map(|r| r.currency())
        .chain(std::iter::once(target))
        .filter(|code| !table.supports(code))
        .map(|code| code.to_string())
        .collect();
    if !unsupported.is_empty() {
        let known: Vec<String> = table.currencies().iter().map(|c| c.to_string()).collect();
        bail!(
            "No exchange rates for {}. Known currencies: {}",
            unsupported.into_iter().collect::<Vec<_>>().join(", "),
            known.join(", ")
        );
    }
    Ok(())
}

fn grand_total<K>(buckets: &[Bucket<K>]) -> Option<Decimal> {
    buckets.iter().try_fold(Decimal::ZERO, |sum, bucket| {
        bucket.total.and_then(|total| sum.checked_add(total))
    })
}

fn footer(buckets_total: Option<Decimal>, target: &CurrencyCode) -> String {
    let style_type = if buckets_total.is_some() {
        ui::StyleType::TotalValue
    } else {
        ui::StyleType::Error
    };
    format!(
        "\n\nTotal ({}): {}",
        ui::style_text(target.as_str(), ui::StyleType::TotalLabel),
        ui::style_text(&ui::format_amount(buckets_total), style_type)
    )
}

pub fn render_categories(buckets: &[Bucket<String>], target: &CurrencyCode) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Category"),
        ui::header_cell(&format!("Amount ({target})")),
    ]);
    for bucket in buckets {
        table.add_row(vec![Cell::new(&bucket.key), ui::amount_cell(bucket.total)]);
    }

    let mut output = format!(
        "{}\n\n",
        ui::style_text("Spending by category", ui::StyleType::Title)
    );
    output.push_str(&table.to_string());
    output.push_str(&footer(grand_total(buckets), target));
    output
}

fn bucket_label(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::Week => date.format("%G-W%V").to_string(),
        Granularity::Month => date.format("%Y-%m").to_string(),
        Granularity::Year => date.format("%Y").to_string(),
    }
}

pub fn render_timeline(
    buckets: &[Bucket<NaiveDate>],
    granularity: Granularity,
    target: &CurrencyCode,
) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Period"),
        ui::header_cell("Starts"),
        ui::header_cell(&format!("Amount ({target})")),
    ]);
    for bucket in buckets {
        table.add_row(vec![
            Cell::new(bucket_label(bucket.key, granularity)),
            Cell::new(ui::style_text(
                &bucket.key.format("%Y-%m-%d").to_string(),
                ui::StyleType::Subtle,
            )),
            ui::amount_cell(bucket.total),
        ]);
    }

    let title = format!("Totals per {granularity}");
    let mut output = format!("{}\n\n", ui::style_text(&title, ui::StyleType::Title));
    output.push_str(&table.to_string());
    output.push_str(&footer(grand_total(buckets), target));
    output
}

fn load(file: &Path, mapping: &CsvMapping) -> Result<Vec<Transaction>> {
    let records = load_transactions(file, mapping)?;
    if records.is_empty() {
        println!("No transactions found in {}.", file.display());
    }
    Ok(records)
}

pub fn run_categories(
    service: &RateService,
    file: &Path,
    mapping: &CsvMapping,
    target: &CurrencyCode,
) -> Result<()> {
    let records = load(file, mapping)?;
    if records.is_empty() {
        return Ok(());
    }
    ensure_supported(&service.snapshot(), &records, target)?;

    let buckets = service.aggregate_by_category(&records, target);
    debug!("Rendering {} categories", buckets.len());
    println!("{}", render_categories(&buckets, target));
    Ok(())
}

pub fn run_timeline(
    service: &RateService,
    file: &Path,
    mapping: &CsvMapping,
    granularity: Granularity,
    target: &CurrencyCode,
) -> Result<()> {
    let records = load(file, mapping)?;
    if records.is_empty() {
        return Ok(());
    }
    ensure_supported(&service.snapshot(), &records, target)?;

    let buckets = service.aggregate_by_time(&records, granularity, target);
    debug!("Rendering {} {granularity} buckets", buckets.len());
    println!("{}", render_timeline(&buckets, granularity, target));
    Ok(())
}
