//! Maps CSV exports of transactions onto [`Transaction`] records.

use crate::core::aggregate::Transaction;
use crate::core::currency::CurrencyCode;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, instrument};

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Column layout and value conventions of a CSV export.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CsvMapping {
    pub date_column: String,
    pub amount_column: String,
    pub category_column: String,
    pub currency_column: Option<String>,
    pub date_format: String,
    pub default_currency: String,
    /// Flip signs for exports that list expenses as positive numbers.
    pub negate_amounts: bool,
}

impl Default for CsvMapping {
    fn default() -> Self {
        CsvMapping {
            date_column: "Date".to_string(),
            amount_column: "Amount".to_string(),
            category_column: "Category".to_string(),
            currency_column: Some("Currency".to_string()),
            date_format: "%Y-%m-%d".to_string(),
            default_currency: "USD".to_string(),
            negate_amounts: false,
        }
    }
}

struct ColumnIndexes {
    date: usize,
    amount: usize,
    category: usize,
    currency: Option<usize>,
}

impl CsvMapping {
    fn resolve_columns(&self, headers: &csv::StringRecord) -> Result<ColumnIndexes> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let required = |name: &str| {
            find(name).ok_or_else(|| anyhow!("Missing column '{}' in CSV header", name))
        };
        Ok(ColumnIndexes {
            date: required(&self.date_column)?,
            amount: required(&self.amount_column)?,
            category: required(&self.category_column)?,
            currency: self.currency_column.as_deref().and_then(find),
        })
    }

    /// Parses a date cell, truncating timestamps to their UTC day.
    pub fn parse_date(&self, value: &str) -> Result<NaiveDate> {
        let value = value.trim();
        if let Ok(date) = NaiveDate::parse_from_str(value, &self.date_format) {
            return Ok(date);
        }
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, &self.date_format) {
            return Ok(datetime.date());
        }
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc).date_naive())
            .with_context(|| format!("Failed to parse date: {value}"))
    }
}

/// Parses amounts like `-12.00`, `$1,234.50` or `(45.10)`.
pub fn parse_amount(value: &str) -> Result<Decimal> {
    let trimmed = value.trim();
    let (negative, body) = match trimmed.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };
    let cleaned: String = body
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect();
    let amount = Decimal::from_str(&cleaned)
        .with_context(|| format!("Failed to parse amount: {value}"))?;
    Ok(if negative { -amount } else { amount })
}

/// Reads transactions from any CSV reader with a header row.
pub fn read_transactions<R: Read>(reader: R, mapping: &CsvMapping) -> Result<Vec<Transaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let columns = mapping.resolve_columns(&headers)?;
    let default_currency: CurrencyCode = mapping
        .default_currency
        .parse()
        .context("Invalid default currency in import mapping")?;

    let mut transactions = Vec::new();
    for (index, result) in reader.records().enumerate() {
        // +2: one-based lines plus the header row
        let line = index + 2;
        let record = result.with_context(|| format!("Failed to parse CSV line {line}"))?;
        let cell = |i: usize| record.get(i).unwrap_or("");

        let date = mapping
            .parse_date(cell(columns.date))
            .with_context(|| format!("Line {line}, column '{}'", mapping.date_column))?;
        let mut amount = parse_amount(cell(columns.amount))
            .with_context(|| format!("Line {line}, column '{}'", mapping.amount_column))?;
        if mapping.negate_amounts {
            amount = -amount;
        }
        let currency = match columns.currency.map(cell).filter(|c| !c.is_empty()) {
            Some(code) => code
                .parse::<CurrencyCode>()
                .with_context(|| format!("Line {line}, invalid currency"))?,
            None => default_currency.clone(),
        };
        let category = match cell(columns.category) {
            "" => UNCATEGORIZED,
            other => other,
        };

        transactions.push(Transaction::new(date, amount, currency, category));
    }
    debug!("Imported {} transactions", transactions.len());
    Ok(transactions)
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_transactions(path: &Path, mapping: &CsvMapping) -> Result<Vec<Transaction>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    read_transactions(file, mapping)
        .with_context(|| format!("Failed to import transactions from {}", path.display()))
}
