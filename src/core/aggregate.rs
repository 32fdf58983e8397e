//! Category and calendar bucket aggregation of multi-currency amounts.
//!
//! Every amount is converted at the rate in effect on its own date, never at
//! today's rate. Unknown conversions make the affected total unknown (`None`)
//! instead of silently dropping the amount.

use crate::core::currency::CurrencyCode;
use crate::core::rates::RateTable;
use chrono::{Datelike, Days, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

/// A dated amount in some currency.
pub trait MoneyRecord {
    fn amount(&self) -> Decimal;
    fn currency(&self) -> &CurrencyCode;
    fn date(&self) -> NaiveDate;
}

/// A [`MoneyRecord`] that belongs to a category.
pub trait CategorizedRecord: MoneyRecord {
    fn category(&self) -> &str;
}

/// Decimal value paired with its currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonetaryAmount {
    pub amount: Decimal,
    pub currency: CurrencyCode,
}

impl MonetaryAmount {
    pub fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub amount: MonetaryAmount,
    pub category: String,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        amount: Decimal,
        currency: CurrencyCode,
        category: impl Into<String>,
    ) -> Self {
        Self {
            date,
            amount: MonetaryAmount::new(amount, currency),
            category: category.into(),
        }
    }
}

impl MoneyRecord for Transaction {
    fn amount(&self) -> Decimal {
        self.amount.amount
    }

    fn currency(&self) -> &CurrencyCode {
        &self.amount.currency
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl CategorizedRecord for Transaction {
    fn category(&self) -> &str {
        &self.category
    }
}

/// One entry of an aggregated series. `total` is `None` when some
/// contribution could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket<K> {
    pub key: K,
    pub total: Option<Decimal>,
}

impl<K> Bucket<K> {
    pub fn new(key: K, total: Option<Decimal>) -> Self {
        Self { key, total }
    }
}

/// Calendar width of a time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    /// First day of the bucket containing `date`. Weeks start on Monday.
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                date - Days::new(date.weekday().num_days_from_monday() as u64)
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
            Granularity::Year => date.with_ordinal(1).unwrap_or(date),
        }
    }

    /// Start of the bucket following the one starting at `start`.
    pub fn next(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.checked_add_days(Days::new(1)),
            Granularity::Week => start.checked_add_days(Days::new(7)),
            Granularity::Month => start.checked_add_months(Months::new(1)),
            Granularity::Year => start.checked_add_months(Months::new(12)),
        }
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Granularity::Day => "day",
                Granularity::Week => "week",
                Granularity::Month => "month",
                Granularity::Year => "year",
            }
        )
    }
}

impl FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            "year" | "yearly" => Ok(Granularity::Year),
            _ => Err(anyhow::anyhow!("Invalid granularity: {}", s)),
        }
    }
}

/// Converts a record into `target` at the rate of the record's own date.
pub fn convert<R: MoneyRecord + ?Sized>(
    table: &RateTable,
    record: &R,
    target: &CurrencyCode,
) -> Option<Decimal> {
    let rate = table.resolve(record.currency(), target, record.date())?;
    record.amount().checked_mul(rate)
}

fn accumulate(total: &mut Option<Decimal>, value: Option<Decimal>) {
    *total = total
        .zip(value)
        .and_then(|(sum, value)| sum.checked_add(value));
}

/// Ascending by signed total; unknown totals go last.
fn compare_totals(a: &Option<Decimal>, b: &Option<Decimal>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sums converted amounts per category, sorted ascending by total so the
/// largest expenses (most negative) come first.
pub fn by_category<'a, R, I>(
    table: &RateTable,
    records: I,
    target: &CurrencyCode,
) -> Vec<Bucket<String>>
where
    R: CategorizedRecord + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut totals: BTreeMap<&str, Option<Decimal>> = BTreeMap::new();
    for record in records {
        let converted = convert(table, record, target);
        accumulate(
            totals
                .entry(record.category())
                .or_insert(Some(Decimal::ZERO)),
            converted,
        );
    }

    let mut buckets: Vec<Bucket<String>> = totals
        .into_iter()
        .map(|(category, total)| Bucket::new(category.to_string(), total))
        .collect();
    buckets.sort_by(|a, b| compare_totals(&a.total, &b.total));
    debug!("Aggregated {} categories in {target}", buckets.len());
    buckets
}

/// Sums converted amounts per calendar bucket, sorted by date, with every
/// empty bucket between the first and last one filled with zero.
pub fn by_time<'a, R, I>(
    table: &RateTable,
    records: I,
    granularity: Granularity,
    target: &CurrencyCode,
) -> Vec<Bucket<NaiveDate>>
where
    R: MoneyRecord + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut totals: BTreeMap<NaiveDate, Option<Decimal>> = BTreeMap::new();
    for record in records {
        let key = granularity.bucket_start(record.date());
        let converted = convert(table, record, target);
        accumulate(totals.entry(key).or_insert(Some(Decimal::ZERO)), converted);
    }

    if let (Some(first), Some(last)) = (
        totals.first_key_value().map(|(d, _)| *d),
        totals.last_key_value().map(|(d, _)| *d),
    ) {
        let mut cursor = first;
        while let Some(next) = granularity.next(cursor) {
            if next >= last {
                break;
            }
            totals.entry(next).or_insert(Some(Decimal::ZERO));
            cursor = next;
        }
    }

    debug!(
        "Aggregated {} {granularity} buckets in {target}",
        totals.len()
    );
    totals
        .into_iter()
        .map(|(date, total)| Bucket::new(date, total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::DailyRates;

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn usd(d: NaiveDate, amount: i64, category: &str) -> Transaction {
        Transaction::new(d, Decimal::new(amount, 0), code("USD"), category)
    }

    fn eur_table() -> RateTable {
        let mut table = RateTable::new();
        let mut early = DailyRates::new();
        early.insert(code("EUR"), Decimal::new(2, 0));
        table.insert_day(date(2024, 1, 1), early);
        let mut late = DailyRates::new();
        late.insert(code("EUR"), Decimal::new(3, 0));
        table.insert_day(date(2024, 6, 1), late);
        table
    }

    #[test]
    fn test_category_totals_sorted_ascending() {
        let d = date(2024, 5, 1);
        let records = vec![
            usd(d, -10, "Food"),
            usd(d, -5, "Food"),
            usd(d, 20, "Salary"),
        ];
        let result = by_category(&RateTable::new(), &records, &code("USD"));
        assert_eq!(
            result,
            vec![
                Bucket::new("Food".to_string(), Some(Decimal::new(-15, 0))),
                Bucket::new("Salary".to_string(), Some(Decimal::new(20, 0))),
            ]
        );
    }

    #[test]
    fn test_category_sort_is_signed_not_by_magnitude() {
        let d = date(2024, 5, 1);
        let records = vec![
            usd(d, 100, "Salary"),
            usd(d, -1, "Coffee"),
            usd(d, -50, "Rent"),
        ];
        let keys: Vec<String> = by_category(&RateTable::new(), &records, &code("USD"))
            .into_iter()
            .map(|b| b.key)
            .collect();
        assert_eq!(keys, vec!["Rent", "Coffee", "Salary"]);
    }

    #[test]
    fn test_converts_at_transaction_date() {
        let table = eur_table();
        let records = vec![
            Transaction::new(date(2024, 1, 5), Decimal::new(10, 0), code("EUR"), "Travel"),
            Transaction::new(date(2024, 6, 5), Decimal::new(10, 0), code("EUR"), "Travel"),
        ];
        let result = by_category(&table, &records, &code("USD"));
        // 10 * 2 + 10 * 3
        assert_eq!(
            result,
            vec![Bucket::new("Travel".to_string(), Some(Decimal::new(50, 0)))]
        );
    }

    #[test]
    fn test_unknown_rate_poisons_only_its_bucket() {
        let d = date(2024, 5, 1);
        let records = vec![
            Transaction::new(d, Decimal::new(10, 0), code("EUR"), "Travel"),
            usd(d, -3, "Food"),
            usd(d, 4, "Travel"),
        ];
        // Empty table: EUR cannot be converted.
        let result = by_category(&RateTable::new(), &records, &code("USD"));
        assert_eq!(
            result,
            vec![
                Bucket::new("Food".to_string(), Some(Decimal::new(-3, 0))),
                Bucket::new("Travel".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        let records: Vec<Transaction> = Vec::new();
        assert!(by_category(&RateTable::new(), &records, &code("USD")).is_empty());
        assert!(
            by_time(&RateTable::new(), &records, Granularity::Month, &code("USD")).is_empty()
        );
    }

    #[test]
    fn test_daily_series_fills_gaps_with_zero() {
        let records = vec![
            usd(date(2024, 3, 1), 10, "A"),
            usd(date(2024, 3, 3), 20, "B"),
        ];
        let result = by_time(&RateTable::new(), &records, Granularity::Day, &code("USD"));
        assert_eq!(
            result,
            vec![
                Bucket::new(date(2024, 3, 1), Some(Decimal::new(10, 0))),
                Bucket::new(date(2024, 3, 2), Some(Decimal::ZERO)),
                Bucket::new(date(2024, 3, 3), Some(Decimal::new(20, 0))),
            ]
        );
    }

    #[test]
    fn test_single_record_single_bucket() {
        let records = vec![usd(date(2024, 3, 14), 7, "A")];
        let result = by_time(&RateTable::new(), &records, Granularity::Week, &code("USD"));
        assert_eq!(
            result,
            vec![Bucket::new(date(2024, 3, 11), Some(Decimal::new(7, 0)))]
        );
    }

    #[test]
    fn test_monthly_series_groups_and_fills() {
        let records = vec![
            usd(date(2024, 1, 31), 5, "A"),
            usd(date(2024, 1, 2), 5, "A"),
            usd(date(2024, 4, 15), -8, "A"),
        ];
        let result = by_time(&RateTable::new(), &records, Granularity::Month, &code("USD"));
        let expected = vec![
            Bucket::new(date(2024, 1, 1), Some(Decimal::new(10, 0))),
            Bucket::new(date(2024, 2, 1), Some(Decimal::ZERO)),
            Bucket::new(date(2024, 3, 1), Some(Decimal::ZERO)),
            Bucket::new(date(2024, 4, 1), Some(Decimal::new(-8, 0))),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn test_weekly_and_yearly_buckets() {
        let records = vec![
            usd(date(2023, 12, 31), 1, "A"), // Sunday, week of Dec 25
            usd(date(2024, 1, 8), 2, "A"),   // Monday
        ];
        let weeks = by_time(&RateTable::new(), &records, Granularity::Week, &code("USD"));
        let keys: Vec<NaiveDate> = weeks.iter().map(|b| b.key).collect();
        assert_eq!(
            keys,
            vec![date(2023, 12, 25), date(2024, 1, 1), date(2024, 1, 8)]
        );
        assert_eq!(weeks[1].total, Some(Decimal::ZERO));

        let records = vec![usd(date(2021, 6, 1), 1, "A"), usd(date(2024, 2, 29), 2, "A")];
        let years = by_time(&RateTable::new(), &records, Granularity::Year, &code("USD"));
        let keys: Vec<NaiveDate> = years.iter().map(|b| b.key).collect();
        assert_eq!(
            keys,
            vec![
                date(2021, 1, 1),
                date(2022, 1, 1),
                date(2023, 1, 1),
                date(2024, 1, 1)
            ]
        );
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let table = eur_table();
        let records = vec![
            Transaction::new(date(2024, 2, 1), Decimal::new(3, 0), code("EUR"), "X"),
            usd(date(2024, 4, 9), -4, "Y"),
        ];
        let target = code("EUR");
        assert_eq!(
            by_category(&table, &records, &target),
            by_category(&table, &records, &target)
        );
        assert_eq!(
            by_time(&table, &records, Granularity::Week, &target),
            by_time(&table, &records, Granularity::Week, &target)
        );
    }

    #[test]
    fn test_granularity_parsing() {
        assert_eq!("Month".parse::<Granularity>().unwrap(), Granularity::Month);
        assert_eq!("weekly".parse::<Granularity>().unwrap(), Granularity::Week);
        assert_eq!(Granularity::Year.to_string(), "year");
        assert!("fortnight".parse::<Granularity>().is_err());
    }
}
