//! Date keyed exchange rate table and rate resolution.
//!
//! Every stored rate says how many units of [`REFERENCE_CURRENCY`] one unit of
//! the keyed currency is worth on that day. The reference currency itself is
//! implicitly `1` on every date and never has to be stored.
//!
//! [`REFERENCE_CURRENCY`]: crate::core::currency::REFERENCE_CURRENCY

use crate::core::currency::CurrencyCode;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, error};

/// Rates of every supported currency for a single day.
pub type DailyRates = HashMap<CurrencyCode, Decimal>;

/// Sparse table of daily rates, ordered by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateTable {
    days: BTreeMap<NaiveDate, DailyRates>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the rates for `date`.
    pub fn insert_day(&mut self, date: NaiveDate, rates: DailyRates) {
        self.days.insert(date, rates);
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Number of distinct dates in the table.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.first_key_value().map(|(date, _)| *date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.last_key_value().map(|(date, _)| *date)
    }

    /// Dates and their rates in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &DailyRates)> {
        self.days.iter()
    }

    pub fn rates_on(&self, date: NaiveDate) -> Option<&DailyRates> {
        self.days.get(&date)
    }

    /// Currencies convertible on every date of this table, reference currency
    /// included.
    pub fn currencies(&self) -> BTreeSet<CurrencyCode> {
        let mut days = self.days.values();
        let mut codes: BTreeSet<CurrencyCode> = days
            .next()
            .map(|rates| rates.keys().cloned().collect())
            .unwrap_or_default();
        for rates in days {
            codes.retain(|code| rates.contains_key(code));
        }
        codes.insert(CurrencyCode::reference());
        codes
    }

    pub fn supports(&self, code: &CurrencyCode) -> bool {
        code.is_reference()
            || (!self.days.is_empty() && self.days.values().all(|rates| rates.contains_key(code)))
    }

    /// Fails unless every date carries the same set of currencies.
    ///
    /// The reference currency is ignored, it is implicit on every date.
    pub fn validate(&self) -> Result<()> {
        let stored = |rates: &DailyRates| -> BTreeSet<CurrencyCode> {
            rates.keys().filter(|c| !c.is_reference()).cloned().collect()
        };
        let mut days = self.days.iter();
        let Some((first_date, first_rates)) = days.next() else {
            return Ok(());
        };
        let expected = stored(first_rates);
        for (date, rates) in days {
            let codes = stored(rates);
            if codes != expected {
                let missing: Vec<String> =
                    expected.difference(&codes).map(|c| c.to_string()).collect();
                let extra: Vec<String> =
                    codes.difference(&expected).map(|c| c.to_string()).collect();
                bail!(
                    "Rate table entry for {date} differs from {first_date}: missing [{}], extra [{}]",
                    missing.join(", "),
                    extra.join(", ")
                );
            }
        }
        Ok(())
    }

    /// Picks the table date closest to `target`.
    ///
    /// Targets outside the table range clamp to the first or last date. An
    /// exact tie between two neighbours goes to the earlier one.
    pub fn nearest_date(&self, target: NaiveDate) -> Option<NaiveDate> {
        let first = self.first_date()?;
        let last = self.last_date()?;
        if target >= last {
            return Some(last);
        }
        if target <= first {
            return Some(first);
        }

        let before = self.days.range(..=target).next_back().map(|(d, _)| *d);
        let after = self.days.range(target..).next().map(|(d, _)| *d);
        match (before, after) {
            (Some(before), Some(after)) => {
                if target - before <= after - target {
                    Some(before)
                } else {
                    Some(after)
                }
            }
            (before, after) => before.or(after),
        }
    }

    /// Returns `r` such that `amount_in_counter = amount_in_source * r`.
    ///
    /// `None` means the rate is unknown: the table is empty, or the entry for
    /// the resolved date lacks one of the currencies.
    pub fn resolve(
        &self,
        source: &CurrencyCode,
        counter: &CurrencyCode,
        date: NaiveDate,
    ) -> Option<Decimal> {
        if source == counter {
            return Some(Decimal::ONE);
        }

        let day = self.nearest_date(date)?;
        let rates = self.days.get(&day)?;
        if day != date {
            debug!("No rates for {date}, using nearest date {day}");
        }

        let rate = if source.is_reference() {
            let inverse = rate_to_reference(rates, counter, day)?;
            Decimal::ONE.checked_div(inverse)
        } else if counter.is_reference() {
            rate_to_reference(rates, source, day)
        } else {
            let source_rate = rate_to_reference(rates, source, day)?;
            let counter_rate = rate_to_reference(rates, counter, day)?;
            source_rate.checked_div(counter_rate)
        };
        debug!("Resolved {source}->{counter} on {day}: {rate:?}");
        rate
    }
}

fn rate_to_reference(rates: &DailyRates, code: &CurrencyCode, day: NaiveDate) -> Option<Decimal> {
    if code.is_reference() {
        return Some(Decimal::ONE);
    }
    let rate = rates.get(code).copied();
    if rate.is_none() {
        error!(currency = %code, %day, "Rate table entry is missing a currency");
    }
    debug_assert!(rate.is_some(), "rate table entry for {day} is missing {code}");
    rate
}

impl FromIterator<(NaiveDate, DailyRates)> for RateTable {
    fn from_iter<T: IntoIterator<Item = (NaiveDate, DailyRates)>>(iter: T) -> Self {
        RateTable {
            days: iter.into_iter().collect(),
        }
    }
}
