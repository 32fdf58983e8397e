//! Currency codes and rate source abstractions

use crate::core::rates::RateTable;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Currency every stored rate is expressed against.
pub const REFERENCE_CURRENCY: &str = "USD";

/// ISO 4217 style three letter currency code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn reference() -> Self {
        CurrencyCode(REFERENCE_CURRENCY.to_string())
    }

    pub fn is_reference(&self) -> bool {
        self.0 == REFERENCE_CURRENCY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(anyhow!("Invalid currency code: {}", s));
        }
        Ok(CurrencyCode(code.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything able to deliver a full replacement snapshot of the rate table.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_table(&self) -> Result<RateTable>;
}
