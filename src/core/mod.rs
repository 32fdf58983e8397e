//! Core business logic: rate tables, resolution and aggregation

pub mod aggregate;
pub mod config;
pub mod currency;
pub mod import;
pub mod log;
pub mod rates;
pub mod seed;
pub mod service;

// Re-export main types for cleaner imports
pub use aggregate::{Bucket, CategorizedRecord, Granularity, MoneyRecord, Transaction};
pub use currency::{CurrencyCode, RateSource};
pub use rates::RateTable;
pub use service::RateService;
