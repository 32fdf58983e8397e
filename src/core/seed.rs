//! Rate table bundled with the binary, used until live rates exist.

use crate::core::rates::RateTable;
use std::sync::LazyLock;
use tracing::error;

const SEED_RATES: &str = include_str!("../../data/seed_rates.json");

static SEED_TABLE: LazyLock<RateTable> = LazyLock::new(|| {
    serde_json::from_str(SEED_RATES).unwrap_or_else(|e| {
        error!("Bundled seed rates are malformed: {e}");
        RateTable::default()
    })
});

pub fn seed_table() -> RateTable {
    SEED_TABLE.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_parses_and_is_consistent() {
        let table = seed_table();
        assert!(!table.is_empty());

        let latest = table.rates_on(table.last_date().unwrap()).unwrap();
        let mut expected: Vec<_> = latest.keys().collect();
        expected.sort();

        for (date, rates) in table.iter() {
            let mut codes: Vec<_> = rates.keys().collect();
            codes.sort();
            assert_eq!(codes, expected, "currency set differs on {date}");
        }
    }
}
