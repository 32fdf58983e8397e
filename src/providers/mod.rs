pub mod file_source;
pub mod http_source;
pub mod util;

use crate::core::config::RatesSourceConfig;
use crate::core::currency::RateSource;

/// Builds the remote source described by the configuration.
pub fn from_config(config: &RatesSourceConfig) -> Box<dyn RateSource> {
    match config {
        RatesSourceConfig::Http { base_url } => Box::new(http_source::HttpRateSource::new(base_url)),
        RatesSourceConfig::File { path } => {
            Box::new(file_source::JsonFileRateSource::new(path.clone()))
        }
    }
}
