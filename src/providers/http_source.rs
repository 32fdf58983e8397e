use super::util::with_retry;
use crate::core::currency::RateSource;
use crate::core::rates::RateTable;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Fetches the full rate table from `GET {base_url}/rates`.
///
/// The body is the same JSON shape the table serializes to: an object keyed
/// by `YYYY-MM-DD` whose values map currency codes to rates against USD.
pub struct HttpRateSource {
    base_url: String,
    retries: usize,
    retry_delay_ms: u64,
}

impl HttpRateSource {
    pub fn new(base_url: &str) -> Self {
        HttpRateSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            retries: 2,
            retry_delay_ms: 500,
        }
    }

    pub fn with_retries(mut self, retries: usize, retry_delay_ms: u64) -> Self {
        self.retries = retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    #[instrument(name = "HttpRateFetch", skip(self), fields(base_url = %self.base_url))]
    async fn fetch_table(&self) -> Result<RateTable> {
        let url = format!("{}/rates", self.base_url);
        debug!("Requesting rate table from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("ratebook/0.1")
            .build()?;
        let response = with_retry(
            || client.get(&url).send(),
            self.retries,
            self.retry_delay_ms,
        )
        .await
        .map_err(|e| anyhow!("Request error: {} for URL: {}", e, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for rate table at {}",
                response.status(),
                url
            ));
        }

        let text = response
            .text()
            .await
            .context("Failed to read rate table response")?;
        let table: RateTable = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse rate table from {}: {}", url, e))?;
        debug!("Fetched {} rate dates", table.len());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::CurrencyCode;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rates"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_successful_table_fetch() {
        let body = r#"{
            "2024-05-01": { "EUR": 1.0730, "JPY": "0.0064" },
            "2024-05-02": { "EUR": 1.0715, "JPY": "0.0065" }
        }"#;
        let mock_server = create_mock_server(200, body).await;
        let source = HttpRateSource::new(&format!("{}/", mock_server.uri()));

        let table = source.fetch_table().await.unwrap();

        assert_eq!(table.len(), 2);
        let eur: CurrencyCode = "EUR".parse().unwrap();
        let usd = CurrencyCode::reference();
        let day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert_eq!(
            table.resolve(&eur, &usd, day),
            Some(Decimal::from_str("1.0715").unwrap())
        );
    }

    #[tokio::test]
    async fn test_http_error_response() {
        let mock_server = create_mock_server(500, "").await;
        let source = HttpRateSource::new(&mock_server.uri()).with_retries(0, 0);

        let result = source.fetch_table().await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            format!(
                "HTTP error: 500 Internal Server Error for rate table at {}/rates",
                mock_server.uri()
            )
        );
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let mock_server = create_mock_server(200, r#"{"rates": []}"#).await;
        let source = HttpRateSource::new(&mock_server.uri()).with_retries(0, 0);

        let result = source.fetch_table().await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse rate table")
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let source = HttpRateSource::new("http://127.0.0.1:9").with_retries(1, 1);
        let result = source.fetch_table().await;
        assert!(result.unwrap_err().to_string().starts_with("Request error"));
    }
}
