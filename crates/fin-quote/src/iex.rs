//! IEX Cloud style quote endpoint: `GET {base}/stock/{symbol}/quote?token=...`.

use serde::Deserialize;
use tracing::debug;

use crate::{is_plausible_symbol, json_number_to_micros, Quote, QuoteError, QuoteProvider};

/// HTTP quote provider.
///
/// The token is supplied by the caller (resolved from an env var); it is never
/// logged and is not part of `Debug` output.
#[derive(Clone)]
pub struct IexQuoteProvider {
    token: String,
    http: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for IexQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IexQuoteProvider")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl IexQuoteProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://cloud.iexapis.com/stable";

    pub fn new(token: String) -> Self {
        Self::new_with_base_url(token, Self::DEFAULT_BASE_URL.to_string())
    }

    pub fn new_with_base_url(token: String, base_url: String) -> Self {
        Self {
            token,
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn quote_url(&self, symbol: &str) -> String {
        format!(
            "{}/stock/{}/quote",
            self.base_url.trim_end_matches('/'),
            symbol
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IexQuoteBody {
    company_name: Option<String>,
    symbol: Option<String>,
    latest_price: Option<serde_json::Number>,
}

#[async_trait::async_trait]
impl QuoteProvider for IexQuoteProvider {
    fn source_name(&self) -> &'static str {
        "iex"
    }

    async fn lookup(&self, symbol: &str) -> Result<Quote, QuoteError> {
        if !is_plausible_symbol(symbol) {
            return Err(QuoteError::NotFound {
                symbol: symbol.to_string(),
            });
        }

        let resp = self
            .http
            .get(self.quote_url(symbol))
            .query(&[("token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| QuoteError::Unavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        debug!(symbol, status = status.as_u16(), "iex quote response");

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(QuoteError::NotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(QuoteError::Unavailable(format!(
                "http error status={}",
                status.as_u16()
            )));
        }

        let body: IexQuoteBody = resp
            .json()
            .await
            .map_err(|e| QuoteError::Decode(format!("json decode failed: {e}")))?;

        let Some(raw_price) = body.latest_price else {
            return Err(QuoteError::NotFound {
                symbol: symbol.to_string(),
            });
        };
        let price = json_number_to_micros(&raw_price)
            .ok_or_else(|| QuoteError::Decode(format!("price out of range: {raw_price}")))?;
        if !price.is_positive() {
            return Err(QuoteError::Decode(format!("non-positive price: {raw_price}")));
        }

        let symbol = body
            .symbol
            .map(|s| s.to_ascii_uppercase())
            .unwrap_or_else(|| symbol.to_string());
        let name = body.company_name.unwrap_or_else(|| symbol.clone());

        Ok(Quote {
            name,
            symbol,
            price,
        })
    }
}
