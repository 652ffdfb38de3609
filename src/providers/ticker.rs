use super::{endpoint, parse_base_url};
use crate::core::error::FetchError;
use crate::core::{PriceProvider, PriceRecord};
use async_trait::async_trait;
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, error, instrument, warn};

/// Client for the coin ticker API (`/v1/ticker/<id>/?convert=<CODE>`).
pub struct TickerPriceProvider {
    base_url: Url,
    client: reqwest::Client,
}

impl TickerPriceProvider {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("networth/1.0")
            .build()
            .map_err(|source| FetchError::Transport {
                url: base_url.to_string(),
                source,
            })?;
        Ok(TickerPriceProvider {
            base_url: parse_base_url(base_url)?,
            client,
        })
    }

    fn ticker_url(&self, asset_id: &str, currency_code: &str) -> Url {
        let mut url = endpoint(&self.base_url, &["v1", "ticker", asset_id, ""]);
        url.query_pairs_mut().append_pair("convert", currency_code);
        url
    }
}

/// Body the API sends instead of a ticker array, e.g. `{"error": "id not found"}`.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

fn is_unknown_id(response_text: &str) -> bool {
    serde_json::from_str::<ApiError>(response_text)
        .is_ok_and(|body| body.error.to_lowercase().contains("id not found"))
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    id: String,
    symbol: String,
    name: Option<String>,
    rank: Option<Value>,
    percent_change_1h: Option<Value>,
    percent_change_24h: Option<Value>,
    percent_change_7d: Option<Value>,
    #[serde(flatten)]
    fields: HashMap<String, Value>,
}

/// The API reports most numbers as strings, sometimes as JSON numbers.
fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .ok(),
        Value::Number(n) => {
            let repr = n.to_string();
            Decimal::from_str(&repr)
                .or_else(|_| Decimal::from_scientific(&repr))
                .ok()
        }
        _ => None,
    }
}

fn rank_value(value: &Value) -> Option<u32> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|r| u32::try_from(r).ok()),
        _ => None,
    }
}

#[async_trait]
impl PriceProvider for TickerPriceProvider {
    #[instrument(name = "TickerPriceFetch", skip(self), fields(asset = %asset_id))]
    async fn fetch_price(
        &self,
        asset_id: &str,
        currency: &str,
    ) -> Result<PriceRecord, FetchError> {
        let currency_code = currency.to_uppercase();
        let url = self.ticker_url(asset_id, &currency_code).to_string();
        debug!("Requesting price data from {}", url);

        let transport = |source| FetchError::Transport {
            url: url.clone(),
            source,
        };
        let response = self.client.get(&url).send().await.map_err(transport)?;
        let status_error = response.error_for_status_ref().err();
        let response_text = response.text().await.map_err(transport)?;

        if is_unknown_id(&response_text) {
            warn!(asset = %asset_id, "Asset is not listed by the ticker API; valuing at zero");
            return Ok(PriceRecord::new(
                asset_id,
                &asset_id.to_uppercase(),
                Decimal::ZERO,
            ));
        }
        if let Some(source) = status_error {
            return Err(transport(source));
        }

        let mut entries: Vec<TickerEntry> = match serde_json::from_str(&response_text) {
            Ok(data) => data,
            Err(e) => {
                error!(
                    error = ?e,
                    response = %response_text,
                    "Failed to parse ticker response"
                );
                return Err(FetchError::protocol(
                    &url,
                    format!("malformed ticker response ({e})"),
                ));
            }
        };

        if entries.len() != 1 {
            return Err(FetchError::protocol(
                &url,
                format!("expected exactly one ticker entry, got {}", entries.len()),
            ));
        }
        let entry = entries.remove(0);

        let price_field = format!("price_{}", currency_code.to_lowercase());
        let price = entry
            .fields
            .get(&price_field)
            .ok_or_else(|| FetchError::protocol(&url, format!("missing field '{price_field}'")))
            .and_then(|value| {
                decimal_value(value).ok_or_else(|| {
                    FetchError::protocol(
                        &url,
                        format!("field '{price_field}' is not a number: {value}"),
                    )
                })
            })?;

        if price < Decimal::ZERO {
            return Err(FetchError::protocol(
                &url,
                format!("field '{price_field}' is negative: {price}"),
            ));
        }

        debug!("Successfully fetched price for {}: {}", asset_id, price);

        Ok(PriceRecord {
            asset_id: entry.id,
            symbol: entry.symbol,
            price,
            name: entry.name,
            rank: entry.rank.as_ref().and_then(rank_value),
            percent_change_1h: entry.percent_change_1h.as_ref().and_then(decimal_value),
            percent_change_24h: entry.percent_change_24h.as_ref().and_then(decimal_value),
            percent_change_7d: entry.percent_change_7d.as_ref().and_then(decimal_value),
        })
    }
}
