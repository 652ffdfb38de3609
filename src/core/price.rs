//! Pricing abstractions and core types

use crate::core::error::FetchError;
use async_trait::async_trait;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub asset_id: String,
    pub symbol: String,
    pub price: Decimal,
    pub name: Option<String>,
    pub rank: Option<u32>,
    pub percent_change_1h: Option<Decimal>,
    pub percent_change_24h: Option<Decimal>,
    pub percent_change_7d: Option<Decimal>,
}

impl PriceRecord {
    pub fn new(asset_id: &str, symbol: &str, price: Decimal) -> Self {
        PriceRecord {
            asset_id: asset_id.to_string(),
            symbol: symbol.to_string(),
            price,
            name: None,
            rank: None,
            percent_change_1h: None,
            percent_change_24h: None,
            percent_change_7d: None,
        }
    }
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Price of one unit of `asset_id`, denominated in `currency`.
    async fn fetch_price(&self, asset_id: &str, currency: &str)
    -> Result<PriceRecord, FetchError>;
}
