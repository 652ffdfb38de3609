//! Ledger balance abstraction

use crate::core::error::FetchError;
use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait LedgerProvider: Send + Sync {
    /// Current balance of the account in the ledger's native asset.
    async fn fetch_native_balance(&self, account_id: &str) -> Result<Decimal, FetchError>;
}
