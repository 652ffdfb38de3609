//! Fetch-and-aggregate for one refresh cycle

use crate::core::config::{HoldingsConfig, LocalCurrency, OwnedAsset};
use crate::core::error::{FetchError, FetchFailure};
use crate::core::{LedgerProvider, PriceProvider, PriceRecord};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Result of one cycle as seen by consumers.
pub type FetchOutcome = Result<Arc<Snapshot>, FetchFailure>;

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyLine {
    pub record: PriceRecord,
    /// Amount actually held, after resolving ledger-backed holdings.
    pub amount: Decimal,
    pub net_worth: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub local_currency: LocalCurrency,
    pub lines: Vec<CurrencyLine>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Sum of all line values. `SnapshotBuilder` rejects snapshots whose total
    /// overflows, so this cannot panic for a built snapshot.
    pub fn total_net_worth(&self) -> Decimal {
        self.lines.iter().map(|line| line.net_worth).sum()
    }
}

/// Where the held quantity of an asset comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountSource<'a> {
    Static(Decimal),
    Ledger { account_id: &'a str },
}

impl<'a> AmountSource<'a> {
    pub fn of(asset: &'a OwnedAsset) -> Self {
        match asset.external_account_id.as_deref() {
            Some(account_id) => AmountSource::Ledger { account_id },
            None => AmountSource::Static(asset.amount),
        }
    }

    async fn resolve(self, ledger: &dyn LedgerProvider) -> Result<Decimal, FetchError> {
        match self {
            AmountSource::Static(amount) => Ok(amount),
            AmountSource::Ledger { account_id } => ledger.fetch_native_balance(account_id).await,
        }
    }
}

/// Startup failure held back until the first cycle reports it.
#[derive(Debug, Default)]
pub struct DeferredFailure {
    pending: Mutex<Option<FetchError>>,
}

impl DeferredFailure {
    pub fn capture(err: FetchError) -> Self {
        DeferredFailure {
            pending: Mutex::new(Some(err)),
        }
    }

    /// Hands out the captured failure once; later calls return `None`.
    pub fn take(&self) -> Option<FetchError> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

pub struct SnapshotBuilder {
    holdings: HoldingsConfig,
    deferred: DeferredFailure,
    prices: Arc<dyn PriceProvider>,
    ledger: Arc<dyn LedgerProvider>,
}

impl SnapshotBuilder {
    /// Accepts the outcome of loading the configuration. A load failure is
    /// replayed by the first cycle; later cycles run against empty holdings.
    pub fn new(
        loaded: anyhow::Result<HoldingsConfig>,
        prices: Arc<dyn PriceProvider>,
        ledger: Arc<dyn LedgerProvider>,
    ) -> Self {
        let (holdings, deferred) = match loaded {
            Ok(holdings) => (holdings, DeferredFailure::default()),
            Err(e) => {
                warn!(error = %e, "Configuration failed to load; reporting on first refresh");
                (
                    HoldingsConfig::default(),
                    DeferredFailure::capture(FetchError::ConfigLoad(e)),
                )
            }
        };

        SnapshotBuilder {
            holdings,
            deferred,
            prices,
            ledger,
        }
    }

    pub async fn build(&self) -> Result<Snapshot, FetchError> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }

        let currency = &self.holdings.local_currency;
        let mut lines = Vec::with_capacity(self.holdings.owned_assets.len());
        let mut total = Decimal::ZERO;

        for asset in &self.holdings.owned_assets {
            let record = self
                .prices
                .fetch_price(&asset.asset_id, &currency.code)
                .await?;
            let amount = AmountSource::of(asset)
                .resolve(self.ledger.as_ref())
                .await?;
            let net_worth = amount.checked_mul(record.price).ok_or_else(|| {
                FetchError::protocol(
                    &asset.asset_id,
                    format!("value of {amount} at {} overflows", record.price),
                )
            })?;
            total = total.checked_add(net_worth).ok_or_else(|| {
                FetchError::protocol(
                    &asset.asset_id,
                    format!("total net worth overflows after adding {net_worth}"),
                )
            })?;
            debug!(
                asset = %asset.asset_id,
                %amount,
                price = %record.price,
                %net_worth,
                "Valued holding"
            );

            lines.push(CurrencyLine {
                record,
                amount,
                net_worth,
            });
        }

        debug!(%total, "Aggregated holdings");
        Ok(Snapshot {
            local_currency: currency.clone(),
            lines,
            fetched_at: Utc::now(),
        })
    }

    /// Runs one cycle and captures its failure, if any, as a value.
    #[instrument(name = "RefreshCycle", skip(self))]
    pub async fn run_cycle(&self) -> FetchOutcome {
        match self.build().await {
            Ok(snapshot) => {
                info!(
                    assets = snapshot.lines.len(),
                    total = %snapshot.total_net_worth(),
                    "Refresh cycle completed"
                );
                Ok(Arc::new(snapshot))
            }
            Err(e) => {
                warn!(error = %e, "Refresh cycle failed");
                Err(FetchFailure::from(e))
            }
        }
    }
}
