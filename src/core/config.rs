use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Currency all holdings are valued in, with the rule used to display amounts.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(from = "CurrencySpec")]
pub struct LocalCurrency {
    pub code: String,
    pub symbol: Option<String>,
    pub decimals: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CurrencySpec {
    Code(String),
    Full {
        code: String,
        symbol: Option<String>,
        decimals: Option<u32>,
    },
}

impl From<CurrencySpec> for LocalCurrency {
    fn from(spec: CurrencySpec) -> Self {
        match spec {
            CurrencySpec::Code(code) => LocalCurrency::new(&code),
            CurrencySpec::Full {
                code,
                symbol,
                decimals,
            } => LocalCurrency {
                code: code.to_uppercase(),
                symbol,
                decimals: decimals.unwrap_or(2),
            },
        }
    }
}

impl LocalCurrency {
    pub fn new(code: &str) -> Self {
        LocalCurrency {
            code: code.to_uppercase(),
            symbol: None,
            decimals: 2,
        }
    }

    pub fn format(&self, amount: Decimal) -> String {
        let rounded = amount.round_dp(self.decimals);
        let precision = self.decimals as usize;
        match &self.symbol {
            Some(symbol) => format!("{symbol}{rounded:.precision$}"),
            None => format!("{rounded:.precision$} {}", self.code),
        }
    }
}

impl Default for LocalCurrency {
    fn default() -> Self {
        LocalCurrency::new("USD")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OwnedAsset {
    /// Identifier understood by the price API, e.g. `bitcoin`.
    #[serde(rename = "asset")]
    pub asset_id: String,
    #[serde(default)]
    pub amount: Decimal,
    /// Ledger account whose native balance replaces `amount`.
    #[serde(rename = "account", default)]
    pub external_account_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct HoldingsConfig {
    #[serde(rename = "currency", default)]
    pub local_currency: LocalCurrency,
    #[serde(rename = "holdings", default)]
    pub owned_assets: Vec<OwnedAsset>,
}

impl HoldingsConfig {
    fn validate(&self) -> Result<()> {
        for asset in &self.owned_assets {
            if asset.amount < Decimal::ZERO {
                bail!(
                    "Holding amount for '{}' must not be negative: {}",
                    asset.asset_id,
                    asset.amount
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TickerProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HorizonProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub ticker: Option<TickerProviderConfig>,
    pub horizon: Option<HorizonProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            ticker: Some(TickerProviderConfig {
                base_url: "https://api.coinmarketcap.com".to_string(),
            }),
            horizon: Some(HorizonProviderConfig {
                base_url: "https://horizon.stellar.org".to_string(),
            }),
        }
    }
}

impl ProvidersConfig {
    pub fn ticker_base_url(&self) -> &str {
        self.ticker
            .as_ref()
            .map_or("https://api.coinmarketcap.com", |p| &p.base_url)
    }

    pub fn horizon_base_url(&self) -> &str {
        self.horizon
            .as_ref()
            .map_or("https://horizon.stellar.org", |p| &p.base_url)
    }

    fn validate(&self) -> Result<()> {
        for base_url in [self.ticker_base_url(), self.horizon_base_url()] {
            let url = reqwest::Url::parse(base_url)
                .with_context(|| format!("Provider URL '{base_url}' is not valid"))?;
            if url.cannot_be_a_base() {
                bail!("Provider URL '{base_url}' cannot carry a path");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(flatten)]
    pub holdings: HoldingsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub refresh_interval_secs: Option<u64>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "networth", "networth")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .holdings
            .validate()
            .and_then(|_| config.providers.validate())
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(
            self.refresh_interval_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
        )
    }
}
