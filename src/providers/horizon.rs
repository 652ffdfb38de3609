use super::{endpoint, parse_base_url};
use crate::core::LedgerProvider;
use crate::core::error::FetchError;
use async_trait::async_trait;
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, error, instrument};

/// Balance entry type that marks the ledger's own asset.
const NATIVE_ASSET_TYPE: &str = "native";

/// Client for a Horizon ledger server (`/accounts/<id>`).
pub struct HorizonLedgerProvider {
    base_url: Url,
    client: reqwest::Client,
}

impl HorizonLedgerProvider {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("networth/1.0")
            .build()
            .map_err(|source| FetchError::Transport {
                url: base_url.to_string(),
                source,
            })?;
        Ok(HorizonLedgerProvider {
            base_url: parse_base_url(base_url)?,
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    balance: String,
    asset_type: String,
}

#[async_trait]
impl LedgerProvider for HorizonLedgerProvider {
    #[instrument(name = "HorizonBalanceFetch", skip(self), fields(account = %account_id))]
    async fn fetch_native_balance(&self, account_id: &str) -> Result<Decimal, FetchError> {
        let url = endpoint(&self.base_url, &["accounts", account_id]).to_string();
        debug!("Requesting account balances from {}", url);

        let transport = |source| FetchError::Transport {
            url: url.clone(),
            source,
        };
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?;

        let response_text = response.text().await.map_err(transport)?;

        let account: AccountResponse = match serde_json::from_str(&response_text) {
            Ok(data) => data,
            Err(e) => {
                error!(
                    error = ?e,
                    response = %response_text,
                    "Failed to parse account response"
                );
                return Err(FetchError::protocol(
                    &url,
                    format!("malformed account response ({e})"),
                ));
            }
        };

        let native = account
            .balances
            .iter()
            .find(|entry| entry.asset_type == NATIVE_ASSET_TYPE)
            .ok_or_else(|| FetchError::protocol(&url, "no native balance entry"))?;

        let balance = Decimal::from_str(native.balance.trim()).map_err(|e| {
            FetchError::protocol(
                &url,
                format!("native balance '{}' is not a number ({e})", native.balance),
            )
        })?;

        debug!("Native balance for {}: {}", account_id, balance);
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::FailureKind;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ACCOUNT: &str = "GAXLEDGERACCOUNT";

    async fn create_horizon_mock_server(mock_response: &str, status_code: u16) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/accounts/{ACCOUNT}")))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(mock_response))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_native_balance_is_selected() {
        let mock_response = r#"{
            "id": "GAXLEDGERACCOUNT",
            "balances": [
                {"balance": "120.0000000", "asset_type": "credit_alphanum4", "asset_code": "USDC"},
                {"balance": "5.5000000", "asset_type": "native"}
            ]
        }"#;
        let mock_server = create_horizon_mock_server(mock_response, 200).await;
        let provider = HorizonLedgerProvider::new(&mock_server.uri()).unwrap();

        let balance = provider.fetch_native_balance(ACCOUNT).await.unwrap();
        assert_eq!(balance, dec!(5.5));
    }

    #[tokio::test]
    async fn test_missing_native_balance() {
        let mock_response = r#"{
            "balances": [
                {"balance": "120.0000000", "asset_type": "credit_alphanum4"}
            ]
        }"#;
        let mock_server = create_horizon_mock_server(mock_response, 200).await;
        let provider = HorizonLedgerProvider::new(&mock_server.uri()).unwrap();

        let err = provider.fetch_native_balance(ACCOUNT).await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Protocol);
        assert!(err.to_string().ends_with("no native balance entry"));
    }

    #[tokio::test]
    async fn test_malformed_balance() {
        let mock_response = r#"{"balances": [{"balance": "lots", "asset_type": "native"}]}"#;
        let mock_server = create_horizon_mock_server(mock_response, 200).await;
        let provider = HorizonLedgerProvider::new(&mock_server.uri()).unwrap();

        let err = provider.fetch_native_balance(ACCOUNT).await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Protocol);
        assert!(err.to_string().contains("native balance 'lots' is not a number"));
    }

    #[tokio::test]
    async fn test_account_id_is_percent_encoded() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/horizon/accounts/G%2Fx%20y"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"balances": [{"balance": "1.0000000", "asset_type": "native"}]}"#,
            ))
            .mount(&mock_server)
            .await;
        let provider =
            HorizonLedgerProvider::new(&format!("{}/horizon/", mock_server.uri())).unwrap();

        let balance = provider.fetch_native_balance("G/x y").await.unwrap();
        assert_eq!(balance, dec!(1));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let mock_server = create_horizon_mock_server(r#"{"status": 404}"#, 404).await;
        let provider = HorizonLedgerProvider::new(&mock_server.uri()).unwrap();

        let err = provider.fetch_native_balance(ACCOUNT).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transport);
    }
}
