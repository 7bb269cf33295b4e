//! REST client for the wallet service sidecar.
//!
//! The sidecar owns key custody, transaction construction and signing. This
//! client only forwards requests and maps its responses:
//!
//! | Operation | Request |
//! |---|---|
//! | create wallet | `POST /wallets` |
//! | details | `GET /wallets/{id}` |
//! | balance | `GET /wallets/{id}/balances/{asset}` |
//! | faucet | `POST /wallets/{id}/faucet` |
//! | transfer | `POST /wallets/{id}/transfers` |
//! | register name | `POST /names` |
//! | resolve name | `GET /names/{label}` |
//!
//! Path parameters come from model-supplied tool arguments, so each one is
//! pushed as a single percent-encoded segment.

use async_trait::async_trait;
use npcrelay_config::WalletConfig;
use npcrelay_core::error::WalletError;
use npcrelay_core::wallet::{
    AssetBalance, ProvisionedWallet, TxReceipt, WalletBackend, WalletDetails, WalletProvisioner,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use reqwest::{Method, Url};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct HttpWalletService {
    base_url: Url,
    network: String,
    api_key_name: Option<String>,
    api_key_private_key: Option<String>,
    /// The agent's own wallet, once known.
    wallet_id: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ResolvedName {
    address: Option<String>,
}

impl HttpWalletService {
    pub fn new(config: &WalletConfig) -> Result<Self, WalletError> {
        let raw = config
            .service_url
            .as_deref()
            .ok_or_else(|| WalletError::MissingCredentials("wallet.service_url is not set".into()))?;
        let base_url = Url::parse(raw)
            .map_err(|e| WalletError::InvalidRequest(format!("wallet.service_url '{raw}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(WalletError::InvalidRequest(format!(
                "wallet.service_url '{raw}' cannot carry a path"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| WalletError::Unreachable(e.to_string()))?;

        Ok(Self {
            base_url,
            network: config.network.clone(),
            api_key_name: config.api_key_name.clone(),
            api_key_private_key: config.api_key_private_key.clone(),
            wallet_id: None,
            client,
        })
    }

    /// Bind to the agent's wallet: reuse the id saved in `data_file`, or
    /// create a wallet and save its id there.
    pub async fn connect(config: &WalletConfig) -> Result<Self, WalletError> {
        let mut service = Self::new(config)?;
        let wallet_id = match read_wallet_id(&config.data_file) {
            Some(id) => {
                info!(wallet_id = %id, "Reusing agent wallet");
                id
            }
            None => {
                let wallet = service.create_wallet().await?;
                if let Err(e) = std::fs::write(&config.data_file, &wallet.wallet_id) {
                    warn!(path = %config.data_file.display(), error = %e, "Failed to persist wallet id");
                }
                info!(wallet_id = %wallet.wallet_id, address = %wallet.wallet_address, "Created agent wallet");
                wallet.wallet_id
            }
        };
        service.wallet_id = Some(wallet_id);
        Ok(service)
    }

    fn ensure_credentials(&self) -> Result<(&str, &str), WalletError> {
        match (&self.api_key_name, &self.api_key_private_key) {
            (Some(name), Some(key)) if !name.is_empty() && !key.is_empty() => Ok((name, key)),
            _ => Err(WalletError::MissingCredentials(
                "CDP API Key Name or CDP API Key Private Key is missing".into(),
            )),
        }
    }

    fn wallet_id(&self) -> Result<&str, WalletError> {
        self.wallet_id
            .as_deref()
            .ok_or_else(|| WalletError::InvalidRequest("no agent wallet bound".into()))
    }

    /// `base_url` extended by `segments`, each percent-encoded on its own.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, WalletError> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || matches!(**s, "." | ".."))
        {
            return Err(WalletError::InvalidRequest(format!(
                "invalid path parameter '{bad}'"
            )));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| WalletError::InvalidRequest("wallet service URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<reqwest::RequestBuilder, WalletError> {
        let (name, key) = self.ensure_credentials()?;
        let url = self.endpoint(segments)?;
        Ok(self
            .client
            .request(method, url)
            .header("x-cdp-api-key-name", name)
            .header("x-cdp-api-key-private-key", key))
    }

    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T, WalletError> {
        let response = builder
            .send()
            .await
            .map_err(|e| WalletError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %message, "Wallet service returned error");
            return Err(WalletError::ServiceError {
                status_code: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| WalletError::ServiceError {
                status_code: status.as_u16(),
                message: format!("Failed to parse response: {e}"),
            })
    }
}

fn read_wallet_id(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let id = content.trim();
    (!id.is_empty()).then(|| id.to_string())
}

#[async_trait]
impl WalletProvisioner for HttpWalletService {
    fn name(&self) -> &str {
        "http"
    }

    async fn create_wallet(&self) -> Result<ProvisionedWallet, WalletError> {
        debug!(network = %self.network, "Creating wallet");
        let builder = self
            .request(Method::POST, &["wallets"])?
            .json(&serde_json::json!({ "network": self.network }));
        self.send(builder).await
    }
}

#[async_trait]
impl WalletBackend for HttpWalletService {
    async fn details(&self) -> Result<WalletDetails, WalletError> {
        let wallet_id = self.wallet_id()?;
        self.send(self.request(Method::GET, &["wallets", wallet_id])?).await
    }

    async fn balance(&self, asset_id: &str) -> Result<AssetBalance, WalletError> {
        let wallet_id = self.wallet_id()?;
        self.send(self.request(Method::GET, &["wallets", wallet_id, "balances", asset_id])?)
            .await
    }

    async fn request_faucet_funds(&self, asset_id: Option<&str>) -> Result<TxReceipt, WalletError> {
        let wallet_id = self.wallet_id()?;
        let builder = self
            .request(Method::POST, &["wallets", wallet_id, "faucet"])?
            .json(&serde_json::json!({ "asset_id": asset_id }));
        self.send(builder).await
    }

    async fn transfer(
        &self,
        amount: &str,
        asset_id: &str,
        destination: &str,
    ) -> Result<TxReceipt, WalletError> {
        let wallet_id = self.wallet_id()?;
        let builder = self.request(Method::POST, &["wallets", wallet_id, "transfers"])?.json(&serde_json::json!({
            "amount": amount,
            "asset_id": asset_id,
            "destination": destination,
        }));
        self.send(builder).await
    }

    async fn register_name(&self, label: &str, owner: &str) -> Result<TxReceipt, WalletError> {
        let builder = self
            .request(Method::POST, &["names"])?
            .json(&serde_json::json!({ "label": label, "owner": owner }));
        self.send(builder).await
    }

    async fn resolve_name(&self, label: &str) -> Result<Option<String>, WalletError> {
        match self
            .send::<ResolvedName>(self.request(Method::GET, &["names", label])?)
            .await
        {
            Ok(resolved) => Ok(resolved.address),
            Err(WalletError::ServiceError { status_code: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npcrelay_config::WalletBackendKind;

    fn config() -> WalletConfig {
        WalletConfig {
            backend: WalletBackendKind::Http,
            service_url: Some("http://127.0.0.1:9/".into()),
            ..WalletConfig::default()
        }
    }

    #[test]
    fn requires_service_url() {
        assert!(matches!(
            HttpWalletService::new(&WalletConfig::default()),
            Err(WalletError::MissingCredentials(_))
        ));
    }

    #[test]
    fn joins_segments_onto_base_url() {
        let service = HttpWalletService::new(&config()).unwrap();
        assert_eq!(
            service.endpoint(&["wallets", "w-1", "faucet"]).unwrap().as_str(),
            "http://127.0.0.1:9/wallets/w-1/faucet"
        );

        let mut nested = config();
        nested.service_url = Some("http://svc/api/".into());
        let service = HttpWalletService::new(&nested).unwrap();
        assert_eq!(
            service.endpoint(&["names"]).unwrap().as_str(),
            "http://svc/api/names"
        );
    }

    #[test]
    fn path_parameters_cannot_escape_their_segment() {
        let mut cfg = config();
        cfg.service_url = Some("http://svc".into());
        let service = HttpWalletService::new(&cfg).unwrap();

        let url = service
            .endpoint(&["names", "x/../../wallets/victim/transfers?"])
            .unwrap();
        assert_eq!(url.path(), "/names/x%2F..%2F..%2Fwallets%2Fvictim%2Ftransfers%3F");
        assert_eq!(url.query(), None);

        let url = service
            .endpoint(&["wallets", "agent", "balances", "eth/../../other#frag"])
            .unwrap();
        assert_eq!(url.path(), "/wallets/agent/balances/eth%2F..%2F..%2Fother%23frag");
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn dot_and_empty_segments_are_rejected() {
        let service = HttpWalletService::new(&config()).unwrap();
        for bad in ["..", ".", ""] {
            assert!(matches!(
                service.endpoint(&["names", bad]),
                Err(WalletError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn rejects_unparsable_service_url() {
        let mut cfg = config();
        cfg.service_url = Some("not a url".into());
        assert!(matches!(
            HttpWalletService::new(&cfg),
            Err(WalletError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn create_wallet_without_credentials_fails_fast() {
        let service = HttpWalletService::new(&config()).unwrap();
        let err = service.create_wallet().await.unwrap_err();
        assert!(err.to_string().contains("CDP API Key Name"));
    }

    #[tokio::test]
    async fn unbound_wallet_rejects_actions() {
        let mut cfg = config();
        cfg.api_key_name = Some("name".into());
        cfg.api_key_private_key = Some("key".into());
        let service = HttpWalletService::new(&cfg).unwrap();
        assert!(matches!(
            service.details().await,
            Err(WalletError::InvalidRequest(_))
        ));
    }

    #[test]
    fn wallet_id_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet_data.txt");
        assert!(read_wallet_id(&path).is_none());
        std::fs::write(&path, "wallet-123\n").unwrap();
        assert_eq!(read_wallet_id(&path).as_deref(), Some("wallet-123"));
    }
}
