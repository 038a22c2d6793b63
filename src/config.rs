//! Configuration for the payment verification gate.
//!
//! Values are read from the process environment (a `.env` file is honored),
//! with serde support for hosts that prefer a config file. Only the
//! receiving wallet and the accepted token mint are required; everything
//! else has a sensible default.

use rust_decimal::Decimal;
use serde::Deserialize;
use solana_pubkey::Pubkey;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::ledger::SolanaLedgerReader;
use crate::oracle::JupiterPriceOracle;
use crate::store::MemoryPaymentStore;
use crate::verifier::{PaymentVerifier, VerifierConfig};

const ENV_RPC_SOLANA: &str = "RPC_URL_SOLANA";
const ENV_PRICE_API: &str = "SOLGATE_PRICE_API_URL";
const ENV_RECEIVING_WALLET: &str = "SOLGATE_RECEIVING_WALLET";
const ENV_TOKEN_MINT: &str = "SOLGATE_TOKEN_MINT";
const ENV_SLIPPAGE_TOLERANCE: &str = "SOLGATE_SLIPPAGE_TOLERANCE";
const ENV_RPC_TIMEOUT_SECS: &str = "SOLGATE_RPC_TIMEOUT_SECS";
const ENV_HTTP_TIMEOUT_SECS: &str = "SOLGATE_HTTP_TIMEOUT_SECS";

/// Gate configuration.
///
/// Fields use serde defaults that fall back to environment variables, then
/// to hardcoded defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Solana RPC endpoint the ledger reader queries.
    #[serde(default = "config_defaults::default_rpc_url")]
    pub rpc_url: Url,
    /// Base URL of the price feed.
    #[serde(default = "config_defaults::default_price_api_url")]
    pub price_api_url: Url,
    /// The service wallet payments must be addressed to (base58).
    pub receiving_wallet: String,
    /// Mint of the accepted fungible token (base58).
    pub token_mint: String,
    /// Fractional slippage margin, e.g. `0.005` for 0.5%.
    #[serde(default = "config_defaults::default_slippage_tolerance")]
    pub slippage_tolerance: Decimal,
    #[serde(default = "config_defaults::default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
    #[serde(default = "config_defaults::default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

pub mod config_defaults {
    use super::*;

    pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
    pub const DEFAULT_PRICE_API_URL: &str = "https://api.jup.ag";
    pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

    /// Fallback: $RPC_URL_SOLANA -> mainnet public RPC.
    pub fn default_rpc_url() -> Url {
        env_url(ENV_RPC_SOLANA, DEFAULT_RPC_URL)
    }

    /// Fallback: $SOLGATE_PRICE_API_URL -> Jupiter.
    pub fn default_price_api_url() -> Url {
        env_url(ENV_PRICE_API, DEFAULT_PRICE_API_URL)
    }

    /// Fallback: $SOLGATE_SLIPPAGE_TOLERANCE -> 0.5%.
    pub fn default_slippage_tolerance() -> Decimal {
        env::var(ENV_SLIPPAGE_TOLERANCE)
            .ok()
            .and_then(|s| Decimal::from_str(&s).ok())
            .unwrap_or_else(crate::verifier::default_slippage_tolerance)
    }

    pub fn default_rpc_timeout_secs() -> u64 {
        env_secs(ENV_RPC_TIMEOUT_SECS, DEFAULT_RPC_TIMEOUT_SECS)
    }

    pub fn default_http_timeout_secs() -> u64 {
        env_secs(ENV_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS)
    }

    fn env_url(var: &str, fallback: &str) -> Url {
        env::var(var)
            .ok()
            .and_then(|s| Url::parse(&s).ok())
            .unwrap_or_else(|| Url::parse(fallback).expect("valid default url"))
    }

    fn env_secs(var: &str, fallback: u64) -> u64 {
        env::var(var)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(fallback)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl GateConfig {
    /// Loads configuration from the process environment. A `.env` file is
    /// loaded first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let receiving_wallet =
            env::var(ENV_RECEIVING_WALLET).map_err(|_| ConfigError::MissingVar(ENV_RECEIVING_WALLET))?;
        let token_mint =
            env::var(ENV_TOKEN_MINT).map_err(|_| ConfigError::MissingVar(ENV_TOKEN_MINT))?;
        Ok(Self {
            rpc_url: config_defaults::default_rpc_url(),
            price_api_url: config_defaults::default_price_api_url(),
            receiving_wallet,
            token_mint,
            slippage_tolerance: config_defaults::default_slippage_tolerance(),
            rpc_timeout_secs: config_defaults::default_rpc_timeout_secs(),
            http_timeout_secs: config_defaults::default_http_timeout_secs(),
        })
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Parses the wallet and mint into the verifier's settings.
    pub fn verifier_config(&self) -> Result<VerifierConfig, ConfigError> {
        let receiving_wallet =
            Pubkey::from_str(&self.receiving_wallet).map_err(|e| ConfigError::Invalid {
                name: ENV_RECEIVING_WALLET,
                message: e.to_string(),
            })?;
        let token_mint = Pubkey::from_str(&self.token_mint).map_err(|e| ConfigError::Invalid {
            name: ENV_TOKEN_MINT,
            message: e.to_string(),
        })?;
        Ok(VerifierConfig::new(receiving_wallet, token_mint)
            .with_slippage_tolerance(self.slippage_tolerance))
    }

    /// Assembles the production verifier: Solana RPC ledger reader, Jupiter
    /// price oracle, and the in-process payment store.
    pub fn build_verifier(
        &self,
    ) -> Result<PaymentVerifier<SolanaLedgerReader, JupiterPriceOracle, MemoryPaymentStore>, ConfigError>
    {
        let verifier_config = self.verifier_config()?;
        let ledger = SolanaLedgerReader::new(&self.rpc_url, self.rpc_timeout());
        let oracle = JupiterPriceOracle::new(self.price_api_url.clone(), self.http_timeout())
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let store = MemoryPaymentStore::new();
        Ok(PaymentVerifier::new(ledger, oracle, store, verifier_config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> GateConfig {
        GateConfig {
            rpc_url: Url::parse(config_defaults::DEFAULT_RPC_URL).unwrap(),
            price_api_url: Url::parse(config_defaults::DEFAULT_PRICE_API_URL).unwrap(),
            receiving_wallet: Pubkey::new_unique().to_string(),
            token_mint: Pubkey::new_unique().to_string(),
            slippage_tolerance: crate::verifier::default_slippage_tolerance(),
            rpc_timeout_secs: config_defaults::DEFAULT_RPC_TIMEOUT_SECS,
            http_timeout_secs: config_defaults::DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }

    #[test]
    fn deserializes_with_defaults() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let json = format!(
            "{{ \"receiving_wallet\": \"{wallet}\", \"token_mint\": \"{mint}\" }}"
        );
        let config: GateConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.receiving_wallet, wallet.to_string());
        assert_eq!(config.rpc_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.slippage_tolerance,
            Decimal::from_str("0.005").unwrap()
        );
    }

    #[test]
    fn verifier_config_parses_addresses() {
        let config = base_config();
        let verifier_config = config.verifier_config().unwrap();
        assert_eq!(
            verifier_config.receiving_wallet.to_string(),
            config.receiving_wallet
        );
    }

    #[test]
    fn invalid_wallet_is_reported_by_name() {
        let config = GateConfig {
            receiving_wallet: "not-base58!".to_string(),
            ..base_config()
        };
        let error = config.verifier_config().unwrap_err();
        assert!(error.to_string().contains("SOLGATE_RECEIVING_WALLET"));
    }
}
