//! Client configuration

use eyre::{eyre, Result, WrapErr};
use std::env;

use crate::metadata::DEFAULT_IMAGE_BASE_URL;
use crate::types::DEFAULT_REQUIRED_CHAIN_ID;

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON-RPC endpoint of the wallet's network
    pub evm_rpc_url: String,
    /// Deployed collection contract address
    pub nft_contract_address: String,
    /// Local key standing in for the injected wallet. Without it, connecting
    /// fails with `ProviderUnavailable`.
    pub wallet_private_key: Option<String>,
    /// The only network the client accepts
    pub required_chain_id: u64,

    /// Period of both polling timers in milliseconds
    pub poll_interval_ms: u64,
    /// Bound on waiting for a transaction receipt
    pub tx_confirm_timeout_ms: u64,

    pub collection_name: String,
    pub metadata_base_url: String,
    pub max_supply: u64,

    pub bind_address: String,
    pub http_port: u16,
}

impl Config {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let evm_rpc_url = lookup("EVM_RPC_URL").ok_or_else(|| eyre!("EVM_RPC_URL required"))?;
        url::Url::parse(&evm_rpc_url).wrap_err("Invalid EVM_RPC_URL")?;

        let parse_or = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                Some(v) => v.trim().parse().map_err(|_| eyre!("Invalid {}", key)),
                None => Ok(default),
            }
        };

        Ok(Self {
            evm_rpc_url,
            nft_contract_address: lookup("NFT_CONTRACT_ADDRESS")
                .ok_or_else(|| eyre!("NFT_CONTRACT_ADDRESS required"))?,
            wallet_private_key: lookup("WALLET_PRIVATE_KEY").filter(|k| !k.trim().is_empty()),
            required_chain_id: parse_or("REQUIRED_CHAIN_ID", DEFAULT_REQUIRED_CHAIN_ID)?,

            poll_interval_ms: parse_or("POLL_INTERVAL_MS", 5000)?,
            tx_confirm_timeout_ms: parse_or("TX_CONFIRM_TIMEOUT_MS", 120_000)?,

            collection_name: lookup("COLLECTION_NAME").unwrap_or_else(|| "Buidler".to_string()),
            metadata_base_url: lookup("METADATA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string()),
            max_supply: parse_or("MAX_SUPPLY", 20)?,

            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            http_port: lookup("HTTP_PORT")
                .map(|v| v.parse::<u16>().map_err(|_| eyre!("Invalid HTTP_PORT")))
                .transpose()?
                .unwrap_or(3000),
        })
    }
}
