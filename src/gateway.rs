//! Contract Gateway
//!
//! Typed surface over the collection contract, one operation per contract
//! method. Reads take a [`ReadHandle`], writes a [`SigningHandle`], and every
//! call goes through the wallet connection the handle carries. The gateway
//! never pre-checks permissions; the contract is the authority.
//!
//! # Transaction Building
//!
//! Writes use `ProviderBuilder::with_recommended_fillers()` so nonce, gas and
//! fee fields are populated before signing.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::sol;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::{Result as EyreResult, WrapErr};
use tracing::{debug, info};

use crate::connector::{ReadHandle, RpcConnection, SigningHandle};
use crate::error::{classify_write_error, SaleError};

sol! {
    /// Collection contract interface consumed by the client
    #[sol(rpc)]
    contract CryptoDevs {
        function owner() external view returns (address);

        function presaleStarted() external view returns (bool);

        /// Presale end, epoch seconds
        function presaleEndtime() external view returns (uint256);

        /// Number of tokens minted so far
        function tokenIds() external view returns (uint256);

        /// Owner only
        function startPresale() external;

        /// Allow-listed addresses only, during the presale window
        function presaleMint() external payable;

        /// After the presale window
        function mint() external payable;
    }
}

/// A broadcast transaction awaiting confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxHandle {
    pub tx_hash: B256,
}

impl TxHandle {
    pub fn hash_hex(&self) -> String {
        format!("0x{:x}", self.tx_hash)
    }
}

#[async_trait]
pub trait ContractGateway: Send + Sync {
    async fn get_owner(&self, handle: &ReadHandle) -> Result<Address, SaleError>;

    async fn get_presale_started(&self, handle: &ReadHandle) -> Result<bool, SaleError>;

    async fn get_presale_end_time(&self, handle: &ReadHandle) -> Result<U256, SaleError>;

    /// Monotonically non-decreasing
    async fn get_tokens_minted(&self, handle: &ReadHandle) -> Result<U256, SaleError>;

    async fn start_presale(&self, handle: &SigningHandle) -> Result<TxHandle, SaleError>;

    async fn presale_mint(
        &self,
        handle: &SigningHandle,
        value: U256,
    ) -> Result<TxHandle, SaleError>;

    async fn public_mint(&self, handle: &SigningHandle, value: U256)
        -> Result<TxHandle, SaleError>;

    /// Wait until the transaction is mined. A failed receipt is `RevertedFailure`.
    async fn wait_for_confirmation(
        &self,
        handle: &SigningHandle,
        tx: &TxHandle,
    ) -> Result<(), SaleError>;
}

fn require_connection(
    connection: &Option<Arc<RpcConnection>>,
) -> Result<&RpcConnection, SaleError> {
    connection.as_deref().ok_or_else(|| {
        SaleError::ProviderUnavailable("wallet has no JSON-RPC connection".to_string())
    })
}

/// Gateway over JSON-RPC using alloy bindings
pub struct EvmSaleGateway {
    contract_address: Address,
    confirm_timeout: Duration,
    receipt_poll_interval: Duration,
}

impl EvmSaleGateway {
    pub fn new(contract_address: &str, confirm_timeout: Duration) -> EyreResult<Self> {
        let contract_address =
            Address::from_str(contract_address).wrap_err("Invalid NFT contract address")?;

        info!(contract = %contract_address, "Contract gateway initialized");

        Ok(Self {
            contract_address,
            confirm_timeout,
            receipt_poll_interval: Duration::from_millis(500),
        })
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    fn signing_provider(
        &self,
        handle: &SigningHandle,
    ) -> Result<impl Provider<Http<Client>> + Clone, SaleError> {
        let connection = require_connection(&handle.connection)?;
        let signer = connection.signer().ok_or_else(|| {
            SaleError::SubmissionFailure("no signer configured for writes".to_string())
        })?;

        if signer.address() != handle.account {
            return Err(SaleError::SubmissionFailure(format!(
                "signer {} does not match connected account {}",
                signer.address(),
                handle.account
            )));
        }

        let url = connection
            .rpc_url()
            .parse()
            .map_err(|e| SaleError::SubmissionFailure(format!("Invalid RPC URL: {}", e)))?;

        let wallet = EthereumWallet::from(signer.clone());
        Ok(ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(url))
    }
}

#[async_trait]
impl ContractGateway for EvmSaleGateway {
    async fn get_owner(&self, handle: &ReadHandle) -> Result<Address, SaleError> {
        let connection = require_connection(&handle.connection)?;
        let contract = CryptoDevs::new(self.contract_address, connection.provider());
        let result = contract
            .owner()
            .call()
            .await
            .map_err(|e| SaleError::ReadFailure(format!("Failed to get owner: {}", e)))?;
        Ok(result._0)
    }

    async fn get_presale_started(&self, handle: &ReadHandle) -> Result<bool, SaleError> {
        let connection = require_connection(&handle.connection)?;
        let contract = CryptoDevs::new(self.contract_address, connection.provider());
        let result = contract.presaleStarted().call().await.map_err(|e| {
            SaleError::ReadFailure(format!("Failed to get presale status: {}", e))
        })?;
        Ok(result._0)
    }

    async fn get_presale_end_time(&self, handle: &ReadHandle) -> Result<U256, SaleError> {
        let connection = require_connection(&handle.connection)?;
        let contract = CryptoDevs::new(self.contract_address, connection.provider());
        let result = contract.presaleEndtime().call().await.map_err(|e| {
            SaleError::ReadFailure(format!("Failed to get presale end time: {}", e))
        })?;
        Ok(result._0)
    }

    async fn get_tokens_minted(&self, handle: &ReadHandle) -> Result<U256, SaleError> {
        let connection = require_connection(&handle.connection)?;
        let contract = CryptoDevs::new(self.contract_address, connection.provider());
        let result = contract.tokenIds().call().await.map_err(|e| {
            SaleError::ReadFailure(format!("Failed to get tokens minted: {}", e))
        })?;
        Ok(result._0)
    }

    async fn start_presale(&self, handle: &SigningHandle) -> Result<TxHandle, SaleError> {
        let provider = self.signing_provider(handle)?;
        let contract = CryptoDevs::new(self.contract_address, &provider);

        debug!(account = %handle.account, "Submitting startPresale");

        let pending_tx = contract
            .startPresale()
            .send()
            .await
            .map_err(|e| classify_write_error(&e.to_string()))?;

        let tx_hash = *pending_tx.tx_hash();
        info!(tx_hash = %tx_hash, "startPresale transaction sent");
        Ok(TxHandle { tx_hash })
    }

    async fn presale_mint(
        &self,
        handle: &SigningHandle,
        value: U256,
    ) -> Result<TxHandle, SaleError> {
        let provider = self.signing_provider(handle)?;
        let contract = CryptoDevs::new(self.contract_address, &provider);

        debug!(account = %handle.account, value = %value, "Submitting presaleMint");

        let pending_tx = contract
            .presaleMint()
            .value(value)
            .send()
            .await
            .map_err(|e| classify_write_error(&e.to_string()))?;

        let tx_hash = *pending_tx.tx_hash();
        info!(tx_hash = %tx_hash, "presaleMint transaction sent");
        Ok(TxHandle { tx_hash })
    }

    async fn public_mint(
        &self,
        handle: &SigningHandle,
        value: U256,
    ) -> Result<TxHandle, SaleError> {
        let provider = self.signing_provider(handle)?;
        let contract = CryptoDevs::new(self.contract_address, &provider);

        debug!(account = %handle.account, value = %value, "Submitting mint");

        let pending_tx = contract
            .mint()
            .value(value)
            .send()
            .await
            .map_err(|e| classify_write_error(&e.to_string()))?;

        let tx_hash = *pending_tx.tx_hash();
        info!(tx_hash = %tx_hash, "mint transaction sent");
        Ok(TxHandle { tx_hash })
    }

    async fn wait_for_confirmation(
        &self,
        handle: &SigningHandle,
        tx: &TxHandle,
    ) -> Result<(), SaleError> {
        let provider = require_connection(&handle.connection)?.provider();
        let start = std::time::Instant::now();

        while start.elapsed() < self.confirm_timeout {
            match provider.get_transaction_receipt(tx.tx_hash).await {
                Ok(Some(receipt)) => {
                    if !receipt.status() {
                        return Err(SaleError::RevertedFailure(format!(
                            "transaction {} reverted",
                            tx.hash_hex()
                        )));
                    }
                    info!(
                        tx_hash = %tx.tx_hash,
                        block = ?receipt.block_number,
                        "Transaction confirmed"
                    );
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(tx_hash = %tx.tx_hash, error = %e, "Receipt query failed, retrying");
                }
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }

        Err(SaleError::SubmissionFailure(format!(
            "transaction {} not confirmed after {:?}",
            tx.hash_hex(),
            self.confirm_timeout
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn gateway() -> EvmSaleGateway {
        EvmSaleGateway::new(
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
            Duration::from_secs(1),
        )
        .unwrap()
    }

    fn signing_handle(account: Address, key: Option<&str>) -> SigningHandle {
        SigningHandle {
            chain_id: 5,
            account,
            connection: Some(Arc::new(
                RpcConnection::new("http://localhost:8545", key).unwrap(),
            )),
        }
    }

    #[test]
    fn test_rejects_invalid_contract_address() {
        let result = EvmSaleGateway::new("not-an-address", Duration::from_secs(1));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_read_without_connection_is_provider_unavailable() {
        let handle = ReadHandle {
            chain_id: 5,
            connection: None,
        };
        let err = gateway().get_tokens_minted(&handle).await.unwrap_err();
        assert!(matches!(err, SaleError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_write_without_signer_is_submission_failure() {
        let handle = signing_handle(Address::repeat_byte(1), None);
        let err = gateway().start_presale(&handle).await.unwrap_err();
        assert!(matches!(err, SaleError::SubmissionFailure(_)));
    }

    #[tokio::test]
    async fn test_write_with_foreign_account_is_submission_failure() {
        let handle = signing_handle(Address::repeat_byte(9), Some(ANVIL_KEY));
        let err = gateway()
            .public_mint(&handle, crate::types::mint_price())
            .await
            .unwrap_err();
        assert!(matches!(err, SaleError::SubmissionFailure(_)));
    }

    #[test]
    fn test_tx_handle_hex() {
        let handle = TxHandle {
            tx_hash: B256::repeat_byte(0xab),
        };
        assert_eq!(handle.hash_hex(), format!("0x{}", "ab".repeat(32)));
    }
}
