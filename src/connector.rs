//! Chain Connector
//!
//! Obtains an authorized account from the wallet provider and checks that the
//! wallet is on the single required network before handing out handles.
//!
//! # Handles
//!
//! A [`Handle`] is a capability issued by a connected [`Session`]: a
//! [`ReadHandle`] for contract reads, a [`SigningHandle`] for transactions.
//! Both carry the same underlying [`RpcConnection`] of the wallet and both are
//! only issued after the network identity has been re-checked.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::{eyre, Result as EyreResult, WrapErr};
use tracing::{debug, info, warn};

use crate::error::SaleError;

/// Wallet provider surface consumed by the connector
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Connect and authorize, returning the selected account
    async fn request_account(&self) -> Result<Address, SaleError>;

    /// Chain ID the wallet is currently connected to
    async fn network_id(&self) -> Result<u64, SaleError>;

    /// JSON-RPC connection backing this wallet, if it has one
    fn rpc_connection(&self) -> Option<Arc<RpcConnection>> {
        None
    }
}

/// JSON-RPC transport and optional signer of a wallet
pub struct RpcConnection {
    rpc_url: String,
    provider: RootProvider<Http<Client>>,
    signer: Option<PrivateKeySigner>,
}

impl fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcConnection")
            .field("rpc_url", &self.rpc_url)
            .field("signer", &self.signer.as_ref().map(|s| s.address()))
            .finish_non_exhaustive()
    }
}

impl RpcConnection {
    pub fn new(rpc_url: &str, private_key: Option<&str>) -> EyreResult<Self> {
        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .map_err(|e| eyre!("Invalid RPC URL: {}", e))?,
        );

        let signer = private_key
            .map(|key| key.parse::<PrivateKeySigner>())
            .transpose()
            .wrap_err("Invalid wallet private key")?;

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            provider,
            signer,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn provider(&self) -> &RootProvider<Http<Client>> {
        &self.provider
    }

    pub fn signer(&self) -> Option<&PrivateKeySigner> {
        self.signer.as_ref()
    }
}

/// Read-only capability
#[derive(Debug, Clone)]
pub struct ReadHandle {
    pub chain_id: u64,
    /// `None` for wallets without a JSON-RPC transport
    pub connection: Option<Arc<RpcConnection>>,
}

/// Signing capability for the connected account
#[derive(Debug, Clone)]
pub struct SigningHandle {
    pub chain_id: u64,
    pub account: Address,
    pub connection: Option<Arc<RpcConnection>>,
}

#[derive(Debug, Clone)]
pub enum Handle {
    Read(ReadHandle),
    Signing(SigningHandle),
}

/// Wallet session. Owns the provider; replaced wholesale on reconnect.
#[derive(Clone, Default)]
pub struct Session {
    pub wallet_connected: bool,
    pub network: u64,
    pub account: Option<Address>,
    required_chain_id: u64,
    provider: Option<Arc<dyn WalletProvider>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("wallet_connected", &self.wallet_connected)
            .field("network", &self.network)
            .field("account", &self.account)
            .field("required_chain_id", &self.required_chain_id)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// A session with no wallet attached
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Drop the provider and mark the wallet disconnected
    pub fn disconnect(&mut self) {
        self.wallet_connected = false;
        self.account = None;
        self.provider = None;
    }

    /// Get a read-only or signing handle.
    ///
    /// Fails with `NetworkMismatch` if the wallet switched networks since connect.
    pub async fn get_handle(&self, needs_signing: bool) -> Result<Handle, SaleError> {
        let provider = match (&self.provider, self.wallet_connected) {
            (Some(provider), true) => provider,
            _ => {
                return Err(SaleError::ProviderUnavailable(
                    "wallet not connected".to_string(),
                ))
            }
        };

        let chain_id = provider.network_id().await?;
        check_network(self.required_chain_id, chain_id)?;
        let connection = provider.rpc_connection();

        if !needs_signing {
            return Ok(Handle::Read(ReadHandle {
                chain_id,
                connection,
            }));
        }

        let account = self.account.ok_or_else(|| {
            SaleError::ProviderUnavailable("no authorized account".to_string())
        })?;

        Ok(Handle::Signing(SigningHandle {
            chain_id,
            account,
            connection,
        }))
    }

    pub async fn read_handle(&self) -> Result<ReadHandle, SaleError> {
        match self.get_handle(false).await? {
            Handle::Read(handle) => Ok(handle),
            Handle::Signing(handle) => Ok(ReadHandle {
                chain_id: handle.chain_id,
                connection: handle.connection,
            }),
        }
    }

    pub async fn signing_handle(&self) -> Result<SigningHandle, SaleError> {
        match self.get_handle(true).await? {
            Handle::Signing(handle) => Ok(handle),
            Handle::Read(_) => Err(SaleError::ProviderUnavailable(
                "wallet did not provide a signer".to_string(),
            )),
        }
    }
}

fn check_network(expected: u64, actual: u64) -> Result<(), SaleError> {
    if expected != actual {
        warn!(
            expected_chain_id = expected,
            actual_chain_id = actual,
            "Please connect to the required network"
        );
        return Err(SaleError::NetworkMismatch { expected, actual });
    }
    Ok(())
}

/// Establishes sessions against one required network
pub struct ChainConnector {
    provider: Arc<dyn WalletProvider>,
    required_chain_id: u64,
}

impl ChainConnector {
    pub fn new(provider: Arc<dyn WalletProvider>, required_chain_id: u64) -> Self {
        Self {
            provider,
            required_chain_id,
        }
    }

    pub fn required_chain_id(&self) -> u64 {
        self.required_chain_id
    }

    /// Authorize with the wallet and validate its network.
    ///
    /// A wrong network is never downgraded: the attempt fails and no session
    /// is produced.
    pub async fn connect(&self) -> Result<Session, SaleError> {
        let account = self.provider.request_account().await?;
        let network = self.provider.network_id().await?;
        check_network(self.required_chain_id, network)?;

        info!(account = %account, chain_id = network, "Wallet connected");

        Ok(Session {
            wallet_connected: true,
            network,
            account: Some(account),
            required_chain_id: self.required_chain_id,
            provider: Some(self.provider.clone()),
        })
    }
}

/// Wallet backed by a local private key and a JSON-RPC endpoint
pub struct LocalWallet {
    connection: Arc<RpcConnection>,
}

impl LocalWallet {
    /// Create a wallet. Without a key the wallet can still report its network
    /// but every authorization request fails with `ProviderUnavailable`.
    pub fn new(rpc_url: &str, private_key: Option<&str>) -> EyreResult<Self> {
        let connection = RpcConnection::new(rpc_url, private_key)?;

        if let Some(signer) = connection.signer() {
            debug!(address = %signer.address(), "Local wallet loaded");
        }

        Ok(Self {
            connection: Arc::new(connection),
        })
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request_account(&self) -> Result<Address, SaleError> {
        self.connection
            .signer()
            .map(|s| s.address())
            .ok_or_else(|| SaleError::ProviderUnavailable("no wallet key configured".to_string()))
    }

    async fn network_id(&self) -> Result<u64, SaleError> {
        self.connection
            .provider()
            .get_chain_id()
            .await
            .map_err(|e| SaleError::ProviderUnavailable(format!("Failed to get chain id: {}", e)))
    }

    fn rpc_connection(&self) -> Option<Arc<RpcConnection>> {
        Some(self.connection.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedWallet {
        account: Option<Address>,
        chain_id: AtomicU64,
    }

    #[async_trait]
    impl WalletProvider for FixedWallet {
        async fn request_account(&self) -> Result<Address, SaleError> {
            self.account
                .ok_or_else(|| SaleError::ProviderUnavailable("locked".to_string()))
        }

        async fn network_id(&self) -> Result<u64, SaleError> {
            Ok(self.chain_id.load(Ordering::SeqCst))
        }
    }

    fn wallet(account: Option<Address>, chain_id: u64) -> Arc<FixedWallet> {
        Arc::new(FixedWallet {
            account,
            chain_id: AtomicU64::new(chain_id),
        })
    }

    #[tokio::test]
    async fn test_connect_on_required_network() {
        let account = Address::repeat_byte(0xaa);
        let connector = ChainConnector::new(wallet(Some(account), 5), 5);

        let session = connector.connect().await.unwrap();
        assert!(session.wallet_connected);
        assert_eq!(session.network, 5);
        assert_eq!(session.account, Some(account));
    }

    #[tokio::test]
    async fn test_connect_rejects_wrong_network() {
        let connector = ChainConnector::new(wallet(Some(Address::repeat_byte(1)), 1), 5);

        let err = connector.connect().await.unwrap_err();
        assert_eq!(
            err,
            SaleError::NetworkMismatch {
                expected: 5,
                actual: 1
            }
        );
    }

    #[tokio::test]
    async fn test_connect_without_account() {
        let connector = ChainConnector::new(wallet(None, 5), 5);
        assert!(matches!(
            connector.connect().await,
            Err(SaleError::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_fails_after_network_drift() {
        let account = Address::repeat_byte(0xbb);
        let provider = wallet(Some(account), 5);
        let connector = ChainConnector::new(provider.clone(), 5);
        let session = connector.connect().await.unwrap();

        match session.get_handle(true).await.unwrap() {
            Handle::Signing(handle) => {
                assert_eq!(handle.chain_id, 5);
                assert_eq!(handle.account, account);
                assert!(handle.connection.is_none());
            }
            other => panic!("expected signing handle, got {:?}", other),
        }

        provider.chain_id.store(137, Ordering::SeqCst);
        assert!(matches!(
            session.read_handle().await,
            Err(SaleError::NetworkMismatch { actual: 137, .. })
        ));
    }

    #[tokio::test]
    async fn test_disconnected_session_has_no_handles() {
        let mut session = Session::disconnected();
        assert!(matches!(
            session.get_handle(false).await,
            Err(SaleError::ProviderUnavailable(_))
        ));

        let connector = ChainConnector::new(wallet(Some(Address::repeat_byte(2)), 5), 5);
        session = connector.connect().await.unwrap();
        session.disconnect();
        assert!(!session.wallet_connected);
        assert!(session.signing_handle().await.is_err());
    }

    #[test]
    fn test_local_wallet_rejects_bad_key() {
        assert!(LocalWallet::new("http://localhost:8545", Some("not-a-key")).is_err());
    }

    #[tokio::test]
    async fn test_local_wallet_without_key_is_unavailable() {
        let wallet = LocalWallet::new("http://localhost:8545", None).unwrap();
        assert!(matches!(
            wallet.request_account().await,
            Err(SaleError::ProviderUnavailable(_))
        ));
    }

    #[test]
    fn test_local_wallet_shares_its_connection() {
        let key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let wallet = LocalWallet::new("http://localhost:8545", Some(key)).unwrap();

        let first = wallet.rpc_connection().unwrap();
        let second = wallet.rpc_connection().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.rpc_url(), "http://localhost:8545");
        assert!(first.signer().is_some());
    }
}
