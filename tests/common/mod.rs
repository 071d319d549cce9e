//! In-memory wallet and collection contract for exercising the client
//! without a chain.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use mint_client::connector::{ChainConnector, ReadHandle, SigningHandle, WalletProvider};
use mint_client::gateway::{ContractGateway, TxHandle};
use mint_client::metrics::Metrics;
use mint_client::state::SaleState;
use mint_client::sync::SaleSync;
use mint_client::types::{mint_price, Clock, ManualClock};
use mint_client::{SaleClient, SaleError};
use tokio::sync::oneshot;

pub const START: u64 = 1_700_000_000;
pub const PRESALE_DURATION: u64 = 300;
pub const MAX_SUPPLY: u64 = 20;

pub fn owner() -> Address {
    Address::repeat_byte(0x0a)
}

pub fn buyer() -> Address {
    Address::repeat_byte(0x0b)
}

pub struct MockWallet {
    pub account: Option<Address>,
    pub chain_id: AtomicU64,
}

impl MockWallet {
    pub fn new(account: Address, chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            account: Some(account),
            chain_id: AtomicU64::new(chain_id),
        })
    }

    pub fn locked(chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            account: None,
            chain_id: AtomicU64::new(chain_id),
        })
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_account(&self) -> Result<Address, SaleError> {
        self.account
            .ok_or_else(|| SaleError::ProviderUnavailable("wallet locked".to_string()))
    }

    async fn network_id(&self) -> Result<u64, SaleError> {
        Ok(self.chain_id.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone)]
pub struct Chain {
    pub owner: Address,
    pub presale_started: bool,
    pub presale_end_time: U256,
    pub tokens_minted: u64,
    pub max_supply: u64,
}

/// Collection contract with the same rules as the deployed one
pub struct MockContract {
    pub chain: Mutex<Chain>,
    clock: Arc<ManualClock>,
    pub fail_reads: AtomicBool,
    pub owner_calls: AtomicUsize,
    pub started_calls: AtomicUsize,
    pub end_time_calls: AtomicUsize,
    pub tokens_calls: AtomicUsize,
    /// When non-empty, each tokens read waits for the front gate's value
    token_gates: Mutex<VecDeque<oneshot::Receiver<u64>>>,
    /// Same for end time reads
    end_time_gates: Mutex<VecDeque<oneshot::Receiver<u64>>>,
    pub reads_waiting: AtomicUsize,
    /// When set, the next confirmation waits until the sender fires
    confirm_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub confirmations_waiting: AtomicUsize,
    tx_counter: AtomicU64,
}

impl MockContract {
    pub fn new(clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self {
            chain: Mutex::new(Chain {
                owner: owner(),
                presale_started: false,
                presale_end_time: U256::ZERO,
                tokens_minted: 0,
                max_supply: MAX_SUPPLY,
            }),
            clock,
            fail_reads: AtomicBool::new(false),
            owner_calls: AtomicUsize::new(0),
            started_calls: AtomicUsize::new(0),
            end_time_calls: AtomicUsize::new(0),
            tokens_calls: AtomicUsize::new(0),
            token_gates: Mutex::new(VecDeque::new()),
            end_time_gates: Mutex::new(VecDeque::new()),
            reads_waiting: AtomicUsize::new(0),
            confirm_gate: Mutex::new(None),
            confirmations_waiting: AtomicUsize::new(0),
            tx_counter: AtomicU64::new(0),
        })
    }

    pub fn start_presale_now(&self) {
        let mut chain = self.chain.lock().unwrap();
        chain.presale_started = true;
        chain.presale_end_time = U256::from(self.clock.now_secs() + PRESALE_DURATION);
    }

    pub fn set_tokens_minted(&self, minted: u64) {
        self.chain.lock().unwrap().tokens_minted = minted;
    }

    pub fn tokens_minted(&self) -> u64 {
        self.chain.lock().unwrap().tokens_minted
    }

    /// Queue `n` gates for tokens reads; send on the returned senders to complete them
    pub fn gate_token_reads(&self, n: usize) -> Vec<oneshot::Sender<u64>> {
        queue_gates(&self.token_gates, n)
    }

    /// Queue `n` gates for end time reads
    pub fn gate_end_time_reads(&self, n: usize) -> Vec<oneshot::Sender<u64>> {
        queue_gates(&self.end_time_gates, n)
    }

    async fn pass_gate(
        &self,
        gates: &Mutex<VecDeque<oneshot::Receiver<u64>>>,
    ) -> Result<Option<U256>, SaleError> {
        let gate = gates.lock().unwrap().pop_front();
        let Some(gate) = gate else {
            return Ok(None);
        };
        self.reads_waiting.fetch_add(1, Ordering::SeqCst);
        let value = gate
            .await
            .map_err(|_| SaleError::ReadFailure("gate dropped".to_string()))?;
        self.reads_waiting.fetch_sub(1, Ordering::SeqCst);
        Ok(Some(U256::from(value)))
    }

    pub fn gate_confirmation(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.confirm_gate.lock().unwrap() = Some(rx);
        tx
    }

    fn check_reads(&self) -> Result<(), SaleError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SaleError::ReadFailure("connection reset".to_string()));
        }
        Ok(())
    }

    fn next_tx(&self) -> TxHandle {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        TxHandle {
            tx_hash: B256::from(bytes),
        }
    }

    fn presale_running(&self, chain: &Chain) -> bool {
        chain.presale_started && chain.presale_end_time >= U256::from(self.clock.now_secs())
    }

    fn mint(&self, chain: &mut Chain, value: U256) -> Result<TxHandle, SaleError> {
        if value != mint_price() {
            return Err(SaleError::RevertedFailure(
                "execution reverted: Ether sent is not correct".to_string(),
            ));
        }
        if chain.tokens_minted >= chain.max_supply {
            return Err(SaleError::RevertedFailure(
                "execution reverted: Exceeded maximum supply".to_string(),
            ));
        }
        chain.tokens_minted += 1;
        Ok(self.next_tx())
    }
}

#[async_trait]
impl ContractGateway for MockContract {
    async fn get_owner(&self, _handle: &ReadHandle) -> Result<Address, SaleError> {
        self.owner_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        Ok(self.chain.lock().unwrap().owner)
    }

    async fn get_presale_started(&self, _handle: &ReadHandle) -> Result<bool, SaleError> {
        self.started_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        Ok(self.chain.lock().unwrap().presale_started)
    }

    async fn get_presale_end_time(&self, _handle: &ReadHandle) -> Result<U256, SaleError> {
        self.end_time_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        if let Some(value) = self.pass_gate(&self.end_time_gates).await? {
            return Ok(value);
        }
        Ok(self.chain.lock().unwrap().presale_end_time)
    }

    async fn get_tokens_minted(&self, _handle: &ReadHandle) -> Result<U256, SaleError> {
        self.tokens_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        if let Some(value) = self.pass_gate(&self.token_gates).await? {
            return Ok(value);
        }

        Ok(U256::from(self.chain.lock().unwrap().tokens_minted))
    }

    async fn start_presale(&self, handle: &SigningHandle) -> Result<TxHandle, SaleError> {
        let mut chain = self.chain.lock().unwrap();
        if handle.account != chain.owner {
            return Err(SaleError::RevertedFailure(
                "execution reverted: Ownable: caller is not the owner".to_string(),
            ));
        }
        chain.presale_started = true;
        chain.presale_end_time = U256::from(self.clock.now_secs() + PRESALE_DURATION);
        Ok(self.next_tx())
    }

    async fn presale_mint(
        &self,
        _handle: &SigningHandle,
        value: U256,
    ) -> Result<TxHandle, SaleError> {
        let mut chain = self.chain.lock().unwrap();
        if !self.presale_running(&chain) {
            return Err(SaleError::RevertedFailure(
                "execution reverted: Presale is not running".to_string(),
            ));
        }
        self.mint(&mut chain, value)
    }

    async fn public_mint(
        &self,
        _handle: &SigningHandle,
        value: U256,
    ) -> Result<TxHandle, SaleError> {
        let mut chain = self.chain.lock().unwrap();
        if !chain.presale_started || self.presale_running(&chain) {
            return Err(SaleError::RevertedFailure(
                "execution reverted: Presale has not ended yet".to_string(),
            ));
        }
        self.mint(&mut chain, value)
    }

    async fn wait_for_confirmation(
        &self,
        _handle: &SigningHandle,
        _tx: &TxHandle,
    ) -> Result<(), SaleError> {
        let gate = self.confirm_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.confirmations_waiting.fetch_add(1, Ordering::SeqCst);
            let _ = gate.await;
            self.confirmations_waiting.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn queue_gates(
    gates: &Mutex<VecDeque<oneshot::Receiver<u64>>>,
    n: usize,
) -> Vec<oneshot::Sender<u64>> {
    let mut gates = gates.lock().unwrap();
    (0..n)
        .map(|_| {
            let (tx, rx) = oneshot::channel();
            gates.push_back(rx);
            tx
        })
        .collect()
}

/// Everything a test needs, wired the same way the binary wires it
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub contract: Arc<MockContract>,
    pub wallet: Arc<MockWallet>,
    pub metrics: Arc<Metrics>,
}

impl Harness {
    pub fn new(account: Address) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        Self {
            contract: MockContract::new(clock.clone()),
            wallet: MockWallet::new(account, 5),
            metrics: Arc::new(Metrics::new()),
            clock,
        }
    }

    pub fn connector(&self) -> ChainConnector {
        ChainConnector::new(self.wallet.clone(), 5)
    }

    /// A refresh path over a freshly connected session
    pub async fn sync(&self) -> Arc<SaleSync> {
        let session = self.connector().connect().await.unwrap();
        Arc::new(SaleSync::new(
            self.contract.clone(),
            SaleState::shared(session),
            self.clock.clone(),
            self.metrics.clone(),
        ))
    }

    pub fn client(&self, poll_interval: Duration) -> SaleClient {
        SaleClient::new(
            self.connector(),
            self.contract.clone(),
            self.clock.clone(),
            self.metrics.clone(),
            poll_interval,
            MAX_SUPPLY,
        )
    }
}

/// Poll `check` until it holds, failing after a generous bound
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
