//! Session-scoped sale client
//!
//! Ties the connector, refresh path, scheduler and executor together. A
//! successful connect replaces the session and starts a fresh scheduler;
//! disconnect tears the scheduler down with the session.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::connector::ChainConnector;
use crate::error::SaleError;
use crate::executor::{ExecutionOutcome, TransactionExecutor};
use crate::gateway::ContractGateway;
use crate::metrics::Metrics;
use crate::scheduler::PollingScheduler;
use crate::state::{SaleState, SharedState, UiState};
use crate::sync::SaleSync;
use crate::types::{Clock, TxKind};
use crate::view::{render, UiView};

/// Point-in-time view of the session for the HTTP surface
#[derive(Debug, Clone, Serialize)]
pub struct SaleSnapshot {
    pub wallet_connected: bool,
    pub network: u64,
    pub account: Option<String>,
    pub owner: Option<String>,
    pub is_owner: bool,
    pub presale_started: bool,
    pub presale_end_time: Option<String>,
    pub presale_ended: bool,
    pub tokens_minted: String,
    pub loading: bool,
    pub pending: Option<&'static str>,
    /// Outstanding read failures, by fact
    pub read_errors: BTreeMap<String, String>,
    pub ui_state: UiState,
    pub view: UiView,
}

pub struct SaleClient {
    connector: ChainConnector,
    sync: Arc<SaleSync>,
    executor: TransactionExecutor,
    scheduler: Mutex<Option<PollingScheduler>>,
    generation: AtomicU64,
    poll_interval: Duration,
    max_supply: u64,
}

impl SaleClient {
    pub fn new(
        connector: ChainConnector,
        gateway: Arc<dyn ContractGateway>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
        poll_interval: Duration,
        max_supply: u64,
    ) -> Self {
        let state: SharedState = Arc::new(tokio::sync::RwLock::new(SaleState::default()));
        let sync = Arc::new(SaleSync::new(gateway, state, clock, metrics));
        let executor = TransactionExecutor::new(sync.clone());

        Self {
            connector,
            sync,
            executor,
            scheduler: Mutex::new(None),
            generation: AtomicU64::new(0),
            poll_interval,
            max_supply,
        }
    }

    pub fn sync(&self) -> &Arc<SaleSync> {
        &self.sync
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.sync.metrics()
    }

    /// Connect the wallet and start polling.
    ///
    /// Any previous session and its timers are torn down first, so a failed
    /// attempt leaves the client disconnected. Each attempt starts a new
    /// generation, which detaches transactions still in flight from the old
    /// session.
    pub async fn connect(&self) -> Result<(), SaleError> {
        let mut scheduler = self.scheduler.lock().await;
        if let Some(previous) = scheduler.take() {
            previous.shutdown().await;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.sync.state().write().await = SaleState::default().with_generation(generation);

        let session = self.connector.connect().await?;
        *self.sync.state().write().await = SaleState::new(session).with_generation(generation);

        *scheduler = Some(PollingScheduler::start(
            self.sync.clone(),
            self.poll_interval,
        ));
        Ok(())
    }

    pub async fn disconnect(&self) {
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.shutdown().await;
        }
        self.sync.state().write().await.session.disconnect();
        info!("Wallet disconnected");
    }

    /// Wait for the connect-triggered bootstrap to finish
    pub async fn wait_bootstrap(&self) {
        if let Some(scheduler) = self.scheduler.lock().await.as_mut() {
            scheduler.wait_bootstrap().await;
        }
    }

    pub async fn presale_timer_running(&self) -> bool {
        self.scheduler
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.presale_timer_finished())
    }

    pub async fn execute(&self, kind: TxKind) -> Result<ExecutionOutcome, SaleError> {
        self.executor.execute(kind).await
    }

    pub async fn execute_with_value(
        &self,
        kind: TxKind,
        value: U256,
    ) -> Result<ExecutionOutcome, SaleError> {
        self.executor.execute_with_value(kind, value).await
    }

    pub async fn ui_state(&self) -> UiState {
        self.sync.ui_state().await
    }

    pub async fn snapshot(&self) -> SaleSnapshot {
        let now = self.sync.now();
        let state = self.sync.state().read().await;
        let ui_state = state.ui_state(now);
        let facts = &state.facts;

        SaleSnapshot {
            wallet_connected: state.session.wallet_connected,
            network: state.session.network,
            account: state.session.account.map(|a| a.to_string()),
            owner: facts.owner_address.map(|a| a.to_string()),
            is_owner: facts.is_owner(),
            presale_started: facts.presale_started,
            presale_end_time: facts.presale_end_time.map(|t| t.to_string()),
            presale_ended: facts.presale_ended(now),
            tokens_minted: facts.tokens_minted.to_string(),
            loading: state.loading,
            pending: state.pending.as_ref().map(|p| p.kind.as_str()),
            read_errors: state.read_errors.clone(),
            ui_state,
            view: render(ui_state, facts.tokens_minted, self.max_supply),
        }
    }
}
