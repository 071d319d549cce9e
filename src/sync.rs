//! Refresh path shared by the polling scheduler and the transaction executor
//!
//! Each refresh reads chain truth and replaces the corresponding facts in one
//! write. Reads never hold the state lock across a network call, so refreshes
//! may overlap and complete out of order; the last completed write of a field
//! wins.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::{debug, info, warn};

use crate::connector::ReadHandle;
use crate::error::SaleError;
use crate::gateway::ContractGateway;
use crate::metrics::Metrics;
use crate::state::{SharedState, UiState};
use crate::types::{Clock, SaleFacts};

/// Fact names used for read-failure bookkeeping and metric labels
pub const FACT_PRESALE_STATUS: &str = "presale_status";
pub const FACT_OWNER: &str = "owner";
pub const FACT_TOKENS_MINTED: &str = "tokens_minted";

/// Result of a presale status refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresaleStatus {
    pub started: bool,
    pub end_time: Option<U256>,
    /// Computed against the clock at refresh time
    pub ended: bool,
}

pub struct SaleSync {
    gateway: Arc<dyn ContractGateway>,
    state: SharedState,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl SaleSync {
    pub fn new(
        gateway: Arc<dyn ContractGateway>,
        state: SharedState,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            gateway,
            state,
            clock,
            metrics,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn gateway(&self) -> &Arc<dyn ContractGateway> {
        &self.gateway
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn now(&self) -> u64 {
        self.clock.now_secs()
    }

    pub async fn facts(&self) -> SaleFacts {
        self.state.read().await.facts.clone()
    }

    pub async fn ui_state(&self) -> UiState {
        let now = self.now();
        self.state.read().await.ui_state(now)
    }

    async fn read_handle(&self) -> Result<ReadHandle, SaleError> {
        let session = self.state.read().await.session.clone();
        session.read_handle().await
    }

    /// Re-read presale status, and the end time when started.
    ///
    /// Both facts are written together so a reader never observes a started
    /// presale paired with a stale end time from a different read.
    pub async fn refresh_presale_status(&self) -> Result<PresaleStatus, SaleError> {
        let handle = self.read_handle().await?;
        let started = self.gateway.get_presale_started(&handle).await?;

        let end_time = if started {
            Some(self.gateway.get_presale_end_time(&handle).await?)
        } else {
            None
        };

        let now = self.now();
        let mut state = self.state.write().await;
        state.facts.presale_started = started;
        if end_time.is_some() {
            state.facts.presale_end_time = end_time;
        }
        state.read_errors.remove(FACT_PRESALE_STATUS);
        let status = PresaleStatus {
            started,
            end_time: state.facts.presale_end_time,
            ended: started && state.facts.presale_ended(now),
        };
        drop(state);

        debug!(
            started = status.started,
            end_time = ?status.end_time,
            ended = status.ended,
            "Presale status refreshed"
        );
        Ok(status)
    }

    /// Fetch the owner and record whether the connected account is it
    pub async fn refresh_owner(&self) -> Result<bool, SaleError> {
        let handle = self.read_handle().await?;
        let owner = self.gateway.get_owner(&handle).await?;

        let mut state = self.state.write().await;
        let caller: Option<Address> = state.session.account;
        state.facts.owner_address = Some(owner);
        state.facts.caller_address = caller;
        state.read_errors.remove(FACT_OWNER);
        let is_owner = state.facts.is_owner();
        drop(state);

        debug!(owner = %owner, caller = ?caller, is_owner, "Owner refreshed");
        Ok(is_owner)
    }

    pub async fn refresh_tokens_minted(&self) -> Result<U256, SaleError> {
        let handle = self.read_handle().await?;
        let minted = self.gateway.get_tokens_minted(&handle).await?;

        let mut state = self.state.write().await;
        state.facts.tokens_minted = minted;
        state.read_errors.remove(FACT_TOKENS_MINTED);
        drop(state);

        let gauge = u64::try_from(minted).unwrap_or(u64::MAX);
        self.metrics
            .tokens_minted
            .set(i64::try_from(gauge).unwrap_or(i64::MAX));

        debug!(tokens_minted = %minted, "Tokens minted refreshed");
        Ok(minted)
    }

    /// Record a read failure swallowed at a timer boundary. Facts stay as they were.
    pub async fn record_read_failure(&self, fact: &str, error: &SaleError) {
        warn!(fact = fact, error = %error, "Contract read failed, keeping previous value");
        self.metrics
            .read_failures_total
            .with_label_values(&[fact])
            .inc();
        self.state
            .write()
            .await
            .read_errors
            .insert(fact.to_string(), error.to_string());
    }

    /// One-shot sequence run on connect.
    ///
    /// Presale status is resolved before the owner check, and the owner is
    /// only fetched while the presale has not started. Once started, the
    /// owner is never re-checked. Each step fails soft.
    pub async fn bootstrap(&self) -> SaleFacts {
        match self.refresh_presale_status().await {
            Ok(status) if !status.started => {
                if let Err(e) = self.refresh_owner().await {
                    self.record_read_failure(FACT_OWNER, &e).await;
                }
            }
            Ok(_) => {}
            Err(e) => self.record_read_failure(FACT_PRESALE_STATUS, &e).await,
        }

        if let Err(e) = self.refresh_tokens_minted().await {
            self.record_read_failure(FACT_TOKENS_MINTED, &e).await;
        }

        let facts = self.facts().await;
        info!(
            presale_started = facts.presale_started,
            is_owner = facts.is_owner(),
            tokens_minted = %facts.tokens_minted,
            "Bootstrap complete"
        );
        facts
    }
}
