//! Transaction Executor
//!
//! Submits one state-changing call at a time. `loading` is set before the
//! signing handle is requested and only cleared once the transaction is
//! terminal. On confirmation the facts the action touched are refreshed
//! immediately instead of waiting for the next timer tick. Failures are
//! returned to the caller and never retried.
//!
//! A transaction belongs to the session generation it was submitted from. If
//! the session is replaced before it finishes, its completion neither
//! refreshes nor releases the new session's state.

use std::sync::Arc;

use alloy::primitives::U256;
use tracing::{debug, info, warn};

use crate::error::SaleError;
use crate::gateway::TxHandle;
use crate::sync::{SaleSync, FACT_PRESALE_STATUS, FACT_TOKENS_MINTED};
use crate::types::{mint_price, TxKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub kind: TxKind,
    pub tx: TxHandle,
}

pub struct TransactionExecutor {
    sync: Arc<SaleSync>,
}

impl TransactionExecutor {
    pub fn new(sync: Arc<SaleSync>) -> Self {
        Self { sync }
    }

    /// Execute with the fixed mint price attached to mints
    pub async fn execute(&self, kind: TxKind) -> Result<ExecutionOutcome, SaleError> {
        self.execute_with_value(kind, mint_price()).await
    }

    /// Execute with an explicit payment. `value` is ignored for `StartPresale`.
    pub async fn execute_with_value(
        &self,
        kind: TxKind,
        value: U256,
    ) -> Result<ExecutionOutcome, SaleError> {
        let generation = self.sync.state().write().await.begin_transaction(kind)?;

        let result = self.submit_and_confirm(kind, value).await;

        match &result {
            Ok(tx) => {
                self.sync
                    .metrics()
                    .transactions_confirmed_total
                    .with_label_values(&[kind.as_str()])
                    .inc();
                info!(kind = %kind, tx_hash = %tx.tx_hash, "Transaction confirmed, refreshing");
                self.refresh_after(kind, generation).await;
            }
            Err(e) => {
                self.sync
                    .metrics()
                    .transactions_failed_total
                    .with_label_values(&[kind.as_str(), e.kind()])
                    .inc();
                warn!(kind = %kind, error = %e, "Transaction failed");
            }
        }

        if !self.sync.state().write().await.finish_transaction(generation) {
            debug!(kind = %kind, generation, "Session replaced, leaving its state untouched");
        }

        result.map(|tx| ExecutionOutcome { kind, tx })
    }

    async fn submit_and_confirm(&self, kind: TxKind, value: U256) -> Result<TxHandle, SaleError> {
        let session = self.sync.state().read().await.session.clone();
        let handle = session.signing_handle().await?;
        let gateway = self.sync.gateway();

        let tx = match kind {
            TxKind::StartPresale => gateway.start_presale(&handle).await?,
            TxKind::PresaleMint => gateway.presale_mint(&handle, value).await?,
            TxKind::PublicMint => gateway.public_mint(&handle, value).await?,
        };

        self.sync
            .metrics()
            .transactions_submitted_total
            .with_label_values(&[kind.as_str()])
            .inc();

        gateway.wait_for_confirmation(&handle, &tx).await?;
        Ok(tx)
    }

    async fn refresh_after(&self, kind: TxKind, generation: u64) {
        if self.sync.state().read().await.generation != generation {
            return;
        }
        match kind {
            TxKind::StartPresale => {
                if let Err(e) = self.sync.refresh_presale_status().await {
                    self.sync.record_read_failure(FACT_PRESALE_STATUS, &e).await;
                }
            }
            TxKind::PresaleMint | TxKind::PublicMint => {
                if let Err(e) = self.sync.refresh_tokens_minted().await {
                    self.sync.record_read_failure(FACT_TOKENS_MINTED, &e).await;
                }
            }
        }
    }
}
