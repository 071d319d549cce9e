//! Sale State Machine and the session state it reads

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::connector::Session;
use crate::error::SaleError;
use crate::types::{PendingTransaction, SaleFacts, TxKind};

/// Discrete UI state, derived on demand and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UiState {
    Disconnected,
    Loading,
    OwnerPresaleNotStarted,
    PresaleNotStarted,
    PresaleLive,
    PublicSaleLive,
}

impl fmt::Display for UiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Derive the UI state. First match wins:
///
/// 1. wallet not connected
/// 2. a transaction is outstanding
/// 3. owner, presale not started
/// 4. presale not started
/// 5. presale running
/// 6. presale ended
pub fn derive_ui_state(session: &Session, facts: &SaleFacts, loading: bool, now: u64) -> UiState {
    if !session.wallet_connected {
        return UiState::Disconnected;
    }
    if loading {
        return UiState::Loading;
    }
    if facts.is_owner() && !facts.presale_started {
        return UiState::OwnerPresaleNotStarted;
    }
    if !facts.presale_started {
        return UiState::PresaleNotStarted;
    }
    if facts.presale_ended(now) {
        UiState::PublicSaleLive
    } else {
        UiState::PresaleLive
    }
}

/// Mutable state of one session
#[derive(Debug, Default)]
pub struct SaleState {
    pub session: Session,
    /// Bumped on every connect. Work started under an older generation must
    /// not touch this state.
    pub generation: u64,
    pub facts: SaleFacts,
    /// True from submission until the transaction is terminal
    pub loading: bool,
    pub pending: Option<PendingTransaction>,
    /// Read failures swallowed at a timer boundary, by fact. Cleared by the
    /// next successful read of that fact.
    pub read_errors: BTreeMap<String, String>,
}

pub type SharedState = Arc<RwLock<SaleState>>;

impl SaleState {
    pub fn new(session: Session) -> Self {
        let facts = SaleFacts {
            caller_address: session.account,
            ..Default::default()
        };
        Self {
            session,
            facts,
            ..Default::default()
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn shared(session: Session) -> SharedState {
        Arc::new(RwLock::new(Self::new(session)))
    }

    pub fn ui_state(&self, now: u64) -> UiState {
        derive_ui_state(&self.session, &self.facts, self.loading, now)
    }

    /// Claim the single outstanding-transaction slot. Returns the generation
    /// the claim belongs to.
    pub fn begin_transaction(&mut self, kind: TxKind) -> Result<u64, SaleError> {
        if self.loading || self.pending.is_some() {
            return Err(SaleError::TransactionPending);
        }
        self.loading = true;
        self.pending = Some(PendingTransaction {
            kind,
            generation: self.generation,
            submitted_at: Instant::now(),
        });
        Ok(self.generation)
    }

    /// Release the slot claimed under `generation`. A claim from a replaced
    /// session leaves the current one untouched; returns whether it released.
    pub fn finish_transaction(&mut self, generation: u64) -> bool {
        let owns_slot = self
            .pending
            .as_ref()
            .map_or(self.generation == generation, |p| p.generation == generation);
        if !owns_slot {
            return false;
        }
        self.loading = false;
        self.pending = None;
        true
    }
}
