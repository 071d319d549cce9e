//! Data model shared by the connector, sync layer, scheduler and executor

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, U256};
use tokio::time::Instant;

/// Price of one token in wei (0.01 ether). The contract requires it exactly.
pub const MINT_PRICE_WEI: u64 = 10_000_000_000_000_000;

/// Default required network (Goerli)
pub const DEFAULT_REQUIRED_CHAIN_ID: u64 = 5;

/// Mint price as a `U256`
pub fn mint_price() -> U256 {
    U256::from(MINT_PRICE_WEI)
}

/// Authoritative facts read from the collection contract.
///
/// Every writer replaces a field wholesale with a fresh read of chain truth.
/// Nothing is accumulated, so the last completed read of a field wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaleFacts {
    /// Contract owner. Only fetched while the presale has not started.
    pub owner_address: Option<Address>,
    /// Account of the connected wallet
    pub caller_address: Option<Address>,
    pub presale_started: bool,
    /// Presale end, epoch seconds. `None` until read.
    pub presale_end_time: Option<U256>,
    pub tokens_minted: U256,
}

impl SaleFacts {
    /// Whether the presale window has elapsed at `now` (epoch seconds).
    ///
    /// Always derived from `presale_end_time`; there is no stored flag.
    pub fn presale_ended(&self, now: u64) -> bool {
        self.presale_end_time
            .is_some_and(|end| end < U256::from(now))
    }

    /// Address equality is byte equality, which is the case-insensitive
    /// comparison of their hex spellings.
    pub fn is_owner(&self) -> bool {
        match (self.owner_address, self.caller_address) {
            (Some(owner), Some(caller)) => owner == caller,
            _ => false,
        }
    }
}

/// State-changing contract calls the client can submit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    StartPresale,
    PresaleMint,
    PublicMint,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::StartPresale => "start_presale",
            TxKind::PresaleMint => "presale_mint",
            TxKind::PublicMint => "public_mint",
        }
    }

    pub fn is_mint(&self) -> bool {
        matches!(self, TxKind::PresaleMint | TxKind::PublicMint)
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted transaction that has not reached a terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub kind: TxKind,
    /// Session generation the transaction was submitted from
    pub generation: u64,
    pub submitted_at: Instant,
}

/// Source of the current time in epoch seconds
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Manually driven clock for simulations and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
