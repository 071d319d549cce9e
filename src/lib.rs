//! Buidler mint client - library interface
//!
//! Tracks the on-chain lifecycle of a fixed-supply NFT sale and derives a
//! single UI state from it:
//!
//! - `connector` - wallet connection and network validation
//! - `gateway` - typed contract reads and writes
//! - `state` - UI state derivation and session state
//! - `sync` / `scheduler` - bootstrap and periodic refreshes
//! - `executor` - transaction submission and confirmation
//!
//! Re-exports internal modules for use in integration tests.

pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod metadata;
pub mod metrics;
pub mod scheduler;
pub mod server;
pub mod state;
pub mod sync;
pub mod types;
pub mod view;

pub use client::{SaleClient, SaleSnapshot};
pub use error::SaleError;
pub use state::{derive_ui_state, UiState};
pub use types::{mint_price, SaleFacts, TxKind, MINT_PRICE_WEI};
