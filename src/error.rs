//! Error kinds surfaced by the sale client

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaleError {
    /// No wallet/signer reachable. Fatal to the connect attempt.
    #[error("Wallet provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Network mismatch: expected chain {expected}, wallet is on chain {actual}")]
    NetworkMismatch { expected: u64, actual: u64 },

    /// Transient RPC error on a contract read
    #[error("Contract read failed: {0}")]
    ReadFailure(String),

    /// Transaction could not be broadcast
    #[error("Transaction submission failed: {0}")]
    SubmissionFailure(String),

    /// Transaction was rejected by the contract. The reason is passed through untouched.
    #[error("Transaction reverted: {0}")]
    RevertedFailure(String),

    #[error("A transaction is already outstanding for this session")]
    TransactionPending,
}

impl SaleError {
    /// Short machine-readable kind, used in logs, metrics labels and API bodies
    pub fn kind(&self) -> &'static str {
        match self {
            SaleError::ProviderUnavailable(_) => "provider_unavailable",
            SaleError::NetworkMismatch { .. } => "network_mismatch",
            SaleError::ReadFailure(_) => "read_failure",
            SaleError::SubmissionFailure(_) => "submission_failure",
            SaleError::RevertedFailure(_) => "reverted_failure",
            SaleError::TransactionPending => "transaction_pending",
        }
    }
}

/// Classify a write-path RPC error message.
///
/// Gas estimation against a reverting call and an `eth_sendRawTransaction`
/// rejected by the EVM both surface as text containing "revert"; those were
/// seen by the contract. Anything else never reached it.
pub fn classify_write_error(error: &str) -> SaleError {
    let error_lower = error.to_lowercase();

    if error_lower.contains("revert")
        || error_lower.contains("execution reverted")
        || error_lower.contains("invalid opcode")
    {
        return SaleError::RevertedFailure(error.to_string());
    }

    SaleError::SubmissionFailure(error.to_string())
}
