use thiserror::Error;

/// Errors raised while deriving balances or classifying transactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Malformed amount {value:?}: {reason}")]
    Parse { value: String, reason: String },
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Transaction {txid} has no inputs or outputs owned by the wallet")]
    Classification { txid: String },
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
    #[error("Invalid transaction id {0:?}")]
    InvalidTxid(String),
    #[error("Invalid lifecycle transition for {txid}: {from} -> {to}")]
    Lifecycle {
        txid: String,
        from: &'static str,
        to: &'static str,
    },
    #[error("Unknown wallet: {0}")]
    UnknownWallet(String),
    #[error("Address {address} does not belong to wallet {filename}")]
    UnknownAddress { filename: String, address: String },
    #[error("Duplicate address {0} in wallet")]
    DuplicateAddress(String),
}

impl ModelError {
    pub(crate) fn parse(value: &str, reason: impl Into<String>) -> Self {
        ModelError::Parse {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Environment variable {0} is set but empty")]
    EmptyEnv(String),
    #[error("Environment variable {0} contains invalid Unicode")]
    InvalidEnv(String),
    #[error("Environment variable {name} has invalid value {value:?}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, AppError>;

pub type ModelResult<T> = std::result::Result<T, ModelError>;
