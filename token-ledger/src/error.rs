//! Error types for the token ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Every invocation surfaces its first failure immediately; nothing in this
/// crate retries or recovers locally.
#[derive(Error, Debug)]
pub enum Error {
    /// Contract metadata has not been set yet
    #[error("contract options need to be set before calling any function, call Initialize() to initialize contract")]
    NotInitialized,

    /// Contract metadata is already set and can never change
    #[error("contract options are already set, client is not authorized to change them")]
    AlreadyInitialized,

    /// Caller organization may not perform this operation
    #[error("client is not authorized to initialize contract (org: {0})")]
    Unauthorized(String),

    /// Amount is zero or negative where a positive amount is required
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Checked addition wrapped around
    #[error("math: addition overflow occurred {0} + {1}")]
    Overflow(i64, i64),

    /// Debit exceeds the available balance
    #[error("account {account} has insufficient funds (balance {balance}, requested {requested})")]
    InsufficientFunds {
        /// Debited account
        account: String,
        /// Balance at the time of the debit
        balance: i64,
        /// Requested debit
        requested: i64,
    },

    /// Transfer source was never credited
    #[error("client account {0} has no balance")]
    NoBalance(String),

    /// Balance query for an account that was never credited
    #[error("the account {0} does not exist")]
    AccountNotFound(String),

    /// Source and destination are the same account
    #[error("cannot transfer to and from same client account")]
    SelfTransfer,

    /// Token metadata rejected by Initialize
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Account identifier collides with a reserved key
    #[error("Invalid account identifier: {0:?}")]
    InvalidAccount(String),

    /// World state read failed
    #[error("failed to read {key} from world state: {reason}")]
    StoreReadFailure {
        /// Key being read
        key: String,
        /// Backend message
        reason: String,
    },

    /// World state write failed
    #[error("failed to write {key} to world state: {reason}")]
    StoreWriteFailure {
        /// Key being written
        key: String,
        /// Backend message
        reason: String,
    },

    /// Stored value could not be decoded
    #[error("failed to decode {key}: {reason}")]
    DecodeError {
        /// Key holding the corrupt value
        key: String,
        /// Decoder message
        reason: String,
    },

    /// Event transport rejected a notification
    #[error("failed to set event {name}: {reason}")]
    EmitFailure {
        /// Event name
        name: String,
        /// Transport message
        reason: String,
    },

    /// Caller identity could not be resolved
    #[error("failed to get client identity: {0}")]
    Identity(String),

    /// Actor mailbox or response channel closed
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for this error
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotInitialized => "NOT_INITIALIZED",
            Error::AlreadyInitialized => "ALREADY_INITIALIZED",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::InvalidAmount(_) => "INVALID_AMOUNT",
            Error::Overflow(..) => "OVERFLOW",
            Error::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Error::NoBalance(_) => "NO_BALANCE",
            Error::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Error::SelfTransfer => "SELF_TRANSFER",
            Error::InvalidMetadata(_) => "INVALID_METADATA",
            Error::InvalidAccount(_) => "INVALID_ACCOUNT",
            Error::StoreReadFailure { .. } => "STORE_READ_FAILURE",
            Error::StoreWriteFailure { .. } => "STORE_WRITE_FAILURE",
            Error::DecodeError { .. } => "DECODE_ERROR",
            Error::EmitFailure { .. } => "EMIT_FAILURE",
            Error::Identity(_) => "IDENTITY",
            Error::Concurrency(_) => "CONCURRENCY",
            Error::Config(_) => "CONFIG",
            Error::Io(_) => "IO",
        }
    }

    pub(crate) fn read(key: impl Into<String>, err: impl ToString) -> Self {
        Error::StoreReadFailure {
            key: key.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn write(key: impl Into<String>, err: impl ToString) -> Self {
        Error::StoreWriteFailure {
            key: key.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn decode(key: impl Into<String>, err: impl ToString) -> Self {
        Error::DecodeError {
            key: key.into(),
            reason: err.to_string(),
        }
    }
}
