//! Core types for the token ledger
//!
//! Values persisted in world state use two encodings:
//! - Counters (balances, total supply) are decimal strings
//! - Structured records (transactions, events) are JSON

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token amount in minimal units
pub type Amount = i64;

/// Reserved world-state key for the token name (also the initialized marker)
pub const NAME_KEY: &str = "name";
/// Reserved world-state key for the token symbol
pub const SYMBOL_KEY: &str = "symbol";
/// Reserved world-state key for the token decimals
pub const DECIMALS_KEY: &str = "decimals";
/// Reserved world-state key for the total supply counter
pub const TOTAL_SUPPLY_KEY: &str = "totalSupply";
/// Prefix of every transaction-log key
pub const TRANSACTION_PREFIX: &str = "tx";

const RESERVED_KEYS: [&str; 4] = [NAME_KEY, SYMBOL_KEY, DECIMALS_KEY, TOTAL_SUPPLY_KEY];

/// Account identifier (address or client identity)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Account IDs double as world-state keys, so they must not shadow a
    /// reserved key or the transaction-log namespace.
    pub fn validate(&self) -> crate::Result<()> {
        let log_namespace = format!("{}_", TRANSACTION_PREFIX);
        if self.0.is_empty()
            || RESERVED_KEYS.contains(&self.0.as_str())
            || self.0.starts_with(&log_namespace)
        {
            return Err(crate::Error::InvalidAccount(self.0.clone()));
        }
        Ok(())
    }
}

/// Kind of balance-changing operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    /// Mint credited to the recipient
    Claim,
    /// Movement between two accounts
    Transfer,
}

impl TransactionType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Claim => "Claim",
            TransactionType::Transfer => "Transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of an applied claim or transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Debited account (mint sentinel for claims)
    pub from: String,

    /// Credited account
    pub to: String,

    /// Amount moved
    pub amount: Amount,

    /// Claim or Transfer
    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    /// Unix seconds
    pub time: i64,
}

impl Transaction {
    /// The account whose log partition holds this record
    pub fn indexing_account(&self) -> &str {
        match self.tx_type {
            TransactionType::Claim => &self.to,
            TransactionType::Transfer => &self.from,
        }
    }
}

/// Token metadata written once by Initialize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Descriptive name
    pub name: String,
    /// Abbreviated name
    pub symbol: String,
    /// Decimals, stored verbatim
    pub decimals: String,
}

/// Init-once lifecycle of the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContractState {
    /// No metadata written yet
    Uninitialized,
    /// Metadata written; immutable from here on
    Initialized(TokenMetadata),
}

impl ContractState {
    /// Whether metadata has been written
    pub fn is_initialized(&self) -> bool {
        matches!(self, ContractState::Initialized(_))
    }
}

/// Decode a stored counter
pub(crate) fn decode_amount(key: &str, bytes: &[u8]) -> crate::Result<Amount> {
    let text = std::str::from_utf8(bytes).map_err(|e| crate::Error::decode(key, e))?;
    text.parse::<Amount>()
        .map_err(|e| crate::Error::decode(key, format!("{:?}: {}", text, e)))
}

/// Encode a counter for storage
pub(crate) fn encode_amount(amount: Amount) -> Vec<u8> {
    amount.to_string().into_bytes()
}
