//! KRC Token Ledger
//!
//! Fungible token state machine over a key-value world state.
//!
//! # Architecture
//!
//! - **Init-once gate**: every operation fails until the authority
//!   organization sets the token metadata
//! - **Invocation context**: writes and events are staged per invocation and
//!   committed together, or dropped together on error
//! - **Single Writer**: one actor applies invocations in order
//! - **Transaction log**: claims and transfers are appended under
//!   `tx_{account}_{timestamp}` and read back with a prefix scan
//!
//! # Invariants
//!
//! - Supply conservation: `totalSupply` equals the sum of all balances
//! - No negative balances
//! - A failed invocation leaves no trace in the store
//! - Metadata is written exactly once

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod actor;
pub mod arith;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod events;
pub mod gate;
pub mod identity;
pub mod metrics;
pub mod state;
pub mod storage;
pub mod txlog;
pub mod types;

// Re-exports
pub use actor::{spawn_contract_actor, ContractHandle, Executor, Invocation, Response};
pub use config::Config;
pub use context::{Clock, SystemClock, TxContext};
pub use contract::TokenContract;
pub use error::{Error, Result};
pub use events::{BroadcastSink, EmittedEvent, EventSink, MemorySink, TransferEvent};
pub use identity::{Caller, Identity};
pub use metrics::Metrics;
pub use state::{MemoryState, WorldState, WriteSet};
pub use storage::RocksState;
pub use types::{AccountId, Amount, ContractState, TokenMetadata, Transaction, TransactionType};
