//! Single-writer host for contract invocations
//!
//! Invocations are applied one at a time, each under a fresh
//! [`TxContext`]. A mutating invocation commits its whole write-set on
//! success and discards it on any error; queries never commit.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │           ContractHandle (Clone, many callers)        │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              ContractActor (single task)              │
//! │   Executor::execute → TxContext → commit | discard    │
//! └─────────────────────┬────────────────────────────────┘
//!                       ▼
//!            WorldState::commit (atomic write-set)
//! ```

use crate::{
    context::{Clock, MonotonicClock, TxContext},
    contract::TokenContract,
    events::EventSink,
    identity::Caller,
    metrics::Metrics,
    state::WorldState,
    types::{Amount, ContractState, Transaction},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

/// Public operation surface, as sent by the invoking environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function", content = "args")]
pub enum Invocation {
    /// Set token metadata
    Initialize {
        /// Token name
        name: String,
        /// Token symbol
        symbol: String,
        /// Token decimals
        decimals: String,
    },
    /// Mint tokens
    Claim {
        /// Amount to mint
        amount: Amount,
        /// Recipient
        address: String,
    },
    /// Move tokens
    TransferFrom {
        /// Source
        from: String,
        /// Destination
        to: String,
        /// Amount to move
        value: Amount,
    },
    /// Balance query
    BalanceOf {
        /// Account to query
        account: String,
    },
    /// Supply query
    TotalSupply {},
    /// Token name
    Name {},
    /// Token symbol
    Symbol {},
    /// Token decimals
    Decimals {},
    /// Lifecycle state, available before initialization
    Metadata {},
    /// History query
    GetTransactionHistory {
        /// Account whose partition to scan
        address: String,
    },
}

impl Invocation {
    /// Function name
    pub fn function(&self) -> &'static str {
        match self {
            Invocation::Initialize { .. } => "Initialize",
            Invocation::Claim { .. } => "Claim",
            Invocation::TransferFrom { .. } => "TransferFrom",
            Invocation::BalanceOf { .. } => "BalanceOf",
            Invocation::TotalSupply {} => "TotalSupply",
            Invocation::Name {} => "Name",
            Invocation::Symbol {} => "Symbol",
            Invocation::Decimals {} => "Decimals",
            Invocation::Metadata {} => "Metadata",
            Invocation::GetTransactionHistory { .. } => "GetTransactionHistory",
        }
    }

    /// Read-only invocations never commit
    pub fn is_query(&self) -> bool {
        !matches!(
            self,
            Invocation::Initialize { .. } | Invocation::Claim { .. } | Invocation::TransferFrom { .. }
        )
    }
}

/// Result value of an invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// No value
    Unit,
    /// Initialize result
    Bool(bool),
    /// Balance or supply
    Amount(Amount),
    /// Metadata field
    Text(String),
    /// Transaction history
    History(Vec<Transaction>),
    /// Lifecycle state
    State(ContractState),
}

/// Runs invocations against a world state
pub struct Executor {
    store: Arc<dyn WorldState>,
    contract: TokenContract,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    metrics: Metrics,
}

impl Executor {
    /// Create executor; `clock` readings are made unique across invocations
    pub fn new(
        store: Arc<dyn WorldState>,
        contract: TokenContract,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            contract,
            clock: Arc::new(MonotonicClock::new(clock)),
            events,
            metrics,
        }
    }

    /// Metrics recorded by this executor
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Apply one invocation as an all-or-nothing unit
    pub fn execute(&self, caller: &Caller, invocation: Invocation) -> Result<Response> {
        let started = Instant::now();
        let mut ctx = TxContext::new(self.store.as_ref(), caller, self.clock.as_ref());
        let span = tracing::info_span!(
            "invocation",
            id = %ctx.id(),
            function = invocation.function()
        );
        let _entered = span.enter();

        let is_query = invocation.is_query();
        let outcome = self.dispatch(&mut ctx, &invocation);

        // Event delivery runs after the store commit, so an EmitFailure
        // from commit means the writes are durable
        let mut committed = false;
        let result = match outcome {
            Ok(response) if is_query => {
                ctx.discard();
                Ok(response)
            }
            Ok(response) => match ctx.commit(self.events.as_ref()) {
                Ok(_) => {
                    committed = true;
                    Ok(response)
                }
                Err(e @ Error::EmitFailure { .. }) => {
                    committed = true;
                    Err(e)
                }
                Err(e) => Err(e),
            },
            Err(e) => {
                ctx.discard();
                Err(e)
            }
        };

        if committed {
            self.metrics.record_commit();
            match invocation {
                Invocation::Claim { .. } => self.metrics.record_claim(),
                Invocation::TransferFrom { .. } => self.metrics.record_transfer(),
                _ => {}
            }
        }

        if let Err(e) = &result {
            if committed {
                tracing::warn!(kind = e.kind(), "Invocation committed, event delivery failed: {}", e);
                self.metrics.record_event_failure();
            } else {
                tracing::warn!(kind = e.kind(), "Invocation rejected: {}", e);
                self.metrics.record_abort(e.kind());
            }
        }
        self.metrics
            .record_duration(started.elapsed().as_secs_f64());

        result
    }

    fn dispatch(&self, ctx: &mut TxContext<'_>, invocation: &Invocation) -> Result<Response> {
        let contract = &self.contract;
        match invocation {
            Invocation::Initialize {
                name,
                symbol,
                decimals,
            } => contract
                .initialize(ctx, name, symbol, decimals)
                .map(Response::Bool),
            Invocation::Claim { amount, address } => contract
                .claim(ctx, *amount, address)
                .map(|_| Response::Unit),
            Invocation::TransferFrom { from, to, value } => contract
                .transfer_from(ctx, from, to, *value)
                .map(|_| Response::Unit),
            Invocation::BalanceOf { account } => {
                contract.balance_of(ctx, account).map(Response::Amount)
            }
            Invocation::TotalSupply {} => contract.total_supply(ctx).map(Response::Amount),
            Invocation::Name {} => contract.name(ctx).map(Response::Text),
            Invocation::Symbol {} => contract.symbol(ctx).map(Response::Text),
            Invocation::Decimals {} => contract.decimals(ctx).map(Response::Text),
            Invocation::Metadata {} => contract.metadata(ctx).map(Response::State),
            Invocation::GetTransactionHistory { address } => contract
                .get_transaction_history(ctx, address)
                .map(Response::History),
        }
    }
}

/// Message sent to the contract actor
pub enum ContractMessage {
    /// Run an invocation
    Invoke {
        /// Invoking identity
        caller: Caller,
        /// Function and arguments
        invocation: Invocation,
        /// Result channel
        response: oneshot::Sender<Result<Response>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the executor
pub struct ContractActor {
    executor: Executor,
    mailbox: mpsc::Receiver<ContractMessage>,
}

impl ContractActor {
    /// Create new actor
    pub fn new(executor: Executor, mailbox: mpsc::Receiver<ContractMessage>) -> Self {
        Self { executor, mailbox }
    }

    /// Run the actor event loop until shutdown or all handles drop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                ContractMessage::Invoke {
                    caller,
                    invocation,
                    response,
                } => {
                    let result = self.executor.execute(&caller, invocation);
                    // Caller may have given up waiting
                    let _ = response.send(result);
                }
                ContractMessage::Shutdown => break,
            }
        }
        tracing::info!("Contract actor stopped");
    }
}

/// Handle for sending invocations to the actor
#[derive(Clone)]
pub struct ContractHandle {
    sender: mpsc::Sender<ContractMessage>,
}

impl ContractHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<ContractMessage>) -> Self {
        Self { sender }
    }

    /// Submit an invocation and wait for its result
    pub async fn invoke(&self, caller: Caller, invocation: Invocation) -> Result<Response> {
        let (tx, rx) = oneshot::channel();
        let span = tracing::debug_span!("submit", function = invocation.function());
        async {
            self.sender
                .send(ContractMessage::Invoke {
                    caller,
                    invocation,
                    response: tx,
                })
                .await
                .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

            rx.await
                .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
        }
        .instrument(span)
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(ContractMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the contract actor
pub fn spawn_contract_actor(executor: Executor, mailbox_capacity: usize) -> ContractHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = ContractActor::new(executor, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    ContractHandle::new(tx)
}
