//! Property-based tests for token ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Supply conservation: totalSupply == Σ(balances)
//! - No negative balances
//! - Failed invocations leave the store untouched
//! - History records every applied claim and transfer, oldest first

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use token_ledger::{
    context::ManualClock,
    config::ContractConfig,
    state::StateIter,
    Caller, Config, ContractState, EmittedEvent, Error, EventSink, Executor, Invocation,
    MemorySink, MemoryState, Metrics, Response, RocksState, TokenContract, TokenMetadata,
    Transaction, TransactionType, WorldState, WriteSet,
};

const ACCOUNTS: [&str; 3] = ["alice", "bob", "carol"];

#[derive(Debug, Clone)]
enum Op {
    Claim { to: usize, amount: i64 },
    Transfer { from: usize, to: usize, value: i64 },
}

/// Strategy for generating operations, including invalid ones
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ACCOUNTS.len(), -5i64..1_000).prop_map(|(to, amount)| Op::Claim { to, amount }),
        (0..ACCOUNTS.len(), 0..ACCOUNTS.len(), -5i64..1_500)
            .prop_map(|(from, to, value)| Op::Transfer { from, to, value }),
    ]
}

fn admin() -> Caller {
    Caller::new("mailabs", "admin")
}

struct Harness {
    store: Arc<MemoryState>,
    sink: Arc<MemorySink>,
    executor: Executor,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryState::new());
        let sink = Arc::new(MemorySink::new());
        let executor = Executor::new(
            store.clone(),
            TokenContract::new(ContractConfig::default()),
            Arc::new(ManualClock::new(1_700_000_000_000_000_000)),
            sink.clone(),
            Metrics::new().unwrap(),
        );
        Self {
            store,
            sink,
            executor,
        }
    }

    fn initialized() -> Self {
        let harness = Self::new();
        harness.initialize().unwrap();
        harness
    }

    fn initialize(&self) -> token_ledger::Result<Response> {
        self.run(Invocation::Initialize {
            name: "Kalp Token".into(),
            symbol: "KLP".into(),
            decimals: "18".into(),
        })
    }

    fn run(&self, invocation: Invocation) -> token_ledger::Result<Response> {
        self.executor.execute(&admin(), invocation)
    }

    fn claim(&self, amount: i64, address: &str) -> token_ledger::Result<Response> {
        self.run(Invocation::Claim {
            amount,
            address: address.into(),
        })
    }

    fn transfer(&self, from: &str, to: &str, value: i64) -> token_ledger::Result<Response> {
        self.run(Invocation::TransferFrom {
            from: from.into(),
            to: to.into(),
            value,
        })
    }

    fn balance(&self, account: &str) -> token_ledger::Result<i64> {
        match self.run(Invocation::BalanceOf {
            account: account.into(),
        })? {
            Response::Amount(amount) => Ok(amount),
            other => panic!("unexpected response {:?}", other),
        }
    }

    fn supply(&self) -> i64 {
        match self.run(Invocation::TotalSupply {}).unwrap() {
            Response::Amount(amount) => amount,
            other => panic!("unexpected response {:?}", other),
        }
    }

    fn history(&self, address: &str) -> Vec<Transaction> {
        match self
            .run(Invocation::GetTransactionHistory {
                address: address.into(),
            })
            .unwrap()
        {
            Response::History(records) => records,
            other => panic!("unexpected response {:?}", other),
        }
    }

    fn snapshot(&self) -> Vec<(String, Vec<u8>)> {
        self.store
            .scan_prefix("")
            .unwrap()
            .map(|entry| entry.unwrap())
            .collect()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: supply equals the sum of balances and no balance is negative
    #[test]
    fn prop_supply_conservation(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let harness = Harness::initialized();
        let mut model: BTreeMap<&str, i64> = BTreeMap::new();

        for op in &ops {
            match *op {
                Op::Claim { to, amount } => {
                    let result = harness.claim(amount, ACCOUNTS[to]);
                    prop_assert_eq!(result.is_ok(), amount > 0);
                    if amount > 0 {
                        *model.entry(ACCOUNTS[to]).or_insert(0) += amount;
                    }
                }
                Op::Transfer { from, to, value } => {
                    let (from, to) = (ACCOUNTS[from], ACCOUNTS[to]);
                    let applicable = from != to
                        && value > 0
                        && model.get(from).map_or(false, |balance| *balance >= value);
                    let result = harness.transfer(from, to, value);
                    prop_assert_eq!(result.is_ok(), applicable);
                    if applicable {
                        *model.entry(from).or_insert(0) -= value;
                        *model.entry(to).or_insert(0) += value;
                    }
                }
            }
        }

        let mut sum = 0;
        for account in ACCOUNTS {
            match model.get(account) {
                Some(expected) => {
                    let balance = harness.balance(account).unwrap();
                    prop_assert!(balance >= 0);
                    prop_assert_eq!(balance, *expected);
                    sum += balance;
                }
                None => {
                    let is_not_found = matches!(harness.balance(account), Err(Error::AccountNotFound(_)));
                    prop_assert!(is_not_found);
                }
            }
        }
        prop_assert_eq!(harness.supply(), sum);
    }

    /// Property: a rejected invocation changes nothing and emits nothing
    #[test]
    fn prop_failed_invocation_leaves_no_trace(
        seed in 1i64..500,
        op in op_strategy(),
    ) {
        let harness = Harness::initialized();
        harness.claim(seed, "alice").unwrap();

        let before = harness.snapshot();
        let events_before = harness.sink.events().len();

        let result = match op {
            Op::Claim { to, amount } => harness.claim(amount, ACCOUNTS[to]),
            Op::Transfer { from, to, value } => harness.transfer(ACCOUNTS[from], ACCOUNTS[to], value),
        };

        if result.is_err() {
            prop_assert_eq!(harness.snapshot(), before);
            prop_assert_eq!(harness.sink.events().len(), events_before);
        } else {
            prop_assert_eq!(harness.sink.events().len(), events_before + 1);
        }
    }

    /// Property: history holds one record per applied operation, in order
    #[test]
    fn prop_history_matches_applied_operations(amounts in prop::collection::vec(1i64..100, 1..25)) {
        let harness = Harness::initialized();
        let mut expected = Vec::new();

        for (i, amount) in amounts.iter().enumerate() {
            if i % 3 == 2 {
                if harness.transfer("alice", "bob", *amount).is_ok() {
                    expected.push(("alice", "bob", *amount, TransactionType::Transfer));
                }
            } else {
                harness.claim(*amount, "alice").unwrap();
                expected.push(("0x0", "alice", *amount, TransactionType::Claim));
            }
        }

        let history = harness.history("alice");
        prop_assert_eq!(history.len(), expected.len());
        for (record, (from, to, amount, tx_type)) in history.iter().zip(&expected) {
            prop_assert_eq!(record.from.as_str(), *from);
            prop_assert_eq!(record.to.as_str(), *to);
            prop_assert_eq!(record.amount, *amount);
            prop_assert_eq!(record.tx_type, *tx_type);
        }
        prop_assert!(history.windows(2).all(|pair| pair[0].time <= pair[1].time));
    }

    /// Property: Initialize succeeds at most once, whatever the arguments or caller
    #[test]
    fn prop_initialize_once(name in "[A-Za-z ]{1,16}", org in "[a-z]{1,8}") {
        let harness = Harness::initialized();

        let again = harness.run(Invocation::Initialize {
            name: name.clone(),
            symbol: "X".into(),
            decimals: "2".into(),
        });
        prop_assert!(matches!(again, Err(Error::AlreadyInitialized)));

        let other = harness.executor.execute(
            &Caller::new(org.clone(), "someone"),
            Invocation::Initialize { name, symbol: "X".into(), decimals: "2".into() },
        );
        if org == "mailabs" {
            prop_assert!(matches!(other, Err(Error::AlreadyInitialized)));
        } else {
            prop_assert!(matches!(other, Err(Error::Unauthorized(_))));
        }
        prop_assert_eq!(
            harness.run(Invocation::Name {}).unwrap(),
            Response::Text("Kalp Token".into())
        );
    }
}

/// World state whose reads or commits can be made to fail
struct FailingState {
    inner: MemoryState,
    fail_reads: AtomicBool,
    fail_commits: AtomicBool,
}

impl FailingState {
    fn new() -> Self {
        Self {
            inner: MemoryState::new(),
            fail_reads: AtomicBool::new(false),
            fail_commits: AtomicBool::new(false),
        }
    }
}

impl WorldState for FailingState {
    fn get_state(&self, key: &str) -> token_ledger::Result<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::StoreReadFailure {
                key: key.to_string(),
                reason: "disk unavailable".to_string(),
            });
        }
        self.inner.get_state(key)
    }

    fn put_state(&self, key: &str, value: &[u8]) -> token_ledger::Result<()> {
        self.inner.put_state(key, value)
    }

    fn commit(&self, writes: WriteSet) -> token_ledger::Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(Error::StoreWriteFailure {
                key: "write-set".to_string(),
                reason: "disk full".to_string(),
            });
        }
        self.inner.commit(writes)
    }

    fn scan_prefix<'a>(&'a self, prefix: &str) -> token_ledger::Result<StateIter<'a>> {
        self.inner.scan_prefix(prefix)
    }
}

/// Sink that refuses every event
struct RejectingSink;

impl EventSink for RejectingSink {
    fn emit(&self, event: EmittedEvent) -> token_ledger::Result<()> {
        Err(Error::EmitFailure {
            name: event.name,
            reason: "listener gone".to_string(),
        })
    }
}

fn executor_over(store: Arc<dyn WorldState>, sink: Arc<dyn EventSink>) -> Executor {
    Executor::new(
        store,
        TokenContract::new(ContractConfig::default()),
        Arc::new(ManualClock::new(1_000_000_000)),
        sink,
        Metrics::new().unwrap(),
    )
}

fn init(executor: &Executor) {
    executor
        .execute(
            &admin(),
            Invocation::Initialize {
                name: "Kalp Token".into(),
                symbol: "KLP".into(),
                decimals: "18".into(),
            },
        )
        .unwrap();
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_claim_on_fresh_contract() {
        let harness = Harness::initialized();
        harness.claim(100, "A").unwrap();

        assert_eq!(harness.balance("A").unwrap(), 100);
        assert_eq!(harness.supply(), 100);

        let history = harness.history("A");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, "0x0");
        assert_eq!(history[0].to, "A");
        assert_eq!(history[0].amount, 100);
        assert_eq!(history[0].tx_type, TransactionType::Claim);

        let events = harness.sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Transfer");
        let transfer = events[0].transfer().unwrap();
        assert_eq!((transfer.from.as_str(), transfer.value), ("0x0", 100));
    }

    #[test]
    fn test_claims_then_transfer() {
        let harness = Harness::initialized();
        harness.claim(50, "A").unwrap();
        harness.claim(30, "A").unwrap();
        harness.transfer("A", "B", 20).unwrap();

        assert_eq!(harness.balance("A").unwrap(), 60);
        assert_eq!(harness.balance("B").unwrap(), 20);
        assert_eq!(harness.supply(), 80);

        // Transfers are indexed under the sender
        assert_eq!(harness.history("A").len(), 3);
        assert!(harness.history("B").is_empty());

        let events = harness.sink.events();
        assert_eq!(events.len(), 3);
        let transfer = events[2].transfer().unwrap();
        assert_eq!(events[2].name, "Transfer");
        assert_eq!(transfer.from, "A");
        assert_eq!(transfer.to, "B");
        assert_eq!(transfer.value, 20);
    }

    #[test]
    fn test_history_survives_executor_restart_with_repeated_clock() {
        let store = Arc::new(MemoryState::new());

        {
            let first = executor_over(store.clone(), Arc::new(MemorySink::new()));
            init(&first);
            first
                .execute(
                    &admin(),
                    Invocation::Claim {
                        amount: 10,
                        address: "A".into(),
                    },
                )
                .unwrap();
        }

        // Fresh executor, same clock reading as before the restart
        let second = executor_over(store.clone(), Arc::new(MemorySink::new()));
        second
            .execute(
                &admin(),
                Invocation::Claim {
                    amount: 20,
                    address: "A".into(),
                },
            )
            .unwrap();

        let balance = second
            .execute(
                &admin(),
                Invocation::BalanceOf {
                    account: "A".into(),
                },
            )
            .unwrap();
        assert_eq!(balance, Response::Amount(30));

        match second
            .execute(
                &admin(),
                Invocation::GetTransactionHistory {
                    address: "A".into(),
                },
            )
            .unwrap()
        {
            Response::History(records) => {
                let amounts: Vec<i64> = records.iter().map(|r| r.amount).collect();
                assert_eq!(amounts, vec![10, 20]);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_self_transfer_rejected_regardless_of_balance() {
        let harness = Harness::initialized();
        assert!(matches!(harness.transfer("A", "A", 10), Err(Error::SelfTransfer)));

        harness.claim(100, "A").unwrap();
        assert!(matches!(harness.transfer("A", "A", 10), Err(Error::SelfTransfer)));
        assert_eq!(harness.balance("A").unwrap(), 100);
    }

    #[test]
    fn test_insufficient_funds_mutates_nothing() {
        let harness = Harness::initialized();
        harness.claim(60, "A").unwrap();
        let before = harness.snapshot();

        match harness.transfer("A", "B", 1000) {
            Err(Error::InsufficientFunds {
                account,
                balance,
                requested,
            }) => {
                assert_eq!(account, "A");
                assert_eq!(balance, 60);
                assert_eq!(requested, 1000);
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }

        assert_eq!(harness.snapshot(), before);
        assert_eq!(harness.history("A").len(), 1);
        assert!(matches!(harness.balance("B"), Err(Error::AccountNotFound(_))));
    }

    #[test]
    fn test_never_credited_differs_from_drained() {
        let harness = Harness::initialized();
        assert!(matches!(
            harness.balance("never-credited"),
            Err(Error::AccountNotFound(_))
        ));

        harness.claim(40, "A").unwrap();
        harness.transfer("A", "B", 40).unwrap();
        assert_eq!(harness.balance("A").unwrap(), 0);
    }

    #[test]
    fn test_operations_gated_until_initialized() {
        let harness = Harness::new();

        assert!(matches!(harness.claim(10, "A"), Err(Error::NotInitialized)));
        assert!(matches!(harness.transfer("A", "B", 1), Err(Error::NotInitialized)));
        assert!(matches!(harness.balance("A"), Err(Error::NotInitialized)));
        assert!(matches!(
            harness.run(Invocation::TotalSupply {}),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(
            harness.run(Invocation::Symbol {}),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(
            harness.run(Invocation::GetTransactionHistory {
                address: "A".into()
            }),
            Err(Error::NotInitialized)
        ));
        assert!(harness.store.is_empty());

        assert_eq!(harness.initialize().unwrap(), Response::Bool(true));
        harness.claim(10, "A").unwrap();
        assert_eq!(harness.balance("A").unwrap(), 10);
        assert_eq!(
            harness.run(Invocation::Metadata {}).unwrap(),
            Response::State(ContractState::Initialized(TokenMetadata {
                name: "Kalp Token".into(),
                symbol: "KLP".into(),
                decimals: "18".into(),
            }))
        );
    }

    #[test]
    fn test_unauthorized_org_cannot_initialize() {
        let harness = Harness::new();
        let result = harness.executor.execute(
            &Caller::new("org2", "mallory"),
            Invocation::Initialize {
                name: "Fake".into(),
                symbol: "FK".into(),
                decimals: "0".into(),
            },
        );
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        assert!(harness.store.is_empty());
    }

    #[test]
    fn test_overflow_rejected_without_writes() {
        let harness = Harness::initialized();
        harness.claim(i64::MAX, "A").unwrap();
        let before = harness.snapshot();

        assert!(matches!(harness.claim(1, "B"), Err(Error::Overflow(..))));
        assert_eq!(harness.snapshot(), before);
    }

    #[test]
    fn test_read_failure_surfaces() {
        let store = Arc::new(FailingState::new());
        let executor = executor_over(store.clone(), Arc::new(MemorySink::new()));
        init(&executor);

        store.fail_reads.store(true, Ordering::SeqCst);
        let result = executor.execute(
            &admin(),
            Invocation::Claim {
                amount: 5,
                address: "A".into(),
            },
        );
        assert!(matches!(result, Err(Error::StoreReadFailure { .. })));
    }

    #[test]
    fn test_write_failure_commits_nothing() {
        let store = Arc::new(FailingState::new());
        let sink = Arc::new(MemorySink::new());
        let executor = executor_over(store.clone(), sink.clone());
        init(&executor);

        store.fail_commits.store(true, Ordering::SeqCst);
        let result = executor.execute(
            &admin(),
            Invocation::Claim {
                amount: 5,
                address: "A".into(),
            },
        );
        assert!(matches!(result, Err(Error::StoreWriteFailure { .. })));
        assert!(sink.events().is_empty());

        store.fail_commits.store(false, Ordering::SeqCst);
        let balance = executor.execute(
            &admin(),
            Invocation::BalanceOf {
                account: "A".into(),
            },
        );
        assert!(matches!(balance, Err(Error::AccountNotFound(_))));
    }

    #[test]
    fn test_emit_failure_after_commit() {
        let store = Arc::new(MemoryState::new());
        let executor = executor_over(store.clone(), Arc::new(RejectingSink));
        init(&executor);

        let result = executor.execute(
            &admin(),
            Invocation::Claim {
                amount: 5,
                address: "A".into(),
            },
        );
        assert!(matches!(result, Err(Error::EmitFailure { .. })));

        // Counted as a commit, not as a rejected invocation
        let metrics = executor.metrics();
        assert_eq!(metrics.committed_total.get(), 2);
        assert_eq!(metrics.claims_total.get(), 1);
        assert_eq!(metrics.event_failures_total.get(), 1);
        assert_eq!(
            metrics.aborted_total.with_label_values(&["EMIT_FAILURE"]).get(),
            0
        );

        // Writes were already durable when delivery failed
        let balance = executor
            .execute(
                &admin(),
                Invocation::BalanceOf {
                    account: "A".into(),
                },
            )
            .unwrap();
        assert_eq!(balance, Response::Amount(5));
    }

    #[tokio::test]
    async fn test_rocksdb_backed_actor_survives_restart() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        {
            let store = Arc::new(RocksState::open(&config).unwrap());
            let handle = token_ledger::spawn_contract_actor(
                executor_over(store, Arc::new(MemorySink::new())),
                config.actor.mailbox_capacity,
            );
            handle
                .invoke(
                    admin(),
                    Invocation::Initialize {
                        name: "Kalp Token".into(),
                        symbol: "KLP".into(),
                        decimals: "18".into(),
                    },
                )
                .await
                .unwrap();
            handle
                .invoke(
                    admin(),
                    Invocation::Claim {
                        amount: 80,
                        address: "A".into(),
                    },
                )
                .await
                .unwrap();
            handle
                .invoke(
                    admin(),
                    Invocation::TransferFrom {
                        from: "A".into(),
                        to: "B".into(),
                        value: 30,
                    },
                )
                .await
                .unwrap();
            handle.shutdown().await.unwrap();
            // Let the actor task drop its store handle
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        let store = Arc::new(RocksState::open(&config).unwrap());
        let executor = executor_over(store, Arc::new(MemorySink::new()));
        let balance = executor
            .execute(
                &admin(),
                Invocation::BalanceOf {
                    account: "B".into(),
                },
            )
            .unwrap();
        assert_eq!(balance, Response::Amount(30));

        let history = executor
            .execute(
                &admin(),
                Invocation::GetTransactionHistory {
                    address: "A".into(),
                },
            )
            .unwrap();
        match history {
            Response::History(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[1].tx_type, TransactionType::Transfer);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }
}
