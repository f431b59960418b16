//! Token contract: mint, transfer, and queries
//!
//! Every public function checks the initialization gate before touching any
//! other state. Mutating functions follow a fixed order:
//!
//! 1. read current values
//! 2. checked arithmetic (all failures surface here, before any write)
//! 3. stage balance and supply writes
//! 4. append the transaction record
//! 5. stage the `Transfer` event
//!
//! Nothing is rolled back locally; the host discards a failed invocation's
//! write-set as a whole.

use crate::{
    arith,
    config::ContractConfig,
    context::TxContext,
    events::TransferEvent,
    gate,
    txlog::{self, NANOS_PER_SEC},
    types::{
        decode_amount, encode_amount, AccountId, Amount, ContractState, TokenMetadata,
        Transaction, TransactionType, DECIMALS_KEY, NAME_KEY, SYMBOL_KEY, TOTAL_SUPPLY_KEY,
    },
    Error, Result,
};

/// Fungible token state machine
#[derive(Debug, Clone)]
pub struct TokenContract {
    config: ContractConfig,
}

impl TokenContract {
    /// Create contract with the given settings
    pub fn new(config: ContractConfig) -> Self {
        Self { config }
    }

    /// Set token metadata; callable once, by the authority organization only
    pub fn initialize(
        &self,
        ctx: &mut TxContext<'_>,
        name: &str,
        symbol: &str,
        decimals: &str,
    ) -> Result<bool> {
        gate::initialize(
            ctx,
            &self.config.authority_org,
            TokenMetadata {
                name: name.to_string(),
                symbol: symbol.to_string(),
                decimals: decimals.to_string(),
            },
        )
    }

    /// Whether metadata has been set
    pub fn is_initialized(&self, ctx: &TxContext<'_>) -> Result<bool> {
        gate::is_initialized(ctx)
    }

    /// Mint `amount` new tokens to `address`
    pub fn claim(&self, ctx: &mut TxContext<'_>, amount: Amount, address: &str) -> Result<()> {
        gate::require_initialized(ctx)?;

        if amount <= 0 {
            return Err(Error::InvalidAmount(
                "claim amount must be a positive integer".to_string(),
            ));
        }
        AccountId::new(address).validate()?;

        let current_balance = read_counter(ctx, address)?.unwrap_or(0);
        let updated_balance = arith::add(current_balance, amount)?;

        let total_supply = read_counter(ctx, TOTAL_SUPPLY_KEY)?.unwrap_or(0);
        let updated_supply = arith::add(total_supply, amount)?;

        ctx.put_state(address, encode_amount(updated_balance))?;
        ctx.put_state(TOTAL_SUPPLY_KEY, encode_amount(updated_supply))?;

        self.record(
            ctx,
            &self.config.mint_sentinel,
            address,
            amount,
            TransactionType::Claim,
        )?;

        tracing::info!(
            "Account {} balance updated from {} to {}",
            address,
            current_balance,
            updated_balance
        );
        Ok(())
    }

    /// Move `value` tokens from `from` to `to`
    ///
    /// The caller identity is logged but not required to match `from`.
    pub fn transfer_from(
        &self,
        ctx: &mut TxContext<'_>,
        from: &str,
        to: &str,
        value: Amount,
    ) -> Result<()> {
        gate::require_initialized(ctx)?;

        let spender = ctx.caller_account_id()?;

        self.transfer_helper(ctx, from, to, value)?;
        self.record(ctx, from, to, value, TransactionType::Transfer)?;

        tracing::info!(
            "spender {} transferred {} tokens from {} to {}",
            spender,
            value,
            from,
            to
        );
        Ok(())
    }

    /// Balance of an account that has been credited at least once
    pub fn balance_of(&self, ctx: &TxContext<'_>, account: &str) -> Result<Amount> {
        gate::require_initialized(ctx)?;
        AccountId::new(account).validate()?;

        read_counter(ctx, account)?.ok_or_else(|| Error::AccountNotFound(account.to_string()))
    }

    /// Total minted supply; zero before the first claim
    pub fn total_supply(&self, ctx: &TxContext<'_>) -> Result<Amount> {
        gate::require_initialized(ctx)?;

        let supply = read_counter(ctx, TOTAL_SUPPLY_KEY)?.unwrap_or(0);
        tracing::debug!("TotalSupply: {} tokens", supply);
        Ok(supply)
    }

    /// Token name
    pub fn name(&self, ctx: &TxContext<'_>) -> Result<String> {
        gate::require_initialized(ctx)?;
        gate::read_text(ctx, NAME_KEY)
    }

    /// Token symbol
    pub fn symbol(&self, ctx: &TxContext<'_>) -> Result<String> {
        gate::require_initialized(ctx)?;
        gate::read_text(ctx, SYMBOL_KEY)
    }

    /// Token decimals, as stored
    pub fn decimals(&self, ctx: &TxContext<'_>) -> Result<String> {
        gate::require_initialized(ctx)?;
        gate::read_text(ctx, DECIMALS_KEY)
    }

    /// Contract lifecycle state; never gated
    pub fn metadata(&self, ctx: &TxContext<'_>) -> Result<ContractState> {
        gate::load(ctx)
    }

    /// Claims and transfers indexed under `address`, oldest first
    pub fn get_transaction_history(
        &self,
        ctx: &TxContext<'_>,
        address: &str,
    ) -> Result<Vec<Transaction>> {
        gate::require_initialized(ctx)?;
        txlog::query_by_account(ctx, address)?.into_vec()
    }

    fn transfer_helper(
        &self,
        ctx: &mut TxContext<'_>,
        from: &str,
        to: &str,
        value: Amount,
    ) -> Result<()> {
        if from == to {
            return Err(Error::SelfTransfer);
        }

        if value < 0 {
            return Err(Error::InvalidAmount(
                "transfer amount cannot be negative".to_string(),
            ));
        }

        AccountId::new(from).validate()?;
        AccountId::new(to).validate()?;

        // An account never credited cannot be a source, even for zero
        let from_balance =
            read_counter(ctx, from)?.ok_or_else(|| Error::NoBalance(from.to_string()))?;

        if from_balance < value {
            return Err(Error::InsufficientFunds {
                account: from.to_string(),
                balance: from_balance,
                requested: value,
            });
        }

        let to_balance = read_counter(ctx, to)?.unwrap_or(0);

        let from_updated = arith::sub(from_balance, value).map_err(|e| match e {
            Error::InsufficientFunds {
                balance, requested, ..
            } => Error::InsufficientFunds {
                account: from.to_string(),
                balance,
                requested,
            },
            other => other,
        })?;
        let to_updated = arith::add(to_balance, value)?;

        ctx.put_state(from, encode_amount(from_updated))?;
        ctx.put_state(to, encode_amount(to_updated))?;

        tracing::info!(
            "client {} balance updated from {} to {}",
            from,
            from_balance,
            from_updated
        );
        tracing::info!(
            "recipient {} balance updated from {} to {}",
            to,
            to_balance,
            to_updated
        );
        Ok(())
    }

    /// Append the log entry and stage the event for one balance change
    fn record(
        &self,
        ctx: &mut TxContext<'_>,
        from: &str,
        to: &str,
        amount: Amount,
        tx_type: TransactionType,
    ) -> Result<()> {
        let stamp = ctx.timestamp_nanos();
        let transaction = Transaction {
            from: from.to_string(),
            to: to.to_string(),
            amount,
            tx_type,
            time: stamp.div_euclid(NANOS_PER_SEC),
        };
        txlog::append(ctx, &transaction, stamp)?;

        let event = TransferEvent {
            from: from.to_string(),
            to: to.to_string(),
            value: amount,
        };
        let payload = serde_json::to_vec(&event).map_err(|e| Error::EmitFailure {
            name: self.config.event_name.clone(),
            reason: e.to_string(),
        })?;
        ctx.set_event(&self.config.event_name, payload)
    }
}

/// Read a counter key; `None` when the key was never written
fn read_counter(ctx: &TxContext<'_>, key: &str) -> Result<Option<Amount>> {
    match ctx.get_state(key)? {
        Some(bytes) => decode_amount(key, &bytes).map(Some),
        None => Ok(None),
    }
}
