//! Append-only transaction log
//!
//! # Key layout
//!
//! ```text
//! tx_{account}_{nanos:020}
//! ```
//!
//! `account` is the recipient for claims and the sender for transfers. The
//! timestamp is zero-padded so lexical key order is chronological order
//! within an account's partition.

use crate::{
    context::TxContext,
    state::StateIter,
    types::{Transaction, TRANSACTION_PREFIX},
    Error, Result,
};

/// Nanoseconds per second
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Scan prefix for one account's partition
pub fn account_prefix(account: &str) -> String {
    format!("{}_{}_", TRANSACTION_PREFIX, account)
}

/// Full key of a log entry
pub fn entry_key(account: &str, nanos: i64) -> String {
    format!("{}{:020}", account_prefix(account), nanos)
}

/// Stage `record` under its indexing account and return the key
///
/// Entries are never overwritten. If `nanos` is already taken, in the store
/// or earlier in this invocation, the next free stamp is used.
pub fn append(ctx: &mut TxContext<'_>, record: &Transaction, nanos: i64) -> Result<String> {
    let account = record.indexing_account();
    let mut stamp = nanos;
    let mut key = entry_key(account, stamp);
    while ctx.get_state(&key)?.is_some() {
        stamp = stamp
            .checked_add(1)
            .ok_or_else(|| Error::write(&key, "log timestamp space exhausted"))?;
        key = entry_key(account, stamp);
    }
    let value = serde_json::to_vec(record).map_err(|e| Error::write(&key, e))?;
    ctx.put_state(&key, value)?;

    tracing::debug!(key = %key, tx_type = %record.tx_type, "Transaction recorded");
    Ok(key)
}

/// Lazy history of one account
///
/// Yields records in key order. The first corrupt record ends the sequence
/// with `DecodeError`; dropping the history releases the scan.
pub struct History<'a> {
    entries: StateIter<'a>,
    prefix_len: usize,
    failed: bool,
}

impl<'a> History<'a> {
    /// Collect every record, or fail without a partial result
    pub fn into_vec(self) -> Result<Vec<Transaction>> {
        self.collect()
    }
}

impl Iterator for History<'_> {
    type Item = Result<Transaction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let (key, value) = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };

            // Skip keys of accounts that merely share this prefix ("a" vs "a_b")
            let suffix = &key[self.prefix_len.min(key.len())..];
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }

            return match serde_json::from_slice::<Transaction>(&value) {
                Ok(record) => Some(Ok(record)),
                Err(e) => {
                    self.failed = true;
                    Some(Err(Error::decode(key, e)))
                }
            };
        }
    }
}

/// Open a lazy scan over `account`'s partition
///
/// Each call starts a fresh scan.
pub fn query_by_account<'c>(ctx: &'c TxContext<'_>, account: &str) -> Result<History<'c>> {
    let prefix = account_prefix(account);
    let entries = ctx.scan_prefix(&prefix)?;
    Ok(History {
        entries,
        prefix_len: prefix.len(),
        failed: false,
    })
}
