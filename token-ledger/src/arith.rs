//! Checked arithmetic for balance mutations

use crate::{types::Amount, Error, Result};

/// Add two amounts, failing on wraparound
pub fn add(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_add(b).ok_or(Error::Overflow(a, b))
}

/// Debit `b` from `a`
///
/// Not general subtraction: `b` must be positive and no larger than `a`.
pub fn sub(a: Amount, b: Amount) -> Result<Amount> {
    if b <= 0 {
        return Err(Error::InvalidAmount(format!(
            "the subtraction number is {}, it should be greater than 0",
            b
        )));
    }
    if a < b {
        return Err(Error::InsufficientFunds {
            account: String::new(),
            balance: a,
            requested: b,
        });
    }
    Ok(a - b)
}
