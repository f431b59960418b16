//! Initialization gate
//!
//! The `name` key is the authoritative initialized marker. Metadata is
//! written exactly once and never overwritten.

use crate::{
    context::TxContext,
    types::{ContractState, TokenMetadata, DECIMALS_KEY, NAME_KEY, SYMBOL_KEY},
    Error, Result,
};

/// Whether the contract metadata has been written
pub fn is_initialized(ctx: &TxContext<'_>) -> Result<bool> {
    Ok(ctx.get_state(NAME_KEY)?.is_some())
}

/// Fail with `NotInitialized` unless metadata is present
pub fn require_initialized(ctx: &TxContext<'_>) -> Result<()> {
    if !is_initialized(ctx)? {
        return Err(Error::NotInitialized);
    }
    Ok(())
}

/// Load the contract lifecycle state
pub fn load(ctx: &TxContext<'_>) -> Result<ContractState> {
    let name = match ctx.get_state(NAME_KEY)? {
        Some(bytes) => decode_text(NAME_KEY, bytes)?,
        None => return Ok(ContractState::Uninitialized),
    };

    Ok(ContractState::Initialized(TokenMetadata {
        name,
        symbol: read_text(ctx, SYMBOL_KEY)?,
        decimals: read_text(ctx, DECIMALS_KEY)?,
    }))
}

/// Write token metadata once
///
/// Only callers from `authority_org` may initialize.
pub fn initialize(
    ctx: &mut TxContext<'_>,
    authority_org: &str,
    metadata: TokenMetadata,
) -> Result<bool> {
    let org = ctx.caller_org_id()?;
    if org != authority_org {
        return Err(Error::Unauthorized(org));
    }

    if is_initialized(ctx)? {
        return Err(Error::AlreadyInitialized);
    }

    if metadata.name.is_empty() {
        return Err(Error::InvalidMetadata("token name must not be empty".to_string()));
    }

    ctx.put_state(NAME_KEY, metadata.name.clone().into_bytes())?;
    ctx.put_state(SYMBOL_KEY, metadata.symbol.clone().into_bytes())?;
    ctx.put_state(DECIMALS_KEY, metadata.decimals.clone().into_bytes())?;

    tracing::info!(
        name = %metadata.name,
        symbol = %metadata.symbol,
        decimals = %metadata.decimals,
        org = %org,
        "Contract initialized"
    );

    Ok(true)
}

/// Read a metadata field; empty when unset
pub(crate) fn read_text(ctx: &TxContext<'_>, key: &str) -> Result<String> {
    match ctx.get_state(key)? {
        Some(bytes) => decode_text(key, bytes),
        None => Ok(String::new()),
    }
}

fn decode_text(key: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::decode(key, e))
}
