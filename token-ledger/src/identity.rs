//! Caller identity context

use crate::Result;
use serde::{Deserialize, Serialize};

/// Identity of the client submitting an invocation
pub trait Identity: Send + Sync {
    /// Membership organization of the caller
    fn caller_org_id(&self) -> Result<String>;

    /// Account identity of the caller
    fn caller_account_id(&self) -> Result<String>;
}

/// Identity already resolved by the invoking environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Organization (MSP) ID
    pub org_id: String,
    /// Client account ID
    pub account_id: String,
}

impl Caller {
    /// Create caller identity
    pub fn new(org_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            account_id: account_id.into(),
        }
    }
}

impl Identity for Caller {
    fn caller_org_id(&self) -> Result<String> {
        if self.org_id.is_empty() {
            return Err(crate::Error::Identity("caller has no organization".to_string()));
        }
        Ok(self.org_id.clone())
    }

    fn caller_account_id(&self) -> Result<String> {
        if self.account_id.is_empty() {
            return Err(crate::Error::Identity("caller has no account id".to_string()));
        }
        Ok(self.account_id.clone())
    }
}
