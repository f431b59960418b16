//! Configuration for the token ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Contract settings
    pub contract: ContractConfig,

    /// Host actor settings
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/token-ledger"),
            service_name: "token-ledger".to_string(),
            rocksdb: RocksDBConfig::default(),
            contract: ContractConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            enable_statistics: false,
        }
    }
}

/// Contract settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// The only organization allowed to call Initialize
    pub authority_org: String,

    /// `from` of claim records and events
    pub mint_sentinel: String,

    /// Name of the balance-change event
    pub event_name: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            authority_org: "mailabs".to_string(),
            mint_sentinel: "0x0".to_string(),
            event_name: "Transfer".to_string(),
        }
    }
}

/// Host actor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox size
    pub mailbox_capacity: usize,

    /// Event broadcast buffer
    pub event_buffer: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
            event_buffer: 1024,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("TOKEN_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(org) = std::env::var("TOKEN_LEDGER_AUTHORITY_ORG") {
            config.contract.authority_org = org;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.contract.authority_org.is_empty() {
            return Err(crate::Error::Config("authority_org must not be empty".to_string()));
        }
        if self.contract.event_name.is_empty() {
            return Err(crate::Error::Config("event_name must not be empty".to_string()));
        }
        if self.actor.mailbox_capacity == 0 || self.actor.event_buffer == 0 {
            return Err(crate::Error::Config("actor buffers must be non-zero".to_string()));
        }
        Ok(())
    }
}
