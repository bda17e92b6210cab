use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::block::INITIAL_DIFFICULTY;

/// Main configuration for LatteChain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    /// Accounts created at genesis
    #[serde(default = "default_accounts")]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// PoW target; lower is harder
    #[serde(default = "default_difficulty")]
    pub difficulty: u64,

    /// Upper bound on transactions a miner takes from the pool per block
    #[serde(default = "default_max_block_transactions")]
    pub max_block_transactions: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            max_block_transactions: default_max_block_transactions(),
        }
    }
}

fn default_difficulty() -> u64 {
    INITIAL_DIFFICULTY
}

fn default_max_block_transactions() -> usize {
    16
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningConfig {
    #[serde(default = "default_mining_enabled")]
    pub enabled: bool,

    /// Number of mining threads (0 = auto-detect)
    #[serde(default = "default_threads")]
    pub threads: u32,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            enabled: default_mining_enabled(),
            threads: default_threads(),
        }
    }
}

fn default_mining_enabled() -> bool {
    true
}

fn default_threads() -> u32 {
    0 // Auto-detect
}

impl MiningConfig {
    /// Get the actual number of threads to use
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads as usize
        }
    }
}

/// A preset account and its genesis allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    #[serde(default)]
    pub balance: u64,
}

impl AccountConfig {
    pub fn new(name: impl Into<String>, balance: u64) -> Self {
        Self {
            name: name.into(),
            balance,
        }
    }
}

fn default_accounts() -> Vec<AccountConfig> {
    vec![
        AccountConfig::new("alice", 100),
        AccountConfig::new("bob", 100),
        AccountConfig::new("carol", 100),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            mining: MiningConfig::default(),
            accounts: default_accounts(),
        }
    }
}

impl Config {
    /// Config with the given genesis accounts and otherwise default settings
    pub fn with_accounts(accounts: Vec<AccountConfig>) -> Self {
        Self {
            accounts,
            ..Self::default()
        }
    }

    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    /// Sum of genesis balances, or `None` if it does not fit in a `u64`.
    pub fn total_supply(&self) -> Option<u64> {
        self.accounts
            .iter()
            .try_fold(0u64, |total, account| total.checked_add(account.balance))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain.max_block_transactions == 0 {
            return Err(anyhow!("chain.max_block_transactions must be at least 1"));
        }
        if self.chain.difficulty == 0 {
            return Err(anyhow!("chain.difficulty of 0 can never be satisfied"));
        }

        let mut names = HashSet::new();
        for account in &self.accounts {
            if account.name.trim().is_empty() {
                return Err(anyhow!("account names must not be empty"));
            }
            if !names.insert(account.name.as_str()) {
                return Err(anyhow!("duplicate account name: {}", account.name));
            }
        }
        if self.total_supply().is_none() {
            return Err(anyhow!("account balances sum past {}", u64::MAX));
        }
        Ok(())
    }
}

/// Get the default data directory path
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lattechain")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::default();
        config.save(&path).unwrap();
        assert!(Config::exists(&path));

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str("[mining]\nthreads = 2\n").unwrap();
        assert_eq!(config.mining.threads, 2);
        assert!(config.mining.enabled);
        assert_eq!(config.chain, ChainConfig::default());
        assert_eq!(config.accounts.len(), 3);
    }

    #[test]
    fn test_effective_threads() {
        let mut mining = MiningConfig::default();
        assert!(mining.effective_threads() >= 1);
        mining.threads = 3;
        assert_eq!(mining.effective_threads(), 3);
    }

    #[test]
    fn test_duplicate_accounts_rejected() {
        let config = Config::with_accounts(vec![
            AccountConfig::new("alice", 1),
            AccountConfig::new("alice", 2),
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_supply_must_fit_u64() {
        let mut config = Config::with_accounts(vec![
            AccountConfig::new("alice", u64::MAX),
            AccountConfig::new("bob", 0),
        ]);
        assert_eq!(config.total_supply(), Some(u64::MAX));
        assert!(config.validate().is_ok());

        config.accounts[1].balance = 1;
        assert_eq!(config.total_supply(), None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[chain]\nmax_block_transactions = 0\n").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
