// Copyright (c) 2024 Botho Foundation

//! Node: the chain context and the operations exposed to users.
//!
//! [`ChainContext::bootstrap`] runs the one-time setup (pairing domain,
//! accounts, genesis) and hands every component its collaborators
//! explicitly. [`Node`] wraps a context that may not exist yet, so calls made
//! before `init_chain` fail with [`NodeError::NotInitialized`].

pub mod miner;

pub use miner::{BlockAssembler, MinedBlock, Miner, MiningStats, PowAssembler};

use crossbeam_channel::Receiver;
use lc_crypto_chameleon::{ChameleonHasher, PairingDomain};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{info, warn};

use crate::block::Block;
use crate::chain::{Chain, ChainError, ChainInfo};
use crate::config::Config;
use crate::ledger::{Ledger, LedgerError};
use crate::mempool::TransactionPool;
use crate::store::{MemoryStore, Store, StoreError};
use crate::transaction::{Transaction, TransactionDigest, Utxo, GENESIS_REF};
use crate::wallet::{AccountInfo, Wallet, WalletError, WalletRegistry};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Chain not initialized; call init_chain first")]
    NotInitialized,

    #[error("Chain already initialized")]
    AlreadyInitialized,

    #[error("Mining already running")]
    MiningActive,

    #[error("Genesis balances exceed the maximum supply")]
    SupplyOverflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Every component of a running chain, wired together.
pub struct ChainContext {
    config: Config,
    hasher: Arc<ChameleonHasher>,
    registry: Arc<WalletRegistry>,
    utxos: Arc<dyn Store<Utxo>>,
    pool: Arc<TransactionPool>,
    ledger: Arc<Ledger>,
    chain: Arc<Chain>,
}

impl ChainContext {
    /// Run setup and allocate the genesis balances from `config.accounts`.
    pub fn bootstrap(config: &Config) -> Result<Self, NodeError> {
        let supply = config.total_supply().ok_or(NodeError::SupplyOverflow)?;
        let domain = Arc::new(PairingDomain::setup(&mut OsRng));
        let hasher = Arc::new(ChameleonHasher::new(domain));
        let registry = Arc::new(WalletRegistry::new());
        let transactions: Arc<dyn Store<Transaction>> = Arc::new(MemoryStore::<Transaction>::new());
        let utxos: Arc<dyn Store<Utxo>> = Arc::new(MemoryStore::<Utxo>::new());
        let pool = Arc::new(TransactionPool::new());

        for (ordinal, account) in config.accounts.iter().enumerate() {
            let wallet = registry.register(Wallet::generate(Some(account.name.clone()), &mut OsRng))?;
            if account.balance > 0 {
                let utxo = Utxo::new(
                    &wallet.public_key_hex(),
                    account.balance,
                    GENESIS_REF,
                    ordinal as u32,
                );
                utxos.save(&utxo.id, utxo.clone())?;
                wallet.credit(utxo);
            }
        }

        let ledger = Arc::new(Ledger::new(
            transactions,
            utxos.clone(),
            registry.clone(),
            hasher.clone(),
            pool.clone(),
        ));
        let chain = Arc::new(Chain::new(Block::genesis()));

        info!(
            accounts = registry.len(),
            supply,
            "Chain initialized"
        );

        Ok(Self {
            config: config.clone(),
            hasher,
            registry,
            utxos,
            pool,
            ledger,
            chain,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hasher(&self) -> &Arc<ChameleonHasher> {
        &self.hasher
    }

    pub fn registry(&self) -> &Arc<WalletRegistry> {
        &self.registry
    }

    pub fn utxos(&self) -> &Arc<dyn Store<Utxo>> {
        &self.utxos
    }

    pub fn pool(&self) -> &Arc<TransactionPool> {
        &self.pool
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn chain(&self) -> &Arc<Chain> {
        &self.chain
    }

    /// Miner configured from this context's settings, not yet started.
    pub fn miner(&self) -> Miner {
        Miner::new(
            self.config.mining.effective_threads(),
            self.config.chain.max_block_transactions,
            self.ledger.clone(),
            self.chain.clone(),
            self.config.chain.difficulty,
        )
    }
}

/// User-facing operations over a lazily initialized chain.
pub struct Node {
    config: Config,
    context: OnceLock<Arc<ChainContext>>,
    miner: Mutex<Option<Miner>>,
}

impl Node {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            context: OnceLock::new(),
            miner: Mutex::new(None),
        }
    }

    pub fn init_chain(&self) -> Result<(), NodeError> {
        if self.context.get().is_some() {
            return Err(NodeError::AlreadyInitialized);
        }
        let context = Arc::new(ChainContext::bootstrap(&self.config)?);
        self.context
            .set(context)
            .map_err(|_| NodeError::AlreadyInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.context.get().is_some()
    }

    pub fn context(&self) -> Result<&Arc<ChainContext>, NodeError> {
        self.context.get().ok_or(NodeError::NotInitialized)
    }

    pub fn list_accounts(&self) -> Result<Vec<AccountInfo>, NodeError> {
        Ok(self.context()?.registry().accounts())
    }

    pub fn submit_transaction(
        &self,
        sender: &str,
        recipient: &str,
        value: u64,
    ) -> Result<TransactionDigest, NodeError> {
        let tx = self
            .context()?
            .ledger()
            .create_transaction(sender, recipient, value)?;
        Ok(tx.digest())
    }

    pub fn get_transaction(&self, id: &str) -> Result<Option<TransactionDigest>, NodeError> {
        Ok(self.context()?.ledger().get_transaction(id)?)
    }

    pub fn modify_transaction(&self, sender: &str, id: &str) -> Result<TransactionDigest, NodeError> {
        Ok(self.context()?.ledger().modify_transaction(sender, id)?)
    }

    pub fn chain_info(&self) -> Result<ChainInfo, NodeError> {
        Ok(self.context()?.chain().info())
    }

    /// Re-check the whole chain.
    pub fn verify_chain(&self) -> Result<(), NodeError> {
        Ok(self.context()?.chain().verify()?)
    }

    /// Start the miner pool. Returns the receiver of appended blocks.
    pub fn start_mining(&self) -> Result<Receiver<MinedBlock>, NodeError> {
        let context = self.context()?;
        let mut slot = self.miner.lock();
        if slot.is_some() {
            return Err(NodeError::MiningActive);
        }

        let mut miner = context.miner();
        let receiver = miner
            .take_block_receiver()
            .ok_or(NodeError::MiningActive)?;
        miner.start();
        *slot = Some(miner);
        Ok(receiver)
    }

    pub fn mining_stats(&self) -> Option<MiningStats> {
        self.miner.lock().as_ref().map(|m| m.stats())
    }

    /// Stop mining and close the pool. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Some(miner) = self.miner.lock().take() {
            miner.stop();
        }
        if let Some(context) = self.context.get() {
            if !context.pool().is_empty() {
                warn!(pending = context.pool().len(), "Shutting down with pending transactions");
            }
            context.pool().close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;

    fn node() -> Node {
        Node::new(Config::with_accounts(vec![
            AccountConfig::new("alice", 50),
            AccountConfig::new("bob", 0),
        ]))
    }

    #[test]
    fn test_operations_before_init_fail() {
        let node = node();
        assert!(matches!(node.list_accounts(), Err(NodeError::NotInitialized)));
        assert!(matches!(
            node.submit_transaction("alice", "bob", 1),
            Err(NodeError::NotInitialized)
        ));
        assert!(matches!(node.get_transaction("x"), Err(NodeError::NotInitialized)));
        assert!(matches!(
            node.modify_transaction("alice", "x"),
            Err(NodeError::NotInitialized)
        ));
        assert!(matches!(node.chain_info(), Err(NodeError::NotInitialized)));
        assert!(matches!(node.start_mining(), Err(NodeError::NotInitialized)));
    }

    #[test]
    fn test_init_twice_fails() {
        let node = node();
        node.init_chain().unwrap();
        assert!(node.is_initialized());
        assert!(matches!(node.init_chain(), Err(NodeError::AlreadyInitialized)));
    }

    #[test]
    fn test_genesis_allocation() {
        let node = node();
        node.init_chain().unwrap();

        let accounts = node.list_accounts().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].name, "alice");
        assert_eq!(accounts[0].balance, 50);
        assert_eq!(accounts[1].balance, 0);

        let context = node.context().unwrap();
        assert_eq!(context.ledger().total_unspent().unwrap(), 50);
        assert_eq!(node.chain_info().unwrap().height, 0);
        node.verify_chain().unwrap();
    }

    #[test]
    fn test_duplicate_account_fails_bootstrap() {
        let node = Node::new(Config::with_accounts(vec![
            AccountConfig::new("alice", 1),
            AccountConfig::new("alice", 1),
        ]));
        assert!(matches!(
            node.init_chain(),
            Err(NodeError::Wallet(WalletError::DuplicateAccount(_)))
        ));
        assert!(!node.is_initialized());
    }

    #[test]
    fn test_oversized_supply_fails_bootstrap() {
        let node = Node::new(Config::with_accounts(vec![
            AccountConfig::new("alice", u64::MAX),
            AccountConfig::new("bob", 1),
        ]));
        assert!(matches!(node.init_chain(), Err(NodeError::SupplyOverflow)));
        assert!(!node.is_initialized());
    }

    #[test]
    fn test_shutdown_without_mining() {
        let node = node();
        node.shutdown();
        node.init_chain().unwrap();
        node.shutdown();
        assert!(node.context().unwrap().pool().is_closed());
    }
}
