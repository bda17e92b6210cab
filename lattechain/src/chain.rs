// Copyright (c) 2024 Botho Foundation

//! Append-only block chain.

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::block::Block;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Block at height {height} does not extend the current tip")]
    StaleTip { height: u64 },

    #[error("Invalid proof of work at height {0}")]
    InvalidPow(u64),

    #[error("Merkle root mismatch at height {0}")]
    MerkleMismatch(u64),

    #[error("Invalid genesis block")]
    InvalidGenesis,
}

/// Summary of the chain tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainInfo {
    pub height: u64,
    pub tip_hash: String,
    pub merkle_root: String,
    pub transactions: usize,
}

#[derive(Debug)]
pub struct Chain {
    blocks: RwLock<Vec<Block>>,
}

impl Chain {
    pub fn new(genesis: Block) -> Self {
        Self {
            blocks: RwLock::new(vec![genesis]),
        }
    }

    pub fn tip(&self) -> Block {
        let blocks = self.blocks.read();
        // Never empty: constructed with a genesis block.
        blocks[blocks.len() - 1].clone()
    }

    pub fn height(&self) -> u64 {
        self.blocks.read().len() as u64 - 1
    }

    pub fn get(&self, height: u64) -> Option<Block> {
        self.blocks.read().get(height as usize).cloned()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.read().clone()
    }

    /// Number of transactions confirmed across all blocks.
    pub fn transaction_count(&self) -> usize {
        self.blocks.read().iter().map(|b| b.transactions.len()).sum()
    }

    pub fn info(&self) -> ChainInfo {
        let tip = self.tip();
        ChainInfo {
            height: tip.height(),
            tip_hash: tip.hash_hex(),
            merkle_root: tip.header.merkle_root.clone(),
            transactions: self.transaction_count(),
        }
    }

    /// Append `block` if it extends the current tip.
    ///
    /// A block mined against an older tip fails with [`ChainError::StaleTip`]
    /// and can be relinked and mined again.
    pub fn append(&self, block: Block) -> Result<(), ChainError> {
        let mut blocks = self.blocks.write();
        let tip = &blocks[blocks.len() - 1];

        if block.header.prev_block_hash != tip.hash() || block.height() != tip.height() + 1 {
            return Err(ChainError::StaleTip {
                height: block.height(),
            });
        }
        Self::check_block(&block)?;

        info!(
            height = block.height(),
            hash = %block.hash_hex(),
            txs = block.transactions.len(),
            "Appended block"
        );
        blocks.push(block);
        Ok(())
    }

    /// Re-check every link, proof of work and Merkle root.
    pub fn verify(&self) -> Result<(), ChainError> {
        let blocks = self.blocks.read();
        let genesis = &blocks[0];
        if !genesis.header.is_genesis() || !genesis.has_valid_merkle_root() {
            return Err(ChainError::InvalidGenesis);
        }

        for pair in blocks.windows(2) {
            let (prev, block) = (&pair[0], &pair[1]);
            if block.header.prev_block_hash != prev.hash() || block.height() != prev.height() + 1 {
                return Err(ChainError::StaleTip {
                    height: block.height(),
                });
            }
            Self::check_block(block)?;
        }
        Ok(())
    }

    fn check_block(block: &Block) -> Result<(), ChainError> {
        if !block.header.is_valid_pow() {
            return Err(ChainError::InvalidPow(block.height()));
        }
        if !block.has_valid_merkle_root() {
            return Err(ChainError::MerkleMismatch(block.height()));
        }
        Ok(())
    }
}
