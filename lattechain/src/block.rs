// Copyright (c) 2024 Botho Foundation

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::merkle::calculate_merkle_root;

/// Default PoW target. A header is valid when the first 8 bytes of its hash,
/// read big-endian, are below the target.
pub const INITIAL_DIFFICULTY: u64 = 0x00FF_FFFF_FFFF_FFFF;

/// Block header containing PoW fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block version
    pub version: u32,

    /// Hash of the previous block
    pub prev_block_hash: [u8; 32],

    /// Merkle root of the block's transaction ids (hex)
    pub merkle_root: String,

    /// Block timestamp (unix seconds)
    pub timestamp: u64,

    pub height: u64,

    /// PoW target
    pub difficulty: u64,

    pub nonce: u64,
}

impl BlockHeader {
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.prev_block_hash);
        hasher.update(self.merkle_root.as_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.difficulty.to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }

    /// Check if PoW is valid (hash < difficulty target)
    pub fn is_valid_pow(&self) -> bool {
        let hash = self.hash();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash[0..8]);
        u64::from_be_bytes(prefix) < self.difficulty
    }

    pub fn genesis() -> Self {
        Self {
            version: 1,
            prev_block_hash: [0u8; 32],
            merkle_root: String::new(),
            timestamp: 0,
            height: 0,
            difficulty: u64::MAX, // Genesis has no PoW requirement
            nonce: 0,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.prev_block_hash == [0u8; 32]
    }
}

/// A block: header plus the ids of the transactions it confirms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<String>,
}

impl Block {
    pub fn genesis() -> Self {
        Self {
            header: BlockHeader::genesis(),
            transactions: Vec::new(),
        }
    }

    pub fn hash(&self) -> [u8; 32] {
        self.header.hash()
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Unmined block on top of `prev` with nonce 0.
    pub fn new_template(prev: &Block, transactions: Vec<String>, difficulty: u64) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            header: BlockHeader {
                version: 1,
                prev_block_hash: prev.hash(),
                merkle_root: calculate_merkle_root(&transactions),
                timestamp,
                height: prev.height() + 1,
                difficulty,
                nonce: 0,
            },
            transactions,
        }
    }

    /// Point this block at a new parent, keeping its transactions.
    pub fn relink(&mut self, prev: &Block) {
        self.header.prev_block_hash = prev.hash();
        self.header.height = prev.height() + 1;
        self.header.nonce = 0;
    }

    pub fn has_valid_merkle_root(&self) -> bool {
        self.header.merkle_root == calculate_merkle_root(&self.transactions)
    }
}
