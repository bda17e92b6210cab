// Copyright (c) 2024 Botho Foundation

//! Transactions and unspent outputs.
//!
//! A transaction's id is a chameleon hash owned by its sender. The id never
//! changes; the `content_digest` is the redactable part and is covered by the
//! signature together with the sender, recipient and value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::merkle::sha256_hex;

/// `ref_transaction_id` of outputs allocated at genesis.
pub const GENESIS_REF: &str = "genesis";

/// An unspent transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub id: String,
    /// Hex-encoded public key of the owner
    pub owner: String,
    pub value: u64,
    /// Transaction that created this output
    pub ref_transaction_id: String,
}

impl Utxo {
    pub fn new(owner: &str, value: u64, ref_transaction_id: &str, output_index: u32) -> Self {
        Self {
            id: Self::compute_id(ref_transaction_id, output_index, owner, value),
            owner: owner.to_string(),
            value,
            ref_transaction_id: ref_transaction_id.to_string(),
        }
    }

    /// Deterministic id: SHA-256 over the creating transaction, output index,
    /// owner and value.
    pub fn compute_id(ref_transaction_id: &str, output_index: u32, owner: &str, value: u64) -> String {
        let mut data = Vec::with_capacity(ref_transaction_id.len() + owner.len() + 12);
        data.extend_from_slice(ref_transaction_id.as_bytes());
        data.extend_from_slice(&output_index.to_le_bytes());
        data.extend_from_slice(owner.as_bytes());
        data.extend_from_slice(&value.to_le_bytes());
        sha256_hex(data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Chameleon hash assigned at creation
    pub id: String,
    /// Sender account name
    pub sender: String,
    /// Recipient account name
    pub recipient: String,
    pub value: u64,
    pub signature: Vec<u8>,
    /// Redactable content, rewritten in place by redaction
    pub content_digest: String,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: u64,
    pub input_utxo_ids: BTreeSet<String>,
    pub output_utxo_ids: BTreeSet<String>,
    pub output_utxos: Vec<Utxo>,
}

impl Transaction {
    /// Unsigned transaction without an id. The ledger fills in the id and
    /// content digest from the sender's trapdoor before signing.
    pub fn new(sender: &str, recipient: &str, value: u64, input_utxo_ids: BTreeSet<String>) -> Self {
        Self {
            id: String::new(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            value,
            signature: Vec::new(),
            content_digest: String::new(),
            timestamp: unix_millis(),
            input_utxo_ids,
            output_utxo_ids: BTreeSet::new(),
            output_utxos: Vec::new(),
        }
    }

    /// Bytes covered by the signature.
    ///
    /// Fields are length-prefixed so that moving bytes between adjacent
    /// string fields changes the payload.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        for field in [&self.sender, &self.recipient] {
            payload.extend_from_slice(&(field.len() as u32).to_le_bytes());
            payload.extend_from_slice(field.as_bytes());
        }
        payload.extend_from_slice(&self.value.to_le_bytes());
        payload.extend_from_slice(&(self.content_digest.len() as u32).to_le_bytes());
        payload.extend_from_slice(self.content_digest.as_bytes());
        payload
    }

    /// Whether outputs have been attached by the ledger.
    pub fn is_processed(&self) -> bool {
        !self.output_utxos.is_empty()
    }

    pub fn output_value(&self) -> u64 {
        self.output_utxos.iter().map(|u| u.value).sum()
    }

    pub fn digest(&self) -> TransactionDigest {
        TransactionDigest {
            transaction_id: self.id.clone(),
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            value: self.value,
            content_digest: self.content_digest.clone(),
            timestamp: self.timestamp,
            processed: self.is_processed(),
        }
    }
}

/// Lookup view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDigest {
    pub transaction_id: String,
    pub sender: String,
    pub recipient: String,
    pub value: u64,
    pub content_digest: String,
    pub timestamp: u64,
    pub processed: bool,
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
