// Copyright (c) 2024 Botho Foundation

//! Transaction lifecycle: creation, validation, UTXO transition and redaction.
//!
//! Every read-modify-write of the UTXO store and every rewrite of a stored
//! transaction happens under `state_lock`, so two miners can never both spend
//! the same output and a redaction can never race with processing.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use lc_crypto_chameleon::ChameleonHasher;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::LedgerError;
use crate::mempool::{PoolEntry, TransactionPool};
use crate::store::Store;
use crate::transaction::{Transaction, TransactionDigest, Utxo};
use crate::wallet::WalletRegistry;

pub struct Ledger {
    transactions: Arc<dyn Store<Transaction>>,
    utxos: Arc<dyn Store<Utxo>>,
    registry: Arc<WalletRegistry>,
    hasher: Arc<ChameleonHasher>,
    pool: Arc<TransactionPool>,
    state_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(
        transactions: Arc<dyn Store<Transaction>>,
        utxos: Arc<dyn Store<Utxo>>,
        registry: Arc<WalletRegistry>,
        hasher: Arc<ChameleonHasher>,
        pool: Arc<TransactionPool>,
    ) -> Self {
        Self {
            transactions,
            utxos,
            registry,
            hasher,
            pool,
            state_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<WalletRegistry> {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<TransactionPool> {
        &self.pool
    }

    pub fn utxos(&self) -> &Arc<dyn Store<Utxo>> {
        &self.utxos
    }

    pub fn transactions(&self) -> &Arc<dyn Store<Transaction>> {
        &self.transactions
    }

    /// Create, sign, persist and enqueue a transfer.
    ///
    /// The transaction id comes from the sender's trapdoor, so only the
    /// sender can later redact it. Reserved inputs go back to the sender if
    /// anything after input selection fails.
    pub fn create_transaction(
        &self,
        sender: &str,
        recipient: &str,
        value: u64,
    ) -> Result<Transaction, LedgerError> {
        let draft = self.registry.draft(sender, recipient, value)?;
        let mut tx = draft.transaction;
        let wallet = draft.sender;

        let output = {
            let mut trapdoor = wallet.trapdoor();
            self.hasher.generate_hash(&mut trapdoor, &mut OsRng)
        };
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                wallet.release(draft.reserved);
                return Err(e.into());
            }
        };

        tx.id = output.hash;
        tx.content_digest = output.message_digest;
        Self::generate_signature(wallet.signing_key(), &mut tx);

        let stored = tx.clone();
        let enqueued = self
            .pool
            .enqueue_with(PoolEntry::from(&tx), || -> Result<(), LedgerError> {
                self.transactions.save(&stored.id, stored.clone())?;
                Ok(())
            });
        if let Err(e) = enqueued {
            wallet.release(draft.reserved);
            return Err(e);
        }

        info!(
            tx_id = %tx.id,
            sender = %tx.sender,
            recipient = %tx.recipient,
            value = tx.value,
            "Transaction submitted"
        );
        Ok(tx)
    }

    /// Validate `tx` and move value from its inputs to fresh outputs.
    ///
    /// On success the inputs are gone from the UTXO store, a payment output
    /// (index 0, to the recipient) and a change output (index 1, back to the
    /// sender) exist, and the updated transaction is persisted. A rejected
    /// transaction changes neither the UTXO store nor any wallet.
    pub fn process_transaction(&self, tx: &mut Transaction) -> Result<(), LedgerError> {
        let _guard = self.state_lock.lock();
        self.process_locked(tx)
    }

    /// Load a pooled transaction by id and process it.
    ///
    /// If the stored transaction is rejected, the inputs reserved for it at
    /// creation that are still unspent go back to the sender.
    pub fn process_pending(&self, transaction_id: &str) -> Result<Transaction, LedgerError> {
        let _guard = self.state_lock.lock();
        let mut tx = self.stored(transaction_id)?;
        if let Err(e) = self.process_locked(&mut tx) {
            if !tx.is_processed() {
                self.release_inputs(&tx);
            }
            return Err(e);
        }
        Ok(tx)
    }

    /// Give back the inputs of a stored transaction that will never be
    /// processed. Returns `false` if it was already processed.
    pub fn release_pending(&self, transaction_id: &str) -> Result<bool, LedgerError> {
        let _guard = self.state_lock.lock();
        let tx = self.stored(transaction_id)?;
        if tx.is_processed() {
            return Ok(false);
        }
        self.release_inputs(&tx);
        Ok(true)
    }

    fn stored(&self, transaction_id: &str) -> Result<Transaction, LedgerError> {
        self.transactions
            .get_by_id(transaction_id)?
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))
    }

    fn process_locked(&self, tx: &mut Transaction) -> Result<(), LedgerError> {
        if tx.is_processed() {
            return Err(LedgerError::AlreadyProcessed(tx.id.clone()));
        }

        let result = self.apply(tx);
        if let Err(e) = &result {
            warn!(tx_id = %tx.id, error = %e, "Rejected transaction");
        }
        result
    }

    fn apply(&self, tx: &mut Transaction) -> Result<(), LedgerError> {
        if !self.is_valid_signature(tx) {
            return Err(LedgerError::InvalidSignature(tx.id.clone()));
        }

        let sender = self.registry.resolve(&tx.sender)?;
        let recipient = self.registry.resolve(&tx.recipient)?;

        let inputs = self.inputs_value(tx)?;
        if inputs < tx.value {
            return Err(LedgerError::InsufficientInputs {
                inputs,
                value: tx.value,
            });
        }

        for id in &tx.input_utxo_ids {
            self.utxos.delete_by_id(id)?;
        }

        let payment = Utxo::new(&recipient.public_key_hex(), tx.value, &tx.id, 0);
        let change = Utxo::new(&sender.public_key_hex(), inputs - tx.value, &tx.id, 1);
        for utxo in [&payment, &change] {
            self.utxos.save(&utxo.id, utxo.clone())?;
        }

        tx.output_utxo_ids = [payment.id.clone(), change.id.clone()].into_iter().collect();
        tx.output_utxos = vec![payment.clone(), change.clone()];
        self.transactions.save_and_flush(&tx.id, tx.clone())?;

        // Spent outputs leave the sender even if they had been released.
        sender.forget(&tx.input_utxo_ids);
        recipient.credit(payment);
        sender.credit(change);

        info!(
            tx_id = %tx.id,
            inputs = tx.input_utxo_ids.len(),
            value = tx.value,
            "Transaction processed"
        );
        Ok(())
    }

    /// Sum of the outputs `tx` spends.
    ///
    /// Fails on the first input that is missing from the store or not owned
    /// by the sender.
    pub fn inputs_value(&self, tx: &Transaction) -> Result<u64, LedgerError> {
        if tx.input_utxo_ids.is_empty() {
            return Err(LedgerError::NoInputs(tx.id.clone()));
        }
        let owner = self.registry.resolve(&tx.sender)?.public_key_hex();

        let mut total = 0u64;
        for id in &tx.input_utxo_ids {
            let utxo = self
                .utxos
                .get_by_id(id)?
                .ok_or_else(|| LedgerError::UnresolvableInput(id.clone()))?;
            if utxo.owner != owner {
                return Err(LedgerError::ForeignInput {
                    utxo_id: id.clone(),
                    sender: tx.sender.clone(),
                });
            }
            total = total
                .checked_add(utxo.value)
                .ok_or_else(|| LedgerError::ValueOverflow(tx.id.clone()))?;
        }
        Ok(total)
    }

    fn release_inputs(&self, tx: &Transaction) {
        let Some(sender) = self.registry.get(&tx.sender) else {
            return;
        };
        let owner = sender.public_key_hex();

        let restored: Vec<Utxo> = tx
            .input_utxo_ids
            .iter()
            .filter_map(|id| self.utxos.get_by_id(id).ok().flatten())
            .filter(|utxo| utxo.owner == owner)
            .collect();

        if !restored.is_empty() {
            debug!(tx_id = %tx.id, count = restored.len(), "Released inputs to sender");
            sender.release(restored);
        }
    }

    /// Sign the transaction's payload with `signing_key`.
    pub fn generate_signature(signing_key: &SigningKey, tx: &mut Transaction) {
        tx.signature = signing_key.sign(&tx.signing_payload()).to_bytes().to_vec();
    }

    /// Check the signature against the registered key of `tx.sender`.
    pub fn is_valid_signature(&self, tx: &Transaction) -> bool {
        let Some(wallet) = self.registry.get(&tx.sender) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&tx.signature) else {
            return false;
        };
        wallet
            .public_key()
            .verify(&tx.signing_payload(), &signature)
            .is_ok()
    }

    pub fn transaction(&self, id: &str) -> Result<Option<Transaction>, LedgerError> {
        Ok(self.transactions.get_by_id(id)?)
    }

    pub fn get_transaction(&self, id: &str) -> Result<Option<TransactionDigest>, LedgerError> {
        Ok(self.transactions.get_by_id(id)?.map(|tx| tx.digest()))
    }

    /// Redact a transaction's content with `sender`'s trapdoor.
    ///
    /// The id is unchanged. The new content digest is written in place and
    /// the transaction is re-signed so its signature covers the new content.
    /// On any failure the stored transaction is left as it was.
    pub fn modify_transaction(&self, sender: &str, id: &str) -> Result<TransactionDigest, LedgerError> {
        let wallet = self.registry.resolve(sender)?;

        let _guard = self.state_lock.lock();
        let mut tx = self.stored(id)?;

        let collision = {
            let trapdoor = wallet.trapdoor();
            self.hasher.modify_message(&tx.id, &trapdoor, &mut OsRng)
        };
        let collision = collision.map_err(|e| {
            warn!(tx_id = %id, user = %sender, error = %e, "Redaction failed");
            e
        })?;

        tx.content_digest = collision.message_digest;
        Self::generate_signature(wallet.signing_key(), &mut tx);
        self.transactions.save_and_flush(&tx.id, tx.clone())?;

        info!(tx_id = %tx.id, user = %sender, "Transaction redacted");
        Ok(tx.digest())
    }

    /// Total value held in unspent outputs.
    pub fn total_unspent(&self) -> Result<u64, LedgerError> {
        let mut total = 0u64;
        for id in self.utxos.ids()? {
            if let Some(utxo) = self.utxos.get_by_id(&id)? {
                total = total
                    .checked_add(utxo.value)
                    .ok_or(LedgerError::SupplyOverflow)?;
            }
        }
        Ok(total)
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("accounts", &self.registry.len())
            .field("pending", &self.pool.len())
            .finish_non_exhaustive()
    }
}
