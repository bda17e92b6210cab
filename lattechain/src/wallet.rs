// Copyright (c) 2024 Botho Foundation

//! Accounts: signing keys, trapdoors and spendable outputs.
//!
//! A wallet's balance is never stored. It is the sum of the outputs the
//! wallet currently holds. Outputs selected for a pending transaction are
//! taken out of the wallet until the ledger either consumes them or hands
//! them back.

use ed25519_dalek::{SigningKey, VerifyingKey};
use lc_crypto_chameleon::Trapdoor;
use parking_lot::{Mutex, MutexGuard, RwLock};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::transaction::{Transaction, Utxo};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Account already registered: {0}")]
    DuplicateAccount(String),

    #[error("Transfer value must be greater than zero")]
    ZeroValue,

    #[error("Insufficient funds: {available} available, {requested} requested")]
    InsufficientFunds { available: u64, requested: u64 },
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub name: String,
    pub public_key: String,
    pub balance: u64,
}

pub struct Wallet {
    name: String,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    trapdoor: Mutex<Trapdoor>,
    /// Spendable outputs keyed by id
    utxos: Mutex<BTreeMap<String, Utxo>>,
}

impl Wallet {
    /// Create a wallet with fresh keys. Without a name, the first 16 hex
    /// characters of the public key are used.
    pub fn generate<R: RngCore + CryptoRng>(name: Option<String>, rng: &mut R) -> Self {
        let signing_key = SigningKey::generate(rng);
        let verifying_key = signing_key.verifying_key();
        let name = name.unwrap_or_else(|| hex::encode(verifying_key.as_bytes())[..16].to_string());

        Self {
            name,
            signing_key,
            verifying_key,
            trapdoor: Mutex::new(Trapdoor::generate(rng)),
            utxos: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    /// Local private key. Never leaves the process.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn trapdoor(&self) -> MutexGuard<'_, Trapdoor> {
        self.trapdoor.lock()
    }

    /// Sum of held outputs, saturating at `u64::MAX`.
    pub fn balance(&self) -> u64 {
        held_value(self.utxos.lock().values())
    }

    pub fn utxos(&self) -> Vec<Utxo> {
        self.utxos.lock().values().cloned().collect()
    }

    pub fn info(&self) -> AccountInfo {
        AccountInfo {
            name: self.name.clone(),
            public_key: self.public_key_hex(),
            balance: self.balance(),
        }
    }

    /// Add an output to the spendable set.
    pub fn credit(&self, utxo: Utxo) {
        self.utxos.lock().insert(utxo.id.clone(), utxo);
    }

    /// Drop outputs that have been spent.
    pub fn forget<'a>(&self, ids: impl IntoIterator<Item = &'a String>) {
        let mut held = self.utxos.lock();
        for id in ids {
            held.remove(id);
        }
    }

    /// Return previously reserved outputs to the spendable set.
    pub fn release(&self, utxos: impl IntoIterator<Item = Utxo>) {
        let mut held = self.utxos.lock();
        for utxo in utxos {
            held.entry(utxo.id.clone()).or_insert(utxo);
        }
    }

    /// Remove and return outputs covering `value`, smallest ids first.
    ///
    /// Nothing is removed when the balance is short.
    fn reserve(&self, value: u64) -> Result<Vec<Utxo>, WalletError> {
        let mut held = self.utxos.lock();
        let available = held_value(held.values());
        if available < value {
            return Err(WalletError::InsufficientFunds {
                available,
                requested: value,
            });
        }

        let mut selected = Vec::new();
        let mut total = 0u64;
        for (id, utxo) in held.iter() {
            if total >= value {
                break;
            }
            total = total.saturating_add(utxo.value);
            selected.push(id.clone());
        }

        Ok(selected
            .iter()
            .filter_map(|id| held.remove(id))
            .collect())
    }
}

fn held_value<'a>(utxos: impl Iterator<Item = &'a Utxo>) -> u64 {
    utxos.fold(0u64, |total, utxo| total.saturating_add(utxo.value))
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("name", &self.name)
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// A transaction whose inputs have been reserved from the sender.
#[derive(Debug)]
pub struct Draft {
    pub transaction: Transaction,
    pub sender: Arc<Wallet>,
    /// Outputs taken from the sender; hand back with [`Wallet::release`] if
    /// the transaction is abandoned.
    pub reserved: Vec<Utxo>,
}

/// Name to wallet lookup.
#[derive(Debug, Default)]
pub struct WalletRegistry {
    wallets: RwLock<BTreeMap<String, Arc<Wallet>>>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, wallet: Wallet) -> Result<Arc<Wallet>, WalletError> {
        let mut wallets = self.wallets.write();
        if wallets.contains_key(wallet.name()) {
            return Err(WalletError::DuplicateAccount(wallet.name().to_string()));
        }
        let wallet = Arc::new(wallet);
        wallets.insert(wallet.name().to_string(), wallet.clone());
        Ok(wallet)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Wallet>> {
        self.wallets.read().get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<Wallet>, WalletError> {
        self.get(name)
            .ok_or_else(|| WalletError::UnknownAccount(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.wallets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.read().is_empty()
    }

    /// Accounts sorted by name.
    pub fn accounts(&self) -> Vec<AccountInfo> {
        self.wallets.read().values().map(|w| w.info()).collect()
    }

    /// Build an unsigned transfer and reserve the sender's inputs for it.
    pub fn draft(&self, sender: &str, recipient: &str, value: u64) -> Result<Draft, WalletError> {
        if value == 0 {
            return Err(WalletError::ZeroValue);
        }
        let sender_wallet = self.resolve(sender)?;
        self.resolve(recipient)?;

        let reserved = sender_wallet.reserve(value)?;
        let inputs: BTreeSet<String> = reserved.iter().map(|u| u.id.clone()).collect();

        debug!(
            sender = %sender,
            recipient = %recipient,
            value,
            inputs = inputs.len(),
            "Drafted transfer"
        );

        Ok(Draft {
            transaction: Transaction::new(sender, recipient, value, inputs),
            sender: sender_wallet,
            reserved,
        })
    }
}
