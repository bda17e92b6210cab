mod processor;

pub use processor::Ledger;

use lc_crypto_chameleon::ChameleonError;
use thiserror::Error;

use crate::mempool::PoolError;
use crate::store::StoreError;
use crate::wallet::WalletError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Chameleon hash error: {0}")]
    Chameleon(#[from] ChameleonError),

    #[error("Invalid signature on transaction {0}")]
    InvalidSignature(String),

    #[error("Transaction {0} has no inputs")]
    NoInputs(String),

    #[error("Input UTXO {0} is spent or unknown")]
    UnresolvableInput(String),

    #[error("Input UTXO {utxo_id} is not owned by {sender}")]
    ForeignInput { utxo_id: String, sender: String },

    #[error("Inputs worth {inputs} cannot cover value {value}")]
    InsufficientInputs { inputs: u64, value: u64 },

    #[error("Input value overflows in transaction {0}")]
    ValueOverflow(String),

    #[error("Unspent outputs exceed the maximum representable supply")]
    SupplyOverflow,

    #[error("Transaction already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
}
