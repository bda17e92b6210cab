// Copyright (c) 2024 Botho Foundation

//! LatteChain node library - a redactable UTXO ledger.
//!
//! Transaction ids are chameleon hashes owned by the sender, so a sender can
//! later rewrite a transaction's content without changing its id, and every
//! block that references the id stays valid.

#![deny(clippy::print_stdout)]

pub mod block;
pub mod chain;
pub mod config;
pub mod ledger;
pub mod mempool;
pub mod merkle;
pub mod node;
pub mod store;
pub mod telemetry;
pub mod transaction;
pub mod wallet;

// Re-export commands module for CLI binary
#[allow(clippy::print_stdout)]
pub mod commands;
