// Copyright (c) 2024 Botho Foundation
//
//! Common test utilities for integration tests.
//!
//! Builds chain contexts with preset accounts and trivial proof of work so
//! tests can focus on their scenario.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use lattechain::config::{AccountConfig, Config};
use lattechain::node::ChainContext;
use lattechain::store::Store;
use lattechain::transaction::Utxo;

/// Every header hash satisfies this target except an all-ones prefix
pub const TRIVIAL_DIFFICULTY: u64 = u64::MAX;

pub fn test_config(accounts: &[(&str, u64)]) -> Config {
    let mut config = Config::with_accounts(
        accounts
            .iter()
            .map(|(name, balance)| AccountConfig::new(*name, *balance))
            .collect(),
    );
    config.chain.difficulty = TRIVIAL_DIFFICULTY;
    config.chain.max_block_transactions = 8;
    config.mining.threads = 2;
    config
}

pub fn bootstrap(accounts: &[(&str, u64)]) -> ChainContext {
    ChainContext::bootstrap(&test_config(accounts)).expect("bootstrap")
}

/// Give `name` extra outputs of the given values, outside of any transaction.
pub fn fund(context: &ChainContext, name: &str, values: &[u64]) {
    let wallet = context.registry().resolve(name).expect("known account");
    for (index, value) in values.iter().enumerate() {
        let utxo = Utxo::new(
            &wallet.public_key_hex(),
            *value,
            &format!("faucet-{name}"),
            index as u32,
        );
        context.utxos().save(&utxo.id, utxo.clone()).expect("save utxo");
        wallet.credit(utxo);
    }
}

/// Sorted ids currently in the UTXO store.
pub fn utxo_ids(context: &ChainContext) -> Vec<String> {
    let mut ids = context.utxos().ids().expect("ids");
    ids.sort();
    ids
}

pub fn balance(context: &ChainContext, name: &str) -> u64 {
    context.registry().resolve(name).expect("known account").balance()
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
