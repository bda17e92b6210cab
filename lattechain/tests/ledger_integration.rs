// Copyright (c) 2024 Botho Foundation
//
//! Ledger Integration Tests
//!
//! Exercises the transaction lifecycle against a bootstrapped chain context:
//! - Redaction keeps the transaction id and changes the content digest
//! - Double spends are rejected without touching the UTXO store
//! - Value is conserved by every processed transaction
//! - Any change to a signed field invalidates the signature

mod common;

use std::sync::Arc;
use std::thread;

use common::{balance, bootstrap, fund, utxo_ids};
use lattechain::ledger::{Ledger, LedgerError};
use lattechain::transaction::Transaction;
use lc_crypto_chameleon::ChameleonError;

// ============================================================================
// Redaction
// ============================================================================

#[test]
fn test_redaction_preserves_identity() {
    let context = bootstrap(&[("alice", 100), ("bob", 0)]);
    let ledger = context.ledger();

    let tx = ledger.create_transaction("alice", "bob", 40).unwrap();
    let redacted = ledger.modify_transaction("alice", &tx.id).unwrap();

    assert_eq!(redacted.transaction_id, tx.id);
    assert_ne!(redacted.content_digest, tx.content_digest);

    // The stored copy carries the new digest and a signature over it.
    let stored = ledger.transaction(&tx.id).unwrap().unwrap();
    assert_eq!(stored.content_digest, redacted.content_digest);
    assert!(ledger.is_valid_signature(&stored));

    // A redacted transaction still processes normally.
    ledger.process_pending(&tx.id).unwrap();
    assert_eq!(balance(&context, "bob"), 40);
}

#[test]
fn test_redaction_after_processing() {
    let context = bootstrap(&[("alice", 100), ("bob", 0)]);
    let ledger = context.ledger();

    let tx = ledger.create_transaction("alice", "bob", 10).unwrap();
    let processed = ledger.process_pending(&tx.id).unwrap();

    let first = ledger.modify_transaction("alice", &tx.id).unwrap();
    let second = ledger.modify_transaction("alice", &tx.id).unwrap();
    assert_ne!(first.content_digest, second.content_digest);
    assert!(second.processed);

    let stored = ledger.transaction(&tx.id).unwrap().unwrap();
    assert_eq!(stored.output_utxos, processed.output_utxos);
}

#[test]
fn test_redaction_by_other_user_leaves_transaction_untouched() {
    let context = bootstrap(&[("alice", 100), ("bob", 0)]);
    let ledger = context.ledger();

    let tx = ledger.create_transaction("alice", "bob", 40).unwrap();
    let before = ledger.transaction(&tx.id).unwrap().unwrap();

    let err = ledger.modify_transaction("bob", &tx.id).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Chameleon(ChameleonError::UnknownHash(_))
    ));
    assert_eq!(ledger.transaction(&tx.id).unwrap().unwrap(), before);
}

// ============================================================================
// Double spends
// ============================================================================

/// A second transaction signed by `sender` that spends `inputs` again.
fn respend(ledger: &Ledger, source: &Transaction, recipient: &str, value: u64) -> Transaction {
    let wallet = ledger.registry().resolve(&source.sender).unwrap();
    let mut tx = Transaction::new(&source.sender, recipient, value, source.input_utxo_ids.clone());
    tx.id = format!("{}-respend-{}", source.id, recipient);
    tx.content_digest = "respend".to_string();
    Ledger::generate_signature(wallet.signing_key(), &mut tx);
    tx
}

#[test]
fn test_double_spend_leaves_store_unchanged() {
    let context = bootstrap(&[("alice", 100), ("bob", 0), ("carol", 0)]);
    let ledger = context.ledger();

    let first = ledger.create_transaction("alice", "bob", 30).unwrap();
    ledger.process_pending(&first.id).unwrap();

    let before = utxo_ids(&context);
    let balances = (balance(&context, "alice"), balance(&context, "carol"));

    let mut second = respend(ledger, &first, "carol", 30);
    assert!(ledger.is_valid_signature(&second));
    let err = ledger.process_transaction(&mut second).unwrap_err();

    let spent = first.input_utxo_ids.iter().next().unwrap().clone();
    assert!(matches!(err, LedgerError::UnresolvableInput(id) if id == spent));
    assert_eq!(utxo_ids(&context), before);
    assert_eq!(
        (balance(&context, "alice"), balance(&context, "carol")),
        balances
    );
    assert!(!second.is_processed());
}

#[test]
fn test_concurrent_spends_of_one_output() {
    let context = bootstrap(&[("alice", 100), ("bob", 0), ("carol", 0)]);
    let ledger = context.ledger().clone();

    let original = ledger.create_transaction("alice", "bob", 50).unwrap();
    let competing = respend(&ledger, &original, "carol", 50);

    let handles: Vec<_> = [original, competing]
        .into_iter()
        .map(|mut tx| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.process_transaction(&mut tx).is_ok())
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(ledger.total_unspent().unwrap(), 100);
    assert_eq!(balance(&context, "bob") + balance(&context, "carol"), 50);
}

#[test]
fn test_foreign_input_rejected() {
    let context = bootstrap(&[("alice", 100), ("bob", 100)]);
    let ledger = context.ledger();

    let alice_tx = ledger.create_transaction("alice", "bob", 10).unwrap();

    // Bob signs a transfer that names Alice's reserved output.
    let bob = ledger.registry().resolve("bob").unwrap();
    let mut theft = Transaction::new("bob", "bob", 10, alice_tx.input_utxo_ids.clone());
    theft.id = "theft".to_string();
    Ledger::generate_signature(bob.signing_key(), &mut theft);

    assert!(matches!(
        ledger.process_transaction(&mut theft),
        Err(LedgerError::ForeignInput { .. })
    ));
    // Alice's transfer is unaffected.
    ledger.process_pending(&alice_tx.id).unwrap();
}

// ============================================================================
// Value conservation
// ============================================================================

#[test]
fn test_value_conservation_across_transfers() {
    let context = bootstrap(&[("alice", 500), ("bob", 300), ("carol", 200)]);
    fund(&context, "alice", &[7, 11, 13]);
    let ledger = context.ledger();
    let supply = ledger.total_unspent().unwrap();

    let transfers = [
        ("alice", "bob", 123),
        ("bob", "carol", 45),
        ("carol", "alice", 200),
        ("alice", "carol", 31),
        ("bob", "alice", 1),
        ("alice", "alice", 50),
    ];

    for (sender, recipient, value) in transfers {
        let tx = ledger.create_transaction(sender, recipient, value).unwrap();

        let input_value = ledger.inputs_value(&tx).unwrap();
        let processed = ledger.process_pending(&tx.id).unwrap();

        assert_eq!(processed.output_value(), input_value);
        assert_eq!(processed.output_utxos[0].value, value);
        assert_eq!(processed.output_utxo_ids.len(), 2);
        assert_eq!(ledger.total_unspent().unwrap(), supply);
    }

    let wallets: u64 = ["alice", "bob", "carol"]
        .iter()
        .map(|name| balance(&context, name))
        .sum();
    assert_eq!(wallets, supply);
}

#[test]
fn test_rejected_copy_leaves_wallets_unchanged() {
    let context = bootstrap(&[("alice", 100), ("bob", 0)]);
    let ledger = context.ledger();

    let tx = ledger.create_transaction("alice", "bob", 40).unwrap();
    assert_eq!(balance(&context, "alice"), 0);

    let mut tampered = tx.clone();
    tampered.value = 41;
    assert!(matches!(
        ledger.process_transaction(&mut tampered),
        Err(LedgerError::InvalidSignature(_))
    ));
    // The inputs stay reserved for the pending transaction.
    assert_eq!(balance(&context, "alice"), 0);
    assert_eq!(balance(&context, "bob"), 0);

    ledger.process_pending(&tx.id).unwrap();
    assert_eq!(balance(&context, "alice"), 60);
    assert_eq!(balance(&context, "bob"), 40);
    assert_eq!(
        balance(&context, "alice") + balance(&context, "bob"),
        ledger.total_unspent().unwrap()
    );
}

#[test]
fn test_released_inputs_are_dropped_once_spent() {
    let context = bootstrap(&[("alice", 100), ("bob", 0)]);
    let ledger = context.ledger();

    let tx = ledger.create_transaction("alice", "bob", 40).unwrap();
    assert!(ledger.release_pending(&tx.id).unwrap());
    assert_eq!(balance(&context, "alice"), 100);

    // Processing the stored transaction anyway must not leave the
    // released outputs in the wallet.
    ledger.process_pending(&tx.id).unwrap();
    assert_eq!(balance(&context, "alice"), 60);
    assert_eq!(
        balance(&context, "alice") + balance(&context, "bob"),
        ledger.total_unspent().unwrap()
    );
    assert!(!ledger.release_pending(&tx.id).unwrap());
}

#[test]
fn test_total_unspent_overflow_is_an_error() {
    let context = bootstrap(&[("alice", u64::MAX), ("bob", 0)]);
    fund(&context, "bob", &[1]);

    assert!(matches!(
        context.ledger().total_unspent(),
        Err(LedgerError::SupplyOverflow)
    ));
    assert_eq!(balance(&context, "alice"), u64::MAX);
}

// ============================================================================
// Signatures
// ============================================================================

#[test]
fn test_signature_roundtrip_and_tampering() {
    let context = bootstrap(&[("alice", 100), ("bob", 0), ("carol", 0)]);
    let ledger = context.ledger();
    let tx = ledger.create_transaction("alice", "bob", 25).unwrap();
    assert!(ledger.is_valid_signature(&tx));

    let tampered: Vec<Box<dyn Fn(&mut Transaction)>> = vec![
        Box::new(|tx| tx.value += 1),
        Box::new(|tx| tx.recipient = "carol".to_string()),
        Box::new(|tx| tx.content_digest.push('0')),
        Box::new(|tx| tx.sender = "bob".to_string()),
        Box::new(|tx| tx.signature[0] ^= 0x01),
        Box::new(|tx| tx.signature.truncate(10)),
    ];
    for tamper in tampered {
        let mut copy = tx.clone();
        tamper(&mut copy);
        assert!(!ledger.is_valid_signature(&copy));
    }
}

#[test]
fn test_draft_errors_surface_from_ledger() {
    let context = bootstrap(&[("alice", 10), ("bob", 0)]);
    let ledger = context.ledger();

    assert!(matches!(
        ledger.create_transaction("alice", "bob", 11),
        Err(LedgerError::Wallet(_))
    ));
    assert!(matches!(
        ledger.create_transaction("nobody", "bob", 1),
        Err(LedgerError::Wallet(_))
    ));
    assert!(context.pool().is_empty());
    assert_eq!(balance(&context, "alice"), 10);
}
