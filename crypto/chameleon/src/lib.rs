// Copyright (c) 2024 Botho Foundation

//! Trapdoor (chameleon) hashing for redactable ledgers.
//!
//! A chameleon hash is collision resistant for everyone except the holder of
//! the trapdoor secret `x`, who can produce any number of new openings that
//! hash to the same value. LatteChain uses the hash as the transaction id, so
//! a transaction's content can be redacted later without breaking the chain.
//!
//! # Construction
//!
//! Over the BLS12-381 G1 group with generator `P` and scalar field `Fr`:
//!
//! - trapdoor public key `Y = x·P`
//! - hash of message `m` with randomness `r`: `SHA-256(m·P + r·Y)`
//! - witness `k = m + r·x`, kept by the trapdoor owner
//! - collision for fresh `r'`: `m' = k - r'·x`, since `m'·P + r'·Y = k·P`
//!
//! # Usage
//!
//! ```ignore
//! let domain = Arc::new(PairingDomain::setup(&mut OsRng));
//! let hasher = ChameleonHasher::new(domain);
//! let mut trapdoor = Trapdoor::generate(&mut OsRng);
//!
//! let output = hasher.generate_hash(&mut trapdoor, &mut OsRng)?;
//! let collision = hasher.modify_message(&output.hash, &trapdoor, &mut OsRng)?;
//! assert!(hasher.verify_hash(&collision.message, &output.hash, &trapdoor, &collision.randomness));
//! ```

mod domain;
mod error;
mod hasher;
mod trapdoor;

pub use domain::PairingDomain;
pub use error::ChameleonError;
pub use hasher::{digest_scalar, ChameleonHasher, Collision, HashOutput};
pub use trapdoor::Trapdoor;

pub use ark_bls12_381::{Fr, G1Projective};
