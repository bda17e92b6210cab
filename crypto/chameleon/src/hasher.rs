// Copyright (c) 2024 Botho Foundation

//! Hash generation, collision finding and verification.

use std::sync::Arc;

use ark_bls12_381::{Fr, G1Projective};
use ark_serialize::CanonicalSerialize;
use ark_std::UniformRand;
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::{ChameleonError, PairingDomain, Trapdoor};

/// Result of hashing a fresh message under a trapdoor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashOutput {
    /// Hex SHA-256 of the compressed point `m·P + r·Y`. Used as the transaction id.
    pub hash: String,
    /// Hex SHA-256 of the message scalar. The visible, redactable content.
    pub message_digest: String,
}

/// A new `(m', r')` opening that collides with an existing hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collision {
    pub message: Fr,
    pub randomness: Fr,
    pub message_digest: String,
}

/// Chameleon hash engine bound to a [`PairingDomain`].
///
/// Holding a hasher is proof that setup ran: there is no way to build one
/// without a domain.
#[derive(Clone, Debug)]
pub struct ChameleonHasher {
    domain: Arc<PairingDomain>,
}

impl ChameleonHasher {
    pub fn new(domain: Arc<PairingDomain>) -> Self {
        Self { domain }
    }

    pub fn domain(&self) -> &PairingDomain {
        &self.domain
    }

    /// Hash a random message under `trapdoor` and remember its witness.
    pub fn generate_hash<R: RngCore + CryptoRng>(
        &self,
        trapdoor: &mut Trapdoor,
        rng: &mut R,
    ) -> Result<HashOutput, ChameleonError> {
        let message = Fr::rand(rng);
        let randomness = Fr::rand(rng);
        self.generate_hash_with(trapdoor, message, randomness)
    }

    /// Hash a caller-chosen `(message, randomness)` pair under `trapdoor`.
    ///
    /// Computes `H = m·P + r·Y` and stores the witness `k = m + r·x` under the
    /// hex digest of `H`.
    pub fn generate_hash_with(
        &self,
        trapdoor: &mut Trapdoor,
        message: Fr,
        randomness: Fr,
    ) -> Result<HashOutput, ChameleonError> {
        let public_key = trapdoor.public_key(&self.domain);
        let point = self.domain.commit(&message, &randomness, &public_key);
        let hash = digest_point(&point)?;
        let message_digest = digest_scalar(&message)?;

        let witness = message + randomness * trapdoor.secret();
        trapdoor.record(hash.clone(), witness);

        debug!(hash = %hash, "Generated chameleon hash");
        Ok(HashOutput {
            hash,
            message_digest,
        })
    }

    /// Produce a fresh message that still hashes to `hash`.
    ///
    /// The new message is pseudorandom: `m' = k - r'·x` for a fresh `r'`. It is
    /// not caller-chosen content. Nothing is mutated on failure.
    pub fn modify_message<R: RngCore + CryptoRng>(
        &self,
        hash: &str,
        trapdoor: &Trapdoor,
        rng: &mut R,
    ) -> Result<Collision, ChameleonError> {
        let witness = *trapdoor
            .witness(hash)
            .ok_or_else(|| ChameleonError::UnknownHash(hash.to_string()))?;

        let randomness = Fr::rand(rng);
        let message = witness - randomness * trapdoor.secret();

        if !self.verify_hash(&message, hash, trapdoor, &randomness) {
            warn!(hash = %hash, "Witness failed to reproduce hash, trapdoor state may be corrupt");
            return Err(ChameleonError::WitnessMismatch(hash.to_string()));
        }

        Ok(Collision {
            message_digest: digest_scalar(&message)?,
            message,
            randomness,
        })
    }

    /// Check that `(message, randomness)` opens `hash` under `trapdoor`.
    ///
    /// Recomputes `(m + r·x)·P`; the comparison is constant time.
    pub fn verify_hash(&self, message: &Fr, hash: &str, trapdoor: &Trapdoor, randomness: &Fr) -> bool {
        let exponent = *message + *randomness * trapdoor.secret();
        let point = *self.domain.generator() * exponent;
        digest_matches(&point, hash)
    }

    /// Check an opening using only the trapdoor's public key `Y`.
    pub fn verify_opening(
        &self,
        message: &Fr,
        randomness: &Fr,
        public_key: &G1Projective,
        hash: &str,
    ) -> bool {
        let point = self.domain.commit(message, randomness, public_key);
        digest_matches(&point, hash)
    }
}

fn digest_matches(point: &G1Projective, hash: &str) -> bool {
    match digest_point(point) {
        Ok(computed) => computed.as_bytes().ct_eq(hash.as_bytes()).into(),
        Err(_) => false,
    }
}

fn digest_point(point: &G1Projective) -> Result<String, ChameleonError> {
    let mut bytes = Vec::new();
    point.serialize_compressed(&mut bytes)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Hex SHA-256 of the canonical encoding of a message scalar.
pub fn digest_scalar(message: &Fr) -> Result<String, ChameleonError> {
    let mut bytes = Vec::new();
    message.serialize_compressed(&mut bytes)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
