// Copyright (c) 2024 Botho Foundation

//! Per-user trapdoor secret and collision witnesses.

use std::collections::HashMap;
use std::fmt;

use ark_bls12_381::{Fr, G1Projective};
use ark_std::UniformRand;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::PairingDomain;

/// A user's trapdoor: the secret exponent `x` and the witness `k = m + r·x`
/// recorded for every hash generated under it.
///
/// Witnesses are only ever added. Removing one would make the matching
/// transaction permanently unredactable.
pub struct Trapdoor {
    secret: Fr,
    witnesses: HashMap<String, Fr>,
}

impl Trapdoor {
    /// Sample a new secret with an empty witness map.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            secret: Fr::rand(rng),
            witnesses: HashMap::new(),
        }
    }

    /// The public point `Y = x·P` for this trapdoor.
    pub fn public_key(&self, domain: &PairingDomain) -> G1Projective {
        domain.public_key(&self.secret)
    }

    /// Witness stored for `hash`, if this trapdoor generated it.
    pub fn witness(&self, hash: &str) -> Option<&Fr> {
        self.witnesses.get(hash)
    }

    /// Whether this trapdoor can redact `hash`.
    pub fn knows(&self, hash: &str) -> bool {
        self.witnesses.contains_key(hash)
    }

    /// Number of hashes generated under this trapdoor.
    pub fn witness_count(&self) -> usize {
        self.witnesses.len()
    }

    pub(crate) fn secret(&self) -> &Fr {
        &self.secret
    }

    pub(crate) fn record(&mut self, hash: String, witness: Fr) {
        self.witnesses.insert(hash, witness);
    }
}

impl fmt::Debug for Trapdoor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trapdoor")
            .field("secret", &"<redacted>")
            .field("witnesses", &self.witnesses.len())
            .finish()
    }
}

impl Drop for Trapdoor {
    fn drop(&mut self) {
        self.secret.zeroize();
        for witness in self.witnesses.values_mut() {
            witness.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_new_trapdoor_has_no_witnesses() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let trapdoor = Trapdoor::generate(&mut rng);
        assert_eq!(trapdoor.witness_count(), 0);
        assert!(!trapdoor.knows("deadbeef"));
    }

    #[test]
    fn test_debug_hides_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let trapdoor = Trapdoor::generate(&mut rng);
        let rendered = format!("{:?}", trapdoor);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&format!("{}", trapdoor.secret)));
    }

    #[test]
    fn test_distinct_users_get_distinct_public_keys() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let domain = PairingDomain::setup(&mut rng);
        let alice = Trapdoor::generate(&mut rng);
        let bob = Trapdoor::generate(&mut rng);
        assert_ne!(alice.public_key(&domain), bob.public_key(&domain));
    }
}
