// Copyright (c) 2024 Botho Foundation

//! Group parameters shared by every trapdoor.

use ark_bls12_381::{Fr, G1Projective};
use ark_std::{UniformRand, Zero};
use rand_core::{CryptoRng, RngCore};
use tracing::debug;

/// The pairing group and generator `P` every trapdoor hashes against.
///
/// A domain is created once per chain and shared read-only (usually behind an
/// `Arc`). Hashes produced under one domain never verify under another, so
/// all wallets of a chain must use the same instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairingDomain {
    generator: G1Projective,
}

impl PairingDomain {
    /// Sample a fresh non-identity generator in G1.
    pub fn setup<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let generator = G1Projective::rand(rng);
            if !generator.is_zero() {
                debug!("Pairing domain initialized over BLS12-381 G1");
                return Self { generator };
            }
        }
    }

    /// Build a domain around a known generator. Returns `None` for the identity.
    pub fn from_generator(generator: G1Projective) -> Option<Self> {
        if generator.is_zero() {
            None
        } else {
            Some(Self { generator })
        }
    }

    /// The generator `P`.
    pub fn generator(&self) -> &G1Projective {
        &self.generator
    }

    /// Trapdoor public key `Y = x·P`.
    pub fn public_key(&self, secret: &Fr) -> G1Projective {
        self.generator * secret
    }

    /// `m·P + r·Y`
    pub fn commit(&self, message: &Fr, randomness: &Fr, public_key: &G1Projective) -> G1Projective {
        self.generator * message + *public_key * randomness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_setup_generator_is_not_identity() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let domain = PairingDomain::setup(&mut rng);
        assert!(!domain.generator().is_zero());
    }

    #[test]
    fn test_from_generator_rejects_identity() {
        assert!(PairingDomain::from_generator(G1Projective::zero()).is_none());
    }

    #[test]
    fn test_commit_is_linear_in_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let domain = PairingDomain::setup(&mut rng);
        let x = Fr::rand(&mut rng);
        let m = Fr::rand(&mut rng);
        let r = Fr::rand(&mut rng);

        // m·P + r·(x·P) == (m + r·x)·P
        let lhs = domain.commit(&m, &r, &domain.public_key(&x));
        let rhs = *domain.generator() * (m + r * x);
        assert_eq!(lhs, rhs);
    }
}
