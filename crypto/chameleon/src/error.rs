// Copyright (c) 2024 Botho Foundation

//! Error types for trapdoor hashing.

use displaydoc::Display;
use thiserror::Error;

/// Errors that can occur while hashing or redacting.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ChameleonError {
    /// No witness stored for hash {0}
    UnknownHash(String),

    /// Recomputed message does not reproduce hash {0}
    WitnessMismatch(String),

    /// Failed to encode group element: {0}
    Encoding(String),
}

impl From<ark_serialize::SerializationError> for ChameleonError {
    fn from(err: ark_serialize::SerializationError) -> Self {
        ChameleonError::Encoding(err.to_string())
    }
}
