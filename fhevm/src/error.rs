use alloy_primitives::{Address, B256};
use thiserror::Error;

use crate::ciphertext::FheUintType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FhevmError {
    #[error("Ciphertext verification failed: {0}")]
    VerificationFailed(String),
    #[error("Ciphertext {0} is not verified at the current depth")]
    UnverifiedCiphertext(B256),
    #[error("Require failed: {0}")]
    RequireFailed(#[from] RequireFailure),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Decryptions are disabled in committing transactions")]
    DecryptionsDisabled,
    #[error("Invalid ciphertext type {0}")]
    InvalidCiphertextType(u8),
    #[error("Ciphertext {hash} was verified as {cached:?}, not {requested:?}")]
    CiphertextTypeMismatch {
        hash: B256,
        cached: FheUintType,
        requested: FheUintType,
    },
}

/// Why a batch of optimistic requires was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequireFailure {
    #[error("predicate {0} has no live verified ciphertext")]
    UnverifiedPredicate(B256),
    #[error("predicate {0} evaluated to false")]
    PredicateFalse(B256),
}

/// Failures reported by the host when creating a contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Max call depth exceeded")]
    CallDepthExceeded,
    #[error("Insufficient balance for transfer")]
    InsufficientBalance,
    #[error("Nonce uint64 overflow")]
    NonceOverflow,
    #[error("Contract address collision at {0}")]
    AddressCollision(Address),
}
