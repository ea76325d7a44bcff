//! Ciphertext handles and their content-derived identity.

use crate::error::FhevmError;
use alloy_primitives::{Bytes, B256};
use sha3::{Digest, Keccak256};

/// Encrypted integer types understood by the FHE library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FheUintType {
    Bool = 0,
    Uint4 = 1,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
    Uint160 = 6,
}

impl FheUintType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Width of the plaintext in bits.
    pub fn bits(self) -> usize {
        match self {
            FheUintType::Bool => 1,
            FheUintType::Uint4 => 4,
            FheUintType::Uint8 => 8,
            FheUintType::Uint16 => 16,
            FheUintType::Uint32 => 32,
            FheUintType::Uint64 => 64,
            FheUintType::Uint160 => 160,
        }
    }
}

impl TryFrom<u8> for FheUintType {
    type Error = FhevmError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(FheUintType::Bool),
            1 => Ok(FheUintType::Uint4),
            2 => Ok(FheUintType::Uint8),
            3 => Ok(FheUintType::Uint16),
            4 => Ok(FheUintType::Uint32),
            5 => Ok(FheUintType::Uint64),
            6 => Ok(FheUintType::Uint160),
            _ => Err(FhevmError::InvalidCiphertextType(tag)),
        }
    }
}

/// Keccak-256 of a canonical ciphertext serialization.
pub fn ciphertext_hash(serialization: &[u8]) -> B256 {
    B256::from_slice(&Keccak256::digest(serialization))
}

/// An opaque encrypted value. The payload is owned by the FHE library's
/// serialization and is never mutated here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    fhe_type: FheUintType,
    serialization: Bytes,
    hash: B256,
}

impl Ciphertext {
    pub fn new(fhe_type: FheUintType, serialization: impl Into<Bytes>) -> Self {
        let serialization = serialization.into();
        let hash = ciphertext_hash(&serialization);
        Ciphertext {
            fhe_type,
            serialization,
            hash,
        }
    }

    /// A ciphertext filed under `hash` rather than the hash of its own
    /// serialization, for libraries whose verified form differs from the
    /// proven payload.
    pub fn with_hash(fhe_type: FheUintType, serialization: impl Into<Bytes>, hash: B256) -> Self {
        Ciphertext {
            fhe_type,
            serialization: serialization.into(),
            hash,
        }
    }

    /// A payload-less stand-in used while estimating gas, identified by a
    /// counter-derived hash instead of its content.
    pub fn placeholder(fhe_type: FheUintType, hash: B256) -> Self {
        Ciphertext {
            fhe_type,
            serialization: Bytes::new(),
            hash,
        }
    }

    pub fn fhe_type(&self) -> FheUintType {
        self.fhe_type
    }

    pub fn serialization(&self) -> &Bytes {
        &self.serialization
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn is_placeholder(&self) -> bool {
        self.serialization.is_empty()
    }
}
