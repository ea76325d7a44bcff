// Test doubles for the FHE library. They are public so hosts embedding this
// crate can drive confidential operations in their own tests without real
// cryptography.

use crate::{
    ciphertext::{Ciphertext, FheUintType},
    error::FhevmError,
    library::FheLibrary,
};
use alloy_primitives::U256;
use std::cell::Cell;

const PROVEN: u8 = 0x01;
const FORGED: u8 = 0x00;
const PAYLOAD_LEN: usize = 1 + 8 + 32;

/// An [`FheLibrary`] whose "ciphertexts" are plaintexts.
///
/// Payload layout: one proof byte, an 8-byte nonce that makes every
/// encryption distinct, and the 32-byte big-endian value. Verification
/// accepts well-formed, proven payloads whose value fits the declared type.
#[derive(Debug, Default)]
pub struct PlaintextLibrary {
    nonce: Cell<u64>,
    verifications: Cell<usize>,
    decryptions: Cell<usize>,
}

impl PlaintextLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    fn payload(&self, proof: u8, value: U256) -> Vec<u8> {
        let nonce = self.nonce.get();
        self.nonce.set(nonce + 1);

        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        payload.push(proof);
        payload.extend_from_slice(&nonce.to_be_bytes());
        payload.extend_from_slice(&value.to_be_bytes::<32>());
        payload
    }

    /// A fresh, verifiable encryption of `value`.
    pub fn encrypt(&self, value: u64) -> Vec<u8> {
        self.payload(PROVEN, U256::from(value))
    }

    pub fn encrypt_bool(&self, value: bool) -> Vec<u8> {
        self.encrypt(value as u64)
    }

    /// An encryption whose proof does not check out.
    pub fn forge(&self, value: u64) -> Vec<u8> {
        self.payload(FORGED, U256::from(value))
    }

    /// How many times [`FheLibrary::verify`] has run.
    pub fn verifications(&self) -> usize {
        self.verifications.get()
    }

    /// How many times [`FheLibrary::decrypt`] has run.
    pub fn decryptions(&self) -> usize {
        self.decryptions.get()
    }
}

impl FheLibrary for PlaintextLibrary {
    fn verify(&self, fhe_type: FheUintType, payload: &[u8]) -> Result<Ciphertext, FhevmError> {
        self.verifications.set(self.verifications.get() + 1);

        if payload.len() != PAYLOAD_LEN {
            return Err(FhevmError::VerificationFailed(format!(
                "expected {PAYLOAD_LEN} bytes, got {}",
                payload.len()
            )));
        }
        if payload[0] != PROVEN {
            return Err(FhevmError::VerificationFailed("invalid proof".into()));
        }
        let value = U256::from_be_slice(&payload[9..]);
        if value.bit_len() > fhe_type.bits() {
            return Err(FhevmError::VerificationFailed(format!(
                "value does not fit {fhe_type:?}"
            )));
        }
        Ok(Ciphertext::new(fhe_type, payload.to_vec()))
    }

    fn decrypt(&self, ciphertext: &Ciphertext) -> Result<U256, FhevmError> {
        self.decryptions.set(self.decryptions.get() + 1);

        let serialization = ciphertext.serialization();
        if serialization.len() != PAYLOAD_LEN {
            return Err(FhevmError::DecryptionFailed(format!(
                "cannot decrypt ciphertext {}",
                ciphertext.hash()
            )));
        }
        Ok(U256::from_be_slice(&serialization[9..]))
    }
}

#[test]
fn test_plaintext_library() {
    let lib = PlaintextLibrary::new();
    let a = lib.encrypt(42u64);
    let b = lib.encrypt(42u64);
    assert_ne!(a, b);

    let ct = lib.verify(FheUintType::Uint8, &a).unwrap();
    assert_eq!(lib.decrypt(&ct).unwrap(), U256::from(42));
    assert!(lib.decrypt_predicate(&ct).unwrap());

    assert!(lib.verify(FheUintType::Uint8, &lib.forge(1u64)).is_err());
    assert!(lib.verify(FheUintType::Uint4, &lib.encrypt(16u64)).is_err());
    assert!(lib.verify(FheUintType::Bool, &a[..10]).is_err());
    assert_eq!(lib.verifications(), 4);

    let placeholder = Ciphertext::placeholder(FheUintType::Bool, ct.hash());
    assert!(lib.decrypt(&placeholder).is_err());
    assert_eq!(lib.decryptions(), 3);
}
