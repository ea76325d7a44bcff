use crate::{
    ciphertext::{Ciphertext, FheUintType},
    error::FhevmError,
};
use alloy_primitives::U256;

/// The homomorphic-encryption library, as seen by this crate.
///
/// Both calls are synchronous and may be CPU bound.
pub trait FheLibrary {
    /// Checks the proof attached to `payload` and returns the usable
    /// ciphertext, or [`FhevmError::VerificationFailed`].
    ///
    /// The returned ciphertext must keep the identity of the payload: its
    /// [`Ciphertext::hash`] has to equal the keccak-256 of `payload`, since
    /// that hash is the handle contracts use. A library that expands or
    /// re-serializes the ciphertext must still report the payload hash, e.g.
    /// through [`Ciphertext::with_hash`]. Results that break this are
    /// rejected by the caller.
    fn verify(&self, fhe_type: FheUintType, payload: &[u8]) -> Result<Ciphertext, FhevmError>;

    /// Decrypts a verified ciphertext.
    fn decrypt(&self, ciphertext: &Ciphertext) -> Result<U256, FhevmError>;

    /// Evaluates an encrypted predicate; any non-zero plaintext is true.
    fn decrypt_predicate(&self, ciphertext: &Ciphertext) -> Result<bool, FhevmError> {
        Ok(!self.decrypt(ciphertext)?.is_zero())
    }
}
