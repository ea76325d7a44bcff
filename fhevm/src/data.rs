use crate::{
    ciphertext::Ciphertext, constants::GAS_ESTIMATION_HASH_START, registry::VerificationRegistry,
    requires::OptimisticRequires,
};
use alloy_primitives::{B256, U256};

/// Confidential-execution state of one in-flight transaction.
///
/// Owned by the host's transaction context and dropped with it; nothing here
/// is shared between transactions.
#[derive(Debug, Clone)]
pub struct FhevmData {
    // ciphertext hash -> verified ciphertext and the depth that verified it
    verified_ciphertexts: VerificationRegistry,

    // requires encountered so far in the transaction, not yet resolved
    optimistic_requires: OptimisticRequires,

    next_ciphertext_hash_on_gas_est: U256,
}

impl FhevmData {
    pub fn new() -> Self {
        FhevmData {
            verified_ciphertexts: VerificationRegistry::new(),
            optimistic_requires: OptimisticRequires::new(),
            next_ciphertext_hash_on_gas_est: GAS_ESTIMATION_HASH_START,
        }
    }

    pub fn verified_ciphertexts(&self) -> &VerificationRegistry {
        &self.verified_ciphertexts
    }

    pub fn verified_ciphertexts_mut(&mut self) -> &mut VerificationRegistry {
        &mut self.verified_ciphertexts
    }

    pub fn optimistic_requires(&self) -> &OptimisticRequires {
        &self.optimistic_requires
    }

    pub fn optimistic_requires_mut(&mut self) -> &mut OptimisticRequires {
        &mut self.optimistic_requires
    }

    /// Both halves at once, for resolving requires against the registry.
    pub(crate) fn split_mut(&mut self) -> (&VerificationRegistry, &mut OptimisticRequires) {
        (&self.verified_ciphertexts, &mut self.optimistic_requires)
    }

    pub fn reset_optimistic_requires(&mut self) {
        self.optimistic_requires.reset();
    }

    pub fn append_optimistic_require(&mut self, ciphertext: Ciphertext, depth: usize) {
        self.optimistic_requires.append(ciphertext, depth);
    }

    /// Next distinct placeholder hash for gas estimation.
    pub fn next_gas_estimation_hash(&mut self) -> B256 {
        let hash = B256::from(self.next_ciphertext_hash_on_gas_est.to_be_bytes::<32>());
        self.next_ciphertext_hash_on_gas_est += U256::from(1);
        hash
    }

    /// Clears everything at the start of a transaction.
    pub fn reset(&mut self) {
        self.verified_ciphertexts.reset();
        self.optimistic_requires.reset();
        self.next_ciphertext_hash_on_gas_est = GAS_ESTIMATION_HASH_START;
    }

    /// Clears everything before a gas-estimation dry run, so repeated runs
    /// issue the same placeholder sequence.
    pub fn reset_for_gas_estimation(&mut self) {
        self.reset();
    }

    /// Discards what the frames deeper than `depth` verified or asserted.
    pub fn prune_deeper_than(&mut self, depth: usize) {
        self.verified_ciphertexts.prune_deeper_than(depth);
        self.optimistic_requires.prune_deeper_than(depth);
    }

    /// Hands what the frames deeper than `depth` verified or asserted to the
    /// frame at `depth`.
    pub fn merge_into(&mut self, depth: usize) {
        self.verified_ciphertexts.merge_into(depth);
        self.optimistic_requires.merge_into(depth);
    }
}

impl Default for FhevmData {
    fn default() -> Self {
        FhevmData::new()
    }
}
