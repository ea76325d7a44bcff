//! Host-supplied configuration of the confidential-execution core.

use serde::{Deserialize, Serialize};

/// When pending optimistic requires are resolved besides decryptions and the
/// end of the transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Only before decryptions and at transaction end.
    #[default]
    Deferred,
    /// Also before every state-mutating external call of a committing run.
    BeforeExternalCalls,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FhevmParams {
    pub resolution_policy: ResolutionPolicy,
    /// Reject decryptions while committing a transaction; they remain
    /// available to eth_call.
    pub disable_decryptions_in_transaction: bool,
}

impl FhevmParams {
    pub fn with_resolution_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.resolution_policy = policy;
        self
    }

    pub fn with_decryptions_disabled_in_transaction(mut self, disabled: bool) -> Self {
        self.disable_decryptions_in_transaction = disabled;
        self
    }
}
