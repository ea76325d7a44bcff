//! Per-transaction cache of verified ciphertexts, tagged with the call depth
//! at which each was verified.

use crate::{ciphertext::Ciphertext, error::FhevmError};
use alloy_primitives::B256;
use std::collections::{hash_map::Entry, HashMap};
use tracing::debug;

/// A ciphertext whose proof has been checked, and the depth of the frame that
/// checked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCiphertext {
    pub ciphertext: Ciphertext,
    pub verified_depth: usize,
}

impl VerifiedCiphertext {
    /// An entry is usable from any frame at or below the one that verified it.
    pub fn is_live_at(&self, depth: usize) -> bool {
        self.verified_depth <= depth
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerificationRegistry {
    entries: HashMap<B256, VerifiedCiphertext>,
}

impl VerificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `hash`, or runs `verify` and caches its
    /// result at `depth`. The boolean is `true` on a cache hit.
    ///
    /// A cache hit never touches `verified_depth`. A failed verification
    /// leaves the registry unchanged.
    pub fn lookup_or_insert<F>(
        &mut self,
        hash: B256,
        depth: usize,
        verify: F,
    ) -> Result<(&VerifiedCiphertext, bool), FhevmError>
    where
        F: FnOnce() -> Result<Ciphertext, FhevmError>,
    {
        match self.entries.entry(hash) {
            Entry::Occupied(entry) => {
                debug!(%hash, verified_depth = entry.get().verified_depth, "verified ciphertext cache hit");
                Ok((entry.into_mut(), true))
            }
            Entry::Vacant(entry) => {
                let ciphertext = verify()?;
                debug!(%hash, depth, "ciphertext verified");
                Ok((
                    entry.insert(VerifiedCiphertext {
                        ciphertext,
                        verified_depth: depth,
                    }),
                    false,
                ))
            }
        }
    }

    pub fn get(&self, hash: &B256) -> Option<&VerifiedCiphertext> {
        self.entries.get(hash)
    }

    /// Like [`get`](Self::get), but only if the entry is live for the frame at `depth`.
    pub fn get_at_depth(&self, hash: &B256, depth: usize) -> Option<&VerifiedCiphertext> {
        self.entries.get(hash).filter(|entry| entry.is_live_at(depth))
    }

    pub fn contains(&self, hash: &B256) -> bool {
        self.entries.contains_key(hash)
    }

    /// Drops every entry verified deeper than `depth`. Returns how many were removed.
    pub fn prune_deeper_than(&mut self, depth: usize) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.verified_depth <= depth);
        let pruned = before - self.entries.len();
        if pruned > 0 {
            debug!(depth, pruned, "pruned verified ciphertexts of reverted frame");
        }
        pruned
    }

    /// Folds entries of a successfully returned frame into the frame at `depth`.
    pub fn merge_into(&mut self, depth: usize) {
        for entry in self.entries.values_mut() {
            if entry.verified_depth > depth {
                entry.verified_depth = depth;
            }
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&B256, &VerifiedCiphertext)> {
        self.entries.iter()
    }
}
