//! Deferred ("optimistic") encrypted require conditions.
//!
//! Each require is an encrypted predicate that is only decrypted when the
//! accumulated batch is resolved. The batch is the conjunction of all its
//! predicates, in insertion order.

use crate::{
    ciphertext::Ciphertext,
    error::{FhevmError, RequireFailure},
    registry::VerificationRegistry,
};
use alloy_primitives::B256;
use tracing::{debug, warn};

/// A pending predicate and the depth of the frame that asserted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticRequire {
    pub ciphertext: Ciphertext,
    pub depth: usize,
}

impl OptimisticRequire {
    pub fn hash(&self) -> B256 {
        self.ciphertext.hash()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OptimisticRequires {
    requires: Vec<OptimisticRequire>,
}

impl OptimisticRequires {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.requires.clear();
    }

    /// Queues a predicate. Nothing is verified here; a predicate without a
    /// live registry entry fails at resolution.
    pub fn append(&mut self, ciphertext: Ciphertext, depth: usize) {
        self.requires.push(OptimisticRequire { ciphertext, depth });
    }

    pub fn len(&self) -> usize {
        self.requires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requires.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptimisticRequire> {
        self.requires.iter()
    }

    /// Drops predicates asserted inside frames deeper than `depth`.
    pub fn prune_deeper_than(&mut self, depth: usize) -> usize {
        let before = self.requires.len();
        self.requires.retain(|require| require.depth <= depth);
        before - self.requires.len()
    }

    /// Re-tags predicates of a successfully returned frame to `depth`.
    pub fn merge_into(&mut self, depth: usize) {
        for require in self.requires.iter_mut() {
            require.depth = require.depth.min(depth);
        }
    }

    /// Resolves the whole batch from the frame at `depth`.
    ///
    /// Every predicate must map to a registry entry live at `depth` before
    /// anything is decrypted. Predicates are then decrypted in order and the
    /// first false one fails the batch. The accumulator is cleared only on
    /// success.
    ///
    /// # Panics
    ///
    /// If a predicate was asserted deeper than `depth`, i.e. the host skipped
    /// the call-exit bookkeeping for some frame.
    pub fn resolve<D>(
        &mut self,
        registry: &VerificationRegistry,
        depth: usize,
        mut decrypt: D,
    ) -> Result<(), FhevmError>
    where
        D: FnMut(&Ciphertext) -> Result<bool, FhevmError>,
    {
        assert!(
            self.requires.iter().all(|require| require.depth <= depth),
            "optimistic requires resolved at depth {depth} with predicates from a deeper frame"
        );

        let mut verified = Vec::with_capacity(self.requires.len());
        for require in &self.requires {
            match registry.get_at_depth(&require.hash(), depth) {
                Some(entry) => verified.push(&entry.ciphertext),
                None => {
                    warn!(hash = %require.hash(), depth, "optimistic require on unverified ciphertext");
                    return Err(RequireFailure::UnverifiedPredicate(require.hash()).into());
                }
            }
        }

        for ciphertext in verified {
            if !decrypt(ciphertext)? {
                warn!(hash = %ciphertext.hash(), depth, "optimistic require evaluated to false");
                return Err(RequireFailure::PredicateFalse(ciphertext.hash()).into());
            }
        }

        debug!(count = self.requires.len(), depth, "optimistic requires resolved");
        self.requires.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ciphertext::FheUintType;

    fn verified(registry: &mut VerificationRegistry, byte: u8, depth: usize) -> Ciphertext {
        let c = Ciphertext::new(FheUintType::Bool, vec![byte]);
        registry.lookup_or_insert(c.hash(), depth, || Ok(c.clone())).unwrap();
        c
    }

    fn truthy(ct: &Ciphertext) -> Result<bool, FhevmError> {
        Ok(ct.serialization()[0] != 0)
    }

    #[test]
    fn test_all_true_resolves_and_clears() {
        let mut registry = VerificationRegistry::new();
        let mut requires = OptimisticRequires::new();
        requires.append(verified(&mut registry, 1, 1), 1);
        requires.append(verified(&mut registry, 2, 1), 1);

        requires.resolve(&registry, 1, truthy).unwrap();
        assert!(requires.is_empty());
    }

    #[test]
    fn test_false_predicate_keeps_contents() {
        let mut registry = VerificationRegistry::new();
        let mut requires = OptimisticRequires::new();
        requires.append(verified(&mut registry, 1, 1), 1);
        let falsy = verified(&mut registry, 0, 1);
        requires.append(falsy.clone(), 1);

        let err = requires.resolve(&registry, 1, truthy).unwrap_err();
        assert_eq!(
            err,
            FhevmError::RequireFailed(RequireFailure::PredicateFalse(falsy.hash()))
        );
        assert_eq!(requires.len(), 2);
    }

    #[test]
    fn test_unverified_predicate_fails_before_decrypting() {
        let mut registry = VerificationRegistry::new();
        let mut requires = OptimisticRequires::new();
        let live = verified(&mut registry, 1, 1);
        let missing = Ciphertext::new(FheUintType::Bool, vec![7u8]);
        requires.append(live, 1);
        requires.append(missing.clone(), 1);

        let mut decrypted = 0;
        let err = requires
            .resolve(&registry, 1, |ct| {
                decrypted += 1;
                truthy(ct)
            })
            .unwrap_err();
        assert_eq!(
            err,
            FhevmError::RequireFailed(RequireFailure::UnverifiedPredicate(missing.hash()))
        );
        assert_eq!(decrypted, 0);
    }

    #[test]
    fn test_pruned_ciphertext_never_resolves_true() {
        let mut registry = VerificationRegistry::new();
        let mut requires = OptimisticRequires::new();
        // asserted at depth 1 before the handle was verified in a deeper frame
        let c = Ciphertext::new(FheUintType::Bool, vec![1u8]);
        requires.append(c.clone(), 1);
        registry.lookup_or_insert(c.hash(), 2, || Ok(c.clone())).unwrap();
        registry.prune_deeper_than(1);

        let err = requires.resolve(&registry, 1, truthy).unwrap_err();
        assert!(matches!(
            err,
            FhevmError::RequireFailed(RequireFailure::UnverifiedPredicate(_))
        ));
    }

    #[test]
    fn test_decryption_error_propagates() {
        let mut registry = VerificationRegistry::new();
        let mut requires = OptimisticRequires::new();
        requires.append(verified(&mut registry, 1, 0), 0);
        let err = requires
            .resolve(&registry, 0, |_| Err(FhevmError::DecryptionFailed("no key".into())))
            .unwrap_err();
        assert_eq!(err, FhevmError::DecryptionFailed("no key".into()));
        assert_eq!(requires.len(), 1);
    }

    #[test]
    fn test_prune_and_merge() {
        let mut requires = OptimisticRequires::new();
        for depth in 1..=4 {
            requires.append(Ciphertext::new(FheUintType::Bool, vec![depth as u8]), depth);
        }
        requires.merge_into(3);
        assert_eq!(requires.iter().map(|r| r.depth).max(), Some(3));
        assert_eq!(requires.prune_deeper_than(2), 2);
        assert_eq!(requires.len(), 2);
        requires.reset();
        assert!(requires.is_empty());
    }

    #[test]
    #[should_panic(expected = "deeper frame")]
    fn test_resolving_below_an_open_frame_panics() {
        let registry = VerificationRegistry::new();
        let mut requires = OptimisticRequires::new();
        requires.append(Ciphertext::new(FheUintType::Bool, vec![1u8]), 3);
        let _ = requires.resolve(&registry, 2, truthy);
    }
}
