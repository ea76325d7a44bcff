//! Confidential operations as invoked by the host EVM.
//!
//! Every function reads the call depth and execution mode from the host and
//! keeps the transaction's [`FhevmData`](crate::data::FhevmData) consistent
//! with the host's call stack:
//!
//! - [`verify_ciphertext`] and [`get_verified_ciphertext`] go through the
//!   verification registry.
//! - [`optimistic_require`] defers a predicate, [`require`] checks one now.
//! - [`checkpoint`] resolves deferred predicates when the configured
//!   [`ResolutionPolicy`] says so.
//! - [`on_call_returned`] must run after every nested frame exits.

use crate::{
    ciphertext::{ciphertext_hash, Ciphertext, FheUintType},
    environment::{EvmEnvironment, ExecutionMode},
    error::{FhevmError, RequireFailure},
    library::FheLibrary,
    params::ResolutionPolicy,
    registry::VerifiedCiphertext,
};
use alloy_primitives::{B256, U256};
use tracing::{debug, warn};

/// Points at which pending optimistic requires may have to be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// A plaintext is about to leave the encrypted domain.
    BeforeDecryption,
    /// A state-mutating external call or contract creation is about to run.
    BeforeExternalCall,
    /// The top-level call has finished.
    TransactionEnd,
}

/// Clears the transaction's confidential state.
pub fn begin_transaction<E: EvmEnvironment + ?Sized>(env: &mut E) {
    env.fhevm_data_mut().reset();
}

/// Clears the confidential state before a gas-estimation dry run.
pub fn begin_gas_estimation<E: EvmEnvironment + ?Sized>(env: &mut E) {
    env.fhevm_data_mut().reset_for_gas_estimation();
}

/// Resolves whatever is still pending once the top-level call is done.
pub fn finish_transaction<E, L>(env: &mut E, lib: &L) -> Result<(), FhevmError>
where
    E: EvmEnvironment + ?Sized,
    L: FheLibrary + ?Sized,
{
    checkpoint(env, lib, Checkpoint::TransactionEnd)
}

/// Bookkeeping after a nested frame exits. `env.depth()` must already be the
/// depth of the surviving frame.
pub fn on_call_returned<E: EvmEnvironment + ?Sized>(env: &mut E, reverted: bool) {
    let depth = env.depth();
    let data = env.fhevm_data_mut();
    if reverted {
        data.prune_deeper_than(depth);
        debug!(depth, "call reverted, dropped deeper verifications");
    } else {
        data.merge_into(depth);
    }
}

/// Verifies `payload` once per transaction and returns the cached entry.
///
/// In gas-estimation mode nothing is verified: a placeholder ciphertext with a
/// fresh counter-derived hash is registered instead.
pub fn verify_ciphertext<E, L>(
    env: &mut E,
    lib: &L,
    fhe_type: FheUintType,
    payload: &[u8],
) -> Result<VerifiedCiphertext, FhevmError>
where
    E: EvmEnvironment + ?Sized,
    L: FheLibrary + ?Sized,
{
    let span = env.trace_context().span("verify_ciphertext");
    let _enter = span.enter();
    let depth = env.depth();

    if env.is_gas_estimation() {
        let data = env.fhevm_data_mut();
        let hash = data.next_gas_estimation_hash();
        let (entry, _) = data
            .verified_ciphertexts_mut()
            .lookup_or_insert(hash, depth, || Ok(Ciphertext::placeholder(fhe_type, hash)))?;
        return Ok(entry.clone());
    }

    let hash = ciphertext_hash(payload);
    let (entry, _) = env
        .fhevm_data_mut()
        .verified_ciphertexts_mut()
        .lookup_or_insert(hash, depth, || {
            let ciphertext = lib.verify(fhe_type, payload)?;
            if ciphertext.hash() != hash {
                return Err(FhevmError::VerificationFailed(format!(
                    "verified ciphertext {} does not match payload hash {hash}",
                    ciphertext.hash()
                )));
            }
            Ok(ciphertext)
        })
        .map_err(|err| {
            warn!(%hash, depth, %err, "ciphertext verification failed");
            err
        })?;

    let cached = entry.ciphertext.fhe_type();
    if cached != fhe_type {
        return Err(FhevmError::CiphertextTypeMismatch {
            hash,
            cached,
            requested: fhe_type,
        });
    }
    Ok(entry.clone())
}

/// The verified ciphertext for `hash`, if it is usable at the current depth.
pub fn get_verified_ciphertext<E: EvmEnvironment + ?Sized>(
    env: &E,
    hash: B256,
) -> Option<VerifiedCiphertext> {
    env.fhevm_data()
        .verified_ciphertexts()
        .get_at_depth(&hash, env.depth())
        .cloned()
}

fn live_ciphertext<E: EvmEnvironment + ?Sized>(env: &E, hash: B256) -> Result<Ciphertext, FhevmError> {
    get_verified_ciphertext(env, hash)
        .map(|entry| entry.ciphertext)
        .ok_or(FhevmError::UnverifiedCiphertext(hash))
}

/// Defers an encrypted require until the next resolution checkpoint.
///
/// A handle that is not live at the current depth can never resolve, so it
/// is rejected here with the same [`RequireFailure::UnverifiedPredicate`] the
/// resolution would report.
///
/// Gas estimation assumes every require holds, so nothing is queued there.
pub fn optimistic_require<E: EvmEnvironment + ?Sized>(
    env: &mut E,
    hash: B256,
) -> Result<(), FhevmError> {
    let span = env.trace_context().span("optimistic_require");
    let _enter = span.enter();

    if env.is_gas_estimation() {
        return Ok(());
    }

    let ciphertext = live_ciphertext(env, hash)
        .map_err(|_| RequireFailure::UnverifiedPredicate(hash))?;
    let depth = env.depth();
    env.fhevm_data_mut()
        .append_optimistic_require(ciphertext, depth);
    debug!(%hash, depth, "optimistic require queued");
    Ok(())
}

/// Checks an encrypted require immediately. Pending optimistic requires are
/// resolved first, since this decrypts.
pub fn require<E, L>(env: &mut E, lib: &L, hash: B256) -> Result<(), FhevmError>
where
    E: EvmEnvironment + ?Sized,
    L: FheLibrary + ?Sized,
{
    let span = env.trace_context().span("require");
    let _enter = span.enter();

    if env.is_gas_estimation() {
        return Ok(());
    }

    checkpoint(env, lib, Checkpoint::BeforeDecryption)?;
    let ciphertext = live_ciphertext(env, hash)?;
    if !lib.decrypt_predicate(&ciphertext)? {
        warn!(%hash, depth = env.depth(), "require evaluated to false");
        return Err(RequireFailure::PredicateFalse(hash).into());
    }
    Ok(())
}

/// Decrypts a verified ciphertext after resolving pending optimistic requires.
///
/// Gas estimation returns zero without touching the library.
pub fn decrypt<E, L>(env: &mut E, lib: &L, hash: B256) -> Result<U256, FhevmError>
where
    E: EvmEnvironment + ?Sized,
    L: FheLibrary + ?Sized,
{
    let span = env.trace_context().span("decrypt");
    let _enter = span.enter();

    match env.execution_mode() {
        ExecutionMode::GasEstimation => return Ok(U256::ZERO),
        ExecutionMode::Committing if env.fhevm_params().disable_decryptions_in_transaction => {
            return Err(FhevmError::DecryptionsDisabled);
        }
        _ => {}
    }

    checkpoint(env, lib, Checkpoint::BeforeDecryption)?;
    let ciphertext = live_ciphertext(env, hash)?;
    lib.decrypt(&ciphertext)
}

/// Whether pending optimistic requires must be resolved at `checkpoint`.
pub fn is_resolution_due<E: EvmEnvironment + ?Sized>(env: &E, checkpoint: Checkpoint) -> bool {
    match checkpoint {
        Checkpoint::BeforeDecryption | Checkpoint::TransactionEnd => true,
        Checkpoint::BeforeExternalCall => {
            env.fhevm_params().resolution_policy == ResolutionPolicy::BeforeExternalCalls
                && env.execution_mode() == ExecutionMode::Committing
                && !env.is_read_only()
        }
    }
}

/// Resolves pending optimistic requires if `checkpoint` calls for it.
pub fn checkpoint<E, L>(env: &mut E, lib: &L, checkpoint: Checkpoint) -> Result<(), FhevmError>
where
    E: EvmEnvironment + ?Sized,
    L: FheLibrary + ?Sized,
{
    if env.fhevm_data().optimistic_requires().is_empty() {
        return Ok(());
    }
    if !is_resolution_due(env, checkpoint) {
        debug!(?checkpoint, "optimistic requires deferred");
        return Ok(());
    }
    resolve_optimistic_requires(env, lib)
}

/// Resolves all pending optimistic requires at the current depth.
pub fn resolve_optimistic_requires<E, L>(env: &mut E, lib: &L) -> Result<(), FhevmError>
where
    E: EvmEnvironment + ?Sized,
    L: FheLibrary + ?Sized,
{
    let span = env.trace_context().span("resolve_optimistic_requires");
    let _enter = span.enter();

    let depth = env.depth();
    let gas_estimation = env.is_gas_estimation();
    let (registry, requires) = env.fhevm_data_mut().split_mut();
    requires.resolve(registry, depth, |ciphertext| {
        if gas_estimation {
            Ok(true)
        } else {
            lib.decrypt_predicate(ciphertext)
        }
    })
}
