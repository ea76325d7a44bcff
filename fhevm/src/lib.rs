//! Confidential-execution bookkeeping for an FHE-enabled EVM.
//!
//! Within one transaction this crate remembers which ciphertexts have been
//! verified, and at which call depth, so each proof is checked once and
//! forgotten again when the verifying frame reverts. It also collects
//! encrypted `require` predicates and resolves them in batches.
//!
//! The host EVM plugs in through [`EvmEnvironment`] and the encryption
//! library through [`FheLibrary`]. [`MemoryHost`] and
//! [`testing::PlaintextLibrary`] stand in for both in tests.

pub mod ciphertext;
pub mod confidential;
pub mod constants;
pub mod data;
pub mod environment;
pub mod error;
pub mod library;
pub mod memory_host;
pub mod params;
pub mod registry;
pub mod requires;
pub mod testing;
pub mod trace;


pub use ciphertext::{Ciphertext, FheUintType};
pub use confidential::Checkpoint;
pub use data::FhevmData;
pub use environment::{CreateOutcome, EvmEnvironment, ExecutionMode};
pub use error::{FhevmError, HostError, RequireFailure};
pub use library::FheLibrary;
pub use memory_host::MemoryHost;
pub use params::{FhevmParams, ResolutionPolicy};
pub use registry::{VerificationRegistry, VerifiedCiphertext};
pub use requires::{OptimisticRequire, OptimisticRequires};
pub use trace::TraceContext;
