//! Capabilities this crate needs from the host EVM.

use crate::{data::FhevmData, error::HostError, params::FhevmParams, trace::TraceContext};
use alloy_primitives::{Address, Bytes, B256, U256};

/// Result of a contract creation, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub output: Bytes,
    pub address: Address,
    pub gas_left: u64,
    pub error: Option<HostError>,
}

impl CreateOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// How the current run relates to chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// A transaction whose effects are committed.
    Committing,
    /// An eth_call: real execution, nothing committed.
    EthCall,
    /// A gas-estimation dry run: no real cryptography.
    GasEstimation,
}

pub trait EvmEnvironment {
    // state
    fn get_state(&self, address: Address, slot: B256) -> B256;
    fn set_state(&mut self, address: Address, slot: B256, value: B256);
    fn get_nonce(&self, address: Address) -> u64;
    fn add_balance(&mut self, address: Address, amount: U256);
    fn get_balance(&self, address: Address) -> U256;
    fn self_destruct(&mut self, address: Address) -> bool;

    /// Current call-stack depth.
    fn depth(&self) -> usize;

    fn is_committing(&self) -> bool;
    fn is_eth_call(&self) -> bool;
    fn is_read_only(&self) -> bool;

    /// CREATE: the new address is derived from `caller` and its nonce.
    fn create_contract(&mut self, caller: Address, code: &[u8], gas: u64, value: U256)
        -> CreateOutcome;

    /// CREATE2: the new address is derived from `caller`, `salt` and the
    /// keccak-256 of `code`.
    fn create_contract2(
        &mut self,
        caller: Address,
        code: &[u8],
        salt: B256,
        gas: u64,
        value: U256,
    ) -> CreateOutcome;

    fn fhevm_data(&self) -> &FhevmData;
    fn fhevm_data_mut(&mut self) -> &mut FhevmData;
    fn fhevm_params(&self) -> &FhevmParams;

    /// Root of the spans recorded by confidential operations.
    /// [`TraceContext::disabled`] turns tracing off.
    fn trace_context(&self) -> TraceContext;

    fn execution_mode(&self) -> ExecutionMode {
        if self.is_committing() {
            ExecutionMode::Committing
        } else if self.is_eth_call() {
            ExecutionMode::EthCall
        } else {
            ExecutionMode::GasEstimation
        }
    }

    fn is_gas_estimation(&self) -> bool {
        self.execution_mode() == ExecutionMode::GasEstimation
    }
}
