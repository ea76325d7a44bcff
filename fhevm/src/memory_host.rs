//! An in-memory [`EvmEnvironment`] with a real call stack.
//!
//! Accounts live in a map; each call frame snapshots them so a revert can
//! restore state, and every frame exit runs
//! [`on_call_returned`](crate::confidential::on_call_returned). Contract
//! creation derives addresses exactly like the EVM and deploys the given code
//! verbatim, without running it.

use crate::{
    confidential::on_call_returned,
    constants::MAX_CALL_DEPTH,
    data::FhevmData,
    environment::{CreateOutcome, EvmEnvironment, ExecutionMode},
    error::HostError,
    params::FhevmParams,
    trace::TraceContext,
};
use alloy_primitives::{Address, Bytes, B256, U256};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Account {
    nonce: u64,
    balance: U256,
    code: Bytes,
    storage: HashMap<B256, B256>,
    self_destructed: bool,
}

impl Account {
    fn is_occupied(&self) -> bool {
        self.nonce != 0 || !self.code.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Frame {
    snapshot: HashMap<Address, Account>,
    parent_read_only: bool,
}

#[derive(Debug)]
pub struct MemoryHost {
    accounts: HashMap<Address, Account>,
    frames: Vec<Frame>,
    read_only: bool,
    mode: ExecutionMode,
    data: FhevmData,
    params: FhevmParams,
    trace: TraceContext,
}

impl MemoryHost {
    pub fn new(mode: ExecutionMode) -> Self {
        MemoryHost {
            accounts: HashMap::new(),
            frames: Vec::new(),
            read_only: false,
            mode,
            data: FhevmData::new(),
            params: FhevmParams::default(),
            trace: TraceContext::disabled(),
        }
    }

    pub fn committing() -> Self {
        Self::new(ExecutionMode::Committing)
    }

    pub fn with_params(mut self, params: FhevmParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_trace_context(mut self, trace: TraceContext) -> Self {
        self.trace = trace;
        self
    }

    /// Switches mode between runs, e.g. from gas estimation to the real
    /// transaction.
    pub fn set_mode(&mut self, mode: ExecutionMode) {
        self.mode = mode;
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.accounts.entry(address).or_default().balance = balance;
    }

    pub fn code(&self, address: Address) -> Option<&Bytes> {
        self.accounts
            .get(&address)
            .map(|account| &account.code)
            .filter(|code| !code.is_empty())
    }

    pub fn is_self_destructed(&self, address: Address) -> bool {
        self.accounts
            .get(&address)
            .is_some_and(|account| account.self_destructed)
    }

    /// Opens a nested frame. A static frame makes it and all its children
    /// read-only.
    pub fn enter_call(&mut self, is_static: bool) -> Result<(), HostError> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(HostError::CallDepthExceeded);
        }
        self.frames.push(Frame {
            snapshot: self.accounts.clone(),
            parent_read_only: self.read_only,
        });
        self.read_only |= is_static;
        Ok(())
    }

    /// Closes the innermost frame, rolling its state back if it reverted.
    ///
    /// # Panics
    ///
    /// If no frame is open.
    pub fn exit_call(&mut self, reverted: bool) {
        let Some(frame) = self.frames.pop() else {
            panic!("exit_call without a matching enter_call");
        };
        if reverted {
            self.accounts = frame.snapshot;
        }
        self.read_only = frame.parent_read_only;
        on_call_returned(self, reverted);
    }

    fn create_at<F>(
        &mut self,
        caller: Address,
        code: &[u8],
        gas: u64,
        value: U256,
        derive: F,
    ) -> CreateOutcome
    where
        F: FnOnce(u64) -> Address,
    {
        let failed = |error: HostError, gas_left: u64, address: Address| CreateOutcome {
            output: Bytes::new(),
            address,
            gas_left,
            error: Some(error),
        };

        if self.frames.len() >= MAX_CALL_DEPTH {
            return failed(HostError::CallDepthExceeded, gas, Address::ZERO);
        }
        if self.get_balance(caller) < value {
            return failed(HostError::InsufficientBalance, gas, Address::ZERO);
        }
        let nonce = self.get_nonce(caller);
        let Some(next_nonce) = nonce.checked_add(1) else {
            return failed(HostError::NonceOverflow, gas, Address::ZERO);
        };

        let address = derive(nonce);
        self.accounts.entry(caller).or_default().nonce = next_nonce;

        if self
            .accounts
            .get(&address)
            .is_some_and(Account::is_occupied)
        {
            return failed(HostError::AddressCollision(address), 0, address);
        }

        if let Some(sender) = self.accounts.get_mut(&caller) {
            sender.balance -= value;
        }
        let created = self.accounts.entry(address).or_default();
        created.nonce = 1;
        created.balance += value;
        created.code = Bytes::copy_from_slice(code);

        CreateOutcome {
            output: Bytes::new(),
            address,
            gas_left: gas,
            error: None,
        }
    }
}

impl EvmEnvironment for MemoryHost {
    fn get_state(&self, address: Address, slot: B256) -> B256 {
        self.accounts
            .get(&address)
            .and_then(|account| account.storage.get(&slot))
            .copied()
            .unwrap_or_default()
    }

    fn set_state(&mut self, address: Address, slot: B256, value: B256) {
        self.accounts
            .entry(address)
            .or_default()
            .storage
            .insert(slot, value);
    }

    fn get_nonce(&self, address: Address) -> u64 {
        self.accounts
            .get(&address)
            .map(|account| account.nonce)
            .unwrap_or_default()
    }

    fn add_balance(&mut self, address: Address, amount: U256) {
        let account = self.accounts.entry(address).or_default();
        account.balance = account.balance.saturating_add(amount);
    }

    fn get_balance(&self, address: Address) -> U256 {
        self.accounts
            .get(&address)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    fn self_destruct(&mut self, address: Address) -> bool {
        match self.accounts.get_mut(&address) {
            Some(account) => {
                account.self_destructed = true;
                account.balance = U256::ZERO;
                true
            }
            None => false,
        }
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }

    fn is_committing(&self) -> bool {
        self.mode == ExecutionMode::Committing
    }

    fn is_eth_call(&self) -> bool {
        self.mode == ExecutionMode::EthCall
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn create_contract(
        &mut self,
        caller: Address,
        code: &[u8],
        gas: u64,
        value: U256,
    ) -> CreateOutcome {
        self.create_at(caller, code, gas, value, |nonce| caller.create(nonce))
    }

    fn create_contract2(
        &mut self,
        caller: Address,
        code: &[u8],
        salt: B256,
        gas: u64,
        value: U256,
    ) -> CreateOutcome {
        let code_hash = B256::from_slice(&Keccak256::digest(code));
        self.create_at(caller, code, gas, value, |_| caller.create2(salt, code_hash))
    }

    fn fhevm_data(&self) -> &FhevmData {
        &self.data
    }

    fn fhevm_data_mut(&mut self) -> &mut FhevmData {
        &mut self.data
    }

    fn fhevm_params(&self) -> &FhevmParams {
        &self.params
    }

    fn trace_context(&self) -> TraceContext {
        self.trace.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const ALICE: Address = address!("1111111111111111111111111111111111111111");

    #[test]
    fn test_storage_and_balances() {
        let mut host = MemoryHost::committing();
        let slot = B256::repeat_byte(1);
        assert_eq!(host.get_state(ALICE, slot), B256::ZERO);
        host.set_state(ALICE, slot, B256::repeat_byte(2));
        assert_eq!(host.get_state(ALICE, slot), B256::repeat_byte(2));

        host.add_balance(ALICE, U256::from(5));
        host.add_balance(ALICE, U256::from(7));
        assert_eq!(host.get_balance(ALICE), U256::from(12));

        assert!(host.self_destruct(ALICE));
        assert!(host.is_self_destructed(ALICE));
        assert_eq!(host.get_balance(ALICE), U256::ZERO);
        assert!(!host.self_destruct(Address::repeat_byte(9)));
    }

    #[test]
    fn test_reverted_frame_restores_state() {
        let mut host = MemoryHost::committing();
        let slot = B256::repeat_byte(1);
        host.enter_call(false).unwrap();
        host.set_state(ALICE, slot, B256::repeat_byte(1));
        host.enter_call(false).unwrap();
        assert_eq!(host.depth(), 2);
        host.set_state(ALICE, slot, B256::repeat_byte(2));
        host.exit_call(true);
        assert_eq!(host.depth(), 1);
        assert_eq!(host.get_state(ALICE, slot), B256::repeat_byte(1));
        host.exit_call(false);
        assert_eq!(host.get_state(ALICE, slot), B256::repeat_byte(1));
    }

    #[test]
    fn test_static_frames_are_read_only() {
        let mut host = MemoryHost::committing();
        host.enter_call(false).unwrap();
        assert!(!host.is_read_only());
        host.enter_call(true).unwrap();
        host.enter_call(false).unwrap();
        assert!(host.is_read_only());
        host.exit_call(false);
        host.exit_call(false);
        assert!(!host.is_read_only());
    }

    #[test]
    fn test_call_depth_limit() {
        let mut host = MemoryHost::committing();
        for _ in 0..MAX_CALL_DEPTH {
            host.enter_call(false).unwrap();
        }
        assert_eq!(host.enter_call(false), Err(HostError::CallDepthExceeded));
        let outcome = host.create_contract(ALICE, &[0x00], 100, U256::ZERO);
        assert_eq!(outcome.error, Some(HostError::CallDepthExceeded));
        assert_eq!(outcome.gas_left, 100);
    }

    #[test]
    fn test_create_derives_address_from_nonce() {
        let mut host = MemoryHost::committing();
        host.set_balance(ALICE, U256::from(10));

        let first = host.create_contract(ALICE, &[0x60, 0x00], 1_000, U256::from(3));
        assert!(first.is_success());
        assert_eq!(first.address, ALICE.create(0));
        assert_eq!(first.gas_left, 1_000);
        assert_eq!(host.get_nonce(ALICE), 1);
        assert_eq!(host.get_nonce(first.address), 1);
        assert_eq!(host.get_balance(first.address), U256::from(3));
        assert_eq!(host.get_balance(ALICE), U256::from(7));
        assert_eq!(&host.code(first.address).unwrap()[..], &[0x60u8, 0x00]);

        let second = host.create_contract(ALICE, &[0x60, 0x00], 1_000, U256::ZERO);
        assert_eq!(second.address, ALICE.create(1));
        assert_ne!(first.address, second.address);
    }

    #[test]
    fn test_create2_derives_address_from_salt_and_code() {
        let mut host = MemoryHost::committing();
        let code = [0x60u8, 0x01];
        let salt = B256::repeat_byte(0xab);
        let outcome = host.create_contract2(ALICE, &code, salt, 500, U256::ZERO);
        assert!(outcome.is_success());
        assert_eq!(
            outcome.address,
            ALICE.create2(salt, B256::from_slice(&Keccak256::digest(code)))
        );

        // same salt and code lands on the same, now occupied, address
        let again = host.create_contract2(ALICE, &code, salt, 500, U256::ZERO);
        assert_eq!(again.error, Some(HostError::AddressCollision(outcome.address)));
        assert_eq!(again.gas_left, 0);
    }

    #[test]
    fn test_create_with_insufficient_balance() {
        let mut host = MemoryHost::committing();
        let outcome = host.create_contract(ALICE, &[], 10, U256::from(1));
        assert_eq!(outcome.error, Some(HostError::InsufficientBalance));
        assert_eq!(host.get_nonce(ALICE), 0);
    }

    #[test]
    fn test_execution_modes() {
        let host = MemoryHost::committing();
        assert_eq!(host.execution_mode(), ExecutionMode::Committing);
        let host = MemoryHost::new(ExecutionMode::EthCall);
        assert!(host.is_eth_call() && !host.is_committing());
        assert_eq!(host.execution_mode(), ExecutionMode::EthCall);
        let host = MemoryHost::new(ExecutionMode::GasEstimation);
        assert!(host.is_gas_estimation());
    }
}
