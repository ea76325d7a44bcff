use alloy_primitives::U256;

/// Maximum EVM call-stack depth.
pub const MAX_CALL_DEPTH: usize = 1024;

/// First placeholder hash issued in gas-estimation mode. Zero is skipped so a
/// placeholder never collides with an unset storage slot.
pub const GAS_ESTIMATION_HASH_START: U256 = U256::from_limbs([1, 0, 0, 0]);
