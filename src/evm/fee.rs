//! EVM fee computation from chain telemetry
//!
//! Inputs are fetched concurrently by `EvmClient::estimate_fee`; this module
//! only does the arithmetic.

use crate::error::ChainBridgeResult;
use crate::utils::quantity::parse_hex_u128;

use super::types::{EvmFeeConfig, FeeHistory};

/// Blocks requested from `eth_feeHistory`
pub const FEE_HISTORY_BLOCKS: u64 = 4;
/// Reward percentile requested from `eth_feeHistory`
pub const REWARD_PERCENTILE: f64 = 25.0;

/// `ceil(value * 1.5)` in integer arithmetic
pub fn with_safety_margin(value: u128) -> u128 {
    value.saturating_mul(3).div_ceil(2)
}

/// Rounded mean of the non-zero first-percentile rewards, 0 when none
pub fn priority_fee(history: &FeeHistory) -> ChainBridgeResult<u128> {
    let mut rewards = Vec::new();
    for block in history.reward.iter().flatten() {
        if let Some(first) = block.first() {
            let reward = parse_hex_u128(first)?;
            if reward > 0 {
                rewards.push(reward);
            }
        }
    }

    if rewards.is_empty() {
        return Ok(0);
    }
    let count = rewards.len() as u128;
    let sum: u128 = rewards.iter().sum();
    // round half up
    Ok((sum * 2 + count) / (count * 2))
}

/// Base fee of the pending block (last entry of the history)
pub fn next_base_fee(history: &FeeHistory) -> ChainBridgeResult<u128> {
    match history.base_fee_per_gas.last() {
        Some(fee) => parse_hex_u128(fee),
        None => Ok(0),
    }
}

pub fn compute_fee_config(
    gas_estimate: u64,
    gas_price: u128,
    history: &FeeHistory,
) -> ChainBridgeResult<EvmFeeConfig> {
    let priority = priority_fee(history)?;
    let base_fee = next_base_fee(history)?;

    Ok(EvmFeeConfig {
        gas: u64::try_from(with_safety_margin(gas_estimate as u128)).unwrap_or(u64::MAX),
        gas_price: with_safety_margin(gas_price),
        max_fee_per_gas: with_safety_margin(base_fee) + priority,
        max_priority_fee_per_gas: priority,
    })
}
