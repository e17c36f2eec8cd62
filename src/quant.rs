// Quantization module for amounts and basis points
// This file handles splitting trade amounts into optimizer increments
// and applying basis-point tolerances without overflow
//
// Numan Thabit 2025 Nov

use alloy_primitives::U256;

pub const BPS_DENOMINATOR: u32 = 10_000;
pub const PIPS_DENOMINATOR: u32 = 1_000_000;

/// Split `total` into `granularity` increments. Returns `(increment, remainder)`
/// with `increment * (total / increment) + remainder == total`.
pub fn quantize_increments(total: u128, granularity: u32) -> (u128, u128) {
    let steps = u128::from(granularity.max(1));
    let increment = (total / steps).max(1);
    (increment, total % increment)
}

/// `amount * (10000 - bps) / 10000`, rounded down.
pub fn apply_bps_down(amount: u128, bps: u32) -> u128 {
    let bps = bps.min(BPS_DENOMINATOR);
    let scaled = U256::from(amount) * U256::from(BPS_DENOMINATOR - bps) / U256::from(BPS_DENOMINATOR);
    scaled.saturating_to::<u128>()
}

/// `amount * (10000 + bps) / 10000`, rounded up.
pub fn apply_bps_up(amount: u128, bps: u32) -> u128 {
    let numerator = U256::from(amount) * U256::from(BPS_DENOMINATOR + bps);
    let denominator = U256::from(BPS_DENOMINATOR);
    let scaled = (numerator + denominator - U256::from(1u8)) / denominator;
    scaled.saturating_to::<u128>()
}

/// Lossy conversion used by the floating point pricing paths.
pub fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .rev()
        .fold(0.0_f64, |acc, limb| acc * 18_446_744_073_709_551_616.0 + *limb as f64)
}

/// Floor a non-negative finite float to raw units. `None` if it does not fit.
pub fn floor_units(value: f64) -> Option<u128> {
    if !value.is_finite() || value < 0.0 || value >= u128::MAX as f64 {
        return None;
    }
    Some(value.floor() as u128)
}

/// Ceil a non-negative finite float to raw units. `None` if it does not fit.
pub fn ceil_units(value: f64) -> Option<u128> {
    if !value.is_finite() || value < 0.0 || value >= u128::MAX as f64 {
        return None;
    }
    Some(value.ceil() as u128)
}
