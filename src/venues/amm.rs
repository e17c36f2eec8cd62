// Constant-product AMM execution model
// This file implements x*y=k swap math for Uniswap V2 style pools,
// exact in integer raw units and as a real-valued curve for pricing
//
// Numan Thabit 2025 Nov

use super::SwapError;
use crate::quant::PIPS_DENOMINATOR;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    pub reserve0: u128,
    pub reserve1: u128,
}

impl Reserves {
    pub fn oriented(&self, zero_for_one: bool) -> (u128, u128) {
        if zero_for_one {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        }
    }

    pub fn is_usable(&self) -> bool {
        self.reserve0 > 0 && self.reserve1 > 0
    }

    /// Geometric mean of the reserves; comparable with concentrated liquidity `L`.
    pub fn depth(&self) -> f64 {
        (self.reserve0 as f64).sqrt() * (self.reserve1 as f64).sqrt()
    }
}

/// Output for `amount_in`, fee deducted from the input. Rounds down.
pub fn amount_out(reserve_in: u128, reserve_out: u128, fee_pips: u32, amount_in: u128) -> Result<u128, SwapError> {
    if amount_in == 0 {
        return Ok(0);
    }
    let in_after_fee = U256::from(amount_in) * U256::from(PIPS_DENOMINATOR - fee_pips);
    let numerator = in_after_fee * U256::from(reserve_out);
    let denominator = U256::from(reserve_in) * U256::from(PIPS_DENOMINATOR) + in_after_fee;
    if denominator.is_zero() {
        return Err(SwapError::InsufficientLiquidity);
    }
    let out = numerator / denominator;
    Ok(out.saturating_to::<u128>())
}

/// Input required to receive exactly `amount_out`. Rounds up.
pub fn amount_in(reserve_in: u128, reserve_out: u128, fee_pips: u32, amount_out: u128) -> Result<u128, SwapError> {
    if amount_out == 0 {
        return Ok(0);
    }
    if amount_out >= reserve_out {
        return Err(SwapError::InsufficientLiquidity);
    }
    let numerator = U256::from(reserve_in) * U256::from(amount_out) * U256::from(PIPS_DENOMINATOR);
    let denominator = U256::from(reserve_out - amount_out) * U256::from(PIPS_DENOMINATOR - fee_pips);
    let required = numerator / denominator + U256::from(1u8);
    if required > U256::from(u128::MAX) {
        return Err(SwapError::InsufficientLiquidity);
    }
    Ok(required.to::<u128>())
}

pub fn quote_exact_in(reserve_in: u128, reserve_out: u128, fee_pips: u32, amount_in: f64) -> Result<f64, SwapError> {
    let in_after_fee = amount_in * fee_factor(fee_pips);
    let out = reserve_out as f64 * in_after_fee / (reserve_in as f64 + in_after_fee);
    if !out.is_finite() || out < 0.0 {
        return Err(SwapError::Numeric(format!("constant-product output {out}")));
    }
    Ok(out)
}

pub fn quote_exact_out(reserve_in: u128, reserve_out: u128, fee_pips: u32, amount_out: f64) -> Result<f64, SwapError> {
    if amount_out >= reserve_out as f64 {
        return Err(SwapError::InsufficientLiquidity);
    }
    let required = reserve_in as f64 * amount_out / ((reserve_out as f64 - amount_out) * fee_factor(fee_pips));
    if !required.is_finite() || required < 0.0 {
        return Err(SwapError::Numeric(format!("constant-product input {required}")));
    }
    Ok(required)
}

/// Marginal output per unit of input at zero size, fee excluded.
pub fn mid_price(reserve_in: u128, reserve_out: u128) -> f64 {
    reserve_out as f64 / reserve_in as f64
}

fn fee_factor(fee_pips: u32) -> f64 {
    f64::from(PIPS_DENOMINATOR - fee_pips) / f64::from(PIPS_DENOMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC_RESERVE: u128 = 1_000_000 * 1_000_000; // 1M USDC, 6 decimals
    const ETH_RESERVE: u128 = 500 * 1_000_000_000_000_000_000; // 500 ETH, 18 decimals

    #[test]
    fn exact_in_matches_uniswap_v2_formula() {
        let out = amount_out(USDC_RESERVE, ETH_RESERVE, 3_000, 1_000 * 1_000_000).unwrap();
        // 500 * 997 / (1_000_000 + 997) ETH
        let expected = 500.0 * 997.0 / 1_000_997.0 * 1e18;
        assert!((out as f64 - expected).abs() / expected < 1e-9);
    }

    #[test]
    fn exact_out_covers_requested_output() {
        let want = 400_000_000_000_000_000u128; // 0.4 ETH
        let needed = amount_in(USDC_RESERVE, ETH_RESERVE, 3_000, want).unwrap();
        assert!(amount_out(USDC_RESERVE, ETH_RESERVE, 3_000, needed).unwrap() >= want);
        assert!(amount_out(USDC_RESERVE, ETH_RESERVE, 3_000, needed - 2).unwrap() < want);
    }

    #[test]
    fn exact_out_cannot_drain_reserve() {
        assert_eq!(
            amount_in(USDC_RESERVE, ETH_RESERVE, 3_000, ETH_RESERVE),
            Err(SwapError::InsufficientLiquidity)
        );
        assert!(matches!(
            quote_exact_out(USDC_RESERVE, ETH_RESERVE, 3_000, ETH_RESERVE as f64 * 1.5),
            Err(SwapError::InsufficientLiquidity)
        ));
    }

    #[test]
    fn real_curve_tracks_integer_math() {
        let amount = 25_000 * 1_000_000u128;
        let exact = amount_out(USDC_RESERVE, ETH_RESERVE, 3_000, amount).unwrap() as f64;
        let real = quote_exact_in(USDC_RESERVE, ETH_RESERVE, 3_000, amount as f64).unwrap();
        assert!((exact - real).abs() / real < 1e-9);
    }

    #[test]
    fn zero_amounts_are_free() {
        assert_eq!(amount_out(USDC_RESERVE, ETH_RESERVE, 3_000, 0), Ok(0));
        assert_eq!(amount_in(USDC_RESERVE, ETH_RESERVE, 3_000, 0), Ok(0));
    }
}
