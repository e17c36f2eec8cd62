// Concentrated-liquidity execution model
// This file implements Uniswap V3 style swap simulation: the price moves
// through ranges of constant liquidity, crossing initialized ticks in order
//
// Numan Thabit 2025 Nov

use super::SwapError;
use crate::quant::PIPS_DENOMINATOR;
use serde::{Deserialize, Serialize};

pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickLiquidity {
    pub index: i32,
    /// Liquidity added when the price crosses this tick moving up.
    pub liquidity_net: i128,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentratedState {
    /// sqrt(token1 / token0) in raw units.
    pub sqrt_price: f64,
    pub tick: i32,
    /// Active liquidity at the current tick.
    pub liquidity: u128,
    pub tick_spacing: i32,
    /// Initialized ticks, sorted by index.
    pub ticks: Vec<TickLiquidity>,
    /// Tick range whose initialized ticks are known. Liquidity beyond it was
    /// never read, so swaps stop at its edges.
    #[serde(default = "min_tick")]
    pub min_loaded_tick: i32,
    #[serde(default = "max_tick")]
    pub max_loaded_tick: i32,
}

fn min_tick() -> i32 {
    MIN_TICK
}

fn max_tick() -> i32 {
    MAX_TICK
}

impl ConcentratedState {
    pub fn is_usable(&self) -> bool {
        self.liquidity > 0 && self.sqrt_price.is_finite() && self.sqrt_price > 0.0
    }

    pub fn depth(&self) -> f64 {
        self.liquidity as f64
    }

    /// Token out per token in at the current price, fee excluded.
    pub fn mid_price(&self, zero_for_one: bool) -> f64 {
        let price = self.sqrt_price * self.sqrt_price;
        if zero_for_one {
            price
        } else {
            1.0 / price
        }
    }

    /// Output for `amount_in` (fee deducted up front).
    pub fn quote_exact_in(&self, zero_for_one: bool, fee_pips: u32, amount_in: f64) -> Result<f64, SwapError> {
        let mut remaining = amount_in * fee_factor(fee_pips);
        let mut walker = TickWalker::new(self, zero_for_one)?;
        let mut out = 0.0;

        while remaining > 0.0 {
            let (target, net) = walker.next_boundary().ok_or(SwapError::InsufficientLiquidity)?;
            let liquidity = walker.liquidity as f64;
            let sqrt_p = walker.sqrt_price;
            if liquidity > 0.0 {
                if zero_for_one {
                    let target = target.min(sqrt_p);
                    let max_in = liquidity * (1.0 / target - 1.0 / sqrt_p);
                    if remaining <= max_in {
                        out += remaining * sqrt_p * sqrt_p * liquidity / (liquidity + remaining * sqrt_p);
                        break;
                    }
                    out += liquidity * (sqrt_p - target);
                    remaining -= max_in;
                } else {
                    let target = target.max(sqrt_p);
                    let max_in = liquidity * (target - sqrt_p);
                    if remaining <= max_in {
                        let next = sqrt_p + remaining / liquidity;
                        out += remaining / (sqrt_p * next);
                        break;
                    }
                    out += liquidity * (1.0 / sqrt_p - 1.0 / target);
                    remaining -= max_in;
                }
            }
            walker.cross(target, net)?;
        }

        check_finite("concentrated output", out)
    }

    /// Input (fee included) required to receive exactly `amount_out`.
    pub fn quote_exact_out(&self, zero_for_one: bool, fee_pips: u32, amount_out: f64) -> Result<f64, SwapError> {
        let mut needed = amount_out;
        let mut walker = TickWalker::new(self, zero_for_one)?;
        let mut spent = 0.0;

        while needed > 0.0 {
            let (target, net) = walker.next_boundary().ok_or(SwapError::InsufficientLiquidity)?;
            let liquidity = walker.liquidity as f64;
            let sqrt_p = walker.sqrt_price;
            if liquidity > 0.0 {
                if zero_for_one {
                    let target = target.min(sqrt_p);
                    let max_out = liquidity * (sqrt_p - target);
                    if needed <= max_out {
                        let next = sqrt_p - needed / liquidity;
                        spent += needed / (sqrt_p * next);
                        break;
                    }
                    spent += liquidity * (1.0 / target - 1.0 / sqrt_p);
                    needed -= max_out;
                } else {
                    let target = target.max(sqrt_p);
                    let max_out = liquidity * (1.0 / sqrt_p - 1.0 / target);
                    if needed <= max_out {
                        spent += liquidity * needed * sqrt_p * sqrt_p / (liquidity - needed * sqrt_p);
                        break;
                    }
                    spent += liquidity * (target - sqrt_p);
                    needed -= max_out;
                }
            }
            walker.cross(target, net)?;
        }

        check_finite("concentrated input", spent / fee_factor(fee_pips))
    }
}

pub fn sqrt_price_at_tick(tick: i32) -> f64 {
    1.0001_f64.powf(f64::from(tick) / 2.0)
}

/// Walks initialized ticks in the swap direction, tracking active liquidity.
struct TickWalker<'a> {
    ticks: &'a [TickLiquidity],
    /// Ticks before `cursor` are at or below the current tick.
    cursor: usize,
    zero_for_one: bool,
    liquidity: i128,
    sqrt_price: f64,
    floor: f64,
    ceiling: f64,
}

impl<'a> TickWalker<'a> {
    fn new(state: &'a ConcentratedState, zero_for_one: bool) -> Result<Self, SwapError> {
        let liquidity = i128::try_from(state.liquidity)
            .map_err(|_| SwapError::Numeric(format!("liquidity {} overflows", state.liquidity)))?;
        Ok(Self {
            ticks: &state.ticks,
            cursor: state.ticks.partition_point(|t| t.index <= state.tick),
            zero_for_one,
            liquidity,
            sqrt_price: state.sqrt_price,
            floor: sqrt_price_at_tick(state.min_loaded_tick.clamp(MIN_TICK, MAX_TICK)),
            ceiling: sqrt_price_at_tick(state.max_loaded_tick.clamp(MIN_TICK, MAX_TICK)),
        })
    }

    /// Next price boundary in the swap direction and the net liquidity of the
    /// tick there. `None` once the loaded price range has been consumed.
    fn next_boundary(&self) -> Option<(f64, Option<i128>)> {
        if self.zero_for_one {
            if self.cursor > 0 {
                let tick = &self.ticks[self.cursor - 1];
                return Some((sqrt_price_at_tick(tick.index), Some(tick.liquidity_net)));
            }
            (self.sqrt_price > self.floor).then_some((self.floor, None))
        } else {
            if let Some(tick) = self.ticks.get(self.cursor) {
                return Some((sqrt_price_at_tick(tick.index), Some(tick.liquidity_net)));
            }
            (self.sqrt_price < self.ceiling).then_some((self.ceiling, None))
        }
    }

    fn cross(&mut self, target: f64, net: Option<i128>) -> Result<(), SwapError> {
        self.sqrt_price = target;
        let Some(net) = net else {
            return Ok(());
        };
        if self.zero_for_one {
            self.liquidity -= net;
            self.cursor -= 1;
        } else {
            self.liquidity += net;
            self.cursor += 1;
        }
        if self.liquidity < 0 {
            return Err(SwapError::Numeric(format!(
                "negative active liquidity {} after crossing",
                self.liquidity
            )));
        }
        Ok(())
    }
}

fn fee_factor(fee_pips: u32) -> f64 {
    f64::from(PIPS_DENOMINATOR - fee_pips) / f64::from(PIPS_DENOMINATOR)
}

fn check_finite(what: &str, value: f64) -> Result<f64, SwapError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SwapError::Numeric(format!("{what} {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const L: u128 = 1_000_000_000_000_000_000;

    /// A single position spanning ticks [-1000, 1000] around price 1.
    fn single_range() -> ConcentratedState {
        ConcentratedState {
            sqrt_price: 1.0,
            tick: 0,
            liquidity: L,
            tick_spacing: 10,
            ticks: vec![
                TickLiquidity { index: -1_000, liquidity_net: L as i128 },
                TickLiquidity { index: 1_000, liquidity_net: -(L as i128) },
            ],
            min_loaded_tick: MIN_TICK,
            max_loaded_tick: MAX_TICK,
        }
    }

    #[test]
    fn small_swap_trades_near_mid_price() {
        let pool = single_range();
        let out = pool.quote_exact_in(true, 500, 1_000_000.0).unwrap();
        // 5 bps fee, negligible impact
        assert!((out - 999_500.0).abs() < 1.0);
        assert_eq!(pool.mid_price(true), 1.0);
    }

    #[test]
    fn swap_beyond_last_tick_exhausts_liquidity() {
        let pool = single_range();
        // Range capacity for token0 in is L * (1.0001^500 - 1) ~ 5.13e16.
        assert!(pool.quote_exact_in(true, 0, 5.0e16).is_ok());
        assert_eq!(
            pool.quote_exact_in(true, 0, 1.0e17),
            Err(SwapError::InsufficientLiquidity)
        );
        assert_eq!(
            pool.quote_exact_in(false, 0, 1.0e17),
            Err(SwapError::InsufficientLiquidity)
        );
    }

    #[test]
    fn crossing_into_deeper_range_adds_liquidity() {
        let mut pool = single_range();
        // A second position [-2000, -500] that becomes active below tick -500.
        pool.ticks = vec![
            TickLiquidity { index: -2_000, liquidity_net: L as i128 },
            TickLiquidity { index: -1_000, liquidity_net: L as i128 },
            TickLiquidity { index: -500, liquidity_net: -(L as i128) },
            TickLiquidity { index: 1_000, liquidity_net: -(L as i128) },
        ];
        // Both positions are active between -1000 and -500.
        let shallow = single_range().quote_exact_in(true, 0, 5.0e16).unwrap();
        let deep = pool.quote_exact_in(true, 0, 5.0e16).unwrap();
        assert!(deep > shallow);
    }

    #[test]
    fn exact_out_inverts_exact_in() {
        let pool = single_range();
        for zero_for_one in [true, false] {
            let out = pool.quote_exact_in(zero_for_one, 3_000, 3.0e16).unwrap();
            let back = pool.quote_exact_out(zero_for_one, 3_000, out).unwrap();
            assert!((back - 3.0e16).abs() / 3.0e16 < 1e-9, "zero_for_one={zero_for_one}");
        }
    }

    #[test]
    fn corrupt_tick_data_is_reported() {
        let mut pool = single_range();
        pool.ticks[0].liquidity_net = 2 * L as i128;
        pool.ticks.insert(0, TickLiquidity { index: -1_500, liquidity_net: 0 });
        let err = pool.quote_exact_in(true, 0, 1.0e17).unwrap_err();
        assert!(matches!(err, SwapError::Numeric(_)));
    }

    #[test]
    fn unread_ticks_are_not_liquidity() {
        // active liquidity but no initialized ticks inside a +-100 tick window
        let pool = ConcentratedState {
            ticks: Vec::new(),
            min_loaded_tick: -100,
            max_loaded_tick: 100,
            ..single_range()
        };
        // window capacity is roughly L * (1.0001^50 - 1) ~ 5.0e15 per side
        assert!(pool.quote_exact_in(true, 0, 1.0e15).is_ok());
        assert_eq!(
            pool.quote_exact_in(true, 0, 1.0e16),
            Err(SwapError::InsufficientLiquidity)
        );
        assert_eq!(
            pool.quote_exact_out(false, 0, 1.0e16),
            Err(SwapError::InsufficientLiquidity)
        );
    }
}
