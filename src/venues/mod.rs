// Venue module - liquidity pool data model and execution models
// Pools are a closed set of protocol variants; each variant has its own
// swap math and is dispatched explicitly by `match`
//
// Numan Thabit 2025 Nov

pub mod amm;
pub mod concentrated;

use crate::model::{ChainId, Token};
use crate::quant::{ceil_units, floor_units, PIPS_DENOMINATOR};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use amm::Reserves;
pub use concentrated::{ConcentratedState, TickLiquidity};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    #[error("pool liquidity exhausted")]
    InsufficientLiquidity,
    #[error("numeric failure: {0}")]
    Numeric(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    ConstantProduct,
    Concentrated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoolState {
    ConstantProduct(Reserves),
    Concentrated(ConcentratedState),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub chain_id: ChainId,
    pub address: Address,
    pub token0: Token,
    pub token1: Token,
    /// Swap fee in millionths (3000 = 30 bps).
    pub fee_pips: u32,
    pub state: PoolState,
}

impl Pool {
    pub fn kind(&self) -> PoolKind {
        match self.state {
            PoolState::ConstantProduct(_) => PoolKind::ConstantProduct,
            PoolState::Concentrated(_) => PoolKind::Concentrated,
        }
    }

    /// Pools with no tradable liquidity are never projected into the graph.
    pub fn is_usable(&self) -> bool {
        if self.fee_pips >= PIPS_DENOMINATOR || self.token0 == self.token1 {
            return false;
        }
        match &self.state {
            PoolState::ConstantProduct(reserves) => reserves.is_usable(),
            PoolState::Concentrated(state) => state.is_usable(),
        }
    }

    /// Liquidity in sqrt(x*y) units, used only for cheap path ranking.
    pub fn depth(&self) -> f64 {
        match &self.state {
            PoolState::ConstantProduct(reserves) => reserves.depth(),
            PoolState::Concentrated(state) => state.depth(),
        }
    }

    pub fn token_in(&self, zero_for_one: bool) -> &Token {
        if zero_for_one {
            &self.token0
        } else {
            &self.token1
        }
    }

    pub fn token_out(&self, zero_for_one: bool) -> &Token {
        if zero_for_one {
            &self.token1
        } else {
            &self.token0
        }
    }

    pub fn mid_price(&self, zero_for_one: bool) -> f64 {
        match &self.state {
            PoolState::ConstantProduct(reserves) => {
                let (reserve_in, reserve_out) = reserves.oriented(zero_for_one);
                amm::mid_price(reserve_in, reserve_out)
            }
            PoolState::Concentrated(state) => state.mid_price(zero_for_one),
        }
    }

    /// Integer output for `amount_in` raw units.
    pub fn amount_out(&self, zero_for_one: bool, amount_in: u128) -> Result<u128, SwapError> {
        match &self.state {
            PoolState::ConstantProduct(reserves) => {
                let (reserve_in, reserve_out) = reserves.oriented(zero_for_one);
                amm::amount_out(reserve_in, reserve_out, self.fee_pips, amount_in)
            }
            PoolState::Concentrated(state) => {
                let out = state.quote_exact_in(zero_for_one, self.fee_pips, amount_in as f64)?;
                floor_units(out).ok_or_else(|| SwapError::Numeric(format!("output {out} out of range")))
            }
        }
    }

    /// Integer input required for `amount_out` raw units.
    pub fn amount_in(&self, zero_for_one: bool, amount_out: u128) -> Result<u128, SwapError> {
        match &self.state {
            PoolState::ConstantProduct(reserves) => {
                let (reserve_in, reserve_out) = reserves.oriented(zero_for_one);
                amm::amount_in(reserve_in, reserve_out, self.fee_pips, amount_out)
            }
            PoolState::Concentrated(state) => {
                let required = state.quote_exact_out(zero_for_one, self.fee_pips, amount_out as f64)?;
                ceil_units(required).ok_or(SwapError::InsufficientLiquidity)
            }
        }
    }

    /// Real-valued output curve, used for price impact.
    pub fn quote_exact_in(&self, zero_for_one: bool, amount_in: f64) -> Result<f64, SwapError> {
        match &self.state {
            PoolState::ConstantProduct(reserves) => {
                let (reserve_in, reserve_out) = reserves.oriented(zero_for_one);
                amm::quote_exact_in(reserve_in, reserve_out, self.fee_pips, amount_in)
            }
            PoolState::Concentrated(state) => state.quote_exact_in(zero_for_one, self.fee_pips, amount_in),
        }
    }

    /// Real-valued input curve, used for price impact.
    pub fn quote_exact_out(&self, zero_for_one: bool, amount_out: f64) -> Result<f64, SwapError> {
        match &self.state {
            PoolState::ConstantProduct(reserves) => {
                let (reserve_in, reserve_out) = reserves.oriented(zero_for_one);
                amm::quote_exact_out(reserve_in, reserve_out, self.fee_pips, amount_out)
            }
            PoolState::Concentrated(state) => state.quote_exact_out(zero_for_one, self.fee_pips, amount_out),
        }
    }
}
