// Route types
// This file defines the split route returned by the optimizer and the
// finalized quote handed back to callers
//
// Numan Thabit 2025 Nov

use super::paths::Path;
use super::simulate::Simulation;
use crate::model::{ChainId, Token, TradeType};
use crate::venues::PoolKind;
use alloy_primitives::Address;
use serde::Serialize;

/// One pool traversal, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hop {
    pub pool: Address,
    pub kind: PoolKind,
    pub fee_pips: u32,
    pub token_in: Token,
    pub token_out: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Split {
    pub hops: Vec<Hop>,
    /// Portion of the requested amount routed through this path.
    pub amount: u128,
    pub amount_in: u128,
    pub amount_out: u128,
    pub price_impact_bps: f64,
    #[serde(skip)]
    spot: f64,
}

impl Split {
    pub fn new(path: &Path, amount: u128, simulation: &Simulation) -> Self {
        let hops = path
            .edges
            .iter()
            .map(|edge| Hop {
                pool: edge.pool.address,
                kind: edge.pool.kind(),
                fee_pips: edge.pool.fee_pips,
                token_in: edge.token_in().clone(),
                token_out: edge.token_out().clone(),
            })
            .collect();
        Self {
            hops,
            amount,
            amount_in: simulation.amount_in,
            amount_out: simulation.amount_out,
            price_impact_bps: simulation.price_impact_bps,
            spot: simulation.spot,
        }
    }

    pub fn pools(&self) -> impl Iterator<Item = Address> + '_ {
        self.hops.iter().map(|hop| hop.pool)
    }
}

/// Gas model for route cost estimates.
#[derive(Debug, Clone, Copy)]
pub struct GasModel {
    pub base_swap_gas: u64,
    pub hop_gas: u64,
}

impl GasModel {
    pub fn split_gas(&self, hops: usize) -> u64 {
        let hops = u64::try_from(hops).unwrap_or(u64::MAX);
        self.base_swap_gas.saturating_add(self.hop_gas.saturating_mul(hops))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub trade_type: TradeType,
    /// Ordered by amount, largest first.
    pub splits: Vec<Split>,
    pub amount_in: u128,
    pub amount_out: u128,
    pub price_impact_bps: f64,
    pub estimated_gas: u64,
}

impl Route {
    pub fn new(trade_type: TradeType, mut splits: Vec<Split>, gas: GasModel) -> Self {
        splits.sort_by(|a, b| b.amount.cmp(&a.amount));
        let amount_in = splits.iter().map(|s| s.amount_in).sum();
        let amount_out = splits.iter().map(|s| s.amount_out).sum();
        let estimated_gas = splits
            .iter()
            .map(|s| gas.split_gas(s.hops.len()))
            .fold(0u64, u64::saturating_add);

        // each split weighted by its input valued at spot
        let (weighted, weight) = splits.iter().fold((0.0, 0.0), |(acc, total), split| {
            let w = split.amount_in as f64 * split.spot;
            (acc + w * split.price_impact_bps, total + w)
        });
        let price_impact_bps = if weight > 0.0 { weighted / weight } else { 0.0 };

        Self {
            trade_type,
            splits,
            amount_in,
            amount_out,
            price_impact_bps,
            estimated_gas,
        }
    }

    pub fn split_count(&self) -> usize {
        self.splits.len()
    }

    /// Sum of split portions; always the requested amount.
    pub fn allocated(&self) -> u128 {
        self.splits.iter().map(|s| s.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub chain_id: ChainId,
    pub route: Route,
    /// Exact-in only: least output accepted after slippage.
    pub min_output: Option<u128>,
    /// Exact-out only: most input spent after slippage.
    pub max_input: Option<u128>,
    pub slippage_bps: u32,
    pub snapshot_version: u64,
    /// Unix seconds at finalization.
    pub quoted_at: u64,
}

impl Quote {
    /// The worst-case bound for this trade type.
    pub fn bound(&self) -> u128 {
        match self.route.trade_type {
            TradeType::ExactIn => self.min_output.unwrap_or_default(),
            TradeType::ExactOut => self.max_input.unwrap_or(u128::MAX),
        }
    }
}
