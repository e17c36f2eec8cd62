// Path quote simulation
// Runs a trial amount through every hop of a path against the captured
// snapshot, forward for exact-in and backward for exact-out
//
// Numan Thabit 2025 Nov

use super::paths::Path;
use crate::errors::RoutingError;
use crate::metrics::SIMULATIONS;
use crate::model::TradeType;
use crate::quant::BPS_DENOMINATOR;
use crate::venues::SwapError;
use serde::Serialize;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::error;

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Cancellation budget for one route computation: the caller's deadline
/// plus the router's own computation timeout.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    deadline: u64,
    expires_at: Option<Instant>,
}

impl Budget {
    pub fn new(deadline: u64, timeout: Duration) -> Self {
        Self {
            deadline,
            expires_at: Instant::now().checked_add(timeout),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            deadline: u64::MAX,
            expires_at: None,
        }
    }

    /// Time left before the computation timeout, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn check(&self) -> Result<(), RoutingError> {
        let timed_out = self.expires_at.is_some_and(|at| Instant::now() >= at);
        if unix_now() > self.deadline || timed_out {
            return Err(self.exceeded());
        }
        Ok(())
    }

    pub fn exceeded(&self) -> RoutingError {
        RoutingError::DeadlineExceeded {
            deadline: self.deadline,
            now: unix_now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Simulation {
    pub amount_in: u128,
    pub amount_out: u128,
    pub price_impact_bps: f64,
    /// Product of per-hop mid prices, output per input.
    pub spot: f64,
}

/// Simulate `trial_amount` (input for exact-in, output for exact-out).
pub fn simulate(path: &Path, trial_amount: u128, trade_type: TradeType, budget: &Budget) -> Result<Simulation, RoutingError> {
    SIMULATIONS.inc();
    let spot = path
        .edges
        .iter()
        .map(|edge| edge.pool.mid_price(edge.zero_for_one))
        .product::<f64>();
    if !spot.is_finite() || spot <= 0.0 {
        return Err(internal(path, format!("spot price {spot}")));
    }

    let (amount_in, amount_out, efficiency) = match trade_type {
        TradeType::ExactIn => {
            let mut amount = trial_amount;
            let mut real = trial_amount as f64;
            for edge in &path.edges {
                budget.check()?;
                amount = edge
                    .pool
                    .amount_out(edge.zero_for_one, amount)
                    .map_err(|e| swap_error(path, trial_amount, e))?;
                real = edge
                    .pool
                    .quote_exact_in(edge.zero_for_one, real)
                    .map_err(|e| swap_error(path, trial_amount, e))?;
            }
            if amount == 0 {
                return Err(RoutingError::InsufficientLiquidity {
                    path: path.to_string(),
                    amount: trial_amount,
                });
            }
            (trial_amount, amount, real / (trial_amount as f64 * spot))
        }
        TradeType::ExactOut => {
            let mut amount = trial_amount;
            let mut real = trial_amount as f64;
            for edge in path.edges.iter().rev() {
                budget.check()?;
                amount = edge
                    .pool
                    .amount_in(edge.zero_for_one, amount)
                    .map_err(|e| swap_error(path, trial_amount, e))?;
                real = edge
                    .pool
                    .quote_exact_out(edge.zero_for_one, real)
                    .map_err(|e| swap_error(path, trial_amount, e))?;
            }
            (amount, trial_amount, trial_amount as f64 / (real * spot))
        }
    };

    if !efficiency.is_finite() || efficiency < 0.0 {
        return Err(internal(path, format!("execution efficiency {efficiency}")));
    }
    let price_impact_bps = ((1.0 - efficiency) * f64::from(BPS_DENOMINATOR)).max(0.0);

    Ok(Simulation {
        amount_in,
        amount_out,
        price_impact_bps,
        spot,
    })
}

fn swap_error(path: &Path, amount: u128, err: SwapError) -> RoutingError {
    match err {
        SwapError::InsufficientLiquidity => RoutingError::InsufficientLiquidity {
            path: path.to_string(),
            amount,
        },
        SwapError::Numeric(msg) => internal(path, msg),
    }
}

fn internal(path: &Path, msg: String) -> RoutingError {
    error!(path = %path, error = %msg, "path simulation produced an invalid value");
    RoutingError::InternalComputationError(format!("{msg} on path {path}"))
}
