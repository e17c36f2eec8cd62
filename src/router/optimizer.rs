// Split route optimizer
// Allocates the requested amount across candidate paths: parallel full-amount
// simulations pick a seed, then greedy increment moves rebalance it while the
// aggregate improves by more than the configured tolerance
//
// Numan Thabit 2025 Nov

use super::paths::Path;
use super::routes::{GasModel, Route, Split};
use super::simulate::{simulate, Budget, Simulation};
use crate::config::RouterConfig;
use crate::errors::RoutingError;
use crate::model::TradeType;
use crate::quant::{quantize_increments, BPS_DENOMINATOR};
use alloy_primitives::Address;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub split_granularity: u32,
    pub max_splits: usize,
    pub max_iterations: usize,
    pub min_improvement_bps: f64,
    pub split_penalty_bps: f64,
    pub simulation_concurrency: usize,
    pub gas: GasModel,
}

impl From<&RouterConfig> for OptimizerConfig {
    fn from(cfg: &RouterConfig) -> Self {
        Self {
            split_granularity: cfg.split_granularity,
            max_splits: cfg.max_splits.max(1),
            max_iterations: cfg.max_iterations,
            min_improvement_bps: cfg.min_improvement_bps,
            split_penalty_bps: cfg.split_penalty_bps,
            simulation_concurrency: cfg.simulation_concurrency.max(1),
            gas: GasModel {
                base_swap_gas: cfg.base_swap_gas,
                hop_gas: cfg.hop_gas,
            },
        }
    }
}

pub struct Optimizer {
    config: OptimizerConfig,
    limiter: Arc<Semaphore>,
    simulations: AtomicU64,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        let limiter = Arc::new(Semaphore::new(config.simulation_concurrency.max(1)));
        Self {
            config,
            limiter,
            simulations: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Path simulations run since construction.
    pub fn simulations(&self) -> u64 {
        self.simulations.load(Ordering::Relaxed)
    }

    pub async fn optimize(
        &self,
        candidates: Vec<Path>,
        total: u128,
        trade_type: TradeType,
        budget: Budget,
    ) -> Result<Route, RoutingError> {
        if total == 0 {
            return Err(RoutingError::InvalidRequest("amount must be positive".into()));
        }
        if candidates.is_empty() {
            return Err(RoutingError::InternalComputationError("optimizer received no candidate paths".into()));
        }
        budget.check()?;

        let candidates = Arc::new(candidates);
        let full = self.simulate_full(&candidates, total, trade_type, budget).await?;

        let config = self.config.clone();
        let paths = Arc::clone(&candidates);
        let (route, simulations) = tokio::task::spawn_blocking(move || {
            let mut search = Allocator::new(&paths, total, trade_type, budget, &config, full);
            let route = search.run();
            (route, search.simulations)
        })
        .await
        .map_err(|e| RoutingError::InternalComputationError(format!("optimizer task failed: {e}")))?;

        self.simulations.fetch_add(simulations, Ordering::Relaxed);
        route
    }

    /// Simulate every candidate at the full amount on blocking workers,
    /// bounded by the semaphore. Results keep candidate order.
    async fn simulate_full(
        &self,
        candidates: &Arc<Vec<Path>>,
        total: u128,
        trade_type: TradeType,
        budget: Budget,
    ) -> Result<Vec<Option<Simulation>>, RoutingError> {
        let mut handles = Vec::with_capacity(candidates.len());
        for index in 0..candidates.len() {
            let permit = Arc::clone(&self.limiter)
                .acquire_owned()
                .await
                .map_err(|_| RoutingError::InternalComputationError("simulation limiter closed".into()))?;
            let paths = Arc::clone(candidates);
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                simulate(&paths[index], total, trade_type, &budget)
            }));
        }
        self.simulations
            .fetch_add(handles.len() as u64, Ordering::Relaxed);

        let mut results = Vec::with_capacity(handles.len());
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            let outcome = joined
                .map_err(|e| RoutingError::InternalComputationError(format!("simulation task failed: {e}")))?;
            match outcome {
                Ok(sim) => results.push(Some(sim)),
                Err(err @ RoutingError::InsufficientLiquidity { .. }) => {
                    debug!(index, error = %err, "candidate cannot fill the full amount");
                    results.push(None);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(results)
    }
}

/// Sequential allocation search over one request's candidates.
struct Allocator<'a> {
    paths: &'a [Path],
    total: u128,
    trade_type: TradeType,
    budget: Budget,
    config: &'a OptimizerConfig,
    /// `shared[i][j]`: paths `i` and `j` trade through a common pool.
    shared: Vec<Vec<bool>>,
    memo: HashMap<(usize, u128), Option<Simulation>>,
    simulations: u64,
}

impl<'a> Allocator<'a> {
    fn new(
        paths: &'a [Path],
        total: u128,
        trade_type: TradeType,
        budget: Budget,
        config: &'a OptimizerConfig,
        full: Vec<Option<Simulation>>,
    ) -> Self {
        let memo = full
            .into_iter()
            .enumerate()
            .map(|(index, sim)| ((index, total), sim))
            .collect();
        let pools: Vec<HashSet<Address>> = paths
            .iter()
            .map(|path| path.pool_addresses().into_iter().collect())
            .collect();
        let shared = (0..paths.len())
            .map(|i| {
                (0..paths.len())
                    .map(|j| i != j && !pools[i].is_disjoint(&pools[j]))
                    .collect()
            })
            .collect();
        Self {
            paths,
            total,
            trade_type,
            budget,
            config,
            shared,
            memo,
            simulations: 0,
        }
    }

    /// Each split is simulated against untouched pool state, so a path may
    /// only receive funds while no other funded path shares one of its pools.
    /// `released` is a path that gives up its whole allocation in the move.
    fn overlaps_funded(&self, allocation: &[u128], recipient: usize, released: Option<usize>) -> bool {
        allocation.iter().enumerate().any(|(other, amount)| {
            *amount > 0 && Some(other) != released && self.shared[recipient][other]
        })
    }

    fn run(&mut self) -> Result<Route, RoutingError> {
        let (increment, remainder) = quantize_increments(self.total, self.config.split_granularity);
        let mut allocation = match self.best_single() {
            Some(index) => {
                let mut allocation = vec![0u128; self.paths.len()];
                allocation[index] = self.total;
                allocation
            }
            None => self.water_fill(increment, remainder)?,
        };

        let mut value = self.value_of(&allocation)?;
        let mut iterations = 0usize;
        while iterations < self.config.max_iterations {
            self.budget.check()?;
            let Some((next, next_value)) = self.best_move(&allocation, value, increment)? else {
                break;
            };
            allocation = next;
            value = next_value;
            iterations += 1;
        }

        let mut splits = Vec::new();
        for (index, amount) in allocation.iter().enumerate() {
            if *amount == 0 {
                continue;
            }
            let sim = self.eval(index, *amount)?.ok_or_else(|| {
                RoutingError::InternalComputationError(format!("allocated path {} became infeasible", self.paths[index]))
            })?;
            splits.push(Split::new(&self.paths[index], *amount, &sim));
        }
        debug!(
            iterations,
            splits = splits.len(),
            simulations = self.simulations,
            increment = %increment,
            "split allocation converged"
        );
        Ok(Route::new(self.trade_type, splits, self.config.gas))
    }

    /// Best feasible path at the full amount; ties keep the earlier rank.
    fn best_single(&self) -> Option<usize> {
        let mut best: Option<(usize, u128)> = None;
        for index in 0..self.paths.len() {
            let Some(Some(sim)) = self.memo.get(&(index, self.total)) else {
                continue;
            };
            let score = self.contribution(sim);
            if best.map_or(true, |(_, current)| self.is_better(score, current)) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Place increments one at a time where the marginal result is best.
    fn water_fill(&mut self, increment: u128, remainder: u128) -> Result<Vec<u128>, RoutingError> {
        let mut allocation = vec![0u128; self.paths.len()];
        let mut placed = 0u128;
        while placed < self.total {
            self.budget.check()?;
            let step = if placed == 0 { increment + remainder } else { increment };
            let active = allocation.iter().filter(|a| **a > 0).count();
            let mut best: Option<(usize, u128)> = None;
            for index in 0..self.paths.len() {
                if allocation[index] == 0 && active >= self.config.max_splits {
                    continue;
                }
                if self.overlaps_funded(&allocation, index, None) {
                    continue;
                }
                let before = self.contribution_at(index, allocation[index])?;
                let Some(after) = self.contribution_at(index, allocation[index] + step)? else {
                    continue;
                };
                let Some(before) = before else { continue };
                // extra output gained, or extra input spent
                let marginal = after.saturating_sub(before);
                let better = match (best, self.trade_type) {
                    (None, _) => true,
                    (Some((_, m)), TradeType::ExactIn) => marginal > m,
                    (Some((_, m)), TradeType::ExactOut) => marginal < m,
                };
                if better {
                    best = Some((index, marginal));
                }
            }
            let Some((index, _)) = best else {
                warn!(total = %self.total, placed = %placed, "candidate paths cannot absorb the amount");
                return Err(RoutingError::InsufficientLiquidity {
                    path: format!("{} candidate paths", self.paths.len()),
                    amount: self.total,
                });
            };
            allocation[index] += step;
            placed += step;
        }
        Ok(allocation)
    }

    /// Best single-increment reallocation that clears the improvement bar.
    fn best_move(
        &mut self,
        allocation: &[u128],
        value: u128,
        increment: u128,
    ) -> Result<Option<(Vec<u128>, u128)>, RoutingError> {
        let active = allocation.iter().filter(|a| **a > 0).count();
        // (donor, recipient, amount, new value, splits after)
        let mut best: Option<(usize, usize, u128, u128, usize)> = None;

        for donor in 0..allocation.len() {
            let held = allocation[donor];
            if held < increment {
                continue;
            }
            let amount = if held - increment < increment { held } else { increment };
            let Some(donor_before) = self.contribution_at(donor, held)? else {
                continue;
            };
            let Some(donor_after) = self.contribution_at(donor, held - amount)? else {
                continue;
            };

            for recipient in 0..allocation.len() {
                if recipient == donor {
                    continue;
                }
                let opens = allocation[recipient] == 0;
                let closes = held == amount;
                let splits_after = active + usize::from(opens) - usize::from(closes);
                if splits_after > self.config.max_splits {
                    continue;
                }
                if self.overlaps_funded(allocation, recipient, closes.then_some(donor)) {
                    continue;
                }
                let Some(recipient_before) = self.contribution_at(recipient, allocation[recipient])? else {
                    continue;
                };
                let Some(recipient_after) = self.contribution_at(recipient, allocation[recipient] + amount)? else {
                    continue;
                };

                let gained = donor_after.checked_add(recipient_after).ok_or_else(value_overflow)?;
                let given = donor_before.checked_add(recipient_before).ok_or_else(value_overflow)?;
                let candidate = value
                    .checked_add(gained)
                    .and_then(|v| v.checked_sub(given))
                    .ok_or_else(value_overflow)?;
                let threshold = self.config.min_improvement_bps
                    + if splits_after > active { self.config.split_penalty_bps } else { 0.0 };
                if self.improvement_bps(value, candidate) <= threshold {
                    continue;
                }
                let wins = match best {
                    None => true,
                    Some((_, _, _, best_value, best_splits)) => {
                        self.is_better(candidate, best_value) || (candidate == best_value && splits_after < best_splits)
                    }
                };
                if wins {
                    best = Some((donor, recipient, amount, candidate, splits_after));
                }
            }
        }

        Ok(best.map(|(donor, recipient, amount, candidate, _)| {
            let mut next = allocation.to_vec();
            next[donor] -= amount;
            next[recipient] += amount;
            (next, candidate)
        }))
    }

    fn value_of(&mut self, allocation: &[u128]) -> Result<u128, RoutingError> {
        let mut value = 0u128;
        for (index, amount) in allocation.iter().enumerate() {
            let part = self.contribution_at(index, *amount)?.ok_or_else(|| RoutingError::InsufficientLiquidity {
                path: self.paths[index].to_string(),
                amount: *amount,
            })?;
            value = value.checked_add(part).ok_or_else(value_overflow)?;
        }
        Ok(value)
    }

    /// Output (exact-in) or input (exact-out) of `amount` on a path.
    fn contribution_at(&mut self, index: usize, amount: u128) -> Result<Option<u128>, RoutingError> {
        if amount == 0 {
            return Ok(Some(0));
        }
        Ok(self.eval(index, amount)?.map(|sim| self.contribution(&sim)))
    }

    fn contribution(&self, sim: &Simulation) -> u128 {
        match self.trade_type {
            TradeType::ExactIn => sim.amount_out,
            TradeType::ExactOut => sim.amount_in,
        }
    }

    fn is_better(&self, candidate: u128, current: u128) -> bool {
        match self.trade_type {
            TradeType::ExactIn => candidate > current,
            TradeType::ExactOut => candidate < current,
        }
    }

    fn improvement_bps(&self, current: u128, candidate: u128) -> f64 {
        if current == 0 {
            return if self.is_better(candidate, current) { f64::INFINITY } else { 0.0 };
        }
        let delta = match self.trade_type {
            TradeType::ExactIn => candidate as f64 - current as f64,
            TradeType::ExactOut => current as f64 - candidate as f64,
        };
        delta / current as f64 * f64::from(BPS_DENOMINATOR)
    }

    /// Memoized simulation; amounts beyond a path's liquidity are remembered
    /// as `None`. Any other failure aborts the search.
    fn eval(&mut self, index: usize, amount: u128) -> Result<Option<Simulation>, RoutingError> {
        if let Some(cached) = self.memo.get(&(index, amount)) {
            return Ok(*cached);
        }
        self.simulations += 1;
        let result = match simulate(&self.paths[index], amount, self.trade_type, &self.budget) {
            Ok(sim) => Some(sim),
            Err(RoutingError::InsufficientLiquidity { .. }) => None,
            Err(err) => return Err(err),
        };
        self.memo.insert((index, amount), result);
        Ok(result)
    }
}

fn value_overflow() -> RoutingError {
    RoutingError::InternalComputationError("allocation value out of u128 range".into())
}
