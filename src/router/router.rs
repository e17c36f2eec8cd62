// Router entry point
// This file ties validation, admission, snapshot capture, path search,
// split optimization and quote finalization into one request
//
// Numan Thabit 2025 Nov

use super::graph::build_graph;
use super::optimizer::{Optimizer, OptimizerConfig};
use super::paths::find_paths_bounded;
use super::quote::finalize;
use super::routes::Quote;
use super::simulate::{unix_now, Budget};
use super::validation::{validate_request, WalletPolicy};
use crate::config::RouterConfig;
use crate::control::AdmissionControl;
use crate::errors::RoutingError;
use crate::metrics::{ROUTE_ERRORS, ROUTE_LATENCY};
use crate::model::{TradeRequest, TradeType};
use crate::registry::{PoolRegistry, PoolSnapshot};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Router statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct RouterStats {
    pub total_requests: u64,
    pub successful_routes: u64,
    pub failed_routes: u64,
    pub simulations: u64,
    pub success_rate: f64,
}

pub struct Router {
    registry: Arc<PoolRegistry>,
    config: RouterConfig,
    optimizer: Optimizer,
    admission: AdmissionControl,
    wallets: WalletPolicy,
    total_requests: AtomicU64,
    successful_routes: AtomicU64,
    failed_routes: AtomicU64,
}

impl Router {
    pub fn new(registry: Arc<PoolRegistry>, config: RouterConfig) -> Self {
        Self {
            optimizer: Optimizer::new(OptimizerConfig::from(&config)),
            admission: AdmissionControl::new(config.max_inflight, config.rate_per_sec),
            wallets: WalletPolicy::new(config.denied_wallets.iter().copied()),
            registry,
            config,
            total_requests: AtomicU64::new(0),
            successful_routes: AtomicU64::new(0),
            failed_routes: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Quote a trade against the latest snapshot for its chain.
    #[tracing::instrument(skip_all, fields(chain_id = req.chain_id, trade_type = ?req.trade_type, amount = %req.amount))]
    pub async fn compute_route(&self, req: &TradeRequest) -> Result<Quote, RoutingError> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let _timer = ROUTE_LATENCY
            .with_label_values(&[trade_type_label(req.trade_type)])
            .start_timer();

        let result = self.route_latest(req).await;
        self.record(&result);
        result
    }

    /// Quote a trade against an explicit snapshot. Same snapshot and request
    /// give the same route.
    pub async fn compute_route_on(&self, snapshot: &PoolSnapshot, req: &TradeRequest) -> Result<Quote, RoutingError> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let result = match self.precheck(req) {
            Ok(()) => {
                let budget = Budget::new(req.deadline, self.config.computation_timeout());
                self.route_on(snapshot, req, budget).await
            }
            Err(err) => Err(err),
        };
        self.record(&result);
        result
    }

    pub fn get_stats(&self) -> RouterStats {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_routes.load(Ordering::Relaxed);
        RouterStats {
            total_requests: total,
            successful_routes: successful,
            failed_routes: self.failed_routes.load(Ordering::Relaxed),
            simulations: self.optimizer.simulations(),
            success_rate: if total > 0 {
                successful as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    async fn route_latest(&self, req: &TradeRequest) -> Result<Quote, RoutingError> {
        self.precheck(req)?;
        let budget = Budget::new(req.deadline, self.config.computation_timeout());
        let _permit = self.admission.acquire(&budget).await?;

        let snapshot = self.registry.snapshot(req.chain_id);
        self.check_fresh(&snapshot)?;

        let left = budget.remaining().unwrap_or_else(|| self.config.computation_timeout());
        match tokio::time::timeout(left, self.route_on(&snapshot, req, budget)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = self.config.computation_timeout_ms,
                    "route computation timed out"
                );
                Err(RoutingError::DeadlineExceeded {
                    deadline: req.deadline,
                    now: unix_now(),
                })
            }
        }
    }

    /// Validation and deadline; runs before any simulation.
    fn precheck(&self, req: &TradeRequest) -> Result<(), RoutingError> {
        validate_request(req, &self.wallets).into_result()?;
        let now = unix_now();
        if now > req.deadline {
            return Err(RoutingError::DeadlineExceeded {
                deadline: req.deadline,
                now,
            });
        }
        Ok(())
    }

    fn check_fresh(&self, snapshot: &PoolSnapshot) -> Result<(), RoutingError> {
        let staleness = self.registry.staleness(snapshot.chain_id);
        let too_old = self
            .config
            .max_snapshot_age()
            .is_some_and(|max_age| !snapshot.is_fresh(max_age));
        if staleness.stale || too_old {
            return Err(RoutingError::StaleSnapshot {
                chain_id: snapshot.chain_id,
                age_secs: snapshot.age().map(|age| age.as_secs()),
            });
        }
        Ok(())
    }

    async fn route_on(&self, snapshot: &PoolSnapshot, req: &TradeRequest, budget: Budget) -> Result<Quote, RoutingError> {
        let graph = build_graph(snapshot, &req.token_in, &req.token_out);
        let paths = find_paths_bounded(
            &graph,
            &req.token_in,
            &req.token_out,
            self.config.max_hops,
            self.config.max_paths,
            self.config.max_enumerated_paths,
        )?;
        let candidates = paths.len();

        let route = self
            .optimizer
            .optimize(paths, req.amount, req.trade_type, budget)
            .await?;
        let quote = finalize(route, req, snapshot.version, self.config.max_price_impact_bps)?;

        info!(
            snapshot_version = snapshot.version,
            candidates,
            splits = quote.route.splits.len(),
            amount_in = %quote.route.amount_in,
            amount_out = %quote.route.amount_out,
            impact_bps = quote.route.price_impact_bps,
            "route computed"
        );
        Ok(quote)
    }

    fn record(&self, result: &Result<Quote, RoutingError>) {
        match result {
            Ok(_) => {
                self.successful_routes.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.failed_routes.fetch_add(1, Ordering::Relaxed);
                ROUTE_ERRORS.with_label_values(&[err.kind()]).inc();
                match err {
                    RoutingError::InternalComputationError(_) => error!(error = %err, "route computation failed"),
                    _ => warn!(kind = err.kind(), error = %err, "no quote"),
                }
            }
        }
    }
}

fn trade_type_label(trade_type: TradeType) -> &'static str {
    match trade_type {
        TradeType::ExactIn => "exact_in",
        TradeType::ExactOut => "exact_out",
    }
}
