// Configuration management module
// This file handles loading and parsing of configuration settings
// from an optional YAML file overlaid with environment variables
//
// Numan Thabit 2025 Nov

use crate::model::{ChainId, Token};
use crate::transport::PoolSpec;
use crate::venues::PoolKind;
use alloy_primitives::Address;
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Chains to serve and the pools to keep fresh on each
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    /// Interval for the daemon heartbeat log line
    #[serde(default = "default_heartbeat_seconds")]
    pub heartbeat_seconds: u64,
}

fn default_heartbeat_seconds() -> u64 {
    30
}

/// Route search and optimizer policy. Every limit here is a tunable, not an
/// algorithmic constant.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Maximum pools traversed by one path
    pub max_hops: usize,
    /// Candidate paths kept after static ranking
    pub max_paths: usize,
    /// Hard stop for raw path enumeration
    pub max_enumerated_paths: usize,
    /// Number of increments the optimizer moves between paths
    pub split_granularity: u32,
    /// Maximum paths a single route may use
    pub max_splits: usize,
    /// Upper bound on reallocation iterations
    pub max_iterations: usize,
    /// A reallocation must beat the current aggregate by this much
    pub min_improvement_bps: f64,
    /// Extra improvement required to open one more split
    pub split_penalty_bps: f64,
    /// Parallel full-amount path simulations per request
    pub simulation_concurrency: usize,
    /// Wall clock budget for one route computation
    pub computation_timeout_ms: u64,
    /// Reject snapshots older than this (None = accept any age)
    pub max_snapshot_age_ms: Option<u64>,
    /// Gas estimate per split, independent of hop count
    pub base_swap_gas: u64,
    /// Gas estimate per pool hop
    pub hop_gas: u64,
    /// Reject routes whose aggregate price impact exceeds this
    pub max_price_impact_bps: Option<f64>,
    /// Concurrency control
    pub max_inflight: usize,
    /// Admission rate limit per second
    pub rate_per_sec: Option<u32>,
    /// Wallets not eligible for quotes
    pub denied_wallets: Vec<Address>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_hops: 3,
            max_paths: 8,
            max_enumerated_paths: 10_000,
            split_granularity: 20,
            max_splits: 4,
            max_iterations: 200,
            min_improvement_bps: 0.1,
            split_penalty_bps: 1.0,
            simulation_concurrency: 8,
            computation_timeout_ms: 2_000,
            max_snapshot_age_ms: None,
            base_swap_gas: 60_000,
            hop_gas: 90_000,
            max_price_impact_bps: None,
            max_inflight: 64,
            rate_per_sec: None,
            denied_wallets: Vec::new(),
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_hops >= 1, "router.max_hops must be at least 1");
        ensure!(self.max_paths >= 1, "router.max_paths must be at least 1");
        ensure!(self.max_splits >= 1, "router.max_splits must be at least 1");
        ensure!(self.split_granularity >= 1, "router.split_granularity must be at least 1");
        ensure!(
            self.simulation_concurrency >= 1,
            "router.simulation_concurrency must be at least 1"
        );
        ensure!(self.max_inflight >= 1, "router.max_inflight must be at least 1");
        ensure!(
            self.min_improvement_bps.is_finite() && self.min_improvement_bps >= 0.0,
            "router.min_improvement_bps must be non-negative"
        );
        ensure!(
            self.split_penalty_bps.is_finite() && self.split_penalty_bps >= 0.0,
            "router.split_penalty_bps must be non-negative"
        );
        Ok(())
    }

    pub fn computation_timeout(&self) -> Duration {
        Duration::from_millis(self.computation_timeout_ms)
    }

    pub fn max_snapshot_age(&self) -> Option<Duration> {
        self.max_snapshot_age_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub refresh_interval_ms: u64,
    /// Consecutive failed refreshes before a snapshot is reported stale
    pub stale_after_failures: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    /// Total retry budget for one refresh
    pub backoff_max_elapsed_ms: u64,
    pub rpc_timeout_ms: u64,
    /// Tick spacings read on each side of the current tick for concentrated pools
    pub tick_window: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 12_000,
            stale_after_failures: 3,
            backoff_initial_ms: 100,
            backoff_max_ms: 2_000,
            backoff_max_elapsed_ms: 10_000,
            rpc_timeout_ms: 10_000,
            tick_window: 20,
        }
    }
}

impl RegistryConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    /// JSON-RPC endpoint, e.g. https://eth.llamarpc.com
    pub rpc_endpoint: Url,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    pub address: Address,
    pub kind: PoolKind,
    pub token0: TokenConfig,
    pub token1: TokenConfig,
    /// Fee in millionths (3000 = 0.3%)
    pub fee_pips: u32,
    pub tick_spacing: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub address: Address,
    pub decimals: u8,
    #[serde(default)]
    pub symbol: String,
}

impl TokenConfig {
    fn to_token(&self, chain_id: ChainId) -> Token {
        Token::new(chain_id, self.address, self.decimals, self.symbol.clone())
    }
}

impl AppConfig {
    /// Load from the YAML file named by `APP_CONFIG` (if any), then `APP__*` env vars.
    pub fn load() -> Result<Self> {
        let file = std::env::var("APP_CONFIG").ok();
        Self::from_sources(file.as_deref())
    }

    pub fn from_sources(file: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path));
        }
        let cfg = builder
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()
            .context("assemble configuration sources")?;
        let app: AppConfig = cfg.try_deserialize().context("deserialize configuration")?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        self.router.validate()?;
        for chain in &self.chains {
            for pool in &chain.pools {
                ensure!(
                    pool.fee_pips < crate::quant::PIPS_DENOMINATOR,
                    "pool {} on chain {} has fee {} >= 100%",
                    pool.address,
                    chain.chain_id,
                    pool.fee_pips
                );
                if pool.kind == PoolKind::Concentrated {
                    ensure!(
                        pool.tick_spacing.is_some_and(|s| s > 0),
                        "concentrated pool {} on chain {} needs a positive tick_spacing",
                        pool.address,
                        chain.chain_id
                    );
                }
            }
        }
        Ok(())
    }

    pub fn endpoints(&self) -> HashMap<ChainId, Url> {
        self.chains
            .iter()
            .map(|chain| (chain.chain_id, chain.rpc_endpoint.clone()))
            .collect()
    }

    /// Per-chain pool watch lists for the registry.
    pub fn watchlists(&self) -> Vec<(ChainId, Vec<PoolSpec>)> {
        self.chains
            .iter()
            .map(|chain| {
                let specs = chain
                    .pools
                    .iter()
                    .map(|pool| PoolSpec {
                        address: pool.address,
                        kind: pool.kind,
                        token0: pool.token0.to_token(chain.chain_id),
                        token1: pool.token1.to_token(chain.chain_id),
                        fee_pips: pool.fee_pips,
                        tick_spacing: pool.tick_spacing,
                    })
                    .collect();
                (chain.chain_id, specs)
            })
            .collect()
    }
}
