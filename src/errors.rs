// Error types and error handling module
// This file defines the routing error taxonomy surfaced to callers
// and the chain-data source errors retried inside the registry
//
// Numan Thabit 2025 Nov

use alloy_primitives::Address;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no route from {token_in} to {token_out} within {max_hops} hops")]
    NoRouteFound {
        token_in: Address,
        token_out: Address,
        max_hops: usize,
    },
    #[error("insufficient liquidity for amount {amount} on path {path}")]
    InsufficientLiquidity { path: String, amount: u128 },
    #[error("slippage exceeded: bound {bound} is worse than limit {limit}")]
    SlippageExceeded { bound: u128, limit: u128 },
    #[error("deadline {deadline} exceeded at {now}")]
    DeadlineExceeded { deadline: u64, now: u64 },
    #[error("rpc failure: {0}")]
    RpcFailure(String),
    #[error("internal computation error: {0}")]
    InternalComputationError(String),
    #[error("snapshot for chain {chain_id} is stale (age {age_secs:?}s)")]
    StaleSnapshot { chain_id: u64, age_secs: Option<u64> },
}

impl RoutingError {
    /// Stable label for metrics and for callers mapping errors to status codes.
    pub fn kind(&self) -> &'static str {
        match self {
            RoutingError::InvalidRequest(_) => "invalid_request",
            RoutingError::NoRouteFound { .. } => "no_route_found",
            RoutingError::InsufficientLiquidity { .. } => "insufficient_liquidity",
            RoutingError::SlippageExceeded { .. } => "slippage_exceeded",
            RoutingError::DeadlineExceeded { .. } => "deadline_exceeded",
            RoutingError::RpcFailure(_) => "rpc_failure",
            RoutingError::InternalComputationError(_) => "internal_computation_error",
            RoutingError::StaleSnapshot { .. } => "stale_snapshot",
        }
    }

    /// Only chain-data fetches are retried, and only inside the registry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RoutingError::RpcFailure(_))
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("no data source configured for chain {0}")]
    UnknownChain(u64),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transport(_) | SourceError::Provider(_))
    }
}

impl From<SourceError> for RoutingError {
    fn from(err: SourceError) -> Self {
        RoutingError::RpcFailure(err.to_string())
    }
}
