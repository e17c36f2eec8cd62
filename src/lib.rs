// Library root module for ultra-router
// This file defines the public API and module structure for the ultra-router library
// It exports the pool registry, the routing pipeline and the chain data sources
//
// Numan Thabit 2025 Nov

pub mod config;
pub mod control;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod quant;
pub mod registry;
pub mod router;
pub mod transport;
pub mod venues;

pub use errors::RoutingError;
pub use model::{Token, TradeRequest, TradeType};
pub use registry::{PoolRegistry, PoolSnapshot};
pub use router::{Quote, Router};
