// Router module - request-scoped routing pipeline
// This file wires graph projection, path search, quote simulation, split
// optimization and quote finalization behind the Router entry point
//
// Numan Thabit 2025 Nov

pub mod graph;
pub mod optimizer;
pub mod paths;
pub mod quote;
pub mod routes;
pub mod simulate;
pub mod validation;

#[allow(clippy::module_inception)]
pub mod router;

pub use graph::{build_graph, Edge, Graph};
pub use optimizer::{Optimizer, OptimizerConfig};
pub use paths::{find_paths, Path};
pub use quote::finalize;
pub use router::{Router, RouterStats};
pub use routes::{Quote, Route, Split};
pub use simulate::{simulate, Budget, Simulation};
