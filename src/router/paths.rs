// Candidate path enumeration
// Depth-first search over the token graph for simple paths within the hop
// bound, ranked by a static liquidity heuristic
//
// Numan Thabit 2025 Nov

use super::graph::{Edge, Graph};
use crate::errors::RoutingError;
use crate::model::Token;
use alloy_primitives::Address;
use std::collections::BTreeSet;
use std::fmt;

pub const DEFAULT_MAX_ENUMERATED_PATHS: usize = 10_000;

/// Edges connected end to end; no token appears twice.
#[derive(Debug, Clone)]
pub struct Path {
    pub edges: Vec<Edge>,
}

impl Path {
    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    pub fn pool_addresses(&self) -> Vec<Address> {
        self.edges.iter().map(|edge| edge.pool.address).collect()
    }

    /// Thinnest pool on the path in depth units.
    pub fn bottleneck(&self) -> f64 {
        self.edges
            .iter()
            .map(|edge| edge.pool.depth())
            .fold(f64::INFINITY, f64::min)
    }

    pub fn tokens(&self) -> Vec<&Token> {
        let mut tokens = Vec::with_capacity(self.edges.len() + 1);
        if let Some(first) = self.edges.first() {
            tokens.push(first.token_in());
        }
        tokens.extend(self.edges.iter().map(Edge::token_out));
        tokens
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, edge) in self.edges.iter().enumerate() {
            if i == 0 {
                write!(f, "{}", edge.token_in())?;
            }
            write!(f, " -[{}]-> {}", edge.pool.address, edge.token_out())?;
        }
        Ok(())
    }
}

pub fn find_paths(
    graph: &Graph,
    token_in: &Token,
    token_out: &Token,
    max_hops: usize,
    max_paths: usize,
) -> Result<Vec<Path>, RoutingError> {
    find_paths_bounded(graph, token_in, token_out, max_hops, max_paths, DEFAULT_MAX_ENUMERATED_PATHS)
}

/// Enumerate, rank and truncate. Enumeration stops after `max_enumerated`
/// raw paths.
pub fn find_paths_bounded(
    graph: &Graph,
    token_in: &Token,
    token_out: &Token,
    max_hops: usize,
    max_paths: usize,
    max_enumerated: usize,
) -> Result<Vec<Path>, RoutingError> {
    if token_in == token_out {
        return Err(RoutingError::InvalidRequest(format!(
            "input and output token are both {token_in}"
        )));
    }

    let mut search = Search {
        graph,
        target: token_out.address,
        depth: 0,
        max_enumerated: max_enumerated.max(1),
        stack: Vec::with_capacity(max_hops),
        found: Vec::new(),
    };
    // shallow levels first, so the cap never crowds out shorter paths
    for depth in 1..=max_hops {
        if search.found.len() >= search.max_enumerated {
            break;
        }
        search.depth = depth;
        let mut visited = BTreeSet::new();
        visited.insert(token_in.address);
        search.walk(token_in.address, &mut visited);
    }

    let mut paths: Vec<(f64, Path)> = search
        .found
        .into_iter()
        .map(|path| (path.bottleneck(), path))
        .collect();
    if paths.is_empty() {
        return Err(RoutingError::NoRouteFound {
            token_in: token_in.address,
            token_out: token_out.address,
            max_hops,
        });
    }

    paths.sort_by(|(depth_a, a), (depth_b, b)| {
        a.hops()
            .cmp(&b.hops())
            .then_with(|| depth_b.total_cmp(depth_a))
            .then_with(|| a.pool_addresses().cmp(&b.pool_addresses()))
    });
    paths.truncate(max_paths.max(1));
    Ok(paths.into_iter().map(|(_, path)| path).collect())
}

struct Search<'g> {
    graph: &'g Graph,
    target: Address,
    /// Exact hop count collected by the current pass.
    depth: usize,
    max_enumerated: usize,
    stack: Vec<Edge>,
    found: Vec<Path>,
}

impl Search<'_> {
    fn walk(&mut self, at: Address, visited: &mut BTreeSet<Address>) {
        if self.stack.len() >= self.depth {
            return;
        }
        for edge in self.graph.edges_from(&at) {
            if self.found.len() >= self.max_enumerated {
                return;
            }
            let next = edge.token_out().address;
            if visited.contains(&next) {
                continue;
            }
            self.stack.push(edge.clone());
            if next == self.target {
                if self.stack.len() == self.depth {
                    self.found.push(Path {
                        edges: self.stack.clone(),
                    });
                }
            } else if self.stack.len() < self.depth {
                visited.insert(next);
                self.walk(next, visited);
                visited.remove(&next);
            }
            self.stack.pop();
        }
    }
}
