// Token graph projection
// Builds the directed liquidity graph for one request from a pool snapshot:
// two edges per usable pool, indexed by source token
//
// Numan Thabit 2025 Nov

use crate::model::{ChainId, Token};
use crate::registry::PoolSnapshot;
use crate::venues::Pool;
use alloy_primitives::Address;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One swap direction through a pool.
#[derive(Debug, Clone)]
pub struct Edge {
    pub pool: Arc<Pool>,
    pub zero_for_one: bool,
}

impl Edge {
    pub fn token_in(&self) -> &Token {
        self.pool.token_in(self.zero_for_one)
    }

    pub fn token_out(&self) -> &Token {
        self.pool.token_out(self.zero_for_one)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub chain_id: ChainId,
    adjacency: BTreeMap<Address, Vec<Edge>>,
}

impl Graph {
    pub fn edges_from(&self, token: &Address) -> &[Edge] {
        self.adjacency.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, token: &Address) -> bool {
        self.adjacency.contains_key(token)
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    fn insert(&mut self, edge: Edge) {
        self.adjacency.entry(edge.token_in().address).or_default().push(edge);
    }
}

/// Project the snapshot into a graph. Deterministic for a given snapshot.
pub fn build_graph(snapshot: &PoolSnapshot, token_in: &Token, token_out: &Token) -> Graph {
    let mut graph = Graph {
        chain_id: snapshot.chain_id,
        adjacency: BTreeMap::new(),
    };
    let mut skipped = 0usize;
    for pool in snapshot.pools() {
        if pool.chain_id != snapshot.chain_id || !pool.is_usable() {
            skipped += 1;
            continue;
        }
        graph.insert(Edge {
            pool: Arc::clone(pool),
            zero_for_one: true,
        });
        graph.insert(Edge {
            pool: Arc::clone(pool),
            zero_for_one: false,
        });
    }
    debug!(
        chain_id = snapshot.chain_id,
        version = snapshot.version,
        edges = graph.edge_count(),
        skipped,
        has_input = graph.contains(&token_in.address),
        has_output = graph.contains(&token_out.address),
        "built token graph"
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venues::concentrated::{MAX_TICK, MIN_TICK};
    use crate::venues::{ConcentratedState, PoolState, Reserves};

    fn token(byte: u8) -> Token {
        Token::new(1, Address::repeat_byte(byte), 18, "")
    }

    fn cp(chain_id: ChainId, byte: u8, a: u8, b: u8, reserve0: u128) -> Pool {
        Pool {
            chain_id,
            address: Address::repeat_byte(byte),
            token0: token(a),
            token1: token(b),
            fee_pips: 3_000,
            state: PoolState::ConstantProduct(Reserves {
                reserve0,
                reserve1: 1_000,
            }),
        }
    }

    #[test]
    fn two_edges_per_usable_pool() {
        let dead_cl = Pool {
            state: PoolState::Concentrated(ConcentratedState {
                sqrt_price: 1.0,
                tick: 0,
                liquidity: 0,
                tick_spacing: 60,
                ticks: Vec::new(),
                min_loaded_tick: MIN_TICK,
                max_loaded_tick: MAX_TICK,
            }),
            ..cp(1, 0xd0, 1, 3, 1)
        };
        let pools = vec![
            cp(1, 0xa0, 1, 2, 1_000),
            cp(1, 0xb0, 2, 3, 0),
            cp(5, 0xc0, 1, 3, 1_000),
            dead_cl,
        ];
        let snapshot = PoolSnapshot::new(1, 1, pools.into_iter().map(Arc::new).collect());
        let graph = build_graph(&snapshot, &token(1), &token(3));

        assert_eq!(graph.edge_count(), 2);
        let from_a = graph.edges_from(&token(1).address);
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].token_out(), &token(2));
        assert!(from_a[0].zero_for_one);
        assert!(graph.edges_from(&token(3).address).is_empty());
    }

    #[test]
    fn edge_lists_follow_snapshot_order() {
        let snapshot = PoolSnapshot::new(
            1,
            1,
            vec![Arc::new(cp(1, 0xb0, 1, 2, 500)), Arc::new(cp(1, 0xa0, 1, 2, 900))],
        );
        let graph = build_graph(&snapshot, &token(1), &token(2));
        let pools: Vec<_> = graph
            .edges_from(&token(1).address)
            .iter()
            .map(|edge| edge.pool.address)
            .collect();
        assert_eq!(pools, vec![Address::repeat_byte(0xa0), Address::repeat_byte(0xb0)]);
    }
}
