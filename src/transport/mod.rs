// Chain data transport layer
// This file defines the injected interface the pool registry uses to read
// pool state, plus an in-memory source for embedding and tests
//
// Numan Thabit 2025 Nov

pub mod jsonrpc;

use crate::errors::SourceError;
use crate::model::{ChainId, Token};
use crate::venues::{Pool, PoolKind};
use alloy_primitives::Address;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Static description of a pool the registry should keep fresh.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSpec {
    pub address: Address,
    pub kind: PoolKind,
    pub token0: Token,
    pub token1: Token,
    pub fee_pips: u32,
    /// Concentrated pools only.
    pub tick_spacing: Option<i32>,
}

/// Reads current pool state for a chain. Implementations own their
/// connections and credentials.
#[async_trait]
pub trait PoolSource: Send + Sync {
    async fn fetch_pools(&self, chain_id: ChainId, specs: &[PoolSpec]) -> Result<Vec<Pool>, SourceError>;
}

/// Serves whatever pool state was last installed for a chain.
#[derive(Default)]
pub struct StaticPoolSource {
    pools: RwLock<HashMap<ChainId, Vec<Pool>>>,
}

impl StaticPoolSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pools(&self, chain_id: ChainId, pools: Vec<Pool>) {
        let mut guard = self.pools.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(chain_id, pools);
    }
}

#[async_trait]
impl PoolSource for StaticPoolSource {
    async fn fetch_pools(&self, chain_id: ChainId, specs: &[PoolSpec]) -> Result<Vec<Pool>, SourceError> {
        let guard = self.pools.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let pools = guard.get(&chain_id).ok_or(SourceError::UnknownChain(chain_id))?;
        if specs.is_empty() {
            return Ok(pools.clone());
        }
        Ok(pools
            .iter()
            .filter(|pool| specs.iter().any(|spec| spec.address == pool.address))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venues::{PoolState, Reserves};

    fn pool(byte: u8) -> Pool {
        Pool {
            chain_id: 1,
            address: Address::repeat_byte(byte),
            token0: Token::new(1, Address::repeat_byte(1), 18, "A"),
            token1: Token::new(1, Address::repeat_byte(2), 18, "B"),
            fee_pips: 3_000,
            state: PoolState::ConstantProduct(Reserves { reserve0: 10, reserve1: 10 }),
        }
    }

    #[tokio::test]
    async fn static_source_filters_by_watchlist() {
        let source = StaticPoolSource::new();
        source.set_pools(1, vec![pool(0xa0), pool(0xb0)]);

        let all = source.fetch_pools(1, &[]).await.unwrap();
        assert_eq!(all.len(), 2);

        let spec = PoolSpec {
            address: Address::repeat_byte(0xb0),
            kind: PoolKind::ConstantProduct,
            token0: all[0].token0.clone(),
            token1: all[0].token1.clone(),
            fee_pips: 3_000,
            tick_spacing: None,
        };
        let watched = source.fetch_pools(1, &[spec]).await.unwrap();
        assert_eq!(watched.len(), 1);
        assert_eq!(watched[0].address, Address::repeat_byte(0xb0));
    }

    #[tokio::test]
    async fn static_source_rejects_unknown_chain() {
        let source = StaticPoolSource::new();
        let err = source.fetch_pools(42, &[]).await.unwrap_err();
        assert!(matches!(err, SourceError::UnknownChain(42)));
    }
}
