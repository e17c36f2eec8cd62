// Core request and token types
// This file defines the token identity and the trade request shape
// accepted by the router entry point
//
// Numan Thabit 2025 Nov

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub type ChainId = u64;

/// ERC-20 style token. Identity is (chain, address); decimals and symbol are metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub chain_id: ChainId,
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

impl Token {
    pub fn new(chain_id: ChainId, address: Address, decimals: u8, symbol: impl Into<String>) -> Self {
        Self {
            chain_id,
            address,
            decimals,
            symbol: symbol.into(),
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
        self.address.hash(state);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.symbol.is_empty() {
            write!(f, "{}", self.address)
        } else {
            f.write_str(&self.symbol)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TradeType {
    /// Amount is denominated in the input token; solve for output.
    ExactIn,
    /// Amount is denominated in the output token; solve for input.
    ExactOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub chain_id: ChainId,
    pub token_in: Token,
    pub token_out: Token,
    /// Raw units of `token_in` for exact-in, of `token_out` for exact-out.
    pub amount: u128,
    pub trade_type: TradeType,
    pub slippage_bps: u32,
    /// Absolute unix timestamp in seconds.
    pub deadline: u64,
    /// Only used for eligibility checks.
    pub wallet: Address,
    /// Least favorable bound downstream execution accepts: minimum output for
    /// exact-in, maximum input for exact-out.
    #[serde(default)]
    pub limit_amount: Option<u128>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn token_identity_ignores_metadata() {
        let addr = Address::repeat_byte(0x11);
        let a = Token::new(1, addr, 6, "USDC");
        let b = Token::new(1, addr, 18, "usdc-bridged");
        let c = Token::new(10, addr, 6, "USDC");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Token> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn trade_type_serializes_camel_case() {
        let json = serde_json::to_string(&TradeType::ExactOut).unwrap();
        assert_eq!(json, "\"exactOut\"");
    }
}
