// Pre-routing request validation
// Checks amounts, tolerances, token identity and wallet eligibility before
// any snapshot is read or path simulated
//
// Numan Thabit 2025 Nov

use crate::errors::RoutingError;
use crate::model::{Token, TradeRequest};
use crate::quant::BPS_DENOMINATOR;
use alloy_primitives::Address;
use std::collections::HashSet;

/// Collected validation failures
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn into_result(self) -> Result<(), RoutingError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(RoutingError::InvalidRequest(self.errors.join("; ")))
        }
    }
}

/// Wallet eligibility policy
#[derive(Debug, Clone, Default)]
pub struct WalletPolicy {
    denied: HashSet<Address>,
}

impl WalletPolicy {
    pub fn new(denied: impl IntoIterator<Item = Address>) -> Self {
        Self {
            denied: denied.into_iter().collect(),
        }
    }

    pub fn is_eligible(&self, wallet: &Address) -> bool {
        !self.denied.contains(wallet)
    }
}

pub fn validate_request(req: &TradeRequest, policy: &WalletPolicy) -> ValidationResult {
    let mut result = ValidationResult::new();

    if req.amount == 0 {
        result.add_error("amount must be positive".into());
    }
    if req.slippage_bps > BPS_DENOMINATOR {
        result.add_error(format!("slippage {} bps exceeds {BPS_DENOMINATOR}", req.slippage_bps));
    }
    if req.token_in == req.token_out {
        result.add_error(format!("input and output token are both {}", req.token_in));
    }
    check_token(&mut result, "input", &req.token_in, req.chain_id);
    check_token(&mut result, "output", &req.token_out, req.chain_id);

    if req.wallet.is_zero() {
        result.add_error("wallet address is zero".into());
    } else if !policy.is_eligible(&req.wallet) {
        result.add_error(format!("wallet {} is not eligible for routing", req.wallet));
    }

    result
}

fn check_token(result: &mut ValidationResult, side: &str, token: &Token, chain_id: u64) {
    if token.chain_id != chain_id {
        result.add_error(format!(
            "{side} token {token} is on chain {} but the request targets chain {chain_id}",
            token.chain_id
        ));
    }
    if token.address.is_zero() {
        result.add_error(format!("{side} token address is zero"));
    }
    if token.decimals == 0 {
        result.add_error(format!("{side} token {token} has zero decimals"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TradeType;

    fn request() -> TradeRequest {
        TradeRequest {
            chain_id: 1,
            token_in: Token::new(1, Address::repeat_byte(1), 6, "USDC"),
            token_out: Token::new(1, Address::repeat_byte(2), 18, "WETH"),
            amount: 1_000_000_000,
            trade_type: TradeType::ExactIn,
            slippage_bps: 50,
            deadline: u64::MAX,
            wallet: Address::repeat_byte(9),
            limit_amount: None,
        }
    }

    #[test]
    fn well_formed_request_passes() {
        assert!(validate_request(&request(), &WalletPolicy::default()).into_result().is_ok());
    }

    #[test]
    fn collects_every_failure() {
        let mut req = request();
        req.amount = 0;
        req.slippage_bps = 10_001;
        req.token_out = Token::new(5, Address::repeat_byte(2), 18, "WETH");
        let result = validate_request(&req, &WalletPolicy::default());
        assert_eq!(result.errors.len(), 3);
        assert!(matches!(result.into_result(), Err(RoutingError::InvalidRequest(_))));
    }

    #[test]
    fn same_token_is_rejected() {
        let mut req = request();
        req.token_out = req.token_in.clone();
        let err = validate_request(&req, &WalletPolicy::default()).into_result().unwrap_err();
        assert!(err.to_string().contains("both USDC"));
    }

    #[test]
    fn denied_wallet_is_ineligible() {
        let policy = WalletPolicy::new([Address::repeat_byte(9)]);
        assert!(!validate_request(&request(), &policy).is_valid());
    }
}
