// Quote finalization
// Applies slippage tolerance to the optimized route and enforces the
// caller's deadline and limit bounds
//
// Numan Thabit 2025 Nov

use super::routes::{Quote, Route};
use super::simulate::unix_now;
use crate::errors::RoutingError;
use crate::model::{TradeRequest, TradeType};
use crate::quant::{apply_bps_down, apply_bps_up};
use tracing::debug;

pub fn finalize(
    route: Route,
    request: &TradeRequest,
    snapshot_version: u64,
    max_price_impact_bps: Option<f64>,
) -> Result<Quote, RoutingError> {
    let now = unix_now();
    if now > request.deadline {
        return Err(RoutingError::DeadlineExceeded {
            deadline: request.deadline,
            now,
        });
    }

    let (min_output, max_input) = match request.trade_type {
        TradeType::ExactIn => (Some(apply_bps_down(route.amount_out, request.slippage_bps)), None),
        TradeType::ExactOut => (None, Some(apply_bps_up(route.amount_in, request.slippage_bps))),
    };

    if let Some(limit) = request.limit_amount {
        match (min_output, max_input) {
            (Some(bound), _) if bound < limit => return Err(RoutingError::SlippageExceeded { bound, limit }),
            (_, Some(bound)) if bound > limit => return Err(RoutingError::SlippageExceeded { bound, limit }),
            _ => {}
        }
    }

    if let Some(max_impact) = max_price_impact_bps {
        if route.price_impact_bps > max_impact {
            // impact limits are expressed as whole bps in the error
            return Err(RoutingError::SlippageExceeded {
                bound: route.price_impact_bps.ceil() as u128,
                limit: max_impact.floor() as u128,
            });
        }
    }

    debug!(
        amount_in = %route.amount_in,
        amount_out = %route.amount_out,
        splits = route.splits.len(),
        impact_bps = route.price_impact_bps,
        snapshot_version,
        "quote finalized"
    );
    Ok(Quote {
        chain_id: request.chain_id,
        route,
        min_output,
        max_input,
        slippage_bps: request.slippage_bps,
        snapshot_version,
        quoted_at: now,
    })
}
