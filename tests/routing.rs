// End-to-end routing scenarios against an in-memory pool registry
//
// Numan Thabit 2025 Nov

use alloy_primitives::Address;
use std::collections::BTreeSet;
use std::sync::Arc;
use ultra_router::config::{RegistryConfig, RouterConfig};
use ultra_router::errors::RoutingError;
use ultra_router::model::{Token, TradeRequest, TradeType};
use ultra_router::quant::apply_bps_down;
use ultra_router::registry::PoolRegistry;
use ultra_router::router::Router;
use ultra_router::transport::StaticPoolSource;
use ultra_router::venues::{amm, Pool, PoolState, Reserves};

const USDC: u8 = 0x01;
const WETH: u8 = 0x02;
const DAI: u8 = 0x03;

fn token(byte: u8) -> Token {
    match byte {
        USDC => Token::new(1, Address::repeat_byte(byte), 6, "USDC"),
        WETH => Token::new(1, Address::repeat_byte(byte), 18, "WETH"),
        _ => Token::new(1, Address::repeat_byte(byte), 18, "DAI"),
    }
}

fn pool(address: u8, a: u8, b: u8, reserve_a: u128, reserve_b: u128) -> Pool {
    Pool {
        chain_id: 1,
        address: Address::repeat_byte(address),
        token0: token(a),
        token1: token(b),
        fee_pips: 3_000,
        state: PoolState::ConstantProduct(Reserves {
            reserve0: reserve_a,
            reserve1: reserve_b,
        }),
    }
}

fn router_with(pools: Vec<Pool>, config: RouterConfig) -> Router {
    let registry = Arc::new(PoolRegistry::new(
        Arc::new(StaticPoolSource::new()),
        RegistryConfig::default(),
        vec![(1, Vec::new())],
    ));
    registry.publish(1, pools).unwrap();
    Router::new(registry, config)
}

fn router(pools: Vec<Pool>) -> Router {
    router_with(pools, RouterConfig::default())
}

fn request(token_in: u8, token_out: u8, amount: u128, trade_type: TradeType) -> TradeRequest {
    TradeRequest {
        chain_id: 1,
        token_in: token(token_in),
        token_out: token(token_out),
        amount,
        trade_type,
        slippage_bps: 50,
        deadline: u64::MAX,
        wallet: Address::repeat_byte(0x99),
        limit_amount: None,
    }
}

const USDC_UNIT: u128 = 1_000_000;
const ETH_UNIT: u128 = 1_000_000_000_000_000_000;

#[tokio::test]
async fn scenario_a_single_direct_pool() {
    let router = router(vec![pool(0xa0, USDC, WETH, 1_000_000 * USDC_UNIT, 500 * ETH_UNIT)]);
    let req = request(USDC, WETH, 1_000 * USDC_UNIT, TradeType::ExactIn);

    let quote = router.compute_route(&req).await.unwrap();
    let expected = amm::amount_out(1_000_000 * USDC_UNIT, 500 * ETH_UNIT, 3_000, 1_000 * USDC_UNIT).unwrap();

    assert_eq!(quote.route.splits.len(), 1);
    assert_eq!(quote.route.amount_out, expected);
    // roughly 0.498 ETH after the 30 bps fee
    assert!(expected > 497 * ETH_UNIT / 1_000 && expected < 500 * ETH_UNIT / 1_000);
    assert_eq!(quote.min_output, Some(apply_bps_down(expected, 50)));
    assert_eq!(quote.snapshot_version, 1);
}

#[tokio::test]
async fn scenario_b_two_half_pools_split_evenly() {
    let half_usdc = 500_000 * USDC_UNIT;
    let half_eth = 250 * ETH_UNIT;
    let router = router(vec![
        pool(0xa0, USDC, WETH, half_usdc, half_eth),
        pool(0xb0, USDC, WETH, half_usdc, half_eth),
    ]);
    let amount = 100_000 * USDC_UNIT;
    let quote = router
        .compute_route(&request(USDC, WETH, amount, TradeType::ExactIn))
        .await
        .unwrap();

    assert_eq!(quote.route.splits.len(), 2);
    for split in &quote.route.splits {
        assert!(split.amount * 10 >= amount * 4 && split.amount * 10 <= amount * 6);
    }
    let single = amm::amount_out(half_usdc, half_eth, 3_000, amount).unwrap();
    assert!(quote.route.amount_out > single);
}

#[tokio::test]
async fn scenario_c_same_token_is_invalid() {
    let router = router(vec![pool(0xa0, USDC, WETH, 1_000 * USDC_UNIT, ETH_UNIT)]);
    let err = router
        .compute_route(&request(USDC, USDC, USDC_UNIT, TradeType::ExactIn))
        .await
        .unwrap_err();
    assert!(matches!(err, RoutingError::InvalidRequest(_)));
}

#[tokio::test]
async fn scenario_d_amount_beyond_reachable_liquidity() {
    let router = router(vec![
        pool(0xa0, USDC, WETH, 1_000_000 * USDC_UNIT, 300 * ETH_UNIT),
        pool(0xb0, USDC, WETH, 1_000_000 * USDC_UNIT, 200 * ETH_UNIT),
    ]);
    let err = router
        .compute_route(&request(USDC, WETH, 600 * ETH_UNIT, TradeType::ExactOut))
        .await
        .unwrap_err();
    assert!(matches!(err, RoutingError::InsufficientLiquidity { .. }));
}

fn three_token_market() -> Vec<Pool> {
    vec![
        pool(0xa0, USDC, WETH, 2_000_000 * USDC_UNIT, 1_000 * ETH_UNIT),
        pool(0xa1, USDC, DAI, 5_000_000 * USDC_UNIT, 5_000_000 * ETH_UNIT),
        pool(0xa2, DAI, WETH, 4_000_000 * ETH_UNIT, 2_000 * ETH_UNIT),
        pool(0xa3, USDC, WETH, 800_000 * USDC_UNIT, 400 * ETH_UNIT),
    ]
}

#[tokio::test]
async fn split_amounts_sum_exactly() {
    let router = router(three_token_market());
    for (amount, trade_type) in [
        (250_003 * USDC_UNIT + 17, TradeType::ExactIn),
        (97 * ETH_UNIT + 5, TradeType::ExactOut),
    ] {
        let quote = router
            .compute_route(&request(USDC, WETH, amount, trade_type))
            .await
            .unwrap();
        assert_eq!(quote.route.allocated(), amount);
        assert!(quote.route.amount_out > 0);
        match trade_type {
            TradeType::ExactIn => assert_eq!(quote.route.amount_in, amount),
            TradeType::ExactOut => {
                assert_eq!(quote.route.amount_out, amount);
                assert!(quote.max_input.unwrap() >= quote.route.amount_in);
            }
        }
        let sizes: Vec<u128> = quote.route.splits.iter().map(|s| s.amount).collect();
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]), "splits ordered by size");
    }
}

#[tokio::test]
async fn same_snapshot_same_route() {
    let router = router(three_token_market());
    let snapshot = router.registry().snapshot(1);
    let req = request(USDC, WETH, 400_000 * USDC_UNIT, TradeType::ExactIn);

    let first = router.compute_route_on(&snapshot, &req).await.unwrap();
    let second = router.compute_route_on(&snapshot, &req).await.unwrap();
    assert_eq!(first.route, second.route);
    assert_eq!(first.min_output, second.min_output);
}

#[tokio::test]
async fn minimum_output_honors_slippage() {
    let router = router(three_token_market());
    for slippage_bps in [0, 1, 50, 333, 10_000] {
        let mut req = request(USDC, WETH, 12_345 * USDC_UNIT, TradeType::ExactIn);
        req.slippage_bps = slippage_bps;
        let quote = router.compute_route(&req).await.unwrap();
        let bound = quote.min_output.unwrap();
        assert!(bound <= quote.route.amount_out);
        assert_eq!(bound, quote.route.amount_out * u128::from(10_000 - slippage_bps) / 10_000);
    }
}

#[tokio::test]
async fn passed_deadline_runs_no_simulations() {
    let router = router(three_token_market());
    let mut req = request(USDC, WETH, 1_000 * USDC_UNIT, TradeType::ExactIn);
    req.deadline = 1;

    let err = router.compute_route(&req).await.unwrap_err();
    assert!(matches!(err, RoutingError::DeadlineExceeded { deadline: 1, .. }));
    let stats = router.get_stats();
    assert_eq!(stats.simulations, 0);
    assert_eq!(stats.failed_routes, 1);
}

#[tokio::test]
async fn routes_never_revisit_a_token() {
    // triangle plus a direct pool; every split must be a simple path
    let router = router_with(
        three_token_market(),
        RouterConfig {
            max_hops: 4,
            ..RouterConfig::default()
        },
    );
    let quote = router
        .compute_route(&request(USDC, WETH, 900_000 * USDC_UNIT, TradeType::ExactIn))
        .await
        .unwrap();
    for split in &quote.route.splits {
        let mut seen = BTreeSet::new();
        seen.insert(split.hops[0].token_in.address);
        for hop in &split.hops {
            assert!(seen.insert(hop.token_out.address), "cycle through {}", hop.token_out);
        }
        assert_eq!(split.hops.last().unwrap().token_out, token(WETH));
    }
}

#[tokio::test]
async fn limit_amount_and_impact_ceiling() {
    let router = router_with(
        vec![pool(0xa0, USDC, WETH, 1_000_000 * USDC_UNIT, 500 * ETH_UNIT)],
        RouterConfig {
            max_price_impact_bps: Some(100.0),
            ..RouterConfig::default()
        },
    );

    let mut req = request(USDC, WETH, 1_000 * USDC_UNIT, TradeType::ExactIn);
    req.limit_amount = Some(ETH_UNIT / 2);
    assert!(matches!(
        router.compute_route(&req).await,
        Err(RoutingError::SlippageExceeded { .. })
    ));

    // 5% of the pool moves the price well beyond 100 bps
    let whale = request(USDC, WETH, 50_000 * USDC_UNIT, TradeType::ExactIn);
    assert!(matches!(
        router.compute_route(&whale).await,
        Err(RoutingError::SlippageExceeded { .. })
    ));
}

#[tokio::test]
async fn denied_wallet_gets_no_quote() {
    let wallet = Address::repeat_byte(0x99);
    let router = router_with(
        three_token_market(),
        RouterConfig {
            denied_wallets: vec![wallet],
            ..RouterConfig::default()
        },
    );
    let err = router
        .compute_route(&request(USDC, WETH, USDC_UNIT, TradeType::ExactIn))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
}

#[tokio::test]
async fn unreachable_pair_has_no_route() {
    let router = router(vec![pool(0xa0, USDC, DAI, 1_000 * USDC_UNIT, 1_000 * ETH_UNIT)]);
    let err = router
        .compute_route(&request(USDC, WETH, USDC_UNIT, TradeType::ExactIn))
        .await
        .unwrap_err();
    assert!(matches!(err, RoutingError::NoRouteFound { max_hops: 3, .. }));
}

#[tokio::test]
async fn splits_never_share_a_pool() {
    // two USDC->DAI pools both exit through one DAI->WETH pool holding 100 ETH
    let router = router(vec![
        pool(0xa1, USDC, DAI, 5_000_000 * USDC_UNIT, 5_000_000 * ETH_UNIT),
        pool(0xa4, USDC, DAI, 5_000_000 * USDC_UNIT, 5_000_000 * ETH_UNIT),
        pool(0xa2, DAI, WETH, 200_000 * ETH_UNIT, 100 * ETH_UNIT),
    ]);

    let err = router
        .compute_route(&request(USDC, WETH, 150 * ETH_UNIT, TradeType::ExactOut))
        .await
        .unwrap_err();
    assert!(matches!(err, RoutingError::InsufficientLiquidity { .. }));

    let quote = router
        .compute_route(&request(USDC, WETH, 1_000_000 * USDC_UNIT, TradeType::ExactIn))
        .await
        .unwrap();
    assert!(quote.route.amount_out < 100 * ETH_UNIT);
    let mut pools: Vec<Address> = quote.route.splits.iter().flat_map(|split| split.pools()).collect();
    let total = pools.len();
    pools.sort();
    pools.dedup();
    assert_eq!(pools.len(), total, "a pool appears in more than one split");
}
