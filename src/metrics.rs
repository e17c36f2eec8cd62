// Metrics and observability module
// This file handles collection of upstream call, registry refresh and
// route computation metrics for the router
//
// Numan Thabit 2025 Nov

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge_vec, CounterVec,
    HistogramVec, IntCounter, IntGaugeVec,
};

pub static REQ_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "router_upstream_latency_seconds",
        "latency for upstream calls",
        &["service", "method"]
    )
    .unwrap()
});

pub static REQ_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "router_upstream_errors_total",
        "errors by upstream",
        &["service", "method"]
    )
    .unwrap()
});

pub static REFRESH_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "router_registry_refresh_seconds",
        "pool registry refresh latency including retries",
        &["chain"]
    )
    .unwrap()
});

pub static REFRESH_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "router_registry_refresh_errors_total",
        "pool registry refreshes that exhausted retries",
        &["chain"]
    )
    .unwrap()
});

pub static SNAPSHOT_STALENESS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "router_snapshot_consecutive_failures",
        "consecutive failed refreshes behind the served snapshot",
        &["chain"]
    )
    .unwrap()
});

pub static ROUTE_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "router_compute_route_seconds",
        "route computation latency",
        &["trade_type"]
    )
    .unwrap()
});

pub static ROUTE_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "router_compute_route_errors_total",
        "failed route computations by error kind",
        &["kind"]
    )
    .unwrap()
});

pub static SIMULATIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("router_path_simulations_total", "path simulations run").unwrap()
});
