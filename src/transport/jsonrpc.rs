// JSON-RPC transport layer implementation
// This file implements the EVM JSON-RPC pool source: batched eth_call reads
// of pair reserves and concentrated-liquidity slot0/liquidity/ticks
//
// Numan Thabit 2025 Nov

use super::{PoolSource, PoolSpec};
use crate::errors::SourceError;
use crate::metrics::{REQ_ERRORS, REQ_LATENCY};
use crate::model::ChainId;
use crate::quant::u256_to_f64;
use crate::venues::{ConcentratedState, Pool, PoolKind, PoolState, Reserves, TickLiquidity};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

const GET_RESERVES: [u8; 4] = [0x09, 0x02, 0xf1, 0xac];
const SLOT0: [u8; 4] = [0x38, 0x50, 0xc7, 0xbd];
const LIQUIDITY: [u8; 4] = [0x1a, 0x68, 0x65, 0x02];
const TICKS: [u8; 4] = [0xf3, 0x0d, 0xba, 0x93];

const Q96: f64 = 79_228_162_514_264_337_593_543_950_336.0;

#[derive(Debug, Clone)]
pub struct JsonRpcPoolSource {
    http: Client,
    endpoints: HashMap<ChainId, Url>,
    /// Tick spacings read on each side of the current tick.
    tick_window: i32,
}

impl JsonRpcPoolSource {
    pub fn new(endpoints: HashMap<ChainId, Url>, tick_window: u32, timeout: Duration) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| SourceError::Transport(format!("build http client: {e}")))?;
        Ok(Self {
            http,
            endpoints,
            tick_window: i32::try_from(tick_window).unwrap_or(i32::MAX),
        })
    }

    pub fn endpoint(&self, chain_id: ChainId) -> Option<&Url> {
        self.endpoints.get(&chain_id)
    }

    /// Send one JSON-RPC batch of `eth_call`s; results come back in call order.
    async fn eth_call_batch(&self, url: &Url, calls: &[(Address, Vec<u8>)]) -> Result<Vec<Vec<u8>>, SourceError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let _timer = REQ_LATENCY
            .with_label_values(&["jsonrpc", "eth_call_batch"])
            .start_timer();

        let payload: Vec<Value> = calls
            .iter()
            .enumerate()
            .map(|(id, (to, data))| {
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "method": "eth_call",
                    "params": [
                        { "to": to.to_string(), "data": format!("0x{}", hex::encode(data)) },
                        "latest"
                    ]
                })
            })
            .collect();

        let resp = self
            .http
            .post(url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                REQ_ERRORS.with_label_values(&["jsonrpc", "eth_call_batch"]).inc();
                SourceError::Transport(format!("jsonrpc send: {e}"))
            })?;
        if !resp.status().is_success() {
            REQ_ERRORS.with_label_values(&["jsonrpc", "eth_call_batch"]).inc();
            return Err(SourceError::Provider(format!("http {}", resp.status())));
        }
        let body: Vec<RpcResponse> = resp
            .json()
            .await
            .map_err(|e| SourceError::Transport(format!("json parse: {e}")))?;

        let mut results: Vec<Option<Vec<u8>>> = vec![None; calls.len()];
        for entry in body {
            if let Some(err) = entry.error {
                REQ_ERRORS.with_label_values(&["jsonrpc", "eth_call_batch"]).inc();
                return Err(SourceError::Provider(err.to_string()));
            }
            let slot = results
                .get_mut(entry.id)
                .ok_or_else(|| SourceError::Decode(format!("unexpected response id {}", entry.id)))?;
            let raw = entry
                .result
                .ok_or_else(|| SourceError::Decode(format!("missing result for id {}", entry.id)))?;
            *slot = Some(decode_hex(&raw)?);
        }
        results
            .into_iter()
            .enumerate()
            .map(|(id, result)| result.ok_or_else(|| SourceError::Decode(format!("no response for id {id}"))))
            .collect()
    }
}

#[async_trait]
impl PoolSource for JsonRpcPoolSource {
    async fn fetch_pools(&self, chain_id: ChainId, specs: &[PoolSpec]) -> Result<Vec<Pool>, SourceError> {
        let url = self.endpoints.get(&chain_id).ok_or(SourceError::UnknownChain(chain_id))?;

        let mut calls = Vec::new();
        for spec in specs {
            match spec.kind {
                PoolKind::ConstantProduct => calls.push((spec.address, GET_RESERVES.to_vec())),
                PoolKind::Concentrated => {
                    calls.push((spec.address, SLOT0.to_vec()));
                    calls.push((spec.address, LIQUIDITY.to_vec()));
                }
            }
        }
        let results = self.eth_call_batch(url, &calls).await?;

        let mut pools = Vec::with_capacity(specs.len());
        let mut pending_ticks = Vec::new();
        let mut cursor = results.iter();
        for spec in specs {
            let state = match spec.kind {
                PoolKind::ConstantProduct => {
                    let data = next_result(&mut cursor)?;
                    PoolState::ConstantProduct(Reserves {
                        reserve0: word_u128(data, 0)?,
                        reserve1: word_u128(data, 1)?,
                    })
                }
                PoolKind::Concentrated => {
                    let slot0 = next_result(&mut cursor)?;
                    let liquidity = next_result(&mut cursor)?;
                    let tick = word_i32(slot0, 1)?;
                    let spacing = spec.tick_spacing.unwrap_or(1).max(1);
                    let window = tick_range(tick, spacing, self.tick_window);
                    let min_loaded_tick = window.first().copied().unwrap_or(tick);
                    let max_loaded_tick = window.last().copied().unwrap_or(tick);
                    pending_ticks.push((pools.len(), window));
                    PoolState::Concentrated(ConcentratedState {
                        sqrt_price: u256_to_f64(word(slot0, 0)?) / Q96,
                        tick,
                        liquidity: word_u128(liquidity, 0)?,
                        tick_spacing: spacing,
                        ticks: Vec::new(),
                        min_loaded_tick,
                        max_loaded_tick,
                    })
                }
            };
            pools.push(Pool {
                chain_id,
                address: spec.address,
                token0: spec.token0.clone(),
                token1: spec.token1.clone(),
                fee_pips: spec.fee_pips,
                state,
            });
        }

        let mut tick_calls = Vec::new();
        for (index, ticks) in &pending_ticks {
            let address = pools[*index].address;
            tick_calls.extend(ticks.iter().map(|tick| (address, encode_int24_call(TICKS, *tick))));
        }
        let tick_results = self.eth_call_batch(url, &tick_calls).await?;
        let mut cursor = tick_results.iter();
        for (index, ticks) in pending_ticks {
            let mut initialized = Vec::new();
            for tick in ticks {
                let data = next_result(&mut cursor)?;
                if word_u128(data, 0)? == 0 {
                    continue;
                }
                initialized.push(TickLiquidity {
                    index: tick,
                    liquidity_net: word_i128(data, 1)?,
                });
            }
            if let PoolState::Concentrated(state) = &mut pools[index].state {
                state.ticks = initialized;
            }
        }

        debug!(chain_id, pools = pools.len(), "fetched pool state over json-rpc");
        Ok(pools)
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: usize,
    result: Option<String>,
    error: Option<Value>,
}

fn tick_range(tick: i32, spacing: i32, window: i32) -> Vec<i32> {
    let base = tick.div_euclid(spacing) * spacing;
    (-window..=window)
        .filter_map(|offset| offset.checked_mul(spacing).and_then(|delta| base.checked_add(delta)))
        .collect()
}

fn next_result<'a>(cursor: &mut std::slice::Iter<'a, Vec<u8>>) -> Result<&'a [u8], SourceError> {
    cursor
        .next()
        .map(Vec::as_slice)
        .ok_or_else(|| SourceError::Decode("fewer results than calls".into()))
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, SourceError> {
    hex::decode(raw.trim_start_matches("0x")).map_err(|e| SourceError::Decode(format!("hex: {e}")))
}

fn encode_int24_call(selector: [u8; 4], value: i32) -> Vec<u8> {
    let mut data = selector.to_vec();
    let fill = if value < 0 { 0xff } else { 0x00 };
    data.extend(std::iter::repeat(fill).take(28));
    data.extend(value.to_be_bytes());
    data
}

fn word(data: &[u8], index: usize) -> Result<U256, SourceError> {
    let start = index * 32;
    data.get(start..start + 32)
        .map(U256::from_be_slice)
        .ok_or_else(|| SourceError::Decode(format!("missing abi word {index} in {} bytes", data.len())))
}

fn word_u128(data: &[u8], index: usize) -> Result<u128, SourceError> {
    let value = word(data, index)?;
    u128::try_from(value).map_err(|_| SourceError::Decode(format!("abi word {index} exceeds u128")))
}

/// Low 128 bits of a sign-extended ABI word.
fn word_i128(data: &[u8], index: usize) -> Result<i128, SourceError> {
    let limbs = *word(data, index)?.as_limbs();
    Ok((u128::from(limbs[1]) << 64 | u128::from(limbs[0])) as i128)
}

fn word_i32(data: &[u8], index: usize) -> Result<i32, SourceError> {
    let limbs = *word(data, index)?.as_limbs();
    i32::try_from(limbs[0] as i64).map_err(|_| SourceError::Decode(format!("abi word {index} exceeds int24")))
}
