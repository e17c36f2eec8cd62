// Pool registry and snapshot publication
//
// Holds one immutable pool snapshot per chain behind an ArcSwap. Refresh
// fetches through the injected PoolSource with bounded retries and swaps the
// snapshot in atomically; readers never block and never see partial state.
//
// Numan Thabit 2025 Nov

use crate::config::RegistryConfig;
use crate::errors::{RoutingError, SourceError};
use crate::metrics::{REFRESH_ERRORS, REFRESH_LATENCY, SNAPSHOT_STALENESS};
use crate::model::ChainId;
use crate::transport::{PoolSource, PoolSpec};
use crate::venues::Pool;
use arc_swap::ArcSwap;
use backoff::{future::retry_notify, ExponentialBackoff};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consistent view of every watched pool on one chain.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub chain_id: ChainId,
    /// Monotonic per chain; 0 means nothing was ever published.
    pub version: u64,
    pub refreshed_at: Option<SystemTime>,
    pools: Vec<Arc<Pool>>,
}

impl PoolSnapshot {
    pub fn empty(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            version: 0,
            refreshed_at: None,
            pools: Vec::new(),
        }
    }

    pub fn new(chain_id: ChainId, version: u64, pools: Vec<Arc<Pool>>) -> Self {
        let mut pools = pools;
        pools.sort_by(|a, b| a.address.cmp(&b.address));
        Self {
            chain_id,
            version,
            refreshed_at: Some(SystemTime::now()),
            pools,
        }
    }

    /// Pools ordered by address.
    pub fn pools(&self) -> &[Arc<Pool>] {
        &self.pools
    }

    pub fn age(&self) -> Option<Duration> {
        self.refreshed_at
            .map(|at| SystemTime::now().duration_since(at).unwrap_or_default())
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.age().is_some_and(|age| age <= max_age)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Staleness {
    pub consecutive_failures: u64,
    pub age: Option<Duration>,
    pub stale: bool,
}

struct ChainSlot {
    current: ArcSwap<PoolSnapshot>,
    watchlist: Vec<PoolSpec>,
    consecutive_failures: AtomicU64,
}

pub struct PoolRegistry {
    chains: BTreeMap<ChainId, ChainSlot>,
    source: Arc<dyn PoolSource>,
    config: RegistryConfig,
}

impl PoolRegistry {
    pub fn new(
        source: Arc<dyn PoolSource>,
        config: RegistryConfig,
        watchlists: impl IntoIterator<Item = (ChainId, Vec<PoolSpec>)>,
    ) -> Self {
        let chains = watchlists
            .into_iter()
            .map(|(chain_id, watchlist)| {
                let slot = ChainSlot {
                    current: ArcSwap::from_pointee(PoolSnapshot::empty(chain_id)),
                    watchlist,
                    consecutive_failures: AtomicU64::new(0),
                };
                (chain_id, slot)
            })
            .collect();
        Self { chains, source, config }
    }

    pub fn chains(&self) -> impl Iterator<Item = ChainId> + '_ {
        self.chains.keys().copied()
    }

    /// Latest published snapshot. Lock-free; unknown chains read as empty.
    pub fn snapshot(&self, chain_id: ChainId) -> Arc<PoolSnapshot> {
        match self.chains.get(&chain_id) {
            Some(slot) => slot.current.load_full(),
            None => Arc::new(PoolSnapshot::empty(chain_id)),
        }
    }

    /// Install pool state directly, bumping the chain's version.
    pub fn publish(&self, chain_id: ChainId, pools: Vec<Pool>) -> Result<u64, RoutingError> {
        let slot = self.slot(chain_id)?;
        let pools: Vec<Arc<Pool>> = pools.into_iter().map(Arc::new).collect();
        let previous = slot
            .current
            .rcu(|current| Arc::new(PoolSnapshot::new(chain_id, current.version + 1, pools.clone())));
        let version = previous.version + 1;
        debug!(chain_id, version, pools = pools.len(), "published pool snapshot");
        Ok(version)
    }

    /// Fetch the watch list and publish it. On failure the previous snapshot
    /// stays authoritative and the staleness counter grows.
    #[tracing::instrument(skip_all, fields(chain_id = chain_id))]
    pub async fn refresh(&self, chain_id: ChainId) -> Result<u64, RoutingError> {
        let slot = self.slot(chain_id)?;
        let chain_label = chain_id.to_string();
        let _timer = REFRESH_LATENCY.with_label_values(&[&chain_label]).start_timer();

        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(self.config.backoff_initial_ms),
            max_interval: Duration::from_millis(self.config.backoff_max_ms),
            max_elapsed_time: Some(Duration::from_millis(self.config.backoff_max_elapsed_ms)),
            multiplier: 2.0,
            ..Default::default()
        };

        let fetched = retry_notify(
            backoff,
            || {
                let source = Arc::clone(&self.source);
                let specs = slot.watchlist.clone();
                async move {
                    source.fetch_pools(chain_id, &specs).await.map_err(|err| {
                        if err.is_transient() {
                            backoff::Error::transient(err)
                        } else {
                            backoff::Error::permanent(err)
                        }
                    })
                }
            },
            |err: SourceError, wait: Duration| {
                warn!(chain_id, error = %err, retry_in_ms = wait.as_millis() as u64, "pool fetch failed; retrying");
            },
        )
        .await;

        match fetched {
            Ok(pools) => {
                let count = pools.len();
                let version = self.publish(chain_id, pools)?;
                slot.consecutive_failures.store(0, Ordering::Relaxed);
                SNAPSHOT_STALENESS.with_label_values(&[&chain_label]).set(0);
                info!(chain_id, version, pools = count, "pool snapshot refreshed");
                Ok(version)
            }
            Err(err) => {
                let failures = slot.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                REFRESH_ERRORS.with_label_values(&[&chain_label]).inc();
                SNAPSHOT_STALENESS
                    .with_label_values(&[&chain_label])
                    .set(i64::try_from(failures).unwrap_or(i64::MAX));
                warn!(
                    chain_id,
                    failures,
                    version = slot.current.load().version,
                    error = %err,
                    "pool refresh failed; keeping previous snapshot"
                );
                Err(err.into())
            }
        }
    }

    pub fn staleness(&self, chain_id: ChainId) -> Staleness {
        let Some(slot) = self.chains.get(&chain_id) else {
            return Staleness {
                consecutive_failures: 0,
                age: None,
                stale: true,
            };
        };
        let snapshot = slot.current.load();
        let consecutive_failures = slot.consecutive_failures.load(Ordering::Relaxed);
        Staleness {
            consecutive_failures,
            age: snapshot.age(),
            stale: snapshot.version == 0 || consecutive_failures >= self.config.stale_after_failures,
        }
    }

    /// Spawn one periodic refresher per chain.
    pub fn start(self: Arc<Self>) -> RefreshHandle {
        let cancel = CancellationToken::new();
        let period = self.config.refresh_interval();
        let tasks = self
            .chains()
            .map(|chain_id| {
                let registry = Arc::clone(&self);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let mut ticker = interval_at(Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = ticker.tick() => {}
                        }
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            // failures are logged and counted inside refresh
                            _ = registry.refresh(chain_id) => {}
                        }
                    }
                    debug!(chain_id, "pool refresher stopped");
                })
            })
            .collect();
        info!(period_ms = period.as_millis() as u64, "pool refreshers started");
        RefreshHandle { cancel, tasks }
    }

    fn slot(&self, chain_id: ChainId) -> Result<&ChainSlot, RoutingError> {
        self.chains
            .get(&chain_id)
            .ok_or_else(|| RoutingError::InvalidRequest(format!("chain {chain_id} is not configured")))
    }
}

/// Owns the background refreshers; dropping it without `stop` leaves them running.
pub struct RefreshHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "pool refresher task failed");
            }
        }
    }
}
