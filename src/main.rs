use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use ultra_router::config::AppConfig;
use ultra_router::registry::{PoolRegistry, RefreshHandle};
use ultra_router::router::Router;
use ultra_router::transport::jsonrpc::JsonRpcPoolSource;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal router error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration")?;
    if config.chains.is_empty() {
        warn!("no chains configured; the registry will serve empty snapshots");
    }

    let source = JsonRpcPoolSource::new(
        config.endpoints(),
        config.registry.tick_window,
        Duration::from_millis(config.registry.rpc_timeout_ms),
    )
    .context("build json-rpc pool source")?;

    let registry = Arc::new(PoolRegistry::new(
        Arc::new(source),
        config.registry.clone(),
        config.watchlists(),
    ));

    // Initial snapshots; failures leave the chain empty until the next tick.
    for chain in &config.chains {
        match registry.refresh(chain.chain_id).await {
            Ok(version) => info!(
                chain_id = chain.chain_id,
                endpoint = %chain.rpc_endpoint,
                pools = chain.pools.len(),
                version,
                "initial pool snapshot loaded"
            ),
            Err(err) => warn!(
                chain_id = chain.chain_id,
                error = %err,
                "initial pool snapshot failed; continuing"
            ),
        }
    }

    let refresher = Arc::clone(&registry).start();
    let router = Arc::new(Router::new(Arc::clone(&registry), config.router.clone()));

    let app = App {
        config: Arc::new(config),
        registry,
        router,
        refresher,
    };
    app.run().await
}

struct App {
    config: Arc<AppConfig>,
    registry: Arc<PoolRegistry>,
    router: Arc<Router>,
    refresher: RefreshHandle,
}

impl App {
    async fn run(self) -> Result<()> {
        info!(
            chains = self.config.chains.len(),
            refresh_ms = self.config.registry.refresh_interval_ms,
            max_hops = self.config.router.max_hops,
            max_splits = self.config.router.max_splits,
            "smart order router online"
        );

        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.heartbeat_seconds.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for chain_id in self.registry.chains() {
                        let snapshot = self.registry.snapshot(chain_id);
                        let staleness = self.registry.staleness(chain_id);
                        info!(
                            chain_id,
                            version = snapshot.version,
                            pools = snapshot.pools().len(),
                            age_secs = ?snapshot.age().map(|age| age.as_secs()),
                            consecutive_failures = staleness.consecutive_failures,
                            stale = staleness.stale,
                            "snapshot heartbeat"
                        );
                    }

                    let stats = self.router.get_stats();
                    debug!(
                        total_requests = stats.total_requests,
                        successful = stats.successful_routes,
                        failed = stats.failed_routes,
                        simulations = stats.simulations,
                        success_rate = stats.success_rate,
                        "router statistics"
                    );
                }
                res = tokio::signal::ctrl_c() => {
                    if let Err(err) = res {
                        warn!(error = %err, "ctrl_c listener error");
                    }
                    info!("Shutdown signal received, stopping refreshers");
                    break;
                }
            }
        }

        self.refresher.stop().await;
        Ok(())
    }
}

fn init_tracing() -> Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
