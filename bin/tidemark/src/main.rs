//! Tidemark - Tendermint block and transaction sync service.
//!
//! # Usage
//!
//! ```bash
//! # Start with default config (iris profile, local node)
//! tidemark
//!
//! # Start with environment overrides
//! DATABASE_URL=postgres://localhost/tidemark \
//! NODE_URLS=http://10.0.0.1:26657,http://10.0.0.2:26657 \
//! CHAIN_PROFILE=cosmos tidemark
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use tidemark_core::error::IndexerError;
use tidemark_core::metrics::init_metrics;
use tidemark_core::pool::{NodePool, PoolConfig};
use tidemark_core::ports::NodeConnector;
use tidemark_core::services::{IndexerConfig, IngestionPipeline};
use tidemark_storage::{Database, DatabaseConfig, PgRepositories};
use tidemark_tendermint::TendermintConnectionManager;
use tidemark_transforms::{PROFILE_NAMES, profile_by_name};

/// Tidemark CLI - Tendermint ledger indexer.
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(about = "Tidemark - Tendermint block and transaction sync service")]
#[command(version)]
struct Cli {
    /// Tendermint RPC endpoints, comma separated.
    #[arg(
        long,
        env = "NODE_URLS",
        value_delimiter = ',',
        default_value = "http://127.0.0.1:26657"
    )]
    node_urls: Vec<Url>,

    /// PostgreSQL database URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost/tidemark"
    )]
    database_url: String,

    /// Node connections opened at startup.
    #[arg(long, env = "POOL_INIT_SIZE", default_value = "50")]
    pool_init_size: usize,

    /// Maximum node connections lent at once.
    #[arg(long, env = "POOL_MAX_SIZE", default_value = "100")]
    pool_max_size: usize,

    /// Start from this height instead of the checkpoint. Zero is ignored.
    #[arg(long, env = "CHAIN_BLOCK_RESET_HEIGHT")]
    reset_height: Option<u64>,

    /// Chain profile: iris or cosmos.
    #[arg(long, env = "CHAIN_PROFILE", default_value = "iris", value_parser = parse_profile)]
    chain_profile: String,

    /// Id of the sync task checkpoint.
    #[arg(long, env = "SYNC_TASK_ID", default_value = "sync_task")]
    sync_task_id: String,

    /// Milliseconds between chain head queries while waiting for a block.
    #[arg(
        long,
        env = "POLL_INTERVAL_MS",
        default_value = "1000",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    poll_interval_ms: u64,

    /// Node request timeout in seconds.
    #[arg(long, env = "NODE_TIMEOUT_SECS", default_value = "30")]
    node_timeout_secs: u64,

    /// Event attributes are base64 encoded (Tendermint 0.34 and older).
    #[arg(long, env = "BASE64_EVENT_ATTRIBUTES")]
    base64_event_attributes: bool,

    /// Prometheus metrics port.
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Run database migrations and exit.
    #[arg(long)]
    migrate_only: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            task_id: self.sync_task_id.clone(),
            reset_height: self.reset_height,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            initial_size: self.pool_init_size,
            max_size: self.pool_max_size,
        }
    }
}

/// Validate the chain profile name.
fn parse_profile(s: &str) -> Result<String, String> {
    let name = s.to_lowercase();
    if PROFILE_NAMES.contains(&name.as_str()) {
        Ok(name)
    } else {
        Err(format!(
            "Invalid chain profile '{}'. Use one of: {}.",
            s,
            PROFILE_NAMES.join(", ")
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    // Prometheus metrics exporter (optional - failures don't crash the app)
    let metrics_enabled = match format!("0.0.0.0:{}", cli.metrics_port).parse::<std::net::SocketAddr>() {
        Ok(metrics_addr) => {
            match PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
            {
                Ok(()) => {
                    init_metrics();
                    true
                }
                Err(e) => {
                    warn!("⚠️  Failed to start metrics exporter: {}. Continuing without metrics.", e);
                    false
                }
            }
        }
        Err(e) => {
            warn!("⚠️  Invalid metrics address: {}. Continuing without metrics.", e);
            false
        }
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 🚀 STARTUP
    // ─────────────────────────────────────────────────────────────────────────
    info!("🚀 Starting Tidemark");
    debug!(nodes = ?cli.node_urls.iter().map(Url::as_str).collect::<Vec<_>>(), "Node endpoints");
    debug!(database_url = %mask_password(&cli.database_url), "Database endpoint");

    let indexer_config = cli.indexer_config();
    let pool_config = cli.pool_config();
    pool_config.validate().context("Invalid node pool configuration")?;
    let profile = profile_by_name(&cli.chain_profile)
        .with_context(|| format!("Unknown chain profile '{}'", cli.chain_profile))?;

    // ─────────────────────────────────────────────────────────────────────────
    // 🗄️ DATABASE
    // ─────────────────────────────────────────────────────────────────────────
    info!("🗄️  Connecting to database...");
    let db = Database::connect(&DatabaseConfig::for_indexer(&cli.database_url))
        .await
        .context("Failed to connect to database")?;

    db.migrate().await.context("Failed to run migrations")?;
    db.verify_schema().await.context("Database schema is incomplete")?;
    info!("🗄️  Database ready (migrations applied)");

    if cli.migrate_only {
        info!("🛑 --migrate-only flag set, exiting");
        db.close().await;
        return Ok(());
    }

    let db = Arc::new(db);
    let repositories = Arc::new(PgRepositories::new(db.clone()));

    // ─────────────────────────────────────────────────────────────────────────
    // 📡 NODE CONNECTIONS
    // ─────────────────────────────────────────────────────────────────────────
    info!(
        nodes = cli.node_urls.len(),
        initial = pool_config.initial_size,
        max = pool_config.max_size,
        "📡 Opening node connections..."
    );
    let manager = TendermintConnectionManager::new(
        cli.node_urls.clone(),
        Duration::from_secs(cli.node_timeout_secs),
        cli.base64_event_attributes,
    )
    .context("Invalid node configuration")?;
    let pool = Arc::new(
        NodePool::new(manager, pool_config)
            .await
            .context("Failed to open node connections")?,
    );

    // The sequencer tolerates an unreachable node, so this is informational
    let head = match pool.get().await {
        Ok(conn) => conn.chain_head_height().await,
        Err(e) => Err(e),
    };
    match head {
        Ok(head) => info!(head, profile = %profile.name, "🔗 Chain connected"),
        Err(e) => warn!(error = %e, "⚠️  Chain head unavailable, will keep polling"),
    }

    let pipeline = IngestionPipeline::new(indexer_config, pool.clone(), repositories, profile);

    // ─────────────────────────────────────────────────────────────────────────
    // ⚡ SERVICES START
    // ─────────────────────────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut indexer_handle = tokio::spawn(
        async move { pipeline.run(shutdown_rx).await }.instrument(info_span!("indexer")),
    );

    // ─────────────────────────────────────────────────────────────────────────
    // ✅ READY
    // ─────────────────────────────────────────────────────────────────────────
    info!("✅ Tidemark ready");
    if metrics_enabled {
        info!(
            "   📊 Metrics:  http://localhost:{}/metrics",
            cli.metrics_port
        );
    } else {
        info!("   📊 Metrics:  disabled");
    }
    info!("   Press Ctrl+C to stop");

    let outcome = tokio::select! {
        _ = shutdown_signal() => {
            // ─────────────────────────────────────────────────────────────────
            // 🛑 SHUTDOWN
            // ─────────────────────────────────────────────────────────────────
            info!("🛑 Shutting down...");
            let _ = shutdown_tx.send(true);

            match tokio::time::timeout(Duration::from_secs(30), &mut indexer_handle).await {
                Ok(joined) => {
                    debug!("Indexer stopped");
                    joined
                }
                Err(_) => {
                    warn!("⚠️  Indexer shutdown timed out");
                    indexer_handle.abort();
                    Ok(Err(IndexerError::ShutdownRequested))
                }
            }
        }
        joined = &mut indexer_handle => joined,
    };

    pool.close();
    db.close().await;

    match outcome {
        Ok(Ok(())) | Ok(Err(IndexerError::ShutdownRequested)) => {
            info!("🛑 Shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "❌ Indexer stopped on a fatal error");
            Err(anyhow!(e).context("Ingestion halted"))
        }
        Err(e) => Err(anyhow!(e).context("Indexer task panicked")),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Mask password in database URL for logging.
fn mask_password(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
