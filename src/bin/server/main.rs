//! Nola Analytics HTTP Server
//!
//! Serves the read-only sales analytics API over a PostgreSQL pool with a
//! Redis cache in front.
//!
//! # CLI Commands
//!
//! - `start` - Start the HTTP server (default if no command specified)
//! - `check-config` - Validate configuration and print a summary
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `NOLA_CONFIG` environment variable (path to TOML file)
//! 2. `./application.toml` in current directory
//! 3. Default configuration
//!
//! followed by environment overrides (`DB_HOST`, `DB_PORT`, `DB_NAME`,
//! `DB_USER`, `DB_PASSWORD`, `REDIS_URL`, `NOLA_LISTEN_ADDR`, `RUST_LOG`).

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nola_analytics::api::{build_router, ApiSettings, AppState};
use nola_analytics::cache::{CacheAside, CacheBackend, DisabledCache, LocalCache};
use nola_analytics::config::{ApplicationConfig, CacheBackendKind};
use nola_analytics::redis::util::sanitize_url;
use nola_analytics::redis::RedisCache;
use nola_analytics::store::{AnalyticsStore, PgStore};
use tokio::signal;
use tracing::{debug, info, warn};

// =============================================================================
// Server Setup
// =============================================================================

/// Graceful shutdown signal handler
///
/// A failed signal registration is logged and that signal is ignored; the
/// server then has to be killed forcefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {},
            Err(e) => {
                warn!(
                    error = %e,
                    "Ctrl+C handler installation failed - graceful shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

/// Build the configured cache backend
async fn init_cache(
    app_config: &ApplicationConfig,
) -> Result<Arc<dyn CacheBackend>, Box<dyn std::error::Error>> {
    let backend: Arc<dyn CacheBackend> = match app_config.effective_cache_backend() {
        CacheBackendKind::Redis => {
            let redis = RedisCache::new(app_config.to_redis_config()).await?;
            info!(url = %redis.display_url(), "Redis cache client ready");
            Arc::new(redis)
        },
        CacheBackendKind::Memory => {
            debug!(
                max_entries = app_config.cache.local_max_entries,
                "Using in-memory cache"
            );
            Arc::new(LocalCache::new(app_config.cache.local_max_entries))
        },
        CacheBackendKind::Disabled => {
            warn!("Cache disabled, every request reads the database");
            Arc::new(DisabledCache)
        },
    };
    Ok(backend)
}

// =============================================================================
// CLI Definition
// =============================================================================

/// Nola Analytics - sales analytics API
#[derive(Parser)]
#[command(name = "nola-analytics")]
#[command(version)]
#[command(about = "Read-only sales analytics API with Redis cache-aside", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides NOLA_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Override listen address (e.g., 0.0.0.0:8000)
    #[arg(short, long, global = true)]
    listen: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Validate configuration without starting the server
    CheckConfig,
}

/// Load configuration and apply CLI overrides
fn resolve_config(cli: &Cli) -> ApplicationConfig {
    // Apply config path override if specified
    if let Some(config_path) = &cli.config {
        std::env::set_var("NOLA_CONFIG", config_path);
    }

    let mut app_config = config::load_config();
    if let Some(listen) = &cli.listen {
        app_config.server.listen_addr = listen.clone();
    }
    app_config
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

/// Validate configuration and print summary
fn cmd_check_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let app_config = resolve_config(cli);
    app_config.validate()?;

    println!("Configuration is valid!");
    println!();
    println!("Server Settings:");
    println!("  Listen address: {}", app_config.server.listen_addr);
    println!("  Dashboard row limit: {}", app_config.server.dashboard_row_limit);
    println!("  Log level: {}", app_config.server.log_level);
    println!();
    println!("Database Settings:");
    println!(
        "  Target: {}@{}:{}/{}",
        app_config.database.user,
        app_config.database.host,
        app_config.database.port,
        app_config.database.name
    );
    println!("  Max connections: {}", app_config.database.max_connections);
    println!();
    println!("Cache Settings:");
    println!("  Backend: {:?}", app_config.effective_cache_backend());
    if app_config.effective_cache_backend() == CacheBackendKind::Redis {
        // Sanitize URL to hide credentials
        println!("  URL: {}", sanitize_url(&app_config.redis.url));
        println!(
            "  Reconnect backoff: {}s",
            app_config.redis.reconnect_backoff_secs
        );
    }
    println!(
        "  TTLs: analytics={}s filters={}s weekdays={}s customers={}s",
        app_config.cache.analytics_ttl_secs,
        app_config.cache.filters_ttl_secs,
        app_config.cache.weekdays_ttl_secs,
        app_config.cache.customers_ttl_secs
    );
    println!();
    println!("Security:");
    println!(
        "  CORS origins: {:?}",
        app_config.security.cors_allowed_origins
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::CheckConfig) => return cmd_check_config(&cli),
        Some(Commands::Start) | None => {
            // Continue with server startup below
        },
    }

    let app_config = resolve_config(&cli);

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&app_config.server.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    app_config.validate()?;

    info!("Starting Nola Analytics v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {}", app_config.summary());

    // Clients are built once and shared by every request
    let store = Arc::new(PgStore::connect_lazy(&app_config.to_store_config()));
    let cache = CacheAside::new(init_cache(&app_config).await?);
    info!(
        cache_backend = cache.backend_name(),
        "Store and cache initialized"
    );

    let state = Arc::new(AppState::new(
        store.clone(),
        cache.clone(),
        ApiSettings::from(&app_config),
    ));
    let app = build_router(state, &app_config.security.cors_allowed_origins);

    let addr: SocketAddr = app_config.server.listen_addr.parse()?;
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run the server until shutdown signal
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;

    let stats = cache.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        stores = stats.stores,
        backend_errors = stats.backend_errors,
        "Cache statistics at shutdown"
    );

    info!("Server shutdown complete");
    Ok(())
}
