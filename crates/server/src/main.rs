//! Debate Agent Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use debate_agent_config::{load_settings, Settings, StoreBackend};
use debate_agent_persistence::{InMemorySessionStore, RedisSessionStore, SessionPolicy, SessionStore};
use debate_agent_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env} > config/default > defaults
    let env = std::env::var("DEBATE_AGENT_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!("Starting Debate Agent Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = config.environment.as_str(),
        providers = config.llm.providers.len(),
        store = ?config.persistence.backend,
        "Configuration loaded"
    );
    if config.llm.providers.is_empty() {
        tracing::warn!("No language model providers configured, every reply will be a fallback rebuttal");
    }

    let metrics_handle = if config.observability.metrics_enabled {
        let handle = init_metrics();
        if handle.is_some() {
            tracing::info!("Initialized Prometheus metrics at /metrics");
        }
        handle
    } else {
        None
    };

    let (store, sweeper) = init_store(&config).await;
    let state = AppState::new(config.clone(), store).with_metrics(metrics_handle);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.server.host, config.server.port))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweeper) = sweeper {
        let _ = sweeper.send(true);
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Build the configured session store
///
/// A Redis store that cannot be reached at startup falls back to memory.
/// The in-memory store also gets its sweep task, whose shutdown handle is
/// returned.
async fn init_store(config: &Settings) -> (Arc<dyn SessionStore>, Option<watch::Sender<bool>>) {
    let policy = SessionPolicy::from(&config.conversation);

    if config.persistence.backend == StoreBackend::Redis {
        match RedisSessionStore::connect(
            &config.persistence.redis_url,
            &config.persistence.key_prefix,
            policy,
        )
        .await
        {
            Ok(store) => {
                tracing::info!(url = %config.persistence.redis_url, "Redis session store connected");
                let store: Arc<dyn SessionStore> = Arc::new(store);
                return (store, None);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to connect to Redis. Falling back to in-memory sessions."
                );
            }
        }
    }

    let store = Arc::new(InMemorySessionStore::new(policy));
    let sweeper = store.start_cleanup_task(Duration::from_secs(config.conversation.sweep_interval_seconds));
    tracing::info!(
        ttl_seconds = config.conversation.ttl_seconds,
        max_pairs = config.conversation.max_pairs,
        "In-memory session store ready"
    );
    let store: Arc<dyn SessionStore> = store;
    (store, Some(sweeper))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("debate_agent={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
