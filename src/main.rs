use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod factory;
mod handlers;
mod metrics;
mod middleware;
mod seed;
mod server;
mod store;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Menu, franchises, stores and orders.
    pub store: Arc<dyn store::PizzaRepository>,

    /// Login, registration, logout and per-request authorization.
    pub authority: auth::SessionAuthority,

    /// Process-wide counters; the middleware and handlers write, the reporter reads.
    pub counters: Arc<metrics::CounterSet>,

    /// Remote kitchen that fulfils placed orders.
    pub factory: Arc<dyn factory::PizzaFactory>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── 1. Load configuration ────────────────────────────────────
    let cfg = config::load().expect("failed to load configuration");
    info!(version = cfg.version, listen = %cfg.server.listen, "configuration loaded");

    // ── 2. Build collaborators ───────────────────────────────────
    let counters = Arc::new(metrics::CounterSet::new());
    let db = Arc::new(store::MemoryStore::new());

    let tokens = auth::TokenAuthority::new(
        cfg.auth.jwt_secret.as_bytes(),
        cfg.auth.token_ttl_secs.map(Duration::from_secs),
    );
    let authority = auth::SessionAuthority::new(db.clone(), tokens, counters.clone());

    // ── 3. Seed admin and menu ───────────────────────────────────
    seed::seed(&*db, &*db, cfg.admin.as_ref())
        .await
        .expect("failed to seed store");

    // ── 4. Start the metrics reporter ────────────────────────────
    let reporter = metrics::Reporter::new(
        metrics::ReporterConfig::from(&cfg.metrics),
        counters.clone(),
        Arc::new(metrics::HostSampler::new()),
    )
    .spawn();

    // ── 5. Build shared state & router ───────────────────────────
    let state = Arc::new(AppState {
        store: db,
        authority,
        counters,
        factory: Arc::new(factory::HttpFactory::new(&cfg.factory)),
    });
    let app = server::create_router(state);

    // ── 6. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&cfg.server.listen)
        .await
        .expect("failed to bind listen address");
    info!(addr = %cfg.server.listen, "pizza service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server exited with error");

    // ── 7. Stop reporting ────────────────────────────────────────
    reporter.stop().await;
    info!("shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("signal received, starting graceful shutdown");
}
