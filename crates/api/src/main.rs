//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use api::seed::SeedData;
use orders::{InMemoryBusinessDirectory, InMemoryCustomerDirectory, LoggingEventSink};
use store::{InMemoryStore, OrderStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn open_store(config: &Config, seed: &SeedData) -> Arc<dyn OrderStore> {
    match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            for variant in &seed.variants {
                store
                    .insert_variant(variant)
                    .await
                    .expect("failed to seed variant");
            }
            tracing::info!(variants = seed.variants.len(), "using PostgreSQL order store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory order store");
            let store = InMemoryStore::new();
            for variant in &seed.variants {
                store.insert_variant(variant.clone()).await;
            }
            Arc::new(store)
        }
    }
}

fn load_seed(config: &Config) -> SeedData {
    match &config.seed_file {
        Some(path) => SeedData::load(path).expect("failed to load seed file"),
        None => SeedData::default(),
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Load reference data, open the store and wire the coordinator
    let seed = load_seed(&config);
    if seed.is_empty() {
        tracing::warn!("no SEED_FILE data loaded, every business lookup will miss");
    }
    let customers = InMemoryCustomerDirectory::new();
    let businesses = InMemoryBusinessDirectory::new();
    seed.populate(&customers, &businesses).await;

    let store = open_store(&config, &seed).await;
    let state = api::create_state(
        store,
        customers,
        businesses,
        LoggingEventSink,
        config.core.clone(),
        metrics_handle,
    )
    .expect("failed to build order coordinator");

    // 4. Start server
    let app = api::create_app(state);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
