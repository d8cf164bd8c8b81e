mod config;
mod constants;
mod domain;
mod routes;
mod services;
mod storage;

use anyhow::Context;
use google_cloud_storage::client::Storage;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use config::{Config, StorageConfig};
use constants::{DB_ACQUIRE_TIMEOUT_SECS, DB_IDLE_TIMEOUT_SECS, DB_MAX_CONNECTIONS};
use services::platform::Platforms;
use services::publish::{PgPublishStore, PublishStore, TokenPolicy};
use services::tiktok::TiktokClient;
use services::youtube::YoutubeClient;
use storage::MediaStorage;

pub struct AppState {
    pub db: PgPool,
    pub store: Arc<dyn PublishStore>,
    pub storage: MediaStorage,
    pub platforms: Platforms,
    pub policy: TokenPolicy,
    pub environment: String,
    pub started_at: Instant,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vidcast=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_storage(config: &Config) -> anyhow::Result<MediaStorage> {
    Ok(match &config.storage {
        StorageConfig::Local { root } => {
            tracing::info!(root = ?root, "using local media storage");
            MediaStorage::Local {
                root: root.clone(),
                public_base_url: config.public_base_url.clone(),
            }
        }
        StorageConfig::Gcs { bucket } => {
            // GCS client uses GOOGLE_APPLICATION_CREDENTIALS env var
            let client = Storage::builder()
                .build()
                .await
                .context("failed to create GCS client")?;
            tracing::info!(bucket = %bucket, "using GCS media storage");
            MediaStorage::Gcs {
                client,
                bucket: bucket.clone(),
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_json);
    services::error::expose_error_detail(config.is_development());

    let pool = PgPoolOptions::new()
        .max_connections(DB_MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS))
        .idle_timeout(Duration::from_secs(DB_IDLE_TIMEOUT_SECS))
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let platforms = Platforms {
        youtube: Arc::new(YoutubeClient::new(config.youtube.clone())),
        tiktok: Arc::new(TiktokClient::new(config.tiktok.clone())),
    };
    let policy = TokenPolicy {
        auto_refresh: config.auto_refresh,
    };
    let store: Arc<dyn PublishStore> = Arc::new(PgPublishStore::new(pool.clone()));

    let state = Arc::new(AppState {
        db: pool,
        store: store.clone(),
        storage: build_storage(&config).await?,
        platforms: platforms.clone(),
        policy,
        environment: config.environment.clone(),
        started_at: Instant::now(),
    });

    if let Some(every) = config.dispatch_interval {
        tracing::info!(interval_secs = every.as_secs(), "background dispatcher started");
        tokio::spawn(services::dispatcher::start_background_dispatcher(
            store, platforms, policy, every,
        ));
    }

    let app = routes::app(state, config.max_upload_bytes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    tracing::info!(%addr, environment = %config.environment, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
