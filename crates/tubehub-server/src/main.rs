mod config;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header::{AUTHORIZATION, CONTENT_TYPE}};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tubehub_api::media::{DiskMediaStore, HttpMediaStore, MediaStore, StagingArea};
use tubehub_api::tokens::TokenKeys;
use tubehub_api::{AppState, AppStateInner};
use tubehub_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tubehub=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;

    tokio::fs::create_dir_all(config.staging_dir()).await?;
    let media: Arc<dyn MediaStore> = match &config.media_upload_url {
        Some(endpoint) => {
            info!("Uploading media to {}", endpoint);
            Arc::new(HttpMediaStore::new(endpoint.clone()))
        }
        None => {
            info!("Storing media under {}", config.media_dir.display());
            Arc::new(DiskMediaStore::new(&config.media_dir, config.media_base_url.clone()))
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenKeys::new(
            config.access_secret.clone(),
            config.refresh_secret.clone(),
            config.access_ttl,
            config.refresh_ttl,
        ),
        media,
        staging: StagingArea::new(config.staging_dir()),
    });

    let mut app: Router = tubehub_api::router(state);
    if config.media_upload_url.is_none() && config.media_base_url.starts_with('/') {
        app = app.nest_service(&config.media_base_url, ServeDir::new(&config.media_dir));
    }
    let app = app
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors_layer(config.cors_origin.as_deref())?)
        .layer(TraceLayer::new_for_http());

    info!("TubeHub listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };
    Ok(CorsLayer::new()
        .allow_origin(origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    let _ = ctrl_c.await;
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("Received Ctrl+C, shutting down...");
    }
}
