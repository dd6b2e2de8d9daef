#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]

use anyhow::Result;
use axum::Extension;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::api::JwtKeys;
use crate::api::router;
use crate::config::AppConfig;
use crate::mailer::Mailer;
use crate::storage::Storage;

mod api;
mod chapters;
mod collections;
mod config;
mod credentials;
mod entries;
mod mailer;
mod moods;
mod slug;
mod storage;
#[cfg(test)]
mod tests;
mod users;

const DEFAULT_RUST_LOG: &str = "pine=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let config = AppConfig::from_env()?;
    let app = setup_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.address).await?;
    tracing::info!("Listening on {}", config.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Create and setup the app with its dependencies
///
/// # Errors
///
/// Will return `Err` if the storage backend fails to initialize
pub async fn setup_app(config: &AppConfig) -> Result<Router> {
    let storage = storage::setup().await?;

    Ok(create_router(storage, config))
}

/// Create the router for Pine
pub fn create_router<S: Storage>(storage: S, config: &AppConfig) -> Router {
    let jwt_keys = JwtKeys::new(config.jwt_secret.as_bytes());
    let mailer = Mailer::from_config(config.smtp.as_ref());

    router::<S>()
        .layer(TraceLayer::new_for_http())
        .layer(Extension(storage))
        .layer(Extension(jwt_keys))
        .layer(Extension(mailer))
}

fn setup_environment() {
    dotenvy::dotenv().ok();
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM to initiate a shutdown
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Valid CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Valid terminate handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Terminate signal received, starting graceful shutdown");
}
