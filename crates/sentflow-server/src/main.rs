//! Sentient Flow server binary.
//!
//! ## Endpoints
//!
//! - `POST /execute` - run a workflow payload to completion
//! - `POST /auth/register`, `POST /auth/login` - accounts and tokens
//! - `GET|POST /workflows`, `GET|DELETE /workflows/:id` - workflow CRUD
//! - `GET|POST /credentials`, `GET /credentials/:id` - credential CRUD
//! - `GET /healthz` - health check

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentflow_server::{app, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentflow=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env();
    let bind_addr = config.bind_addr();

    info!("Starting Sentient Flow server");
    info!("Binding to: {}", bind_addr);

    if config.jwt_secret.is_empty() {
        warn!("SENTFLOW_JWT_SECRET not set - issued tokens use an empty secret");
    }
    if config.encryption_key.is_empty() {
        warn!("SENTFLOW_ENCRYPTION_KEY not set - credential encryption uses an empty key");
    }

    let state = AppState::new(config);
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Sentient Flow server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM).
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
