//! HTTP server for the topiclens API

use log::{info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;
use topiclens::{CancelSignal, Settings, TopicLens, cancel_pair};

use super::routes::create_router;
use super::tls::TlsListener;

pub type AppState = Arc<AppStateInner>;

#[derive(Clone)]
pub struct AppStateInner {
    pub lens: TopicLens,
    pub environment: String,
    /// Fires once the server starts shutting down; in-flight reads return early.
    pub shutdown: CancelSignal,
}

pub fn create_app_state(lens: TopicLens, environment: String, shutdown: CancelSignal) -> AppState {
    Arc::new(AppStateInner {
        lens,
        environment,
        shutdown,
    })
}

/// Serves the API until SIGINT or SIGTERM, over TLS when `settings.tls` is set.
pub async fn start_server(
    settings: &Settings,
    lens: TopicLens,
) -> Result<(), Box<dyn std::error::Error>> {
    let (handle, shutdown) = cancel_pair();
    let app_state = create_app_state(lens, settings.environment.clone(), shutdown);
    let app = create_router(app_state, settings.request_timeout());

    let bind_address = format!("0.0.0.0:{}", settings.port);
    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|e| format!("Failed to bind to address {bind_address}: {e}"))?;

    let graceful = async move {
        shutdown_signal().await;
        info!("Shutdown requested, cancelling in-flight requests");
        handle.cancel();
    };

    match &settings.tls {
        Some(tls) => {
            let listener = TlsListener::bind(
                listener,
                &tls.cert_file,
                &tls.key_file,
                settings.read_timeout,
            )?;
            info!("topiclens starting on https://{bind_address}");
            axum::serve(listener, app)
                .with_graceful_shutdown(graceful)
                .await
                .map_err(|e| format!("Server failed: {e}"))?;
        }
        None => {
            info!("topiclens starting on http://{bind_address}");
            axum::serve(listener, app)
                .with_graceful_shutdown(graceful)
                .await
                .map_err(|e| format!("Server failed: {e}"))?;
        }
    }

    info!("topiclens stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {e}");
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
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
