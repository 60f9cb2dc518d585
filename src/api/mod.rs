//! REST API for the monitoring backend
//!
//! Stateless HTTP over JSON on top of the shared handles: detector state,
//! baseline registry, storage backend, broker publisher and LLM client.
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Shared handles** in [`ApiState`]; no per-request state
//! - **Graceful shutdown**: stops accepting on the shutdown signal,
//!   finishes in-flight requests within a 10 s grace, then force-exits
//!
//! ## Endpoints
//!
//! - `GET  /api/detector/current` - Active detector configuration
//! - `POST /api/detector/set` - Switch strategy (publishes a config echo)
//! - `GET  /api/user/baselines` - Learned baseline statistics
//! - `POST /api/user/reset_baselines` - Drop a user's baselines
//! - `GET  /api/trends` - Five-scale trend envelope
//! - `GET  /api/alerts/history` - Recent alerts, newest first
//! - `POST /api/trends/llm_analysis` - LLM narrative for one trend window

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// In-flight grace after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Build the API router. Exposed separately so tests can drive the routes
/// without binding a socket.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/detector/current", get(routes::detector::current_detector))
        .route("/api/detector/set", post(routes::detector::set_detector))
        .route("/api/user/baselines", get(routes::baselines::get_baselines))
        .route(
            "/api/user/reset_baselines",
            post(routes::baselines::reset_baselines),
        )
        .route("/api/trends", get(routes::trends::get_trends))
        .route("/api/alerts/history", get(routes::alerts::alert_history))
        .route("/api/trends/llm_analysis", post(routes::trends::llm_analysis))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Spawn the API server as a background task.
///
/// Returns the bound address. The server stops accepting when the shutdown
/// signal fires and aborts any stragglers after [`SHUTDOWN_GRACE`].
pub async fn spawn_api_server(
    port: u16,
    state: ApiState,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<SocketAddr> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {addr}");

    tokio::spawn(async move {
        let mut grace_rx = shutdown_rx.clone();
        let mut signal_rx = shutdown_rx;

        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = signal_rx.changed().await;
            })
            .into_future();

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("API server error: {e}");
                }
            }
            _ = async {
                let _ = grace_rx.changed().await;
                tokio::time::sleep(SHUTDOWN_GRACE).await;
            } => {
                warn!("shutdown grace period expired, aborting API server");
            }
        }
    });

    Ok(addr)
}
