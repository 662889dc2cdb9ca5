use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

/// Error body for rejected requests
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
        }),
    )
}

/// Handler for GET /v1/sensors
#[tracing::instrument(skip(state))]
async fn sensors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.state_snapshot();
    (StatusCode::OK, Json(snapshot.sensors.clone()))
}

/// Handler for GET /v1/devices
#[tracing::instrument(skip(state))]
async fn devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.engine.devices()))
}

/// Handler for POST /v1/integrations/:integration/entries/:entry_id/snapshot
///
/// Accepts a data snapshot fetched by an external poller and hands it to the
/// integration. Decoding happens in the integration, so a malformed body is
/// still accepted here and rejected (and logged) there.
#[tracing::instrument(skip_all, fields(integration = %integration, entry_id = %entry_id))]
async fn push_snapshot(
    State(state): State<Arc<AppState>>,
    Path((integration, entry_id)): Path<(String, String)>,
    Json(data): Json<serde_json::Value>,
) -> impl IntoResponse {
    match state.engine.refresh_snapshot(&integration, entry_id, data) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            tracing::warn!("Rejected snapshot for {}: {}", integration, e);
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/sensors", get(sensors))
        .route("/v1/devices", get(devices))
        .route(
            "/v1/integrations/:integration/entries/:entry_id/snapshot",
            post(push_snapshot),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// This function will bind to the specified address and serve the API endpoints.
/// It will run until the provided shutdown signal is triggered.
///
/// # Arguments
/// * `listen` - The IP address to listen on (e.g., "127.0.0.1")
/// * `port` - The port to listen on (e.g., 8565)
/// * `engine` - The engine whose state is exposed
/// * `shutdown_rx` - A oneshot receiver that will trigger graceful shutdown
pub async fn serve(
    listen: String,
    port: u16,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        create_router(Arc::new(AppState {
            version: "test",
            engine: Arc::new(Engine::new()),
        }))
    }

    #[tokio::test]
    async fn test_ping() {
        let response = router()
            .oneshot(Request::builder().uri("/v1/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_sensors_empty() {
        let response = router()
            .oneshot(Request::builder().uri("/v1/sensors").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn test_push_snapshot_to_unknown_integration() {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/integrations/aldesconnect/entries/home/snapshot")
            .header("content-type", "application/json")
            .body(Body::from("[]"))
            .unwrap();

        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
