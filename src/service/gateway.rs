use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tower_http::cors::CorsLayer;

use crate::constants::{ALERT_VIEW_LIMIT, ALERT_VIEW_MIN_SCORE};
use crate::feed::FeedError;
use crate::logging;
use crate::model::Bias;
use crate::settings::{SettingsError, SettingsUpdate};

use super::metrics::MetricsEvent;
use super::{DashboardSnapshot, ServiceState, ShutdownSignal};

#[derive(Debug, Error)]
enum ApiError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Settings(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Feed(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// HTTP and websocket surface of the scanner.
pub fn router(state: ServiceState) -> Router {
    Router::new()
        .route("/ws", get(websocket_upgrade))
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/scan", post(post_scan))
        .route("/api/alerts", get(get_alerts))
        .route("/api/alerts/clear", post(post_clear_alerts))
        .route("/api/alerts/test", post(post_test_alert))
        .route("/api/detail/:symbol", get(get_detail))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub(super) async fn run_gateway(
    addr: SocketAddr,
    state: ServiceState,
    mut shutdown: watch::Receiver<ShutdownSignal>,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind scanner gateway at {addr}"))?;

    logging::info(
        "gateway.bind",
        "Scanner gateway listening for dashboards",
        json!({ "addr": addr.to_string() }),
    );

    let shutdown_signal = async move {
        while shutdown.changed().await.is_ok() {
            if !matches!(*shutdown.borrow(), ShutdownSignal::None) {
                break;
            }
        }
    };

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("gateway server terminated with error")?;

    logging::info_simple("gateway.server.stop", "Scanner gateway stopped");
    Ok(())
}

async fn get_snapshot(State(state): State<ServiceState>) -> Json<DashboardSnapshot> {
    Json(state.snapshot().await)
}

async fn get_settings(State(state): State<ServiceState>) -> impl IntoResponse {
    Json(state.settings().await)
}

async fn put_settings(
    State(state): State<ServiceState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.update_settings(update).await?;
    Ok(Json(settings))
}

async fn post_scan(State(state): State<ServiceState>) -> impl IntoResponse {
    state.request_scan();
    (StatusCode::ACCEPTED, Json(json!({ "queued": true })))
}

async fn post_clear_alerts(State(state): State<ServiceState>) -> Json<DashboardSnapshot> {
    state.clear_alerts().await;
    Json(state.snapshot().await)
}

async fn post_test_alert(State(state): State<ServiceState>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(state.push_test_alert().await))
}

#[derive(Debug, Default, Deserialize)]
struct AlertQuery {
    bias: Option<String>,
    min_score: Option<u32>,
    limit: Option<usize>,
}

fn parse_biases(raw: Option<&str>) -> Result<Vec<Bias>, ApiError> {
    let Some(raw) = raw else {
        return Ok(vec![Bias::Long, Bias::Short]);
    };
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.to_ascii_uppercase().as_str() {
            "LONG" => Ok(Bias::Long),
            "SHORT" => Ok(Bias::Short),
            "NEUTRAL" => Ok(Bias::Neutral),
            other => Err(ApiError::BadRequest(format!("unknown bias {other:?}"))),
        })
        .collect()
}

async fn get_alerts(
    State(state): State<ServiceState>,
    Query(query): Query<AlertQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let biases = parse_biases(query.bias.as_deref())?;
    let min_score = query.min_score.unwrap_or(ALERT_VIEW_MIN_SCORE);
    let limit = query.limit.unwrap_or(ALERT_VIEW_LIMIT);
    Ok(Json(state.filtered_alerts(&biases, min_score, limit).await))
}

async fn get_detail(
    State(state): State<ServiceState>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if symbol.trim().is_empty() {
        return Err(ApiError::BadRequest("symbol is required".into()));
    }
    Ok(Json(state.detail(&symbol).await?))
}

async fn websocket_upgrade(ws: WebSocketUpgrade, State(state): State<ServiceState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(err) = forward_snapshots_to_client(socket, state).await {
            logging::warn(
                "gateway.client_error",
                "Dashboard websocket ended with error",
                json!({ "error": format!("{err:?}") }),
            );
        }
    })
}

async fn forward_snapshots_to_client(socket: WebSocket, state: ServiceState) -> Result<()> {
    logging::info_simple("gateway.client.connected", "Dashboard websocket connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut receiver = state.subscribe();

    let reader = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    let current = serde_json::to_string(&state.snapshot().await).context("serialize snapshot")?;
    let mut open = ws_sender.send(Message::Text(current)).await.is_ok();

    while open {
        match receiver.recv().await {
            Ok(snapshot) => {
                let payload = serde_json::to_string(&snapshot).context("serialize snapshot")?;
                open = ws_sender.send(Message::Text(payload)).await.is_ok();
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                state.metrics.report(MetricsEvent::ClientLag { skipped });
                logging::warn(
                    "gateway.client.lagged",
                    "Dashboard websocket lagged behind snapshots",
                    json!({ "skipped": skipped }),
                );
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    reader.abort();
    let _ = reader.await;
    logging::info_simple(
        "gateway.client.disconnected",
        "Dashboard websocket disconnected",
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bias_filter_defaults_to_actionable() {
        let biases = parse_biases(None).expect("default");
        assert_eq!(biases, vec![Bias::Long, Bias::Short]);
    }

    #[test]
    fn bias_filter_accepts_lists_and_rejects_unknown() {
        let biases = parse_biases(Some("short, long")).expect("list");
        assert_eq!(biases, vec![Bias::Short, Bias::Long]);
        assert!(parse_biases(Some("")).expect("empty").is_empty());
        assert!(matches!(
            parse_biases(Some("LONG,SIDEWAYS")),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn settings_errors_map_to_unprocessable() {
        let response = ApiError::from(SettingsError::WatchlistTooLong(40)).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let response = ApiError::from(FeedError::MissingApiKey).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
