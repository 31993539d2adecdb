pub mod auth;
pub mod bookings;
pub mod drivers;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::api::rest::auth::ServiceAuth;
use crate::bus::dead_letter::DeadLetter;
use crate::engine::consumers::ConsumerStatus;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(bookings::router())
        .merge(drivers::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .route("/events/dead-letters", get(dead_letters))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ServiceHealth {
    store: &'static str,
    cache: &'static str,
    broker: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueDepth {
    queue: String,
    depth: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    success: bool,
    status: &'static str,
    timestamp: DateTime<Utc>,
    services: ServiceHealth,
    bookings: usize,
    drivers: usize,
    queues: Vec<QueueDepth>,
    consumers: ConsumerStatus,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "healthy",
        timestamp: Utc::now(),
        services: ServiceHealth {
            store: "connected",
            cache: "connected",
            broker: "connected",
        },
        bookings: state.store.len(),
        drivers: state.drivers.len(),
        queues: state
            .bus
            .queue_depths()
            .into_iter()
            .map(|(queue, depth)| QueueDepth { queue, depth })
            .collect(),
        consumers: state.consumers.status(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    for (queue, depth) in state.bus.queue_depths() {
        state
            .metrics
            .queue_depth
            .with_label_values(&[queue.as_str()])
            .set(depth);
    }

    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

async fn dead_letters(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Json<ApiResponse<Vec<DeadLetter>>> {
    Json(ApiResponse::ok(state.bus.dead_letters()))
}
