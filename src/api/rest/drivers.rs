use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::api::rest::auth::ServiceAuth;
use crate::api::rest::bookings::LatLng;
use crate::api::rest::ApiResponse;
use crate::error::AppError;
use crate::models::booking::VehicleType;
use crate::models::driver::{Driver, DriverStatus};
use crate::state::AppState;

/// Internal feed from the driver-location service: positions and
/// availability for the nearby-driver lookup.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", get(list_drivers))
        .route("/drivers/:id", put(upsert_driver))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertDriverRequest {
    pub name: String,
    pub status: DriverStatus,
    pub vehicle_type: VehicleType,
    pub location: LatLng,
    pub rating: f64,
}

async fn upsert_driver(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(driver_id): Path<String>,
    Json(payload): Json<UpsertDriverRequest>,
) -> Result<Json<ApiResponse<Driver>>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let driver = Driver {
        driver_id,
        name: payload.name,
        status: payload.status,
        vehicle_type: payload.vehicle_type,
        location: payload.location.into(),
        rating: payload.rating.clamp(0.0, 5.0),
        updated_at: Utc::now(),
    };

    state.drivers.upsert(driver.clone());
    Ok(Json(ApiResponse::ok(driver)))
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Json<ApiResponse<Vec<Driver>>> {
    Json(ApiResponse::ok(state.drivers.list()))
}
