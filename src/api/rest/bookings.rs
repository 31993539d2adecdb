use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::rest::auth::{Caller, Role, ServiceAuth};
use crate::api::rest::ApiResponse;
use crate::engine::bookings::{self, NewBooking, TransitionMetadata};
use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus, LngLat, Place, VehicleType};
use crate::state::AppState;
use crate::store::{Pagination, SearchFilters, SearchResult};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking).get(search_bookings))
        .route("/bookings/nearby/search", get(nearby_bookings))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id/status", patch(update_status))
        .route("/bookings/:id/assign-driver", post(assign_driver))
        .route("/bookings/:id/cancel", post(cancel_booking))
}

/// Gateway-facing coordinate shape; stored internally as `[lng, lat]`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<LatLng> for LngLat {
    fn from(value: LatLng) -> Self {
        LngLat::new(value.lng, value.lat)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRequest {
    pub address: String,
    pub coordinates: LatLng,
}

impl From<PlaceRequest> for Place {
    fn from(value: PlaceRequest) -> Self {
        Place {
            address: value.address,
            coordinates: value.coordinates.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub pickup: PlaceRequest,
    pub destination: PlaceRequest,
    pub vehicle_type: VehicleType,
    pub schedule_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
    #[serde(default)]
    pub metadata: TransitionMetadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDriverRequest {
    pub driver_id: String,
    pub driver_location: LatLng,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub passenger_id: Option<String>,
    pub driver_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub vehicle_type: Option<VehicleType>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub max_distance: Option<f64>,
}

#[derive(Serialize)]
struct NearbyResponse {
    success: bool,
    count: usize,
    data: Vec<Booking>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), AppError> {
    let booking = bookings::create_booking(
        &state,
        NewBooking {
            pickup: payload.pickup.into(),
            destination: payload.destination.into(),
            vehicle_type: payload.vehicle_type,
            schedule_time: payload.schedule_time,
            notes: payload.notes,
        },
        &caller.user_id,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Booking created successfully", booking)),
    ))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(booking_id): Path<String>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let booking = bookings::get_booking(&state, &booking_id, &caller.user_id)?;
    Ok(Json(ApiResponse::ok(booking)))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(booking_id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let booking =
        bookings::update_status(&state, &booking_id, payload.status, payload.metadata).await?;
    Ok(Json(ApiResponse::with_message(
        "Booking status updated",
        booking,
    )))
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(booking_id): Path<String>,
    Json(payload): Json<AssignDriverRequest>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let booking = bookings::assign_driver(
        &state,
        &booking_id,
        &payload.driver_id,
        payload.driver_location.into(),
    )
    .await?;
    Ok(Json(ApiResponse::with_message(
        "Driver assigned successfully",
        booking,
    )))
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(booking_id): Path<String>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let booking = bookings::cancel_booking(
        &state,
        &booking_id,
        caller.role.as_cancelled_by(),
        payload.reason,
    )
    .await?;
    Ok(Json(ApiResponse::with_message("Booking cancelled", booking)))
}

async fn search_bookings(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<SearchResult>>, AppError> {
    // passengers and drivers only ever see their own bookings
    let filters = SearchFilters {
        passenger_id: match caller.role {
            Role::Passenger => Some(caller.user_id.clone()),
            _ => query.passenger_id,
        },
        driver_id: match caller.role {
            Role::Driver => Some(caller.user_id.clone()),
            _ => query.driver_id,
        },
        status: query.status,
        vehicle_type: query.vehicle_type,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let pagination = Pagination {
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(20),
    };

    let result = bookings::search_bookings(&state, &filters, pagination);
    Ok(Json(ApiResponse::ok(result)))
}

async fn nearby_bookings(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<NearbyResponse>, AppError> {
    if caller.role != Role::Driver {
        return Err(AppError::Forbidden("driver role required".to_string()));
    }

    let center = LngLat::new(query.lng, query.lat);
    let found = bookings::nearby_bookings(&state, center, query.max_distance.unwrap_or(5_000.0))?;

    Ok(Json(NearbyResponse {
        success: true,
        count: found.len(),
        data: found,
    }))
}
