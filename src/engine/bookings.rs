use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::engine::{fare, scoring};
use crate::error::AppError;
use crate::geo;
use crate::models::booking::{
    new_booking_id, Booking, BookingMetadata, BookingStatus, CancelledBy, LngLat, Payment, Place,
    VehicleType,
};
use crate::models::event::{
    BookingCancelled, BookingCreated, BookingStatusChanged, DomainEvent, DriverAssigned,
};
use crate::notify::dispatch;
use crate::state::AppState;
use crate::store::{cache, retry, Pagination, SearchFilters, SearchResult};

const GRACE_WINDOW_MIN: i64 = 5;
const STORE_RETRY_ATTEMPTS: u32 = 3;
const STORE_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub pickup: Place,
    pub destination: Place,
    pub vehicle_type: VehicleType,
    pub schedule_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionMetadata {
    pub driver_id: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub reason: Option<String>,
}

pub async fn create_booking(
    state: &Arc<AppState>,
    data: NewBooking,
    passenger_id: &str,
) -> Result<Booking, AppError> {
    validate_new_booking(&data)?;

    let now = Utc::now();
    let distance_km = geo::haversine_km(&data.pickup.coordinates, &data.destination.coordinates);
    let duration_min = geo::eta_minutes(&data.pickup.coordinates, &data.destination.coordinates);

    let booking = Booking {
        booking_id: new_booking_id(),
        passenger_id: passenger_id.to_string(),
        driver_id: None,
        pickup: data.pickup,
        destination: data.destination,
        vehicle_type: data.vehicle_type,
        status: BookingStatus::Pending,
        estimated_distance_km: distance_km,
        estimated_duration_min: duration_min,
        pickup_eta_min: None,
        fare: fare::estimate(data.vehicle_type, distance_km, duration_min),
        payment: Payment::default(),
        schedule_time: data.schedule_time,
        requested_at: now,
        assigned_at: None,
        started_at: None,
        completed_at: None,
        cancelled_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        cancellation_fee: None,
        metadata: BookingMetadata {
            matching_score: scoring::matching_score(now.hour(), data.vehicle_type),
            priority: scoring::priority_weight(data.schedule_time.is_some(), data.vehicle_type),
            notes: data.notes,
        },
    };

    retry::with_backoff(STORE_RETRY_ATTEMPTS, STORE_RETRY_BASE_DELAY, || {
        let record = booking.clone();
        async move { state.store.insert(record) }
    })
    .await?;

    warm_cache(state, &booking);
    state.metrics.bookings_created_total.inc();

    publish_event(
        state,
        DomainEvent::BookingCreated(BookingCreated {
            booking_id: booking.booking_id.clone(),
            passenger_id: booking.passenger_id.clone(),
            pickup: booking.pickup.clone(),
            destination: booking.destination.clone(),
            vehicle_type: booking.vehicle_type,
            status: booking.status,
            metadata: booking.metadata.clone(),
        }),
    );

    info!(
        booking_id = %booking.booking_id,
        passenger_id,
        vehicle_type = ?booking.vehicle_type,
        "booking created"
    );
    Ok(booking)
}

/// Cache first, then the store. Unknown id and unauthorized caller are
/// deliberately the same answer.
pub fn get_booking(
    state: &Arc<AppState>,
    booking_id: &str,
    caller_id: &str,
) -> Result<Booking, AppError> {
    let not_found = || AppError::NotFound(format!("booking {booking_id} not found"));

    if let Some(cached) = state.cache.get(&cache::booking_key(booking_id)) {
        if let Ok(booking) = serde_json::from_str::<Booking>(&cached) {
            state.metrics.cache_hits_total.inc();
            return if can_view(&booking, caller_id) {
                Ok(booking)
            } else {
                Err(not_found())
            };
        }
    }
    state.metrics.cache_misses_total.inc();

    let booking = state.store.get(booking_id).ok_or_else(not_found)?;
    if !can_view(&booking, caller_id) {
        return Err(not_found());
    }

    warm_cache(state, &booking);
    Ok(booking)
}

pub async fn update_status(
    state: &Arc<AppState>,
    booking_id: &str,
    new_status: BookingStatus,
    metadata: TransitionMetadata,
) -> Result<Booking, AppError> {
    if new_status == BookingStatus::Assigned && metadata.driver_id.is_none() {
        return Err(AppError::Validation(
            "driverId is required when assigning".to_string(),
        ));
    }

    let transitioned = retry::with_backoff(STORE_RETRY_ATTEMPTS, STORE_RETRY_BASE_DELAY, || {
        let metadata = metadata.clone();
        async move {
            state.store.transition(booking_id, new_status, |booking| {
                match new_status {
                    BookingStatus::Assigned => {
                        booking.driver_id = metadata.driver_id.clone();
                    }
                    BookingStatus::Cancelled => {
                        booking.cancelled_by =
                            Some(metadata.cancelled_by.unwrap_or(CancelledBy::System));
                        booking.cancellation_reason = metadata.reason.clone();
                    }
                    _ => {}
                }
            })
        }
    })
    .await?;

    warm_cache(state, &transitioned.booking);
    state
        .metrics
        .transitions_total
        .with_label_values(&[new_status.as_str()])
        .inc();

    publish_event(
        state,
        DomainEvent::BookingStatusChanged(BookingStatusChanged {
            booking_id: booking_id.to_string(),
            old_status: transitioned.previous,
            new_status,
            driver_id: transitioned.booking.driver_id.clone(),
        }),
    );
    dispatch::notify_status_changed(
        state,
        &transitioned.booking,
        transitioned.previous,
        new_status,
    );

    info!(
        booking_id,
        old_status = %transitioned.previous,
        new_status = %new_status,
        "booking status changed"
    );
    Ok(transitioned.booking)
}

pub async fn assign_driver(
    state: &Arc<AppState>,
    booking_id: &str,
    driver_id: &str,
    driver_location: LngLat,
) -> Result<Booking, AppError> {
    if !driver_location.in_bounds() {
        return Err(AppError::Validation(
            "driver location out of bounds".to_string(),
        ));
    }

    let current = state
        .store
        .get(booking_id)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;
    let eta = geo::eta_minutes(&driver_location, &current.pickup.coordinates);

    let transitioned = retry::with_backoff(STORE_RETRY_ATTEMPTS, STORE_RETRY_BASE_DELAY, || {
        async move {
            state
                .store
                .transition(booking_id, BookingStatus::Assigned, |booking| {
                    booking.driver_id = Some(driver_id.to_string());
                    booking.pickup_eta_min = Some(eta);
                })
        }
    })
    .await?;

    warm_cache(state, &transitioned.booking);
    state
        .metrics
        .transitions_total
        .with_label_values(&[BookingStatus::Assigned.as_str()])
        .inc();

    publish_event(
        state,
        DomainEvent::DriverAssigned(DriverAssigned {
            booking_id: booking_id.to_string(),
            driver_id: driver_id.to_string(),
            eta,
        }),
    );
    dispatch::notify_driver_assigned(state, &transitioned.booking, driver_id, eta);

    info!(booking_id, driver_id, eta, "driver assigned");
    Ok(transitioned.booking)
}

pub async fn cancel_booking(
    state: &Arc<AppState>,
    booking_id: &str,
    cancelled_by: CancelledBy,
    reason: Option<String>,
) -> Result<Booking, AppError> {
    let current = state
        .store
        .get(booking_id)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;
    if !current.is_active() {
        return Err(AppError::InvalidTransition {
            from: current.status,
            to: BookingStatus::Cancelled,
        });
    }

    let fee = cancellation_fee_due(&current, cancelled_by, Utc::now());

    let transitioned = retry::with_backoff(STORE_RETRY_ATTEMPTS, STORE_RETRY_BASE_DELAY, || {
        let reason = reason.clone();
        async move {
            state
                .store
                .transition(booking_id, BookingStatus::Cancelled, |booking| {
                    booking.cancelled_by = Some(cancelled_by);
                    booking.cancellation_reason = reason;
                    booking.cancellation_fee = fee;
                })
        }
    })
    .await?;

    warm_cache(state, &transitioned.booking);
    state
        .metrics
        .transitions_total
        .with_label_values(&[BookingStatus::Cancelled.as_str()])
        .inc();

    publish_event(
        state,
        DomainEvent::BookingCancelled(BookingCancelled {
            booking_id: booking_id.to_string(),
            cancelled_by,
            reason: transitioned.booking.cancellation_reason.clone(),
        }),
    );
    dispatch::notify_cancelled(state, &transitioned.booking);

    if let Some(amount) = fee {
        // collection itself belongs to the payment service
        info!(booking_id, amount, "cancellation fee due");
    }
    info!(booking_id, cancelled_by = ?cancelled_by, "booking cancelled");
    Ok(transitioned.booking)
}

pub fn search_bookings(
    state: &Arc<AppState>,
    filters: &SearchFilters,
    pagination: Pagination,
) -> SearchResult {
    state.store.search(filters, pagination)
}

pub fn nearby_bookings(
    state: &Arc<AppState>,
    center: LngLat,
    max_distance_m: f64,
) -> Result<Vec<Booking>, AppError> {
    if !center.in_bounds() {
        return Err(AppError::Validation("coordinates out of bounds".to_string()));
    }
    Ok(state.store.nearby_pending(center, max_distance_m))
}

fn validate_new_booking(data: &NewBooking) -> Result<(), AppError> {
    if data.pickup.address.trim().is_empty() {
        return Err(AppError::Validation("pickup address is required".to_string()));
    }
    if data.destination.address.trim().is_empty() {
        return Err(AppError::Validation(
            "destination address is required".to_string(),
        ));
    }
    if !data.pickup.coordinates.in_bounds() {
        return Err(AppError::Validation(
            "pickup coordinates out of bounds".to_string(),
        ));
    }
    if !data.destination.coordinates.in_bounds() {
        return Err(AppError::Validation(
            "destination coordinates out of bounds".to_string(),
        ));
    }
    if let Some(schedule_time) = data.schedule_time {
        if schedule_time <= Utc::now() {
            return Err(AppError::Validation(
                "scheduleTime must be in the future".to_string(),
            ));
        }
    }
    Ok(())
}

fn cancellation_fee_due(
    booking: &Booking,
    cancelled_by: CancelledBy,
    now: DateTime<Utc>,
) -> Option<f64> {
    if cancelled_by != CancelledBy::Passenger {
        return None;
    }
    let assigned_at = booking.assigned_at?;
    let minutes_since_assignment = (now - assigned_at).num_minutes();
    (minutes_since_assignment < GRACE_WINDOW_MIN).then(|| fare::cancellation_fee(&booking.fare))
}

/// Publish failures never roll back the state change; the event is logged
/// as lost instead.
fn publish_event(state: &Arc<AppState>, event: DomainEvent) {
    let routing_key = event.routing_key();
    match state.bus.publish(&event) {
        Ok(event_id) => {
            state
                .metrics
                .events_published_total
                .with_label_values(&[routing_key.as_str()])
                .inc();
            debug!(event_id = %event_id, routing_key = %routing_key, "event accepted");
        }
        Err(err) => {
            warn!(error = %err, routing_key = %routing_key, "event lost: broker unavailable");
        }
    }
}

fn warm_cache(state: &Arc<AppState>, booking: &Booking) {
    match serde_json::to_string(booking) {
        Ok(json) => state
            .cache
            .put(cache::booking_key(&booking.booking_id), json),
        Err(err) => warn!(error = %err, "failed to cache booking"),
    }
}

fn can_view(booking: &Booking, caller_id: &str) -> bool {
    booking.passenger_id == caller_id || booking.driver_id.as_deref() == Some(caller_id)
}
