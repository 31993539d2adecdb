use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::booking::{Booking, BookingStatus, CancelledBy, PaymentStatus, VehicleType};
use crate::models::driver::DriverStatus;
use crate::notify::Notification;
use crate::state::AppState;
use crate::store::cache;

const DRIVERS_NOTIFIED_TTL: Duration = Duration::from_secs(300);
const APOLOGY_COMPENSATION_VND: f64 = 20_000.0;

pub fn search_radius_m(vehicle_type: VehicleType) -> f64 {
    match vehicle_type {
        VehicleType::Bike => 2_000.0,
        VehicleType::Standard => 5_000.0,
        VehicleType::Premium => 10_000.0,
        VehicleType::Luxury => 15_000.0,
    }
}

/// Looks up drivers around the pickup point, filters to available ones with
/// a matching vehicle, and sends one notification per driver. Returns how
/// many were notified and leaves a short-TTL marker in the cache.
pub async fn notify_nearby_drivers(state: &Arc<AppState>, booking: &Booking) -> usize {
    let radius_m = search_radius_m(booking.vehicle_type);
    let candidates = state
        .locator
        .nearby_drivers(booking.pickup.coordinates, radius_m)
        .await;

    let matching: Vec<_> = candidates
        .into_iter()
        .filter(|d| d.status == DriverStatus::Available && d.vehicle_type == booking.vehicle_type)
        .collect();

    for driver in &matching {
        deliver(
            state,
            Notification::new(
                format!("driver:{}", driver.driver_id),
                "booking_request",
                json!({
                    "bookingId": booking.booking_id,
                    "pickup": booking.pickup,
                    "destination": booking.destination,
                    "vehicleType": booking.vehicle_type,
                    "fare": booking.fare,
                    "priority": booking.metadata.priority,
                }),
            ),
        );
    }

    state.cache.put_with_ttl(
        cache::drivers_notified_key(&booking.booking_id),
        json!({
            "count": matching.len(),
            "timestamp": Utc::now(),
        })
        .to_string(),
        DRIVERS_NOTIFIED_TTL,
    );

    info!(
        booking_id = %booking.booking_id,
        radius_m,
        notified = matching.len(),
        "nearby drivers notified"
    );
    matching.len()
}

pub fn notify_driver_assigned(state: &Arc<AppState>, booking: &Booking, driver_id: &str, eta: i64) {
    let driver = state.drivers.get(driver_id);
    let driver_name = driver
        .as_ref()
        .map(|d| d.name.clone())
        .unwrap_or_else(|| format!("Driver {}", &driver_id[..driver_id.len().min(6)]));
    let rating = driver.as_ref().map(|d| d.rating);

    deliver(
        state,
        Notification::new(
            format!("user:{}", booking.passenger_id),
            "driver_assigned",
            json!({
                "bookingId": booking.booking_id,
                "driver": {
                    "driverId": driver_id,
                    "name": driver_name,
                    "rating": rating,
                },
                "eta": eta,
                "pickup": booking.pickup.address,
                "estimatedArrival": Utc::now() + chrono::Duration::minutes(eta),
            }),
        ),
    );
}

pub fn notify_status_changed(
    state: &Arc<AppState>,
    booking: &Booking,
    old_status: BookingStatus,
    new_status: BookingStatus,
) {
    let payload = json!({
        "bookingId": booking.booking_id,
        "oldStatus": old_status,
        "newStatus": new_status,
        "timestamp": Utc::now(),
        "pickup": booking.pickup.address,
        "destination": booking.destination.address,
    });

    deliver(
        state,
        Notification::new(
            format!("user:{}", booking.passenger_id),
            "booking_status_update",
            payload.clone(),
        ),
    );

    if let Some(driver_id) = &booking.driver_id {
        deliver(
            state,
            Notification::new(
                format!("driver:{driver_id}"),
                "booking_status_update",
                payload,
            ),
        );
    }
}

/// Tells the non-cancelling party, applies the compensation-style notices,
/// and raises an admin alert (HIGH when the driver cancelled).
pub fn notify_cancelled(state: &Arc<AppState>, booking: &Booking) {
    let Some(cancelled_by) = booking.cancelled_by else {
        warn!(booking_id = %booking.booking_id, "cancellation notice without cancelledBy");
        return;
    };

    let cancellation = json!({
        "bookingId": booking.booking_id,
        "cancelledBy": cancelled_by,
        "reason": booking.cancellation_reason,
        "timestamp": Utc::now(),
    });

    match cancelled_by {
        CancelledBy::Passenger | CancelledBy::System => {
            if let Some(driver_id) = &booking.driver_id {
                deliver(
                    state,
                    Notification::new(
                        format!("driver:{driver_id}"),
                        "booking_cancelled",
                        cancellation.clone(),
                    ),
                );

                if let Some(fee) = booking.cancellation_fee {
                    deliver(
                        state,
                        Notification::new(
                            format!("driver:{driver_id}"),
                            "cancellation_fee",
                            json!({
                                "bookingId": booking.booking_id,
                                "feeAmount": fee,
                                "currency": booking.fare.currency,
                                "reason": "Passenger cancellation after driver assignment",
                            }),
                        ),
                    );
                }
            }
        }
        CancelledBy::Driver => {
            deliver(
                state,
                Notification::new(
                    format!("user:{}", booking.passenger_id),
                    "booking_cancelled",
                    cancellation.clone(),
                ),
            );

            let voucher = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
            deliver(
                state,
                Notification::new(
                    format!("user:{}", booking.passenger_id),
                    "apology_notification",
                    json!({
                        "bookingId": booking.booking_id,
                        "message": "We apologize for the cancellation by the driver",
                        "compensation": {
                            "type": "VOUCHER",
                            "amount": APOLOGY_COMPENSATION_VND,
                            "currency": booking.fare.currency,
                            "code": format!("APOLOGY{voucher}"),
                        },
                    }),
                ),
            );
        }
    }

    let severity = if cancelled_by == CancelledBy::Driver {
        "HIGH"
    } else {
        "MEDIUM"
    };
    deliver(
        state,
        Notification::new(
            "admin:alerts",
            "booking_cancelled_alert",
            json!({
                "bookingId": booking.booking_id,
                "cancelledBy": cancelled_by,
                "reason": booking.cancellation_reason,
                "severity": severity,
            }),
        ),
    );
}

pub fn notify_payment(state: &Arc<AppState>, booking: &Booking, status: PaymentStatus) {
    let payment = json!({
        "bookingId": booking.booking_id,
        "status": status,
        "amount": booking.fare.total_fare,
        "currency": booking.fare.currency,
        "transactionId": booking.payment.transaction_id,
        "timestamp": Utc::now(),
    });

    deliver(
        state,
        Notification::new(
            format!("user:{}", booking.passenger_id),
            "payment_status",
            payment.clone(),
        ),
    );

    if status == PaymentStatus::Paid {
        deliver(
            state,
            Notification::new(
                format!("user:{}", booking.passenger_id),
                "payment_receipt",
                json!({
                    "bookingId": booking.booking_id,
                    "amount": booking.fare.total_fare,
                    "currency": booking.fare.currency,
                    "paymentMethod": booking.payment.method,
                    "items": [
                        { "description": "Base fare", "amount": booking.fare.base_fare },
                        { "description": "Distance fare", "amount": booking.fare.distance_fare },
                        { "description": "Time fare", "amount": booking.fare.time_fare },
                        { "description": "Surge multiplier", "amount": booking.fare.surge_multiplier },
                    ],
                }),
            ),
        );

        if let Some(driver_id) = &booking.driver_id {
            deliver(
                state,
                Notification::new(
                    format!("driver:{driver_id}"),
                    "payment_received",
                    payment,
                ),
            );
        }
    }
}

/// Every delivery runs as its own task; a failing sink is logged and never
/// reaches the caller.
fn deliver(state: &Arc<AppState>, notification: Notification) {
    state
        .metrics
        .notifications_total
        .with_label_values(&[notification.event.as_str()])
        .inc();

    let sink = state.sink.clone();
    tokio::spawn(async move {
        if let Err(err) = sink.deliver(notification).await {
            warn!(error = %err, "notification delivery failed");
        }
    });
}
