use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use booking_core::api::rest::router;
use booking_core::config::Config;
use booking_core::engine::timeout;
use booking_core::models::booking::{
    Booking, BookingMetadata, BookingStatus, Fare, LngLat, Payment, Place, VehicleType,
};
use booking_core::models::event::{DomainEvent, PaymentCompleted, PaymentFailed};
use booking_core::notify::RecordingSink;
use booking_core::state::AppState;

const SERVICE_TOKEN: &str = "test-service-token";

fn test_config() -> Config {
    Config {
        service_token: SERVICE_TOKEN.to_string(),
        ..Config::default()
    }
}

fn setup_with_config(config: Config) -> (axum::Router, Arc<AppState>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let state = Arc::new(AppState::with_sink(config, sink.clone()));
    state.consumers.start_all(&state);
    (router(state.clone()), state, sink)
}

fn setup() -> (axum::Router, Arc<AppState>, Arc<RecordingSink>) {
    setup_with_config(test_config())
}

fn user_request(method: &str, uri: &str, user: &str, role: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user)
        .header("x-user-role", role)
        .header("content-type", "application/json");
    match body {
        Some(body) => builder
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn service_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-service-token", SERVICE_TOKEN)
        .header("content-type", "application/json");
    match body {
        Some(body) => builder
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn create_booking_body() -> Value {
    json!({
        "pickup": {
            "address": "227 Nguyen Van Cu",
            "coordinates": { "lat": 10.7626, "lng": 106.6602 }
        },
        "destination": {
            "address": "Landmark 81",
            "coordinates": { "lat": 10.7720, "lng": 106.7003 }
        },
        "vehicleType": "STANDARD"
    })
}

async fn create_booking(app: &axum::Router, passenger: &str) -> Value {
    let response = app
        .clone()
        .oneshot(user_request(
            "POST",
            "/bookings",
            passenger,
            "passenger",
            Some(create_booking_body()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

async fn seed_driver(app: &axum::Router, driver_id: &str, lat: f64, lng: f64) {
    let response = app
        .clone()
        .oneshot(service_request(
            "PUT",
            &format!("/drivers/{driver_id}"),
            Some(json!({
                "name": "Nguyen Van A",
                "status": "AVAILABLE",
                "vehicleType": "STANDARD",
                "location": { "lat": lat, "lng": lng },
                "rating": 4.7
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_reports_connectivity_and_consumers() {
    let (app, _state, _sink) = setup();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["store"], "connected");
    assert_eq!(body["services"]["broker"], "connected");
    assert_eq!(body["consumers"]["initialized"], true);
    assert_eq!(body["consumers"]["total"], 4);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state, _sink) = setup();
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("events_consumed_total") || body.contains("queue_depth"));
}

// end-to-end: create -> PENDING, booking.created on the bus, nearby drivers
// notified with the STANDARD 5km radius
#[tokio::test]
async fn creating_a_booking_notifies_nearby_drivers() {
    let (app, state, sink) = setup();
    seed_driver(&app, "DRIVER001", 10.763, 106.661).await;

    let probe = state.bus.bind_queue("probe.created", "booking.created");

    let booking = create_booking(&app, "passenger-1").await;
    assert_eq!(booking["status"], "PENDING");
    assert!(booking["bookingId"].as_str().unwrap().starts_with("BKG"));
    assert!(booking["driverId"].is_null());
    assert!(booking["fare"]["totalFare"].as_f64().unwrap() > 0.0);
    // [lng, lat] storage order
    assert_eq!(booking["pickup"]["coordinates"][0], 106.6602);
    assert_eq!(booking["pickup"]["coordinates"][1], 10.7626);

    let delivery = tokio::time::timeout(Duration::from_secs(1), probe.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.routing_key, "booking.created");
    assert!(delivery.payload.contains("BOOKING_CREATED"));

    tokio::time::sleep(Duration::from_millis(300)).await;

    let booking_id = booking["bookingId"].as_str().unwrap();
    let notified = sink.for_channel("driver:DRIVER001");
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].event, "booking_request");

    let marker_key = format!("notification:booking:{booking_id}:drivers_notified");
    let marker: Value = serde_json::from_str(&state.cache.get(&marker_key).unwrap()).unwrap();
    assert_eq!(marker["count"], 1);
}

#[tokio::test]
async fn drivers_outside_the_radius_or_wrong_tier_are_skipped() {
    let (app, _state, sink) = setup();
    // ~20km away from the pickup
    seed_driver(&app, "FAR001", 10.90, 106.84).await;
    // close but wrong vehicle tier
    let response = app
        .clone()
        .oneshot(service_request(
            "PUT",
            "/drivers/BIKE001",
            Some(json!({
                "name": "Tran Thi B",
                "status": "AVAILABLE",
                "vehicleType": "BIKE",
                "location": { "lat": 10.763, "lng": 106.661 },
                "rating": 4.9
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    create_booking(&app, "passenger-1").await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(sink.for_channel("driver:FAR001").is_empty());
    assert!(sink.for_channel("driver:BIKE001").is_empty());
}

#[tokio::test]
async fn booking_with_out_of_bounds_coordinates_is_rejected() {
    let (app, state, _sink) = setup();
    let response = app
        .oneshot(user_request(
            "POST",
            "/bookings",
            "passenger-1",
            "passenger",
            Some(json!({
                "pickup": {
                    "address": "nowhere",
                    "coordinates": { "lat": 95.0, "lng": 106.66 }
                },
                "destination": {
                    "address": "Landmark 81",
                    "coordinates": { "lat": 10.7720, "lng": 106.7003 }
                },
                "vehicleType": "STANDARD"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(state.store.is_empty());
}

// end-to-end: assign -> ASSIGNED, assignedAt set, ETA >= 1,
// booking.driver.assigned published
#[tokio::test]
async fn assigning_a_driver_sets_eta_and_publishes() {
    let (app, state, _sink) = setup();
    let booking = create_booking(&app, "passenger-1").await;
    let booking_id = booking["bookingId"].as_str().unwrap();

    let probe = state
        .bus
        .bind_queue("probe.assigned", "booking.driver.assigned");

    let response = app
        .clone()
        .oneshot(service_request(
            "POST",
            &format!("/bookings/{booking_id}/assign-driver"),
            Some(json!({
                "driverId": "DRIVER001",
                "driverLocation": { "lat": 10.763, "lng": 106.661 }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let updated = body_json(response).await["data"].clone();
    assert_eq!(updated["status"], "ASSIGNED");
    assert_eq!(updated["driverId"], "DRIVER001");
    assert!(updated["assignedAt"].is_string());
    assert!(updated["pickupEtaMin"].as_i64().unwrap() >= 1);

    let delivery = tokio::time::timeout(Duration::from_secs(1), probe.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.routing_key, "booking.driver.assigned");
    let envelope: Value = serde_json::from_str(&delivery.payload).unwrap();
    assert_eq!(envelope["type"], "DRIVER_ASSIGNED");
    assert_eq!(envelope["data"]["bookingId"], booking_id);
    assert!(envelope["data"]["eta"].as_i64().unwrap() >= 1);
}

// end-to-end: second assignment attempt is an InvalidTransition with no
// state change and no event
#[tokio::test]
async fn reassigning_an_assigned_booking_conflicts() {
    let (app, state, _sink) = setup();
    let booking = create_booking(&app, "passenger-1").await;
    let booking_id = booking["bookingId"].as_str().unwrap();

    let assign = |driver: &str| {
        service_request(
            "POST",
            &format!("/bookings/{booking_id}/assign-driver"),
            Some(json!({
                "driverId": driver,
                "driverLocation": { "lat": 10.763, "lng": 106.661 }
            })),
        )
    };

    let response = app.clone().oneshot(assign("DRIVER001")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let first_assigned_at = state.store.get(booking_id).unwrap().assigned_at;

    let probe = state
        .bus
        .bind_queue("probe.reassigned", "booking.driver.assigned");
    let response = app.clone().oneshot(assign("DRIVER002")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);

    let current = state.store.get(booking_id).unwrap();
    assert_eq!(current.status, BookingStatus::Assigned);
    assert_eq!(current.driver_id.as_deref(), Some("DRIVER001"));
    assert_eq!(current.assigned_at, first_assigned_at);
    assert_eq!(probe.depth(), 0);
}

// end-to-end: passenger cancels a PENDING booking -> CANCELLED, no fee,
// booking.cancelled published
#[tokio::test]
async fn cancelling_a_pending_booking_is_free() {
    let (app, state, _sink) = setup();
    let booking = create_booking(&app, "passenger-1").await;
    let booking_id = booking["bookingId"].as_str().unwrap();

    let probe = state.bus.bind_queue("probe.cancelled", "booking.cancelled");

    let response = app
        .clone()
        .oneshot(user_request(
            "POST",
            &format!("/bookings/{booking_id}/cancel"),
            "passenger-1",
            "passenger",
            Some(json!({ "reason": "changed plans" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cancelled = body_json(response).await["data"].clone();
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(cancelled["cancelledBy"], "PASSENGER");
    assert_eq!(cancelled["cancellationReason"], "changed plans");
    assert!(cancelled["cancellationFee"].is_null());

    let delivery = tokio::time::timeout(Duration::from_secs(1), probe.recv())
        .await
        .unwrap()
        .unwrap();
    let envelope: Value = serde_json::from_str(&delivery.payload).unwrap();
    assert_eq!(envelope["type"], "BOOKING_CANCELLED");
    assert_eq!(envelope["data"]["cancelledBy"], "PASSENGER");
}

#[tokio::test]
async fn cancelling_inside_the_grace_window_owes_half_the_fare() {
    let (app, _state, sink) = setup();
    let booking = create_booking(&app, "passenger-1").await;
    let booking_id = booking["bookingId"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(service_request(
            "POST",
            &format!("/bookings/{booking_id}/assign-driver"),
            Some(json!({
                "driverId": "DRIVER001",
                "driverLocation": { "lat": 10.763, "lng": 106.661 }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(user_request(
            "POST",
            &format!("/bookings/{booking_id}/cancel"),
            "passenger-1",
            "passenger",
            Some(json!({ "reason": "wrong pickup point" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cancelled = body_json(response).await["data"].clone();
    let total = cancelled["fare"]["totalFare"].as_f64().unwrap();
    assert_eq!(cancelled["cancellationFee"].as_f64().unwrap(), (total * 0.5).round());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let fee_notices: Vec<_> = sink
        .for_channel("driver:DRIVER001")
        .into_iter()
        .filter(|n| n.event == "cancellation_fee")
        .collect();
    assert_eq!(fee_notices.len(), 1);
}

#[tokio::test]
async fn cancelling_after_the_grace_window_is_free() {
    let (app, state, _sink) = setup();

    let now = Utc::now();
    let booking = Booking {
        booking_id: "BKGGRACE".to_string(),
        passenger_id: "passenger-1".to_string(),
        driver_id: Some("DRIVER001".to_string()),
        pickup: Place {
            address: "a".to_string(),
            coordinates: LngLat::new(106.6602, 10.7626),
        },
        destination: Place {
            address: "b".to_string(),
            coordinates: LngLat::new(106.7003, 10.7720),
        },
        vehicle_type: VehicleType::Standard,
        status: BookingStatus::Assigned,
        estimated_distance_km: 4.6,
        estimated_duration_min: 9,
        pickup_eta_min: Some(2),
        fare: Fare {
            base_fare: 15_000.0,
            distance_fare: 41_400.0,
            time_fare: 4_500.0,
            surge_multiplier: 1.0,
            total_fare: 60_900.0,
            currency: "VND".to_string(),
        },
        payment: Payment::default(),
        schedule_time: None,
        requested_at: now - chrono::Duration::minutes(10),
        assigned_at: Some(now - chrono::Duration::minutes(6)),
        started_at: None,
        completed_at: None,
        cancelled_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        cancellation_fee: None,
        metadata: BookingMetadata {
            matching_score: 0.5,
            priority: 1,
            notes: None,
        },
    };
    state.store.insert(booking).unwrap();

    let response = app
        .oneshot(user_request(
            "POST",
            "/bookings/BKGGRACE/cancel",
            "passenger-1",
            "passenger",
            Some(json!({ "reason": "waited too long" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cancelled = body_json(response).await["data"].clone();
    assert_eq!(cancelled["status"], "CANCELLED");
    assert!(cancelled["cancellationFee"].is_null());
}

// end-to-end: a handler failure on payment.failed is diverted to the
// dead-letter path with the original payload and error text
#[tokio::test]
async fn poison_payment_event_lands_in_dead_letters() {
    let (app, state, _sink) = setup();

    state
        .bus
        .publish(&DomainEvent::PaymentFailed(PaymentFailed {
            booking_id: "BKGUNKNOWN".to_string(),
            reason: "card declined".to_string(),
            transaction_id: None,
        }))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let response = app
        .oneshot(service_request("GET", "/events/dead-letters", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let letters = body["data"].as_array().unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0]["routingKey"], "payment.failed");
    assert!(letters[0]["originalMessage"]
        .as_str()
        .unwrap()
        .contains("PAYMENT_FAILED"));
    assert!(letters[0]["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn duplicate_payment_events_settle_once() {
    let (app, state, _sink) = setup();
    let booking = create_booking(&app, "passenger-1").await;
    let booking_id = booking["bookingId"].as_str().unwrap().to_string();

    let event = DomainEvent::PaymentCompleted(PaymentCompleted {
        booking_id: booking_id.clone(),
        amount: 60_000.0,
        transaction_id: "TXN1".to_string(),
    });
    state.bus.publish(&event).unwrap();
    state.bus.publish(&event).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let current = state.store.get(&booking_id).unwrap();
    assert_eq!(current.payment.status, booking_core::models::booking::PaymentStatus::Paid);
    assert_eq!(current.payment.transaction_id.as_deref(), Some("TXN1"));
    assert!(state.bus.dead_letters().is_empty());
}

#[tokio::test]
async fn status_updates_walk_the_lifecycle_and_stop_at_terminal() {
    let (app, _state, _sink) = setup();
    let booking = create_booking(&app, "passenger-1").await;
    let booking_id = booking["bookingId"].as_str().unwrap().to_string();

    let assign = service_request(
        "POST",
        &format!("/bookings/{booking_id}/assign-driver"),
        Some(json!({
            "driverId": "DRIVER001",
            "driverLocation": { "lat": 10.763, "lng": 106.661 }
        })),
    );
    assert_eq!(app.clone().oneshot(assign).await.unwrap().status(), StatusCode::OK);

    for status in ["ARRIVING", "IN_PROGRESS", "COMPLETED"] {
        let response = app
            .clone()
            .oneshot(service_request(
                "PATCH",
                &format!("/bookings/{booking_id}/status"),
                Some(json!({ "status": status })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "transition to {status}");
    }

    let response = app
        .clone()
        .oneshot(user_request(
            "GET",
            &format!("/bookings/{booking_id}"),
            "passenger-1",
            "passenger",
            None,
        ))
        .await
        .unwrap();
    let current = body_json(response).await["data"].clone();
    assert_eq!(current["status"], "COMPLETED");
    assert!(current["startedAt"].is_string());
    assert!(current["completedAt"].is_string());

    // terminal: nothing moves a completed booking
    let response = app
        .oneshot(service_request(
            "PATCH",
            &format!("/bookings/{booking_id}/status"),
            Some(json!({ "status": "ARRIVING" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn status_endpoint_requires_the_service_token() {
    let (app, _state, _sink) = setup();
    let booking = create_booking(&app, "passenger-1").await;
    let booking_id = booking["bookingId"].as_str().unwrap();

    let response = app
        .oneshot(user_request(
            "PATCH",
            &format!("/bookings/{booking_id}/status"),
            "passenger-1",
            "passenger",
            Some(json!({ "status": "ARRIVING" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bookings_are_hidden_from_strangers() {
    let (app, _state, _sink) = setup();
    let booking = create_booking(&app, "passenger-1").await;
    let booking_id = booking["bookingId"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(user_request(
            "GET",
            &format!("/bookings/{booking_id}"),
            "passenger-2",
            "passenger",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(user_request(
            "GET",
            &format!("/bookings/{booking_id}"),
            "passenger-1",
            "passenger",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn search_scopes_results_to_the_caller() {
    let (app, _state, _sink) = setup();
    create_booking(&app, "passenger-1").await;
    create_booking(&app, "passenger-1").await;
    create_booking(&app, "passenger-2").await;

    let response = app
        .clone()
        .oneshot(user_request(
            "GET",
            "/bookings?page=1&limit=10",
            "passenger-1",
            "passenger",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["pagination"]["total"], 2);
    assert_eq!(body["data"]["bookings"].as_array().unwrap().len(), 2);

    let response = app
        .oneshot(user_request(
            "GET",
            "/bookings?status=COMPLETED",
            "passenger-1",
            "passenger",
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["pagination"]["total"], 0);
}

#[tokio::test]
async fn nearby_search_is_driver_only_and_radius_bound() {
    let (app, _state, _sink) = setup();
    create_booking(&app, "passenger-1").await;

    let response = app
        .clone()
        .oneshot(user_request(
            "GET",
            "/bookings/nearby/search?lat=10.7630&lng=106.6610",
            "driver-1",
            "driver",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 1);

    // default 5km radius excludes a faraway driver position
    let response = app
        .clone()
        .oneshot(user_request(
            "GET",
            "/bookings/nearby/search?lat=10.90&lng=106.84",
            "driver-1",
            "driver",
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["count"], 0);

    let response = app
        .oneshot(user_request(
            "GET",
            "/bookings/nearby/search?lat=10.7630&lng=106.6610",
            "passenger-1",
            "passenger",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stale_pending_bookings_time_out_to_no_driver() {
    let config = Config {
        pending_timeout_secs: 0,
        ..test_config()
    };
    let (app, state, _sink) = setup_with_config(config);
    let booking = create_booking(&app, "passenger-1").await;
    let booking_id = booking["bookingId"].as_str().unwrap();

    timeout::sweep_once(&state).await;

    let current = state.store.get(booking_id).unwrap();
    assert_eq!(current.status, BookingStatus::NoDriver);

    // terminal now; a second sweep changes nothing
    timeout::sweep_once(&state).await;
    assert_eq!(
        state.store.get(booking_id).unwrap().status,
        BookingStatus::NoDriver
    );
}

#[tokio::test]
async fn assigned_notice_reaches_the_passenger_channel() {
    let (app, _state, sink) = setup();
    let booking = create_booking(&app, "passenger-1").await;
    let booking_id = booking["bookingId"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(service_request(
            "POST",
            &format!("/bookings/{booking_id}/assign-driver"),
            Some(json!({
                "driverId": "DRIVER001",
                "driverLocation": { "lat": 10.763, "lng": 106.661 }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let assigned: Vec<_> = sink
        .for_channel("user:passenger-1")
        .into_iter()
        .filter(|n| n.event == "driver_assigned")
        .collect();
    assert_eq!(assigned.len(), 1);
    assert!(assigned[0].payload["eta"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn driver_cancellation_compensates_the_passenger_and_alerts_admins() {
    let (app, _state, sink) = setup();
    let booking = create_booking(&app, "passenger-1").await;
    let booking_id = booking["bookingId"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(service_request(
            "POST",
            &format!("/bookings/{booking_id}/assign-driver"),
            Some(json!({
                "driverId": "DRIVER001",
                "driverLocation": { "lat": 10.763, "lng": 106.661 }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(user_request(
            "POST",
            &format!("/bookings/{booking_id}/cancel"),
            "DRIVER001",
            "driver",
            Some(json!({ "reason": "vehicle breakdown" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled = body_json(response).await["data"].clone();
    assert_eq!(cancelled["cancelledBy"], "DRIVER");
    assert!(cancelled["cancellationFee"].is_null());

    tokio::time::sleep(Duration::from_millis(200)).await;

    let passenger_events: Vec<String> = sink
        .for_channel("user:passenger-1")
        .into_iter()
        .map(|n| n.event)
        .collect();
    assert!(passenger_events.contains(&"booking_cancelled".to_string()));
    assert!(passenger_events.contains(&"apology_notification".to_string()));

    let alerts = sink.for_channel("admin:alerts");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].payload["severity"], "HIGH");
}
