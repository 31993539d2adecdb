use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::booking::{BookingMetadata, BookingStatus, CancelledBy, Place, VehicleType};

/// Wire envelope for every message on the exchange:
/// `{eventId, type, timestamp, data}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            event_id: new_event_id(),
            timestamp: Utc::now(),
            event,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    BookingCreated(BookingCreated),
    BookingStatusChanged(BookingStatusChanged),
    DriverAssigned(DriverAssigned),
    BookingCancelled(BookingCancelled),
    PaymentCompleted(PaymentCompleted),
    PaymentFailed(PaymentFailed),
}

impl DomainEvent {
    pub fn routing_key(&self) -> String {
        match self {
            DomainEvent::BookingCreated(_) => "booking.created".to_string(),
            DomainEvent::BookingStatusChanged(e) => {
                format!("booking.status.{}", e.new_status.as_str().to_lowercase())
            }
            DomainEvent::DriverAssigned(_) => "booking.driver.assigned".to_string(),
            DomainEvent::BookingCancelled(_) => "booking.cancelled".to_string(),
            DomainEvent::PaymentCompleted(_) => "payment.completed".to_string(),
            DomainEvent::PaymentFailed(_) => "payment.failed".to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::BookingCreated(_) => "BOOKING_CREATED",
            DomainEvent::BookingStatusChanged(_) => "BOOKING_STATUS_CHANGED",
            DomainEvent::DriverAssigned(_) => "DRIVER_ASSIGNED",
            DomainEvent::BookingCancelled(_) => "BOOKING_CANCELLED",
            DomainEvent::PaymentCompleted(_) => "PAYMENT_COMPLETED",
            DomainEvent::PaymentFailed(_) => "PAYMENT_FAILED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreated {
    pub booking_id: String,
    pub passenger_id: String,
    pub pickup: Place,
    pub destination: Place,
    pub vehicle_type: VehicleType,
    pub status: BookingStatus,
    pub metadata: BookingMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusChanged {
    pub booking_id: String,
    pub old_status: BookingStatus,
    pub new_status: BookingStatus,
    pub driver_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverAssigned {
    pub booking_id: String,
    pub driver_id: String,
    pub eta: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingCancelled {
    pub booking_id: String,
    pub cancelled_by: CancelledBy,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCompleted {
    pub booking_id: String,
    pub amount: f64,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailed {
    pub booking_id: String,
    pub reason: String,
    pub transaction_id: Option<String>,
}

/// Fresh per publish: timestamp plus random suffix, never derived from the
/// payload, so republishing identical data never collides.
pub fn new_event_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("evt_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}
