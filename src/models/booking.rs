use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coordinate pair stored and serialized as `[lng, lat]` for geo-index
/// compatibility. Reversed order is a data-integrity bug, not a valid state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat(pub f64, pub f64);

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self(lng, lat)
    }

    pub fn lng(&self) -> f64 {
        self.0
    }

    pub fn lat(&self) -> f64 {
        self.1
    }

    pub fn in_bounds(&self) -> bool {
        (-180.0..=180.0).contains(&self.0) && (-90.0..=90.0).contains(&self.1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub address: String,
    pub coordinates: LngLat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    Standard,
    Premium,
    Luxury,
    Bike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Assigned,
    Arriving,
    InProgress,
    Completed,
    Cancelled,
    NoDriver,
    Timeout,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Assigned => "ASSIGNED",
            BookingStatus::Arriving => "ARRIVING",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::NoDriver => "NO_DRIVER",
            BookingStatus::Timeout => "TIMEOUT",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::Cancelled
                | BookingStatus::NoDriver
                | BookingStatus::Timeout
        )
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;

        match (self, next) {
            (Pending, Assigned | Cancelled | NoDriver | Timeout) => true,
            (Assigned, Arriving | Cancelled | Timeout) => true,
            (Arriving, InProgress | Cancelled | Timeout) => true,
            (InProgress, Completed | Cancelled | Timeout) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelledBy {
    Passenger,
    Driver,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Wallet,
    Banking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
}

impl Default for Payment {
    fn default() -> Self {
        Self {
            method: PaymentMethod::Cash,
            status: PaymentStatus::Pending,
            transaction_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fare {
    pub base_fare: f64,
    pub distance_fare: f64,
    pub time_fare: f64,
    pub surge_multiplier: f64,
    pub total_fare: f64,
    pub currency: String,
}

impl Fare {
    /// Total is always derived from the components; it is never edited on
    /// its own.
    pub fn recompute(&mut self) {
        self.total_fare =
            ((self.base_fare + self.distance_fare + self.time_fare) * self.surge_multiplier)
                .round();
    }
}

impl Default for Fare {
    fn default() -> Self {
        Self {
            base_fare: 0.0,
            distance_fare: 0.0,
            time_fare: 0.0,
            surge_multiplier: 1.0,
            total_fare: 0.0,
            currency: "VND".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingMetadata {
    pub matching_score: f64,
    pub priority: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: String,
    pub passenger_id: String,
    pub driver_id: Option<String>,
    pub pickup: Place,
    pub destination: Place,
    pub vehicle_type: VehicleType,
    pub status: BookingStatus,
    pub estimated_distance_km: f64,
    pub estimated_duration_min: i64,
    pub pickup_eta_min: Option<i64>,
    pub fare: Fare,
    pub payment: Payment,
    pub schedule_time: Option<DateTime<Utc>>,
    pub requested_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    pub cancellation_fee: Option<f64>,
    pub metadata: BookingMetadata,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            BookingStatus::Pending
                | BookingStatus::Assigned
                | BookingStatus::Arriving
                | BookingStatus::InProgress
        )
    }

    pub fn duration_minutes(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some((completed - started).num_minutes()),
            _ => None,
        }
    }
}

pub fn new_booking_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u128;
    let suffix = Uuid::new_v4().simple().to_string();
    format!("BKG{}{}", to_base36(millis), &suffix[..5]).to_uppercase()
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if n == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [BookingStatus; 8] = [
        BookingStatus::Pending,
        BookingStatus::Assigned,
        BookingStatus::Arriving,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoDriver,
        BookingStatus::Timeout,
    ];

    #[test]
    fn terminal_states_accept_no_transition() {
        for from in ALL_STATUSES.iter().filter(|s| s.is_terminal()) {
            for to in ALL_STATUSES {
                assert!(
                    !from.can_transition_to(to),
                    "{from} -> {to} should be rejected"
                );
            }
        }
    }

    #[test]
    fn lifecycle_path_is_allowed() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Assigned));
        assert!(BookingStatus::Assigned.can_transition_to(BookingStatus::Arriving));
        assert!(BookingStatus::Arriving.can_transition_to(BookingStatus::InProgress));
        assert!(BookingStatus::InProgress.can_transition_to(BookingStatus::Completed));
    }

    #[test]
    fn active_states_can_cancel_and_time_out() {
        for from in [
            BookingStatus::Pending,
            BookingStatus::Assigned,
            BookingStatus::Arriving,
            BookingStatus::InProgress,
        ] {
            assert!(from.can_transition_to(BookingStatus::Cancelled));
            assert!(from.can_transition_to(BookingStatus::Timeout));
        }
    }

    #[test]
    fn no_driver_only_from_pending() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::NoDriver));
        for from in ALL_STATUSES.iter().filter(|s| **s != BookingStatus::Pending) {
            assert!(!from.can_transition_to(BookingStatus::NoDriver));
        }
    }

    #[test]
    fn no_skipping_forward() {
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::InProgress));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Assigned.can_transition_to(BookingStatus::Completed));
    }

    #[test]
    fn coordinates_serialize_as_lng_lat_array() {
        let point = LngLat::new(106.6602, 10.7626);
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(json, "[106.6602,10.7626]");
    }

    #[test]
    fn coordinate_bounds_are_checked() {
        assert!(LngLat::new(106.66, 10.76).in_bounds());
        assert!(!LngLat::new(181.0, 10.76).in_bounds());
        assert!(!LngLat::new(106.66, 95.0).in_bounds());
        // a swapped pair lands out of bounds for this city
        assert!(!LngLat::new(10.7626, 106.6602).in_bounds());
    }

    #[test]
    fn fare_total_follows_components() {
        let mut fare = Fare {
            base_fare: 15_000.0,
            distance_fare: 45_000.0,
            time_fare: 6_000.0,
            surge_multiplier: 1.5,
            ..Fare::default()
        };
        fare.recompute();
        assert_eq!(fare.total_fare, 99_000.0);
    }

    #[test]
    fn booking_ids_are_prefixed_and_unique() {
        let a = new_booking_id();
        let b = new_booking_id();
        assert!(a.starts_with("BKG"));
        assert!(a.len() > 8);
        assert_ne!(a, b);
    }
}
