pub mod cache;
pub mod retry;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo;
use crate::models::booking::{Booking, BookingStatus, LngLat, PaymentStatus, VehicleType};

#[derive(Debug, Default, Clone)]
pub struct SearchFilters {
    pub passenger_id: Option<String>,
    pub driver_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub vehicle_type: Option<VehicleType>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl Pagination {
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, 100),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub pages: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub bookings: Vec<Booking>,
    pub pagination: PageInfo,
}

#[derive(Debug)]
pub struct Transitioned {
    pub previous: BookingStatus,
    pub booking: Booking,
}

/// Single writer of truth for bookings. Transitions are guarded per entry:
/// the status check and the mutation happen under the same entry lock, so a
/// stale caller fails with `InvalidTransition` instead of corrupting state.
pub struct BookingStore {
    bookings: DashMap<String, Booking>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self {
            bookings: DashMap::new(),
        }
    }

    pub fn insert(&self, booking: Booking) -> Result<(), AppError> {
        self.bookings.insert(booking.booking_id.clone(), booking);
        Ok(())
    }

    pub fn get(&self, booking_id: &str) -> Option<Booking> {
        self.bookings.get(booking_id).map(|entry| entry.clone())
    }

    pub fn transition(
        &self,
        booking_id: &str,
        next: BookingStatus,
        apply: impl FnOnce(&mut Booking),
    ) -> Result<Transitioned, AppError> {
        let mut entry = self
            .bookings
            .get_mut(booking_id)
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;

        let previous = entry.status;
        if !previous.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: previous,
                to: next,
            });
        }

        entry.status = next;
        stamp(&mut entry, next, Utc::now());
        apply(&mut entry);

        Ok(Transitioned {
            previous,
            booking: entry.clone(),
        })
    }

    /// Idempotent overwrite keyed by booking id; applying the same payment
    /// outcome twice leaves the same record.
    pub fn set_payment(
        &self,
        booking_id: &str,
        status: PaymentStatus,
        transaction_id: Option<String>,
    ) -> Result<Booking, AppError> {
        let mut entry = self
            .bookings
            .get_mut(booking_id)
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;

        entry.payment.status = status;
        if transaction_id.is_some() {
            entry.payment.transaction_id = transaction_id;
        }

        Ok(entry.clone())
    }

    pub fn search(&self, filters: &SearchFilters, pagination: Pagination) -> SearchResult {
        let pagination = pagination.clamped();

        let mut matched: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|entry| matches_filters(entry.value(), filters))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));

        let total = matched.len();
        let pages = total.div_ceil(pagination.limit as usize);
        let skip = (pagination.page as usize - 1) * pagination.limit as usize;
        let bookings = matched
            .into_iter()
            .skip(skip)
            .take(pagination.limit as usize)
            .collect();

        SearchResult {
            bookings,
            pagination: PageInfo {
                page: pagination.page,
                limit: pagination.limit,
                total,
                pages,
            },
        }
    }

    /// Geo-proximity lookup restricted to PENDING bookings, nearest first.
    pub fn nearby_pending(&self, center: LngLat, max_distance_m: f64) -> Vec<Booking> {
        let mut matched: Vec<(f64, Booking)> = self
            .bookings
            .iter()
            .filter(|entry| entry.status == BookingStatus::Pending)
            .filter_map(|entry| {
                let distance = geo::haversine_m(&center, &entry.pickup.coordinates);
                (distance <= max_distance_m).then(|| (distance, entry.value().clone()))
            })
            .collect();
        matched.sort_by(|a, b| a.0.total_cmp(&b.0));
        matched.into_iter().map(|(_, booking)| booking).collect()
    }

    pub fn active_bookings(&self) -> Vec<Booking> {
        self.bookings
            .iter()
            .filter(|entry| entry.is_active())
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }
}

impl Default for BookingStore {
    fn default() -> Self {
        Self::new()
    }
}

// Lifecycle timestamps are written once, by the transition that owns them.
fn stamp(booking: &mut Booking, next: BookingStatus, now: DateTime<Utc>) {
    match next {
        BookingStatus::Assigned if booking.assigned_at.is_none() => {
            booking.assigned_at = Some(now);
        }
        BookingStatus::InProgress if booking.started_at.is_none() => {
            booking.started_at = Some(now);
        }
        BookingStatus::Completed if booking.completed_at.is_none() => {
            booking.completed_at = Some(now);
        }
        BookingStatus::Cancelled if booking.cancelled_at.is_none() => {
            booking.cancelled_at = Some(now);
        }
        _ => {}
    }
}

fn matches_filters(booking: &Booking, filters: &SearchFilters) -> bool {
    if let Some(passenger_id) = &filters.passenger_id {
        if booking.passenger_id != *passenger_id {
            return false;
        }
    }
    if let Some(driver_id) = &filters.driver_id {
        if booking.driver_id.as_deref() != Some(driver_id.as_str()) {
            return false;
        }
    }
    if let Some(status) = filters.status {
        if booking.status != status {
            return false;
        }
    }
    if let Some(vehicle_type) = filters.vehicle_type {
        if booking.vehicle_type != vehicle_type {
            return false;
        }
    }
    if let Some(start) = filters.start_date {
        if booking.requested_at < start {
            return false;
        }
    }
    if let Some(end) = filters.end_date {
        if booking.requested_at > end {
            return false;
        }
    }
    true
}
