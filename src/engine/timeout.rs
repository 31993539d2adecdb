use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::engine::bookings::{self, TransitionMetadata};
use crate::error::AppError;
use crate::models::booking::BookingStatus;
use crate::state::AppState;

/// Applies the operational timeouts through the same guarded transitions as
/// every other caller: a booking that raced with a real transition simply
/// fails the precondition and is skipped.
pub async fn run_timeout_sweeper(state: Arc<AppState>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        sweep_once(&state).await;
    }
}

pub async fn sweep_once(state: &Arc<AppState>) {
    let now = Utc::now();
    let pending_deadline = chrono::Duration::seconds(state.config.pending_timeout_secs as i64);
    let stale_deadline = chrono::Duration::seconds(state.config.stale_trip_timeout_secs as i64);

    for booking in state.store.active_bookings() {
        let age = now - booking.requested_at;

        let target = if booking.status == BookingStatus::Pending && age >= pending_deadline {
            BookingStatus::NoDriver
        } else if age >= stale_deadline {
            BookingStatus::Timeout
        } else {
            continue;
        };

        match bookings::update_status(
            state,
            &booking.booking_id,
            target,
            TransitionMetadata::default(),
        )
        .await
        {
            Ok(_) => info!(
                booking_id = %booking.booking_id,
                target = %target,
                "booking timed out"
            ),
            Err(AppError::InvalidTransition { .. }) => {
                // lost the race to a real transition
                debug!(booking_id = %booking.booking_id, "timeout skipped");
            }
            Err(err) => warn!(
                booking_id = %booking.booking_id,
                error = %err,
                "timeout transition failed"
            ),
        }
    }
}
