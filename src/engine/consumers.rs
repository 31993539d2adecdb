use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::Delivery;
use crate::error::AppError;
use crate::models::booking::{BookingStatus, PaymentStatus};
use crate::models::event::{DomainEvent, EventEnvelope};
use crate::notify::dispatch;
use crate::state::AppState;

/// The standing consumer set. Each kind owns one durable queue bound to the
/// exchange with its routing pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerKind {
    BookingStatus,
    Payment,
    Notification,
    Matching,
}

impl ConsumerKind {
    pub const ALL: [ConsumerKind; 4] = [
        ConsumerKind::BookingStatus,
        ConsumerKind::Payment,
        ConsumerKind::Notification,
        ConsumerKind::Matching,
    ];

    pub fn queue_name(self) -> &'static str {
        match self {
            ConsumerKind::BookingStatus => "ride.service.queue",
            ConsumerKind::Payment => "payment.service.queue",
            ConsumerKind::Notification => "notification.queue",
            ConsumerKind::Matching => "matching.queue",
        }
    }

    pub fn binding_pattern(self) -> &'static str {
        match self {
            ConsumerKind::BookingStatus => "booking.status.*",
            ConsumerKind::Payment => "payment.*",
            ConsumerKind::Notification => "booking.*",
            ConsumerKind::Matching => "booking.created",
        }
    }
}

/// One worker per queue: parse the envelope, dispatch by type, ack on
/// success. A failing handler is never retried in place; the message is
/// diverted to the dead-letter queue with the error text.
pub async fn run_consumer(state: Arc<AppState>, kind: ConsumerKind) {
    let queue = state
        .bus
        .bind_queue(kind.queue_name(), kind.binding_pattern());
    info!(
        queue = kind.queue_name(),
        pattern = kind.binding_pattern(),
        "consumer started"
    );

    while let Some(delivery) = queue.recv().await {
        match handle_delivery(&state, kind, &delivery).await {
            Ok(()) => {
                state
                    .metrics
                    .events_consumed_total
                    .with_label_values(&[kind.queue_name(), "ack"])
                    .inc();
            }
            Err(err) => {
                warn!(
                    queue = kind.queue_name(),
                    routing_key = %delivery.routing_key,
                    error = %err,
                    "handler failed; diverting message to dead letters"
                );
                state.bus.dead_letter(&delivery, &err.to_string());
                state.metrics.dead_letters_total.inc();
                state
                    .metrics
                    .events_consumed_total
                    .with_label_values(&[kind.queue_name(), "dead_letter"])
                    .inc();
            }
        }
    }

    warn!(queue = kind.queue_name(), "consumer stopped: queue closed");
}

async fn handle_delivery(
    state: &Arc<AppState>,
    kind: ConsumerKind,
    delivery: &Delivery,
) -> Result<(), AppError> {
    let envelope: EventEnvelope = serde_json::from_str(&delivery.payload)
        .map_err(|err| AppError::Internal(format!("malformed event payload: {err}")))?;

    debug!(
        queue = kind.queue_name(),
        event_id = %envelope.event_id,
        kind = envelope.event.kind(),
        "message received"
    );

    match kind {
        ConsumerKind::BookingStatus => handle_status_feed(state, &envelope),
        ConsumerKind::Payment => handle_payment(state, &envelope),
        ConsumerKind::Notification => handle_notification(state, &envelope).await,
        ConsumerKind::Matching => handle_matching(state, &envelope),
    }
}

fn handle_status_feed(state: &Arc<AppState>, envelope: &EventEnvelope) -> Result<(), AppError> {
    let DomainEvent::BookingStatusChanged(event) = &envelope.event else {
        debug!(kind = envelope.event.kind(), "ignored on status queue");
        return Ok(());
    };

    // downstream hooks keyed off the new status; all of them are set-based
    // so a redelivered event lands on the same state
    match event.new_status {
        BookingStatus::InProgress => {
            debug!(booking_id = %event.booking_id, "trip started downstream");
        }
        BookingStatus::Completed => {
            if let Some(booking) = state.store.get(&event.booking_id) {
                debug!(
                    booking_id = %event.booking_id,
                    duration_min = booking.duration_minutes(),
                    "trip completed downstream"
                );
            }
        }
        _ => {}
    }

    info!(
        booking_id = %event.booking_id,
        old_status = %event.old_status,
        new_status = %event.new_status,
        "status feed processed"
    );
    Ok(())
}

fn handle_payment(state: &Arc<AppState>, envelope: &EventEnvelope) -> Result<(), AppError> {
    match &envelope.event {
        DomainEvent::PaymentCompleted(event) => {
            let booking = state.store.set_payment(
                &event.booking_id,
                PaymentStatus::Paid,
                Some(event.transaction_id.clone()),
            )?;
            dispatch::notify_payment(state, &booking, PaymentStatus::Paid);
            info!(
                booking_id = %event.booking_id,
                transaction_id = %event.transaction_id,
                "payment completed"
            );
            Ok(())
        }
        DomainEvent::PaymentFailed(event) => {
            let booking = state.store.set_payment(
                &event.booking_id,
                PaymentStatus::Failed,
                event.transaction_id.clone(),
            )?;
            dispatch::notify_payment(state, &booking, PaymentStatus::Failed);
            warn!(
                booking_id = %event.booking_id,
                reason = %event.reason,
                "payment failed"
            );
            Ok(())
        }
        other => {
            debug!(kind = other.kind(), "ignored on payment queue");
            Ok(())
        }
    }
}

async fn handle_notification(
    state: &Arc<AppState>,
    envelope: &EventEnvelope,
) -> Result<(), AppError> {
    match &envelope.event {
        DomainEvent::BookingCreated(event) => {
            let booking = state.store.get(&event.booking_id).ok_or_else(|| {
                AppError::NotFound(format!("booking {} not found", event.booking_id))
            })?;
            dispatch::notify_nearby_drivers(state, &booking).await;
            Ok(())
        }
        DomainEvent::BookingCancelled(event) => {
            // the cancel notices go out with the transition itself; this is
            // just the downstream record of the fan-out
            debug!(booking_id = %event.booking_id, "cancellation seen on notification queue");
            Ok(())
        }
        other => {
            debug!(kind = other.kind(), "ignored on notification queue");
            Ok(())
        }
    }
}

fn handle_matching(state: &Arc<AppState>, envelope: &EventEnvelope) -> Result<(), AppError> {
    let DomainEvent::BookingCreated(event) = &envelope.event else {
        debug!(kind = envelope.event.kind(), "ignored on matching queue");
        return Ok(());
    };

    if state.store.get(&event.booking_id).is_some() {
        info!(
            booking_id = %event.booking_id,
            score = event.metadata.matching_score,
            priority = event.metadata.priority,
            "booking ready for matching"
        );
    }
    Ok(())
}

struct Worker {
    kind: ConsumerKind,
    handle: JoinHandle<()>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerStatus {
    pub initialized: bool,
    pub total: usize,
    pub active: usize,
}

/// Owns the worker set. Recovery is deliberately all-or-nothing: stop every
/// worker, then start every worker, so the queue bindings are never left in
/// a partially-rebuilt shape.
pub struct ConsumerRegistry {
    workers: Mutex<Vec<Worker>>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self {
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn start_all(&self, state: &Arc<AppState>) {
        let mut workers = self.workers.lock().expect("consumer registry lock");
        if !workers.is_empty() {
            warn!("event consumers already started");
            return;
        }

        for kind in ConsumerKind::ALL {
            workers.push(Worker {
                kind,
                handle: tokio::spawn(run_consumer(state.clone(), kind)),
            });
        }
        info!(count = workers.len(), "event consumers started");
    }

    pub fn stop_all(&self) {
        let mut workers = self.workers.lock().expect("consumer registry lock");
        for worker in workers.drain(..) {
            worker.handle.abort();
            debug!(queue = worker.kind.queue_name(), "consumer stopped");
        }
    }

    pub fn restart_all(&self, state: &Arc<AppState>) {
        self.stop_all();
        self.start_all(state);
        info!("event consumers restarted");
    }

    pub fn status(&self) -> ConsumerStatus {
        let workers = self.workers.lock().expect("consumer registry lock");
        ConsumerStatus {
            initialized: !workers.is_empty(),
            total: workers.len(),
            active: workers.iter().filter(|w| !w.handle.is_finished()).count(),
        }
    }
}

impl Default for ConsumerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls worker liveness; any dead worker triggers a full restart of the
/// consumer set.
pub async fn run_health_monitor(state: Arc<AppState>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let status = state.consumers.status();
        debug!(
            active = status.active,
            total = status.total,
            "consumer health check"
        );

        if status.initialized && status.active < status.total {
            warn!(
                active = status.active,
                total = status.total,
                "inactive consumer detected; restarting the full set"
            );
            state.consumers.restart_all(&state);
        }
    }
}
