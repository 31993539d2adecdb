pub mod dead_letter;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::bus::dead_letter::{DeadLetter, DeadLetterQueue};
use crate::error::AppError;
use crate::models::event::{DomainEvent, EventEnvelope};

#[derive(Debug, Clone)]
pub struct Delivery {
    pub routing_key: String,
    pub payload: String,
}

/// A durable queue bound to the exchange. The queue owns both channel ends,
/// so undelivered messages survive a consumer restart; a worker re-attaches
/// by locking the receiver again.
pub struct Queue {
    pub name: String,
    pub pattern: String,
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Mutex<mpsc::UnboundedReceiver<Delivery>>,
    depth: AtomicI64,
}

impl Queue {
    fn new(name: &str, pattern: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            tx,
            rx: Mutex::new(rx),
            depth: AtomicI64::new(0),
        }
    }

    fn push(&self, delivery: Delivery) -> Result<(), AppError> {
        self.tx
            .send(delivery)
            .map_err(|err| AppError::BrokerUnavailable(format!("queue {}: {err}", self.name)))?;
        self.depth.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub async fn recv(&self) -> Option<Delivery> {
        let delivery = self.rx.lock().await.recv().await;
        if delivery.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        delivery
    }

    pub fn depth(&self) -> i64 {
        self.depth.load(Ordering::Relaxed)
    }
}

/// In-process topic exchange. A published message is copied to every queue
/// whose binding pattern matches its routing key; consumption is pull-based
/// with ack-on-success and reject-without-requeue into the dead-letter queue.
pub struct TopicExchange {
    pub name: String,
    queues: DashMap<String, Arc<Queue>>,
    dead_letters: DeadLetterQueue,
}

impl TopicExchange {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            queues: DashMap::new(),
            dead_letters: DeadLetterQueue::new(),
        }
    }

    /// Assert semantics: binding an existing queue name returns the queue
    /// that is already there.
    pub fn bind_queue(&self, queue_name: &str, pattern: &str) -> Arc<Queue> {
        self.queues
            .entry(queue_name.to_string())
            .or_insert_with(|| Arc::new(Queue::new(queue_name, pattern)))
            .clone()
    }

    /// Wraps the event in an envelope and copies it to every matching queue.
    /// Returns the generated event id once the queues accepted the message,
    /// independent of any consumer processing it.
    pub fn publish(&self, event: &DomainEvent) -> Result<String, AppError> {
        let envelope = EventEnvelope::new(event.clone());
        let payload = serde_json::to_string(&envelope)
            .map_err(|err| AppError::Internal(format!("event serialization failed: {err}")))?;
        let routing_key = event.routing_key();

        let mut delivered = 0;
        for queue in self.queues.iter() {
            if pattern_matches(&queue.pattern, &routing_key) {
                queue.push(Delivery {
                    routing_key: routing_key.clone(),
                    payload: payload.clone(),
                })?;
                delivered += 1;
            }
        }

        debug!(
            event_id = %envelope.event_id,
            routing_key = %routing_key,
            queues = delivered,
            "event published"
        );
        Ok(envelope.event_id)
    }

    pub fn dead_letter(&self, delivery: &Delivery, error: &str) {
        self.dead_letters
            .push(&delivery.routing_key, &delivery.payload, error);
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.snapshot()
    }

    pub fn dead_letter_count(&self) -> usize {
        self.dead_letters.len()
    }

    pub fn queue(&self, name: &str) -> Option<Arc<Queue>> {
        self.queues.get(name).map(|entry| entry.clone())
    }

    pub fn queue_depths(&self) -> Vec<(String, i64)> {
        self.queues
            .iter()
            .map(|entry| (entry.name.clone(), entry.depth()))
            .collect()
    }
}

/// Dotted topic matching: `*` matches exactly one segment, `#` matches any
/// number of segments including none.
pub fn pattern_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_segments(&pattern, &key)
}

fn match_segments(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => {
            if match_segments(rest, key) {
                return true;
            }
            !key.is_empty() && match_segments(pattern, &key[1..])
        }
        Some((&"*", rest)) => !key.is_empty() && match_segments(rest, &key[1..]),
        Some((&segment, rest)) => {
            key.first() == Some(&segment) && match_segments(rest, &key[1..])
        }
    }
}
