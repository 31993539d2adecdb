use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A message a consumer rejected, kept with the original payload and the
/// error text for offline inspection instead of being requeued.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub routing_key: String,
    pub original_message: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

pub struct DeadLetterQueue {
    entries: Mutex<Vec<DeadLetter>>,
}

impl DeadLetterQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, routing_key: &str, original_message: &str, error: &str) {
        let entry = DeadLetter {
            routing_key: routing_key.to_string(),
            original_message: original_message.to_string(),
            error: error.to_string(),
            timestamp: Utc::now(),
        };
        self.entries.lock().expect("dead letter lock").push(entry);
    }

    pub fn snapshot(&self) -> Vec<DeadLetter> {
        self.entries.lock().expect("dead letter lock").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("dead letter lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DeadLetterQueue {
    fn default() -> Self {
        Self::new()
    }
}
