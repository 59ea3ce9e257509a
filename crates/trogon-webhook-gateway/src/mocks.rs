use std::sync::{Arc, Mutex};

use crate::delivery::{DeliveryError, EventPublisher};
use crate::envelope::OutboundEvent;

/// In-memory [`EventPublisher`] that records every acknowledged event.
#[derive(Clone, Debug, Default)]
pub struct MockEventPublisher {
    published: Arc<Mutex<Vec<OutboundEvent>>>,
    attempts: Arc<Mutex<u32>>,
    /// Number of publishes to fail before succeeding.
    /// Use 4 to exhaust the standard retry policy (1 + 3 retries).
    publish_fail_count: Arc<Mutex<u32>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_publish(&self) {
        self.fail_publish_count(1);
    }

    pub fn fail_publish_count(&self, n: u32) {
        *self.publish_fail_count.lock().unwrap() = n;
    }

    pub fn published(&self) -> Vec<OutboundEvent> {
        self.published.lock().unwrap().clone()
    }

    /// Publish calls made so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

impl EventPublisher for MockEventPublisher {
    async fn publish(&self, event: &OutboundEvent) -> Result<(), DeliveryError> {
        *self.attempts.lock().unwrap() += 1;

        {
            let mut remaining = self.publish_fail_count.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DeliveryError::Nack("mock publish failure".to_string()));
            }
        }

        self.published.lock().unwrap().push(event.clone());
        Ok(())
    }
}
