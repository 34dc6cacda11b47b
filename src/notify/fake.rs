use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::models::event::DeliveryEvent;
use crate::notify::{NotificationSink, NotifyError};

/// Captures every event it receives. Can be switched into a failing mode.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<DeliveryEvent>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            events: Arc::default(),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<DeliveryEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, event: &DeliveryEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());

        if self.fail {
            return Err(NotifyError::Failed("sink configured to fail".to_string()));
        }
        Ok(())
    }
}
