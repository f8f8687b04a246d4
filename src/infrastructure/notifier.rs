use crate::domain::events::EngagementEvent;
use crate::domain::ports::Notifier;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Emits every event as a structured log line. Used where no email service is wired.
#[derive(Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: EngagementEvent) -> Result<()> {
        info!(event = event.name(), work_item = %event.work_item_id(), "notification");
        Ok(())
    }
}

/// Keeps every event it receives, for inspection.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<EngagementEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<EngagementEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: EngagementEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
