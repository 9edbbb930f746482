use std::sync::Mutex;

use anyhow::{anyhow, Result};
use log::info;

use super::AnalyticsEvent;

/// Destination of flushed events. Delivery is fire-and-forget: the client logs
/// an `Err` and moves on.
pub trait AnalyticsSink: Send + Sync {
    fn send(&self, event: &AnalyticsEvent) -> Result<()>;
}

/// Writes one log line per event under the `analytics` target.
pub struct LogSink;

impl AnalyticsSink for LogSink {
    fn send(&self, event: &AnalyticsEvent) -> Result<()> {
        let properties = serde_json::to_string(&event.properties)?;
        info!(
            target: "analytics",
            "{} id={} props={}",
            event.name,
            event.event_id,
            properties
        );
        Ok(())
    }
}

/// Keeps delivered events in memory, for embedding hosts that forward them
/// in bulk.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.name).collect()
    }
}

impl AnalyticsSink for RecordingSink {
    fn send(&self, event: &AnalyticsEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow!("recording sink lock poisoned"))?
            .push(event.clone());
        Ok(())
    }
}
