use anyhow::{anyhow, Result};
use tauri::{AppHandle, Emitter};

use super::{AnalyticsEvent, AnalyticsSink};

/// Forwards events to the page, which hands them to its pixel script.
pub struct WebviewSink {
    app_handle: AppHandle,
}

impl WebviewSink {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl AnalyticsSink for WebviewSink {
    fn send(&self, event: &AnalyticsEvent) -> Result<()> {
        self.app_handle
            .emit("analytics-event", event)
            .map_err(|err| anyhow!("failed to emit analytics-event: {err}"))
    }
}
