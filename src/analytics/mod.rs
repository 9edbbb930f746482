//! Batched analytics delivery.
//!
//! Pages call [`AnalyticsClient::track`]; events queue up and reach the sink
//! together once no new event has arrived for the debounce window.

mod sink;

#[cfg(feature = "desktop")]
pub mod webview;

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::{runtime::Handle, task::JoinHandle};
use uuid::Uuid;

pub use sink::{AnalyticsSink, LogSink, RecordingSink};

pub mod events {
    pub const PAGE_VIEW: &str = "PageView";
    pub const MODAL_OPENED: &str = "ModalOpened";
    pub const QUIZ_START: &str = "QuizStart";
    pub const QUIZ_ANSWER: &str = "QuizAnswer";
    pub const QUIZ_COMPLETE: &str = "QuizComplete";
    pub const RESULT_VIEW: &str = "ResultView";
    pub const INITIATE_CHECKOUT: &str = "InitiateCheckout";
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    /// Lets the receiving pixel deduplicate browser and server deliveries.
    pub event_id: Uuid,
    pub name: String,
    pub properties: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    fn new(name: String, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };

        Self {
            event_id: Uuid::new_v4(),
            name,
            properties,
            timestamp: Utc::now(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct AnalyticsClient {
    queue: Arc<Mutex<Vec<AnalyticsEvent>>>,
    sink: Arc<dyn AnalyticsSink>,
    debounce: Duration,
    flush_timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AnalyticsClient {
    pub fn new(sink: Arc<dyn AnalyticsSink>, debounce: Duration) -> Self {
        Self {
            queue: Arc::new(Mutex::new(Vec::new())),
            sink,
            debounce,
            flush_timer: Arc::new(Mutex::new(None)),
        }
    }

    /// Queues an event and re-arms the flush timer. `properties` is usually a
    /// JSON object; `null` means none and any other value lands under `value`.
    ///
    /// Outside a tokio runtime there is no timer to arm, so the queue is
    /// flushed on the spot.
    pub fn track(&self, name: impl Into<String>, properties: Value) -> Uuid {
        let event = AnalyticsEvent::new(name.into(), properties);
        let event_id = event.event_id;
        debug!("Queued analytics event {} ({})", event.name, event_id);

        lock(&self.queue).push(event);
        self.schedule_flush();

        event_id
    }

    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Hands every queued event to the sink, returning how many were drained.
    pub fn flush(&self) -> usize {
        let events = std::mem::take(&mut *lock(&self.queue));
        for event in &events {
            if let Err(err) = self.sink.send(event) {
                warn!("Dropping analytics event {}: {err:#}", event.name);
            }
        }
        events.len()
    }

    /// Cancels the pending timer and delivers what is still queued.
    pub fn shutdown(&self) -> usize {
        self.cancel_timer();
        self.flush()
    }

    fn schedule_flush(&self) {
        let Ok(runtime) = Handle::try_current() else {
            self.flush();
            return;
        };

        let mut timer = lock(&self.flush_timer);
        if let Some(handle) = timer.take() {
            handle.abort();
        }

        let client = self.clone();
        let debounce = self.debounce;
        *timer = Some(runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            let delivered = client.flush();
            debug!("Flushed {delivered} analytics events");
        }));
    }

    fn cancel_timer(&self) {
        if let Some(handle) = lock(&self.flush_timer).take() {
            handle.abort();
        }
    }
}
