use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::Result;
use log::info;
use serde::Serialize;
use serde_json::json;

use crate::{
    analytics::{events, AnalyticsClient},
    timing::{RevealSchedule, ScheduleHandle},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ModalTrigger {
    Delay,
    Scroll,
}

/// Landing page state: the lead modal opens once, on whichever of the delay or
/// the scroll threshold comes first.
#[derive(Clone)]
pub struct LandingPage {
    analytics: AnalyticsClient,
    modal_delay: Duration,
    scroll_threshold: f64,
    modal_trigger: Arc<Mutex<Option<ModalTrigger>>>,
}

impl LandingPage {
    pub fn new(analytics: AnalyticsClient, modal_delay: Duration, scroll_threshold: f64) -> Self {
        Self {
            analytics,
            modal_delay,
            scroll_threshold,
            modal_trigger: Arc::new(Mutex::new(None)),
        }
    }

    pub fn modal_trigger(&self) -> Option<ModalTrigger> {
        *self
            .modal_trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// `fraction` is how far down the page the visitor is, 0.0 to 1.0.
    /// Returns `true` when this call opened the modal.
    pub fn on_scroll(&self, fraction: f64) -> bool {
        fraction >= self.scroll_threshold && self.open_modal(ModalTrigger::Scroll)
    }

    /// Starts the delay timer; `on_open` runs if the timer is what opens the modal.
    pub fn arm_modal_timer<F>(&self, mut on_open: F) -> Result<ScheduleHandle>
    where
        F: FnMut(ModalTrigger) + Send + 'static,
    {
        let page = self.clone();
        RevealSchedule::new()
            .at(self.modal_delay, ModalTrigger::Delay)
            .start(move |trigger| {
                if page.open_modal(trigger) {
                    on_open(trigger);
                }
            })
    }

    fn open_modal(&self, trigger: ModalTrigger) -> bool {
        {
            let mut guard = self
                .modal_trigger
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if guard.is_some() {
                return false;
            }
            *guard = Some(trigger);
        }

        info!("Landing modal opened by {trigger:?}");
        self.analytics
            .track(events::MODAL_OPENED, json!({ "trigger": trigger }));
        true
    }
}
