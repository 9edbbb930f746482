use std::{cmp, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CountdownStatus {
    #[default]
    Idle,
    Running,
    Expired,
}

/// Offer countdown shown on the result page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Countdown {
    pub status: CountdownStatus,
    pub target_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    running_anchor: Option<Instant>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountdownSnapshot {
    pub status: CountdownStatus,
    pub remaining_ms: u64,
    pub display: String,
}

impl Countdown {
    pub fn new(target: Duration) -> Self {
        Self {
            status: CountdownStatus::Idle,
            target_ms: target.as_millis() as u64,
            started_at: None,
            running_anchor: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.status = CountdownStatus::Running;
        self.started_at = Some(Utc::now());
        self.running_anchor = Some(now);
    }

    /// A running countdown restored from disk has no monotonic anchor and
    /// counts from its wall-clock start instead.
    pub fn elapsed_ms(&self) -> u64 {
        match (self.status, self.running_anchor) {
            (CountdownStatus::Idle, _) => 0,
            (CountdownStatus::Expired, _) => self.target_ms,
            (CountdownStatus::Running, Some(anchor)) => anchor.elapsed().as_millis() as u64,
            (CountdownStatus::Running, None) => match self.started_at {
                Some(started_at) => cmp::max((Utc::now() - started_at).num_milliseconds(), 0) as u64,
                None => self.target_ms,
            },
        }
    }

    pub fn remaining_ms(&self) -> u64 {
        match self.status {
            CountdownStatus::Idle => self.target_ms,
            CountdownStatus::Expired => 0,
            CountdownStatus::Running => {
                cmp::max(self.target_ms as i64 - self.elapsed_ms() as i64, 0) as u64
            }
        }
    }

    /// Flips a running countdown to `Expired` once nothing remains.
    pub fn sync_status(&mut self) {
        if self.status == CountdownStatus::Running && self.remaining_ms() == 0 {
            self.status = CountdownStatus::Expired;
        }
    }

    pub fn is_expired(&self) -> bool {
        self.status == CountdownStatus::Expired || self.remaining_ms() == 0
    }

    pub fn snapshot(&mut self) -> CountdownSnapshot {
        self.sync_status();
        let remaining_ms = self.remaining_ms();
        CountdownSnapshot {
            status: self.status,
            remaining_ms,
            display: format_mm_ss(remaining_ms),
        }
    }
}

/// `MM:SS`, rounding up so `00:00` only shows once the countdown is over.
pub fn format_mm_ss(remaining_ms: u64) -> String {
    let seconds = remaining_ms.div_ceil(1_000);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Drives a countdown, reporting a snapshot every tick until it expires.
pub struct CountdownTicker {
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CountdownTicker {
    pub fn spawn<F>(mut countdown: Countdown, tick_interval: Duration, mut on_tick: F) -> Result<Self>
    where
        F: FnMut(CountdownSnapshot) + Send + 'static,
    {
        let runtime = Handle::try_current().context("countdown ticker needs a tokio runtime")?;
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let task = runtime.spawn(async move {
            if countdown.status == CountdownStatus::Idle {
                countdown.start(Instant::now());
            }

            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Countdown ticker cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        let snapshot = countdown.snapshot();
                        let expired = snapshot.status == CountdownStatus::Expired;
                        on_tick(snapshot);
                        if expired {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            cancel_token,
            task: Some(task),
        })
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub async fn join(mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.await.context("countdown ticker failed to join")?;
        }
        Ok(())
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
