use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use tokio::{runtime::Handle, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

/// Ordered `(offset, action)` pairs run by a single task. Offsets count from
/// the moment the schedule starts; equal offsets fire in insertion order.
#[derive(Debug, Clone)]
pub struct RevealSchedule<A> {
    steps: Vec<(Duration, A)>,
}

impl<A> Default for RevealSchedule<A> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<A: Send + 'static> RevealSchedule<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, offset: Duration, action: A) -> Self {
        self.push(offset, action);
        self
    }

    pub fn push(&mut self, offset: Duration, action: A) {
        self.steps.push((offset, action));
    }

    /// Spawns the timer task on the current tokio runtime.
    pub fn start<F>(self, mut on_fire: F) -> Result<ScheduleHandle>
    where
        F: FnMut(A) + Send + 'static,
    {
        let runtime = Handle::try_current().context("reveal schedule needs a tokio runtime")?;

        let mut steps = self.steps;
        steps.sort_by_key(|(offset, _)| *offset);

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let task = runtime.spawn(async move {
            let started = Instant::now();
            for (offset, action) in steps {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Reveal schedule cancelled");
                        return;
                    }
                    _ = tokio::time::sleep_until(started + offset) => on_fire(action),
                }
            }
        });

        Ok(ScheduleHandle {
            cancel_token,
            task: Some(task),
        })
    }
}

/// Owns a running schedule. Dropping it cancels whatever has not fired yet.
pub struct ScheduleHandle {
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ScheduleHandle {
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits until every action fired or the schedule was cancelled.
    pub async fn join(mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.await.context("reveal schedule task failed to join")?;
        }
        Ok(())
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<(u64, &'static str)>>>, Instant) {
        (Arc::new(Mutex::new(Vec::new())), Instant::now())
    }

    #[tokio::test(start_paused = true)]
    async fn fires_in_offset_order() {
        let (fired, origin) = recorder();
        let sink = fired.clone();

        let handle = RevealSchedule::new()
            .at(Duration::from_millis(300), "third")
            .at(Duration::from_millis(100), "first")
            .at(Duration::from_millis(200), "second")
            .start(move |label| {
                let at = origin.elapsed().as_millis() as u64;
                sink.lock().unwrap().push((at, label));
            })
            .unwrap();

        handle.join().await.unwrap();

        assert_eq!(
            *fired.lock().unwrap(),
            vec![(100, "first"), (200, "second"), (300, "third")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn equal_offsets_keep_insertion_order() {
        let (fired, _) = recorder();
        let sink = fired.clone();

        RevealSchedule::new()
            .at(Duration::ZERO, "headline")
            .at(Duration::ZERO, "chart")
            .start(move |label| sink.lock().unwrap().push((0, label)))
            .unwrap()
            .join()
            .await
            .unwrap();

        let labels: Vec<_> = fired.lock().unwrap().iter().map(|(_, l)| *l).collect();
        assert_eq!(labels, vec!["headline", "chart"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_pending_actions() {
        let (fired, _) = recorder();
        let sink = fired.clone();

        let handle = RevealSchedule::new()
            .at(Duration::from_millis(100), "early")
            .at(Duration::from_secs(5), "late")
            .start(move |label| sink.lock().unwrap().push((0, label)))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(handle.is_finished());
        let labels: Vec<_> = fired.lock().unwrap().iter().map(|(_, l)| *l).collect();
        assert_eq!(labels, vec!["early"]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels() {
        let (fired, _) = recorder();
        let sink = fired.clone();

        let handle = RevealSchedule::new()
            .at(Duration::from_secs(1), "never")
            .start(move |label| sink.lock().unwrap().push((0, label)))
            .unwrap();
        drop(handle);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn start_outside_a_runtime_is_an_error() {
        let schedule = RevealSchedule::new().at(Duration::ZERO, ());
        assert!(schedule.start(|_| {}).is_err());
    }
}
