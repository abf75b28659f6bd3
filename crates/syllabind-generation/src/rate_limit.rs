// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Countdown timer that pauses a session while the provider is throttling.
//!
//! The controller is either idle or counting down. While counting down it
//! emits `rate_limit_wait` once per second with the remaining time, then
//! fires its callback exactly once. [`RateLimitController::cancel`] stops the
//! timer and drops the callback unfired.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use syllabind_core::SyllabindError;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::{EventSink, GenerationEvent};

#[derive(Debug)]
enum State {
    Idle,
    CountingDown {
        id: u64,
        reset_in: u64,
        stop: CancellationToken,
    },
}

#[derive(Debug)]
struct Shared {
    state: State,
    next_id: u64,
}

/// Owns the single rate-limit countdown of a session.
#[derive(Clone)]
pub struct RateLimitController {
    sink: EventSink,
    shared: Arc<Mutex<Shared>>,
}

impl RateLimitController {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink,
            shared: Arc::new(Mutex::new(Shared {
                state: State::Idle,
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whole seconds to wait, at least one.
    pub fn clamp_secs(duration: Duration) -> u64 {
        let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
        secs.max(1)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.lock().state, State::CountingDown { .. })
    }

    /// Seconds left on the active countdown.
    pub fn remaining(&self) -> Option<u64> {
        match self.lock().state {
            State::CountingDown { reset_in, .. } => Some(reset_in),
            State::Idle => None,
        }
    }

    /// Starts a countdown that calls `on_fire` when it reaches zero.
    ///
    /// Fails if a countdown is already running.
    pub fn start<F>(&self, duration: Duration, on_fire: F) -> Result<(), SyllabindError>
    where
        F: FnOnce() + Send + 'static,
    {
        let secs = Self::clamp_secs(duration);
        let stop = CancellationToken::new();
        let id = {
            let mut shared = self.lock();
            if let State::CountingDown { reset_in, .. } = shared.state {
                return Err(SyllabindError::Internal(format!(
                    "rate-limit countdown already active ({reset_in}s left)"
                )));
            }
            shared.next_id += 1;
            let id = shared.next_id;
            shared.state = State::CountingDown {
                id,
                reset_in: secs,
                stop: stop.clone(),
            };
            id
        };

        info!(reset_in = secs, "rate limited, pausing generation");
        let controller = self.clone();
        tokio::spawn(async move {
            for remaining in (1..=secs).rev() {
                controller.set_remaining(id, remaining);
                controller
                    .sink
                    .emit(GenerationEvent::RateLimitWait { reset_in: remaining })
                    .await;
                tokio::select! {
                    _ = stop.cancelled() => {
                        debug!("rate-limit countdown cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
            if controller.finish(id) {
                debug!("rate-limit countdown elapsed, resuming");
                on_fire();
            }
        });
        Ok(())
    }

    /// Stops the active countdown, if any. The pending callback never runs.
    pub fn cancel(&self) {
        let mut shared = self.lock();
        if let State::CountingDown { stop, .. } = &shared.state {
            stop.cancel();
        }
        shared.state = State::Idle;
    }

    /// Counts down and resolves once the timer fires.
    ///
    /// Returns `Ok(false)` when `cancel` is triggered first; the countdown is
    /// cancelled with it.
    pub async fn wait(
        &self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool, SyllabindError> {
        let (tx, rx) = oneshot::channel();
        self.start(duration, move || {
            let _ = tx.send(());
        })?;
        tokio::select! {
            fired = rx => Ok(fired.is_ok()),
            _ = cancel.cancelled() => {
                self.cancel();
                Ok(false)
            }
        }
    }

    fn set_remaining(&self, id: u64, remaining: u64) {
        if let State::CountingDown {
            id: current,
            reset_in,
            ..
        } = &mut self.lock().state
            && *current == id
        {
            *reset_in = remaining;
        }
    }

    /// Returns to idle if countdown `id` is still the active one.
    fn finish(&self, id: u64) -> bool {
        let mut shared = self.lock();
        match shared.state {
            State::CountingDown { id: current, .. } if current == id => {
                shared.state = State::Idle;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn controller() -> (RateLimitController, mpsc::Receiver<GenerationEvent>, CancellationToken) {
        let cancel = CancellationToken::new();
        let (sink, rx) = EventSink::channel(16, cancel.clone());
        (RateLimitController::new(sink), rx, cancel)
    }

    fn drain(rx: &mut mpsc::Receiver<GenerationEvent>) -> Vec<u64> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let GenerationEvent::RateLimitWait { reset_in } = event {
                out.push(reset_in);
            }
        }
        out
    }

    #[test]
    fn durations_round_up_to_whole_seconds() {
        assert_eq!(RateLimitController::clamp_secs(Duration::ZERO), 1);
        assert_eq!(RateLimitController::clamp_secs(Duration::from_millis(1500)), 2);
        assert_eq!(RateLimitController::clamp_secs(Duration::from_secs(3)), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_then_fires_once() {
        let (controller, mut rx, cancel) = controller();

        let resumed = controller.wait(Duration::from_secs(3), &cancel).await.unwrap();
        assert!(resumed);
        assert!(!controller.is_active());
        assert_eq!(drain(&mut rx), vec![3, 2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_twice_is_an_error() {
        let (controller, _rx, _cancel) = controller();
        controller.start(Duration::from_secs(5), || {}).unwrap();
        assert!(controller.is_active());
        assert!(controller.start(Duration::from_secs(1), || {}).is_err());
        controller.cancel();
        assert!(controller.start(Duration::from_secs(1), || {}).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_the_callback() {
        let (controller, _rx, _cancel) = controller();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        controller
            .start(Duration::from_secs(2), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        controller.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(controller.remaining().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn session_cancel_interrupts_wait() {
        let (controller, mut rx, cancel) = controller();
        let waiter = {
            let controller = controller.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { controller.wait(Duration::from_secs(10), &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(1500)).await;
        cancel.cancel();

        assert!(!waiter.await.unwrap().unwrap());
        assert!(!controller.is_active());
        assert_eq!(drain(&mut rx), vec![10, 9]);
    }
}
