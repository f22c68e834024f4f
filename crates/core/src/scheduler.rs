//! Debounced rebuild scheduler
//!
//! Coalesces bursts of change notifications into a single `changed`
//! signal. The first call of a burst fixes a deadline `max` into the
//! future; every call re-arms a `min` quiet-period timer, clamped so the
//! signal never fires later than the deadline.

use std::sync::Arc;
use std::time::Duration;

use datebook_domain::BatchConfig;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
struct SchedulerState {
    deadline: Option<Instant>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every re-arm so a superseded timer that already woke up
    /// cannot fire.
    generation: u64,
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    changed: broadcast::Sender<()>,
}

impl SchedulerInner {
    fn fire(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.deadline = None;
            state.timer = None;
        }
        trace!("Emitting changed");
        let _ = self.changed.send(());
    }
}

/// Emits `changed` once per burst of [`RebuildScheduler::mark_dirty`] calls.
///
/// Must be used from within a tokio runtime.
pub struct RebuildScheduler {
    inner: Arc<SchedulerInner>,
    min_batch: Duration,
    max_batch: Duration,
}

impl RebuildScheduler {
    /// Scheduler waiting `min_batch` after each change and at most `max_batch` per burst.
    pub fn new(min_batch: Duration, max_batch: Duration) -> Self {
        let (changed, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SchedulerInner { state: Mutex::new(SchedulerState::default()), changed }),
            min_batch,
            max_batch: max_batch.max(min_batch),
        }
    }

    /// Scheduler with the configured batching bounds.
    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(Duration::from_secs(config.min_seconds), Duration::from_secs(config.max_seconds))
    }

    /// Receiver for `changed` notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.inner.changed.subscribe()
    }

    /// Record that calendar data changed.
    pub fn mark_dirty(&self) {
        let now = Instant::now();
        let mut state = self.inner.state.lock();

        match state.deadline {
            None => {
                state.deadline = Some(now + self.max_batch);
                self.arm(&mut state, self.min_batch);
            }
            Some(deadline) if now < deadline => {
                let delay = self.min_batch.min(deadline - now);
                self.arm(&mut state, delay);
            }
            // The pending timer is due now and will emit.
            Some(_) => {}
        }
    }

    /// Whether a `changed` emission is pending.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().deadline.is_some()
    }

    fn arm(&self, state: &mut SchedulerState, delay: Duration) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation = state.generation.wrapping_add(1);
        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        let fire_at = Instant::now() + delay;

        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;
            inner.fire(generation);
        }));
    }
}

impl Drop for RebuildScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.state.lock().timer.take() {
            timer.abort();
        }
    }
}
