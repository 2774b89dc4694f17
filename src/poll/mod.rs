//! Polling primitives
//!
//! Building blocks shared by the live-session and device pollers:
//!
//! - [`RefreshGate`]: at most one refresh in flight, and refresh triggers
//!   inside the debounce window are dropped rather than queued
//! - [`Lifecycle`]: the "still mounted" flag checked before every state write
//! - [`spawn_ticker`] / [`PollHandle`]: interval tasks with explicit teardown

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Default)]
struct GateState {
    in_flight: bool,
    last_completed: Option<Instant>,
    next_generation: u64,
}

/// Guards a refresh operation against overlap and bursts
#[derive(Debug)]
pub struct RefreshGate {
    min_spacing: Duration,
    state: Mutex<GateState>,
}

/// Why a refresh trigger was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skipped {
    InFlight,
    Debounced,
}

impl RefreshGate {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            state: Mutex::new(GateState::default()),
        }
    }

    /// Claim the right to refresh now
    ///
    /// The permit marks the refresh complete when dropped.
    pub fn try_begin(&self) -> Result<RefreshPermit<'_>, Skipped> {
        self.begin(true)
    }

    /// Like [`try_begin`](Self::try_begin) but ignores the debounce window
    pub fn try_begin_forced(&self) -> Result<RefreshPermit<'_>, Skipped> {
        self.begin(false)
    }

    fn begin(&self, debounce: bool) -> Result<RefreshPermit<'_>, Skipped> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.in_flight {
            return Err(Skipped::InFlight);
        }

        if debounce {
            if let Some(last) = state.last_completed {
                if last.elapsed() < self.min_spacing {
                    return Err(Skipped::Debounced);
                }
            }
        }

        state.in_flight = true;
        state.next_generation += 1;

        Ok(RefreshPermit {
            gate: self,
            generation: state.next_generation,
        })
    }

    pub fn is_in_flight(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.in_flight)
            .unwrap_or(false)
    }

    fn finish(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.in_flight = false;
        state.last_completed = Some(Instant::now());
    }
}

/// Proof that a refresh is running; completes it on drop
#[derive(Debug)]
pub struct RefreshPermit<'a> {
    gate: &'a RefreshGate,
    generation: u64,
}

impl RefreshPermit<'_> {
    /// Monotonic id of this refresh, used to reject stale results
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RefreshPermit<'_> {
    fn drop(&mut self) {
        self.gate.finish();
    }
}

/// Mounted flag plus the generation of the last applied refresh
#[derive(Debug, Default)]
pub struct Lifecycle {
    mounted: AtomicBool,
    applied: Mutex<u64>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self) {
        self.mounted.store(true, Ordering::SeqCst);
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// True if a refresh with `generation` may publish its result
    ///
    /// Rejects everything after unmount, and any generation older than
    /// one already applied.
    pub fn admit(&self, generation: u64) -> bool {
        if !self.is_mounted() {
            return false;
        }

        let mut applied = self.applied.lock().unwrap_or_else(|e| e.into_inner());
        if generation <= *applied {
            return false;
        }
        *applied = generation;
        true
    }
}

/// Shortest period a ticker will run at
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(100);

/// Run `tick` every `period` until the lifecycle unmounts
///
/// The first tick fires immediately unless `skip_first` is set. Periods
/// below [`MIN_TICK_PERIOD`] are raised to it.
pub fn spawn_ticker<F, Fut>(
    period: Duration,
    skip_first: bool,
    lifecycle: Arc<Lifecycle>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let period = if period < MIN_TICK_PERIOD {
        tracing::warn!(
            requested_ms = period.as_millis() as u64,
            "Tick period too short, using {:?}",
            MIN_TICK_PERIOD
        );
        MIN_TICK_PERIOD
    } else {
        period
    };

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if skip_first {
            interval.tick().await;
        }

        loop {
            interval.tick().await;

            if !lifecycle.is_mounted() {
                break;
            }

            tick().await;
        }
    })
}

/// Owns the tasks of one started poller; stopping is idempotent
#[derive(Debug)]
pub struct PollHandle {
    lifecycle: Arc<Lifecycle>,
    tasks: Vec<JoinHandle<()>>,
}

impl PollHandle {
    pub fn new(lifecycle: Arc<Lifecycle>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { lifecycle, tasks }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_mounted()
    }

    /// Unmount and cancel every timer
    pub fn stop(&mut self) {
        self.lifecycle.unmount();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_gate_blocks_overlap() {
        let gate = RefreshGate::new(Duration::from_secs(5));

        let permit = gate.try_begin().unwrap();
        assert!(gate.is_in_flight());
        assert_eq!(gate.try_begin().unwrap_err(), Skipped::InFlight);
        assert_eq!(gate.try_begin_forced().unwrap_err(), Skipped::InFlight);
        drop(permit);
        assert!(!gate.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_debounce_window() {
        let gate = RefreshGate::new(Duration::from_secs(5));

        let first = gate.try_begin().unwrap();
        assert_eq!(first.generation(), 1);
        drop(first);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(gate.try_begin().unwrap_err(), Skipped::Debounced);

        // Forced triggers ignore the window
        let forced = gate.try_begin_forced().unwrap();
        assert_eq!(forced.generation(), 2);
        drop(forced);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(gate.try_begin().unwrap().generation(), 3);
    }

    #[test]
    fn test_lifecycle_admits_newer_only() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.admit(1));

        lifecycle.mount();
        assert!(lifecycle.admit(2));
        assert!(!lifecycle.admit(1));
        assert!(!lifecycle.admit(2));
        assert!(lifecycle.admit(3));

        lifecycle.unmount();
        assert!(!lifecycle.admit(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_stops_on_unmount() {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.mount();
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = ticks.clone();
        let task = spawn_ticker(Duration::from_secs(1), false, lifecycle.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let mut handle = PollHandle::new(lifecycle, vec![task]);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        handle.stop();
        assert!(!handle.is_running());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_zero_period_is_clamped() {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.mount();
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = ticks.clone();
        let task = spawn_ticker(Duration::ZERO, false, lifecycle.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let _handle = PollHandle::new(lifecycle, vec![task]);

        tokio::time::sleep(MIN_TICK_PERIOD * 2 + Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
