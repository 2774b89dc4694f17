//! Live session poller
//!
//! Two timers per started poller: a coarse refresh of the session list and
//! a fast countdown tick that only recomputes the remaining time. Results
//! are published through a `watch` channel and dropped once stopped.

use super::service::SessionSource;
use super::state::LiveSessionState;
use crate::config::PollingConfig;
use crate::credentials::SessionFlags;
use crate::poll::{spawn_ticker, Lifecycle, PollHandle, RefreshGate, Skipped};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Timer settings for [`LiveSessionPoller`]
#[derive(Debug, Clone, Copy)]
pub struct LivePollConfig {
    pub refresh_interval: Duration,
    pub debounce: Duration,
    pub countdown_tick: Duration,
}

impl Default for LivePollConfig {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for LivePollConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            refresh_interval: config.live_session_refresh(),
            debounce: config.live_session_debounce(),
            countdown_tick: config.countdown_tick(),
        }
    }
}

/// What happened to a refresh trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fresh data was published
    Applied,
    /// The fetch failed; the error was recorded in the state
    Failed,
    /// Dropped before fetching
    Skipped(Skipped),
    /// Fetched, but the poller was stopped or a newer result already landed
    Discarded,
}

struct Inner {
    source: Arc<dyn SessionSource>,
    config: LivePollConfig,
    gate: RefreshGate,
    lifecycle: Arc<Lifecycle>,
    state: watch::Sender<LiveSessionState>,
    flags: Option<Arc<SessionFlags>>,
}

/// Polls the session list and keeps [`LiveSessionState`] current
#[derive(Clone)]
pub struct LiveSessionPoller {
    inner: Arc<Inner>,
}

impl LiveSessionPoller {
    pub fn new(source: Arc<dyn SessionSource>, config: LivePollConfig) -> Self {
        Self::build(source, config, None)
    }

    /// Skip scheduled refreshes while the live view is not active
    pub fn with_flags(
        source: Arc<dyn SessionSource>,
        config: LivePollConfig,
        flags: Arc<SessionFlags>,
    ) -> Self {
        Self::build(source, config, Some(flags))
    }

    fn build(
        source: Arc<dyn SessionSource>,
        config: LivePollConfig,
        flags: Option<Arc<SessionFlags>>,
    ) -> Self {
        let (state, _) = watch::channel(LiveSessionState::loading());

        Self {
            inner: Arc::new(Inner {
                source,
                gate: RefreshGate::new(config.debounce),
                config,
                lifecycle: Arc::new(Lifecycle::new()),
                state,
                flags,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveSessionState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> LiveSessionState {
        self.inner.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.is_mounted()
    }

    /// Start both timers; the first refresh runs immediately
    pub fn start(&self) -> PollHandle {
        let lifecycle = self.inner.lifecycle.clone();
        lifecycle.mount();

        info!(
            refresh_secs = self.inner.config.refresh_interval.as_secs(),
            countdown_ms = self.inner.config.countdown_tick.as_millis() as u64,
            "Starting live session poller"
        );

        let poller = self.clone();
        let mut initial = true;
        let refresh_task = spawn_ticker(
            self.inner.config.refresh_interval,
            false,
            lifecycle.clone(),
            move || {
                let poller = poller.clone();
                let scheduled = !std::mem::replace(&mut initial, false);
                async move {
                    if scheduled && !poller.view_active() {
                        debug!("Live view inactive, skipping scheduled refresh");
                        return;
                    }
                    poller.refresh().await;
                }
            },
        );

        let poller = self.clone();
        let countdown_task = spawn_ticker(
            self.inner.config.countdown_tick,
            true,
            lifecycle.clone(),
            move || {
                let poller = poller.clone();
                async move {
                    poller.tick_countdown();
                }
            },
        );

        PollHandle::new(lifecycle, vec![refresh_task, countdown_task])
    }

    /// Refresh unless one is running or the last one finished too recently
    pub async fn refresh(&self) -> RefreshOutcome {
        self.run_refresh(false).await
    }

    /// Refresh ignoring the debounce window
    pub async fn refresh_now(&self) -> RefreshOutcome {
        self.run_refresh(true).await
    }

    async fn run_refresh(&self, forced: bool) -> RefreshOutcome {
        let inner = &self.inner;
        let begun = if forced {
            inner.gate.try_begin_forced()
        } else {
            inner.gate.try_begin()
        };
        let permit = match begun {
            Ok(permit) => permit,
            Err(reason) => {
                debug!(?reason, "Live session refresh skipped");
                return RefreshOutcome::Skipped(reason);
            }
        };

        let result = inner.source.fetch_sessions().await;

        if !inner.lifecycle.admit(permit.generation()) {
            debug!(generation = permit.generation(), "Discarding live session result");
            return RefreshOutcome::Discarded;
        }

        match result {
            Ok(sessions) => {
                let next = LiveSessionState::derive(&sessions, Utc::now());
                debug!(
                    sessions = sessions.len(),
                    is_live = next.is_live,
                    "Live sessions refreshed"
                );
                inner.state.send_replace(next);
                RefreshOutcome::Applied
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch live sessions");
                inner.state.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(e.to_string());
                });
                RefreshOutcome::Failed
            }
        }
    }

    /// Countdown tick against the client clock
    pub fn tick_countdown(&self) -> bool {
        self.tick_countdown_at(Utc::now())
    }

    /// Recompute the countdown at `now`; returns true if the state changed
    ///
    /// A no-op once the poller has been stopped.
    pub fn tick_countdown_at(&self, now: DateTime<Utc>) -> bool {
        if !self.inner.lifecycle.is_mounted() {
            return false;
        }
        self.inner
            .state
            .send_if_modified(|state| state.recompute_countdown(now))
    }

    fn view_active(&self) -> bool {
        self.inner
            .flags
            .as_ref()
            .map(|flags| flags.live_view_active())
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ApiResult};
    use crate::live::service::session;
    use crate::live::LiveSession;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingSource {
        calls: AtomicUsize,
        sessions: Mutex<Vec<LiveSession>>,
        fail: bool,
    }

    impl CountingSource {
        fn new(sessions: Vec<LiveSession>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                sessions: Mutex::new(sessions),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                sessions: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionSource for CountingSource {
        async fn fetch_sessions(&self) -> ApiResult<Vec<LiveSession>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::Unauthenticated);
            }
            Ok(self.sessions.lock().unwrap().clone())
        }
    }

    fn config() -> LivePollConfig {
        LivePollConfig {
            refresh_interval: Duration::from_secs(30),
            debounce: Duration::from_secs(5),
            countdown_tick: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_triggers_fetch_once() {
        let source = CountingSource::new(vec![]);
        let poller = LiveSessionPoller::new(source.clone(), config());
        let _handle = poller.start();

        // Initial tick runs on start
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 1);

        assert_eq!(
            poller.refresh().await,
            RefreshOutcome::Skipped(Skipped::Debounced)
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            poller.refresh().await,
            RefreshOutcome::Skipped(Skipped::Debounced)
        );
        assert_eq!(source.calls(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(poller.refresh().await, RefreshOutcome::Applied);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ticks_do_not_fetch() {
        let upcoming = session("Breathwork", Utc::now() + ChronoDuration::hours(1), false);
        let source = CountingSource::new(vec![upcoming]);
        let poller = LiveSessionPoller::new(source.clone(), config());
        let mut rx = poller.subscribe();
        let _handle = poller.start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 1);
        let _ = rx.borrow_and_update();

        let state = poller.state();
        assert!(!state.loading);
        assert!(state.time_remaining.is_some());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(source.calls(), 1);

        let later = Utc::now() + ChronoDuration::minutes(5);
        assert!(poller.tick_countdown_at(later));
        assert_ne!(poller.state().time_remaining, state.time_remaining);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_refresh_repeats() {
        let source = CountingSource::new(vec![]);
        let poller = LiveSessionPoller::new(source.clone(), config());
        let _handle = poller.start();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_updates_after_stop() {
        let upcoming = session("Breathwork", Utc::now() + ChronoDuration::hours(1), false);
        let source = CountingSource::new(vec![upcoming]);
        let poller = LiveSessionPoller::new(source.clone(), config());
        let mut handle = poller.start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop();
        assert!(!poller.is_running());

        let before = poller.state();
        assert!(!poller.tick_countdown_at(Utc::now() + ChronoDuration::minutes(30)));
        assert_eq!(poller.state(), before);

        assert_eq!(poller.refresh_now().await, RefreshOutcome::Discarded);
        assert_eq!(poller.state(), before);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_refresh_waits_for_active_view() {
        let source = CountingSource::new(vec![]);
        let flags = Arc::new(SessionFlags::new());
        let poller = LiveSessionPoller::with_flags(source.clone(), config(), flags.clone());
        let _handle = poller.start();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(source.calls(), 1);

        flags.set_live_view_active(true);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_recorded_in_state() {
        let source = CountingSource::failing();
        let poller = LiveSessionPoller::new(source.clone(), config());
        let _handle = poller.start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let state = poller.state();
        assert!(!state.loading);
        assert!(state.error.is_some());
        assert!(state.current.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_intervals_still_load() {
        let upcoming = session("Breathwork", Utc::now() + ChronoDuration::hours(1), false);
        let source = CountingSource::new(vec![upcoming]);
        let poller = LiveSessionPoller::new(
            source.clone(),
            LivePollConfig {
                refresh_interval: Duration::ZERO,
                debounce: Duration::from_secs(5),
                countdown_tick: Duration::ZERO,
            },
        );
        let _handle = poller.start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let state = poller.state();
        assert!(!state.loading);
        assert!(state.current.is_some());
        assert_eq!(source.calls(), 1);
    }
}
