//! Background polling of the latest device states

use super::service::DeviceSource;
use super::types::DeviceStates;
use crate::poll::{spawn_ticker, Lifecycle, PollHandle, RefreshGate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DevicePollState {
    pub states: DeviceStates,
    pub loading: bool,
    /// Only set when the very first load fails
    pub error: Option<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

struct Inner {
    source: Arc<dyn DeviceSource>,
    interval: Duration,
    gate: RefreshGate,
    lifecycle: Arc<Lifecycle>,
    state: watch::Sender<DevicePollState>,
}

/// Keeps [`DevicePollState`] current on a fixed interval
#[derive(Clone)]
pub struct DevicePoller {
    inner: Arc<Inner>,
}

impl DevicePoller {
    pub fn new(source: Arc<dyn DeviceSource>, interval: Duration) -> Self {
        let (state, _) = watch::channel(DevicePollState {
            loading: true,
            ..DevicePollState::default()
        });

        Self {
            inner: Arc::new(Inner {
                source,
                interval,
                gate: RefreshGate::new(Duration::ZERO),
                lifecycle: Arc::new(Lifecycle::new()),
                state,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DevicePollState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> DevicePollState {
        self.inner.state.borrow().clone()
    }

    pub fn start(&self) -> PollHandle {
        let lifecycle = self.inner.lifecycle.clone();
        lifecycle.mount();

        info!(
            interval_ms = self.inner.interval.as_millis() as u64,
            "Starting device poller"
        );

        let poller = self.clone();
        let task = spawn_ticker(self.inner.interval, false, lifecycle.clone(), move || {
            let poller = poller.clone();
            async move {
                poller.refresh().await;
            }
        });

        PollHandle::new(lifecycle, vec![task])
    }

    /// Fetch once unless a fetch is already running
    ///
    /// Returns true if new states were published.
    pub async fn refresh(&self) -> bool {
        let inner = &self.inner;
        let permit = match inner.gate.try_begin() {
            Ok(permit) => permit,
            Err(reason) => {
                debug!(?reason, "Device refresh skipped");
                return false;
            }
        };

        let result = inner.source.fetch_latest().await;

        if !inner.lifecycle.admit(permit.generation()) {
            return false;
        }

        match result {
            Ok(states) => {
                inner.state.send_replace(DevicePollState {
                    states,
                    loading: false,
                    error: None,
                    last_refreshed: Some(Utc::now()),
                });
                true
            }
            Err(e) => {
                let first_load = inner.state.borrow().last_refreshed.is_none();
                if first_load {
                    warn!(error = %e, "Failed to load device states");
                    inner.state.send_modify(|state| {
                        state.loading = false;
                        state.error = Some(e.to_string());
                    });
                } else {
                    debug!(error = %e, "Device poll failed, keeping last states");
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ApiResult};
    use crate::devices::DeviceKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FlakySource {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl DeviceSource for FlakySource {
        async fn fetch_latest(&self) -> ApiResult<DeviceStates> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(ApiError::Decode("bad body".into()));
            }
            Ok(serde_json::from_value(json!({
                "sound": { "sound": n % 2 == 0 }
            }))
            .unwrap())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let source = Arc::new(FlakySource::default());
        let poller = DevicePoller::new(source.clone(), Duration::from_secs(3));
        let _handle = poller.start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(poller.state().states.value(DeviceKind::Sound), Some(&json!(true)));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(poller.state().states.value(DeviceKind::Sound), Some(&json!(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_first_failure_surfaces() {
        let source = Arc::new(FlakySource::default());
        source.failing.store(true, Ordering::SeqCst);
        let poller = DevicePoller::new(source.clone(), Duration::from_secs(3));
        let mut handle = poller.start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(poller.state().error.is_some());
        assert!(!poller.state().loading);

        source.failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3)).await;
        let loaded = poller.state();
        assert!(loaded.error.is_none());

        source.failing.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(poller.state(), loaded);

        handle.stop();
        source.failing.store(false, Ordering::SeqCst);
        assert!(!poller.refresh().await);
        assert_eq!(poller.state(), loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_loads() {
        let source = Arc::new(FlakySource::default());
        let poller = DevicePoller::new(source.clone(), Duration::ZERO);
        let _handle = poller.start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!poller.state().loading);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
