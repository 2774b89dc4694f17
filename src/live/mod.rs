//! Live sessions
//!
//! Fetching and classifying live sessions (current, past, upcoming),
//! countdown formatting and the background poller that keeps a
//! [`LiveSessionState`] up to date.

mod poller;
mod service;
mod state;
mod types;

pub use poller::{LivePollConfig, LiveSessionPoller, RefreshOutcome};
pub use service::{
    get_time_remaining, select_current, select_past, select_upcoming, time_remaining,
    LiveSessionService, SessionSource, DEFAULT_PAST_LIMIT,
};
pub use state::LiveSessionState;
pub use types::{embed_url, LiveSession, PastSession};
