//! # Vincy
//!
//! Client core for the Vincy wellness platform: authenticated access to the
//! backend, the signed-in user's session, live-session scheduling and the
//! therapy device dashboard.
//!
//! ## Modules
//!
//! - [`credentials`]: bearer-token storage and session flags
//! - [`api`]: HTTP transport with token expiry and 401 handling
//! - [`session`]: login/logout/signup flows, identity state and guards
//! - [`live`]: live-session selection, countdowns and polling
//! - [`devices`]: device controls and their poller
//! - [`poll`]: refresh gating and ticker primitives shared by the pollers
//! - [`notify`]: user-facing notices and navigation requests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vincy::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let store = Arc::new(FileCredentialStore::new(&config.storage.credentials_path));
//!
//!     let session = SessionManager::new(
//!         &config.api,
//!         store,
//!         Arc::new(TracingNotifier),
//!         Arc::new(SessionFlags::new()),
//!     )?;
//!     session.login("jane@example.com", "correct horse").await?;
//!
//!     let sessions = LiveSessionService::new(session.api().clone());
//!     if let Some(next) = sessions.get_current_live_session().await? {
//!         println!("{} starts in {:?}", next.session_title, get_time_remaining(next.date_time));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod credentials;
pub mod devices;
pub mod live;
pub mod notify;
pub mod poll;
pub mod session;

#[cfg(test)]
mod test_support;

// Re-export top-level types for convenience
pub use api::{is_token_expired, ApiClient, ApiError, ApiResult, AuthFailureHandler, RequestOptions};

pub use config::{generate_default_config, Config, ConfigError, LoadedConfig};

pub use credentials::{
    Credential, CredentialError, CredentialStore, FileCredentialStore, MemoryCredentialStore,
    SessionFlags,
};

pub use devices::{DeviceControls, DeviceKind, DevicePoller, DeviceSetting, DeviceStates};

pub use live::{
    get_time_remaining, LivePollConfig, LiveSession, LiveSessionPoller, LiveSessionService,
    LiveSessionState,
};

pub use notify::{NoticeLevel, Notifier, Route, TracingNotifier};

pub use poll::PollHandle;

pub use session::{AuthState, SessionError, SessionManager, SessionResult, User};
