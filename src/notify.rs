//! User-facing side effects
//!
//! Notices ("toasts") and navigation requests raised by the client layers.
//! The library never renders anything; a front end plugs in its own
//! [`Notifier`]. The default implementation writes to `tracing`.

use serde::Serialize;
use std::fmt;

/// Severity of a user-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Views the session layer may ask the front end to show
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Login,
    Dashboard,
    AdminDashboard,
    PendingApproval,
    /// A caller-supplied location, e.g. the page a guard redirected away from
    Path(String),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Login => write!(f, "/login"),
            Route::Dashboard => write!(f, "/dashboard"),
            Route::AdminDashboard => write!(f, "/admin/dashboard"),
            Route::PendingApproval => write!(f, "/pending-approval"),
            Route::Path(path) => write!(f, "{}", path),
        }
    }
}

/// Sink for notices and navigation requests
pub trait Notifier: Send + Sync {
    /// Show a message to the user
    fn notice(&self, level: NoticeLevel, message: &str);

    /// Ask the front end to switch views
    fn navigate(&self, route: Route);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notice(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Error => tracing::warn!(notice = %message, "User notice"),
            _ => tracing::info!(notice = %message, ?level, "User notice"),
        }
    }

    fn navigate(&self, route: Route) {
        tracing::info!(route = %route, "Navigation requested");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every notice and navigation for assertions
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub notices: Mutex<Vec<(NoticeLevel, String)>>,
        pub routes: Mutex<Vec<Route>>,
    }

    impl RecordingNotifier {
        pub fn routes(&self) -> Vec<Route> {
            self.routes.lock().unwrap().clone()
        }

        pub fn messages(&self) -> Vec<String> {
            self.notices
                .lock()
                .unwrap()
                .iter()
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notice(&self, level: NoticeLevel, message: &str) {
            self.notices.lock().unwrap().push((level, message.to_string()));
        }

        fn navigate(&self, route: Route) {
            self.routes.lock().unwrap().push(route);
        }
    }
}
