//! Access guards
//!
//! Pure decisions over [`AuthState`]. While the identity is still loading
//! the answer is always [`GuardOutcome::Pending`]; a redirect is only ever
//! produced once the stored token has been checked.

use super::types::{AuthState, User};
use crate::notify::Route;

pub const PERMISSION_DENIED: &str = "You do not have permission to access this page";

/// What a guarded view should do
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    /// Identity not settled; render a placeholder and decide later
    Pending,
    Allow(User),
    Redirect {
        route: Route,
        notice: Option<&'static str>,
    },
}

/// Views that need any signed-in user
pub fn evaluate_auth(state: &AuthState) -> GuardOutcome {
    match state {
        AuthState::Loading => GuardOutcome::Pending,
        AuthState::Authenticated(user) => GuardOutcome::Allow(user.clone()),
        AuthState::Anonymous => GuardOutcome::Redirect {
            route: Route::Login,
            notice: None,
        },
    }
}

/// Views that need an admin; everyone else goes back to the dashboard
pub fn evaluate_admin(state: &AuthState) -> GuardOutcome {
    match state {
        AuthState::Loading => GuardOutcome::Pending,
        AuthState::Authenticated(user) if user.is_admin() => GuardOutcome::Allow(user.clone()),
        _ => GuardOutcome::Redirect {
            route: Route::Dashboard,
            notice: Some(PERMISSION_DENIED),
        },
    }
}
