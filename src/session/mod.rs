//! Session / Identity
//!
//! Current-user state, login/signup/logout flows and access guards.
//!
//! ## State machine
//!
//! ```text
//! Anonymous --login--> Loading --/users/me ok--> Authenticated
//!     ^                   |                           |
//!     +------failure------+-------logout / 401--------+
//! ```

mod error;
mod guard;
mod manager;
mod types;

pub use error::{SessionError, SessionResult};
pub use guard::{evaluate_admin, evaluate_auth, GuardOutcome, PERMISSION_DENIED};
pub use manager::SessionManager;
pub use types::{AuthState, SignupData, TokenPair, User, UserRole, UserStatus};
