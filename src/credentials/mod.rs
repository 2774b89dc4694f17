//! Credential Store
//!
//! Persistent bearer-token storage plus the session-scoped flags the
//! front end keeps between views.
//!
//! - [`MemoryCredentialStore`]: in-process, for tests and one-shot runs
//! - [`FileCredentialStore`]: JSON file under the platform data directory

mod flags;
mod store;

pub use flags::SessionFlags;
pub use store::{
    Credential, CredentialError, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
