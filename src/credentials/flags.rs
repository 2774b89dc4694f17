//! Session-scoped flags
//!
//! Short-lived UI state that only lives as long as the process: whether
//! an account is waiting for admin approval, and whether the live-session
//! view is open (which gates background polling).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct SessionFlags {
    pending_email: RwLock<Option<String>>,
    live_view_active: AtomicBool,
}

impl SessionFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `email` signed in but is still awaiting approval
    pub fn mark_pending(&self, email: &str) {
        if let Ok(mut guard) = self.pending_email.write() {
            *guard = Some(email.to_string());
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending_email().is_some()
    }

    pub fn pending_email(&self) -> Option<String> {
        self.pending_email.read().ok().and_then(|e| e.clone())
    }

    pub fn clear_pending(&self) {
        if let Ok(mut guard) = self.pending_email.write() {
            *guard = None;
        }
    }

    pub fn set_live_view_active(&self, active: bool) {
        self.live_view_active.store(active, Ordering::SeqCst);
    }

    pub fn live_view_active(&self) -> bool {
        self.live_view_active.load(Ordering::SeqCst)
    }
}
