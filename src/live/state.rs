//! Presentation state derived from the session list

use super::service::{
    select_current, select_past, select_upcoming, time_remaining, DEFAULT_PAST_LIMIT,
};
use super::types::{LiveSession, PastSession};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What a dashboard banner and recordings list need to render
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveSessionState {
    pub current: Option<LiveSession>,
    pub is_live: bool,
    pub time_remaining: Option<String>,
    pub label: Option<String>,
    pub session_id: Option<Uuid>,
    pub past_sessions: Vec<LiveSession>,
    /// `past_sessions` ready for a recordings list
    pub formatted_past_sessions: Vec<PastSession>,
    pub upcoming_sessions: Vec<LiveSession>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl LiveSessionState {
    /// Initial state before the first fetch completes
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    /// Rebuild everything from a fresh session list
    pub fn derive(sessions: &[LiveSession], now: DateTime<Utc>) -> Self {
        let current = select_current(sessions, now).cloned();
        let is_live = current.as_ref().map(|s| s.livestatus).unwrap_or(false);
        let remaining = match &current {
            Some(session) if !is_live => time_remaining(session.date_time, now),
            _ => None,
        };

        let past_sessions = select_past(sessions, now, DEFAULT_PAST_LIMIT);

        Self {
            is_live,
            time_remaining: remaining,
            label: current.as_ref().map(|s| s.session_title.clone()),
            session_id: current.as_ref().map(|s| s.id),
            current,
            formatted_past_sessions: past_sessions.iter().map(PastSession::from).collect(),
            past_sessions,
            upcoming_sessions: select_upcoming(sessions, now),
            loading: false,
            error: None,
            last_refreshed: Some(now),
        }
    }

    /// Recompute only the countdown; returns true if it changed
    pub fn recompute_countdown(&mut self, now: DateTime<Utc>) -> bool {
        let Some(current) = &self.current else {
            return false;
        };
        if self.is_live {
            return false;
        }

        let next = time_remaining(current.date_time, now);
        if next == self.time_remaining {
            return false;
        }
        self.time_remaining = next;
        true
    }

    /// Short banner text
    pub fn badge(&self) -> String {
        if self.is_live {
            return "Live Now!".to_string();
        }
        match &self.time_remaining {
            Some(remaining) => format!("Live in {}", remaining),
            None => "Live Session".to_string(),
        }
    }
}
