//! Live session service
//!
//! Fetches sessions from the backend and picks out the current, past and
//! upcoming ones. All time comparisons use the client clock; the pure
//! helpers take `now` explicitly.

use super::types::LiveSession;
use crate::api::{ApiClient, ApiResult, RequestOptions};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const LIVE_SESSIONS_ENDPOINT: &str = "/users/live-sessions";

/// Default number of recordings shown
pub const DEFAULT_PAST_LIMIT: usize = 6;

/// Anything that can produce the full session list
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn fetch_sessions(&self) -> ApiResult<Vec<LiveSession>>;
}

/// The session a banner should show: the live one, else the next one
pub fn select_current(sessions: &[LiveSession], now: DateTime<Utc>) -> Option<&LiveSession> {
    if let Some(live) = sessions.iter().find(|s| s.livestatus) {
        return Some(live);
    }

    sessions
        .iter()
        .filter(|s| s.date_time > now)
        .min_by_key(|s| s.date_time)
}

/// Ended sessions that have a recording, most recent first
pub fn select_past(sessions: &[LiveSession], now: DateTime<Utc>, limit: usize) -> Vec<LiveSession> {
    let mut past: Vec<LiveSession> = sessions
        .iter()
        .filter(|s| s.date_time < now && s.has_recording())
        .cloned()
        .collect();
    past.sort_by(|a, b| b.date_time.cmp(&a.date_time));
    past.truncate(limit);
    past
}

/// Future sessions that are not live yet, soonest first
pub fn select_upcoming(sessions: &[LiveSession], now: DateTime<Utc>) -> Vec<LiveSession> {
    let mut upcoming: Vec<LiveSession> = sessions
        .iter()
        .filter(|s| s.date_time > now && !s.livestatus)
        .cloned()
        .collect();
    upcoming.sort_by_key(|s| s.date_time);
    upcoming
}

/// Countdown text such as `1d 1h 1m 1s`, or `None` once `date_time` is reached
///
/// Leading zero units are dropped; seconds are always present.
pub fn time_remaining(date_time: DateTime<Utc>, now: DateTime<Utc>) -> Option<String> {
    if now >= date_time {
        return None;
    }

    let total = (date_time - now).num_milliseconds();
    let days = total / 86_400_000;
    let hours = (total % 86_400_000) / 3_600_000;
    let minutes = (total % 3_600_000) / 60_000;
    let seconds = (total % 60_000) / 1000;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{}d ", days));
    }
    if hours > 0 || days > 0 {
        out.push_str(&format!("{}h ", hours));
    }
    if minutes > 0 || hours > 0 || days > 0 {
        out.push_str(&format!("{}m ", minutes));
    }
    out.push_str(&format!("{}s", seconds));

    Some(out)
}

/// [`time_remaining`] against the current client time
pub fn get_time_remaining(date_time: DateTime<Utc>) -> Option<String> {
    time_remaining(date_time, Utc::now())
}

/// Read access to live sessions for the signed-in user
#[derive(Clone)]
pub struct LiveSessionService {
    api: ApiClient,
}

impl LiveSessionService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn get_all_live_sessions(&self) -> ApiResult<Vec<LiveSession>> {
        self.api
            .get_json(LIVE_SESSIONS_ENDPOINT, RequestOptions::default())
            .await
    }

    pub async fn get_live_session(&self, id: Uuid) -> ApiResult<LiveSession> {
        let endpoint = format!("{}/{}", LIVE_SESSIONS_ENDPOINT, id);
        self.api.get_json(&endpoint, RequestOptions::default()).await
    }

    /// The live session, else the nearest upcoming one
    pub async fn get_current_live_session(&self) -> ApiResult<Option<LiveSession>> {
        let sessions = self.get_all_live_sessions().await?;
        Ok(select_current(&sessions, Utc::now()).cloned())
    }

    pub async fn get_past_live_sessions(&self, limit: usize) -> ApiResult<Vec<LiveSession>> {
        let sessions = self.get_all_live_sessions().await?;
        Ok(select_past(&sessions, Utc::now(), limit))
    }

    pub async fn get_upcoming_live_sessions(&self) -> ApiResult<Vec<LiveSession>> {
        let sessions = self.get_all_live_sessions().await?;
        Ok(select_upcoming(&sessions, Utc::now()))
    }
}

#[async_trait]
impl SessionSource for LiveSessionService {
    async fn fetch_sessions(&self) -> ApiResult<Vec<LiveSession>> {
        self.get_all_live_sessions().await
    }
}

#[cfg(test)]
pub(crate) fn session(title: &str, date_time: DateTime<Utc>, live: bool) -> LiveSession {
    LiveSession {
        id: Uuid::new_v4(),
        session_title: title.to_string(),
        host: "Dr. Mensah".to_string(),
        description: None,
        date_time,
        duration_minutes: 60,
        youtube_link: None,
        livestatus: live,
        created_at: None,
        updated_at: None,
    }
}
