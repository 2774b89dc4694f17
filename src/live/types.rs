//! Live session types

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

/// A scheduled or running live session, as served by `/users/live-sessions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSession {
    pub id: Uuid,
    pub session_title: String,
    pub host: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(deserialize_with = "flexible_datetime::deserialize")]
    pub date_time: DateTime<Utc>,
    pub duration_minutes: i64,
    /// Recording or stream link; a watch URL or an `<iframe>` snippet
    #[serde(default)]
    pub youtube_link: Option<String>,
    #[serde(default)]
    pub livestatus: bool,
    #[serde(default, deserialize_with = "flexible_datetime::deserialize_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_datetime::deserialize_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LiveSession {
    pub fn has_recording(&self) -> bool {
        self.youtube_link
            .as_deref()
            .map(|l| !l.trim().is_empty())
            .unwrap_or(false)
    }

    /// Scheduled end, `None` if the duration does not fit the calendar
    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        chrono::Duration::try_minutes(self.duration_minutes)
            .and_then(|length| self.date_time.checked_add_signed(length))
    }

    /// Started but not yet past its scheduled end
    pub fn is_in_progress(&self, now: DateTime<Utc>) -> bool {
        self.date_time <= now && self.ends_at().map_or(false, |end| now < end)
    }
}

/// An ended session shaped for a recordings list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PastSession {
    pub id: Uuid,
    pub title: String,
    pub date: DateTime<Utc>,
    pub duration: String,
    pub host: String,
    pub video_url: String,
}

impl From<&LiveSession> for PastSession {
    fn from(session: &LiveSession) -> Self {
        Self {
            id: session.id,
            title: session.session_title.clone(),
            date: session.date_time,
            duration: session.duration_minutes.to_string(),
            host: session.host.clone(),
            video_url: session
                .youtube_link
                .as_deref()
                .map(embed_url)
                .unwrap_or_default(),
        }
    }
}

fn iframe_src() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"src=["']([^"']+)["']"#).expect("valid iframe src pattern"))
}

/// Embeddable player URL for a stored link
///
/// Pasted `<iframe>` snippets yield their `src`; watch URLs are rewritten
/// to the embed form.
pub fn embed_url(link: &str) -> String {
    if link.contains("<iframe") {
        return iframe_src()
            .captures(link)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
    }
    link.replace("watch?v=", "embed/")
}

/// The backend emits timestamps with or without an offset; naive ones are UTC
mod flexible_datetime {
    use super::*;

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {}", raw)))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {}", raw))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_deserialize_backend_session() {
        let session: LiveSession = serde_json::from_value(json!({
            "id": "0b7e7a52-4f6a-4c53-a3f4-5b0d51a1c9aa",
            "session_title": "Introduction to Mind-Body Wellness",
            "host": "Dr. Mensah",
            "description": null,
            "date_time": "2025-06-01T18:00:00",
            "duration_minutes": 60,
            "youtube_link": null,
            "livestatus": false,
            "created_at": "2025-05-20T09:30:00.123456",
            "updated_at": null
        }))
        .unwrap();

        assert_eq!(session.date_time, Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap());
        assert_eq!(session.ends_at(), Utc.with_ymd_and_hms(2025, 6, 1, 19, 0, 0).single());
        assert!(session.created_at.is_some());
        assert!(session.updated_at.is_none());
        assert!(!session.has_recording());
    }

    #[test]
    fn test_ends_at_out_of_range() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap();
        let mut session = crate::live::service::session("Yoga Nidra", start, true);

        assert!(session.is_in_progress(start + chrono::Duration::minutes(30)));
        assert!(!session.is_in_progress(start + chrono::Duration::minutes(60)));
        assert!(!session.is_in_progress(start - chrono::Duration::minutes(1)));

        session.duration_minutes = i64::MAX;
        assert_eq!(session.ends_at(), None);
        assert!(!session.is_in_progress(start));

        session.duration_minutes = -30;
        assert_eq!(session.ends_at(), Some(start - chrono::Duration::minutes(30)));
    }

    #[test]
    fn test_offset_timestamps_normalized() {
        let parsed = flexible_datetime::parse("2025-06-01T20:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap());
        assert!(flexible_datetime::parse("next tuesday").is_none());
    }

    #[test]
    fn test_embed_url() {
        assert_eq!(
            embed_url("https://www.youtube.com/watch?v=abc123"),
            "https://www.youtube.com/embed/abc123"
        );
        assert_eq!(
            embed_url(r#"<iframe width="560" src="https://www.youtube.com/embed/xyz" frameborder="0"></iframe>"#),
            "https://www.youtube.com/embed/xyz"
        );
        assert_eq!(embed_url("<iframe></iframe>"), "");
    }
}
