//! Realtime vs playback
//!
//! The mode is consulted in two places only: building the stream URL on
//! open, and choosing the snapshot timestamp.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    #[default]
    Realtime,
    Playback,
}

impl StreamMode {
    pub fn from_playback(playback: bool) -> Self {
        if playback {
            StreamMode::Playback
        } else {
            StreamMode::Realtime
        }
    }

    pub fn is_playback(&self) -> bool {
        *self == StreamMode::Playback
    }

    /// Timestamp published with a snapshot: the upstream time of the last
    /// update in playback, the self vessel's last update otherwise.
    pub fn snapshot_timestamp(
        &self,
        playback_time: Option<&str>,
        self_last_updated: DateTime<Utc>,
    ) -> Option<String> {
        match self {
            StreamMode::Playback => playback_time.map(str::to_string),
            StreamMode::Realtime => Some(self_last_updated.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackOptions {
    /// RFC 3339 start of the replay
    pub start_time: Option<String>,
    pub playback_rate: Option<f64>,
    pub subscribe: Option<String>,
}

impl PlaybackOptions {
    /// Playback stream URL, e.g. `ws://host/signalk/v1/playback?startTime=..&playbackRate=..`
    pub fn playback_url(&self, url: &str) -> String {
        let mut query = Vec::new();
        if let Some(start) = self.start_time.as_deref().filter(|s| !s.is_empty()) {
            query.push(format!("startTime={}", start));
        }
        if let Some(rate) = self.playback_rate.filter(|r| *r != 0.0) {
            query.push(format!("playbackRate={}", rate));
        }
        if query.is_empty() {
            url.to_string()
        } else {
            format!("{}?{}", url, query.join("&"))
        }
    }
}

/// Derive the REST API URL from a stream URL: the last path segment is
/// replaced by `api` and the scheme becomes `https:` for `wss:`, `http:`
/// otherwise.
pub fn api_url(stream_url: &str) -> Result<String, StreamError> {
    let mut parts: Vec<&str> = stream_url.split('/').collect();
    if parts.len() < 4 || parts[2].is_empty() {
        return Err(StreamError::InvalidUrl(stream_url.to_string()));
    }
    parts.pop();
    parts.push("api");
    parts[0] = if parts[0] == "wss:" { "https:" } else { "http:" };
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_api_url() {
        assert_eq!(
            api_url("ws://localhost:3000/signalk/v1/stream").unwrap(),
            "http://localhost:3000/signalk/v1/api"
        );
        assert_eq!(
            api_url("wss://boat.local/signalk/v1/stream?subscribe=none").unwrap(),
            "https://boat.local/signalk/v1/api"
        );
        assert!(api_url("stream").is_err());
        assert!(api_url("ws://host").is_err());
    }

    #[test]
    fn test_playback_url() {
        let url = "ws://host/signalk/v1/playback";
        let opts = PlaybackOptions {
            start_time: Some("2024-01-01T00:00:00Z".into()),
            playback_rate: Some(5.0),
            subscribe: Some("self".into()),
        };
        assert_eq!(
            opts.playback_url(url),
            "ws://host/signalk/v1/playback?startTime=2024-01-01T00:00:00Z&playbackRate=5"
        );

        let rate_only = PlaybackOptions {
            playback_rate: Some(2.5),
            ..Default::default()
        };
        assert_eq!(rate_only.playback_url(url), format!("{}?playbackRate=2.5", url));
        assert_eq!(PlaybackOptions::default().playback_url(url), url);
    }

    #[test]
    fn test_snapshot_timestamp() {
        let t = Utc.timestamp_millis_opt(1_000).unwrap();
        assert_eq!(
            StreamMode::Realtime.snapshot_timestamp(Some("2020-01-01T00:00:00Z"), t),
            Some("1970-01-01T00:00:01.000Z".to_string())
        );
        assert_eq!(
            StreamMode::Playback.snapshot_timestamp(Some("2020-01-01T00:00:00Z"), t),
            Some("2020-01-01T00:00:00Z".to_string())
        );
        assert_eq!(StreamMode::Playback.snapshot_timestamp(None, t), None);
    }
}
