//! Track history fetch
//!
//! A Signal K server with a tracks plugin answers `GET {api}/tracks?radius=R`
//! with one GeoJSON geometry per vessel context:
//!
//! ```text
//! { "vessels.urn:mrn:imo:mmsi:...": { "type": "MultiLineString", "coordinates": [[[lon, lat], ..]] } }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::Value;

use skstream_core::geo::{position_from_array, Position};

use crate::WorkerError;

pub type TrackMap = HashMap<String, Vec<Vec<Position>>>;

#[async_trait]
pub trait TrackSource: Send + Sync {
    async fn fetch_tracks(
        &self,
        api_url: &str,
        radius: f64,
        token: Option<&str>,
    ) -> Result<TrackMap, WorkerError>;
}

#[derive(Default)]
pub struct HttpTrackSource {
    client: Client,
}

impl HttpTrackSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackSource for HttpTrackSource {
    async fn fetch_tracks(
        &self,
        api_url: &str,
        radius: f64,
        token: Option<&str>,
    ) -> Result<TrackMap, WorkerError> {
        let url = format!("{}/tracks?radius={}", api_url, radius);
        log::debug!("Tracks: GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let body: Value = request.send().await?.error_for_status()?.json().await?;
        Ok(parse_tracks(&body))
    }
}

fn parse_line(value: &Value) -> Vec<Position> {
    value
        .as_array()
        .map(|points| points.iter().filter_map(position_from_array).collect())
        .unwrap_or_default()
}

/// Decode a tracks response into segments per context.
///
/// Entries that are not LineString or MultiLineString geometries are skipped.
pub fn parse_tracks(body: &Value) -> TrackMap {
    let mut tracks = TrackMap::new();
    let Some(entries) = body.as_object() else {
        return tracks;
    };
    for (context, geometry) in entries {
        let coordinates = &geometry["coordinates"];
        let segments = match geometry["type"].as_str() {
            Some("LineString") => vec![parse_line(coordinates)],
            Some("MultiLineString") | None => coordinates
                .as_array()
                .map(|lines| lines.iter().map(parse_line).collect())
                .unwrap_or_default(),
            Some(_) => continue,
        };
        let segments: Vec<Vec<Position>> =
            segments.into_iter().filter(|s| !s.is_empty()).collect();
        if !segments.is_empty() {
            tracks.insert(context.clone(), segments);
        }
    }
    tracks
}
