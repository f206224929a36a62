//! Outbound snapshot types

use std::collections::BTreeSet;

use serde::Serialize;

use crate::course::NavData;
use crate::liveness::AisStatus;
use crate::store::EntityStore;

/// Full state as of one output cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(flatten)]
    pub store: EntityStore,
    pub ais_status: AisStatus,
    /// Preferred-source paths seen on the self vessel
    pub paths: BTreeSet<String>,
    pub nav_data: NavData,
}

/// Body of an `update` message
#[derive(Debug, Clone, Serialize)]
pub struct UpdateMessage {
    pub playback: bool,
    pub result: Snapshot,
    pub timestamp: Option<String>,
}
