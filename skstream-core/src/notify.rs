//! Notification classification
//!
//! Turns self-vessel `notifications.*` deltas into discrete notification
//! events. Paths that don't match a known alarm are not reported.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::delta::PathValue;

/// Emergency alarms recognised by their last path segment
pub const STANDARD_ALARMS: [&str; 10] = [
    "mob",
    "sinking",
    "fire",
    "piracy",
    "flooding",
    "collision",
    "grounding",
    "listing",
    "adrift",
    "abandon",
];

const DEPTH_PATHS: [&str; 3] = [
    "notifications.environment.depth.belowTransducer",
    "notifications.environment.depth.belowSurface",
    "notifications.environment.depth.belowKeel",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    pub path: String,
    pub value: Value,
    /// Related context (e.g. the approaching vessel), if any
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Notification type, e.g. `depth`, `anchor`, `mob`, `closestApproach`
    pub kind: String,
    pub data: NotificationData,
}

/// Classify a notification delta.
///
/// Later rules take precedence over earlier ones when several match.
pub fn classify(pv: &PathValue) -> Option<Notification> {
    let path = pv.path.as_str();
    if !path.starts_with("notifications.") {
        return None;
    }
    let seg: Vec<&str> = path.split('.').collect();
    let at = |i: usize| seg.get(i).map(|s| s.to_string());

    let mut kind: Option<String> = None;
    let mut context: Option<String> = None;

    if DEPTH_PATHS.contains(&path) || path == "notifications.navigation.anchor" {
        kind = at(2);
    }
    if seg.last().is_some_and(|last| STANDARD_ALARMS.contains(last)) {
        kind = seg.last().map(|s| s.to_string());
    }
    if path.starts_with("notifications.navigation.closestApproach") {
        kind = at(2);
        context = at(3);
    }
    if path.starts_with("notifications.buddy")
        || path.starts_with("notifications.arrivalCircleEntered")
        || path.starts_with("notifications.navigation.course.arrivalCircleEntered")
    {
        kind = at(1);
        context = at(2);
    }

    kind.map(|kind| Notification {
        kind,
        data: NotificationData {
            path: pv.path.clone(),
            value: pv.value.clone(),
            context,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kind_of(path: &str) -> Option<(String, Option<String>)> {
        classify(&PathValue::new(path, json!({"state": "alarm"})))
            .map(|n| (n.kind, n.data.context))
    }

    #[test]
    fn test_depth_and_anchor() {
        assert_eq!(
            kind_of("notifications.environment.depth.belowKeel"),
            Some(("depth".into(), None))
        );
        assert_eq!(
            kind_of("notifications.navigation.anchor"),
            Some(("anchor".into(), None))
        );
        assert_eq!(kind_of("notifications.environment.depth.other"), None);
    }

    #[test]
    fn test_standard_alarms() {
        for alarm in STANDARD_ALARMS {
            let path = format!("notifications.{}", alarm);
            assert_eq!(kind_of(&path), Some((alarm.to_string(), None)));
        }
        assert_eq!(kind_of("notifications.something.fire"), Some(("fire".into(), None)));
    }

    #[test]
    fn test_closest_approach_context() {
        assert_eq!(
            kind_of("notifications.navigation.closestApproach.urn:mrn:imo:mmsi:123"),
            Some(("closestApproach".into(), Some("urn:mrn:imo:mmsi:123".into())))
        );
    }

    #[test]
    fn test_buddy_and_arrival() {
        assert_eq!(
            kind_of("notifications.buddy.urn:mrn:imo:mmsi:456"),
            Some(("buddy".into(), Some("urn:mrn:imo:mmsi:456".into())))
        );
        assert_eq!(
            kind_of("notifications.arrivalCircleEntered.wp1"),
            Some(("arrivalCircleEntered".into(), Some("wp1".into())))
        );
        assert_eq!(
            kind_of("notifications.navigation.course.arrivalCircleEntered"),
            Some(("navigation".into(), Some("course".into())))
        );
    }

    #[test]
    fn test_unclassified() {
        assert_eq!(kind_of("notifications.server.newVersion"), None);
        assert_eq!(kind_of("navigation.mob"), None);
    }
}
