//! Entity Store
//!
//! One map per entity group, keyed by Signal K context. The self vessel is a
//! single record that always exists.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumIter};

use crate::entity::{Aircraft, AtoN, SarBeacon, Target, Vessel};

/// Context key of the self vessel as used by the server
pub const SELF_CONTEXT: &str = "vessels.self";

/// Entity group of a non-self context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Group {
    Vessels,
    Atons,
    Sar,
    Aircraft,
}

impl Group {
    /// Select the group from the first context segment.
    ///
    /// `shore.*` contexts (base stations) are stored with the AtoNs.
    pub fn from_context(context: &str) -> Option<Group> {
        match context.split('.').next()? {
            "vessels" => Some(Group::Vessels),
            "atons" | "shore" => Some(Group::Atons),
            "sar" => Some(Group::Sar),
            "aircraft" => Some(Group::Aircraft),
            _ => None,
        }
    }
}

/// All tracked entities
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStore {
    #[serde(rename = "self")]
    pub self_vessel: Vessel,
    pub ais_targets: HashMap<String, Vessel>,
    pub atons: HashMap<String, AtoN>,
    pub aircraft: HashMap<String, Aircraft>,
    pub sar: HashMap<String, SarBeacon>,
}

impl EntityStore {
    pub fn new(now: DateTime<Utc>) -> Self {
        EntityStore {
            self_vessel: Vessel::new(SELF_CONTEXT, now),
            ais_targets: HashMap::new(),
            atons: HashMap::new(),
            aircraft: HashMap::new(),
            sar: HashMap::new(),
        }
    }

    pub fn get(&self, group: Group, key: &str) -> Option<&dyn Target> {
        match group {
            Group::Vessels => self.ais_targets.get(key).map(|t| t as &dyn Target),
            Group::Atons => self.atons.get(key).map(|t| t as &dyn Target),
            Group::Sar => self.sar.get(key).map(|t| t as &dyn Target),
            Group::Aircraft => self.aircraft.get(key).map(|t| t as &dyn Target),
        }
    }

    pub fn get_mut(&mut self, group: Group, key: &str) -> Option<&mut dyn Target> {
        match group {
            Group::Vessels => self.ais_targets.get_mut(key).map(|t| t as &mut dyn Target),
            Group::Atons => self.atons.get_mut(key).map(|t| t as &mut dyn Target),
            Group::Sar => self.sar.get_mut(key).map(|t| t as &mut dyn Target),
            Group::Aircraft => self.aircraft.get_mut(key).map(|t| t as &mut dyn Target),
        }
    }

    pub fn contains(&self, group: Group, key: &str) -> bool {
        self.get(group, key).is_some()
    }

    /// Remove a record. Returns true if it was present.
    pub fn remove(&mut self, group: Group, key: &str) -> bool {
        match group {
            Group::Vessels => self.ais_targets.remove(key).is_some(),
            Group::Atons => self.atons.remove(key).is_some(),
            Group::Sar => self.sar.remove(key).is_some(),
            Group::Aircraft => self.aircraft.remove(key).is_some(),
        }
    }

    /// Remove every record of a group, returning the removed keys
    pub fn clear(&mut self, group: Group) -> Vec<String> {
        match group {
            Group::Vessels => self.ais_targets.drain().map(|(k, _)| k).collect(),
            Group::Atons => self.atons.drain().map(|(k, _)| k).collect(),
            Group::Sar => self.sar.drain().map(|(k, _)| k).collect(),
            Group::Aircraft => self.aircraft.drain().map(|(k, _)| k).collect(),
        }
    }

    pub fn len(&self, group: Group) -> usize {
        match group {
            Group::Vessels => self.ais_targets.len(),
            Group::Atons => self.atons.len(),
            Group::Sar => self.sar.len(),
            Group::Aircraft => self.aircraft.len(),
        }
    }

    pub fn is_empty(&self, group: Group) -> bool {
        self.len(group) == 0
    }

    pub fn keys(&self, group: Group) -> Vec<String> {
        match group {
            Group::Vessels => self.ais_targets.keys().cloned().collect(),
            Group::Atons => self.atons.keys().cloned().collect(),
            Group::Sar => self.sar.keys().cloned().collect(),
            Group::Aircraft => self.aircraft.keys().cloned().collect(),
        }
    }

    /// Visit every record of a group, in no particular order
    pub fn for_each<F>(&self, group: Group, mut f: F)
    where
        F: FnMut(&str, &dyn Target),
    {
        match group {
            Group::Vessels => {
                for (k, t) in &self.ais_targets {
                    f(k.as_str(), t as &dyn Target)
                }
            }
            Group::Atons => {
                for (k, t) in &self.atons {
                    f(k.as_str(), t as &dyn Target)
                }
            }
            Group::Sar => {
                for (k, t) in &self.sar {
                    f(k.as_str(), t as &dyn Target)
                }
            }
            Group::Aircraft => {
                for (k, t) in &self.aircraft {
                    f(k.as_str(), t as &dyn Target)
                }
            }
        }
    }

    pub fn vessel_or_create(&mut self, key: &str, now: DateTime<Utc>) -> &mut Vessel {
        self.ais_targets
            .entry(key.to_string())
            .or_insert_with(|| Vessel::new(key, now))
    }

    pub fn aton_or_create(&mut self, key: &str, now: DateTime<Utc>) -> &mut AtoN {
        self.atons
            .entry(key.to_string())
            .or_insert_with(|| AtoN::new(key, now))
    }

    pub fn sar_or_create(&mut self, key: &str, now: DateTime<Utc>) -> &mut SarBeacon {
        self.sar
            .entry(key.to_string())
            .or_insert_with(|| SarBeacon::new(key, now))
    }

    pub fn aircraft_or_create(&mut self, key: &str, now: DateTime<Utc>) -> &mut Aircraft {
        self.aircraft
            .entry(key.to_string())
            .or_insert_with(|| Aircraft::new(key, now))
    }
}
