//! Event diffing and the event sink boundary.
//!
//! Relationship lists are recomputed wholesale each pass. Events are only
//! produced for the difference between a sensor's previous lists and the
//! newly resolved ones:
//! - one event per added id ("connected to X" / "interference from X")
//! - one event per removed id ("disconnected from X" / "no longer interferes with X")
//!
//! Changes are narrated from the sensor's side only, so each logical pair
//! change is reported once per pass. Emission order is stable: connectivity
//! before interference, added before removed, each in list order.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use embassy_time::Instant;
use serde::{Deserialize, Serialize};

use super::motion::{MotionChange, MotionTransition};
use super::types::{EventCategory, NodeId, NodeKind, Sensor, SimulationEvent};

/// Append-only destination for emitted events.
pub trait EventSink {
    fn append(&mut self, event: SimulationEvent);
}

impl EventSink for Vec<SimulationEvent> {
    fn append(&mut self, event: SimulationEvent) {
        self.push(event);
    }
}

/// In-memory append-only event log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Vec<SimulationEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<SimulationEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[SimulationEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Highest event id in the log, used to continue numbering after a load.
    pub fn last_id(&self) -> Option<u64> {
        self.events.iter().map(|e| e.id).max()
    }

    pub fn for_floor(&self, floor: i32) -> impl Iterator<Item = &SimulationEvent> {
        self.events.iter().filter(move |e| e.floor == floor)
    }

    pub fn for_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a SimulationEvent> {
        self.events.iter().filter(move |e| e.node_id == node_id)
    }
}

impl EventSink for EventLog {
    fn append(&mut self, event: SimulationEvent) {
        self.events.push(event);
    }
}

/// Event content before an id and timestamp are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub floor: i32,
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    pub category: EventCategory,
    pub message: String,
}

/// Ids added to and removed from a relationship list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationDiff<'a> {
    pub added: Vec<&'a str>,
    pub removed: Vec<&'a str>,
}

impl RelationDiff<'_> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Set difference between two id lists, keeping list order and dropping repeats.
pub fn diff_ids<'a>(previous: &'a [NodeId], current: &'a [NodeId]) -> RelationDiff<'a> {
    let before: HashSet<&str> = previous.iter().map(String::as_str).collect();
    let after: HashSet<&str> = current.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    let added = current
        .iter()
        .map(String::as_str)
        .filter(|id| !before.contains(id) && seen.insert(*id))
        .collect();
    let mut seen = HashSet::new();
    let removed = previous
        .iter()
        .map(String::as_str)
        .filter(|id| !after.contains(id) && seen.insert(*id))
        .collect();
    RelationDiff { added, removed }
}

/// Events for one sensor whose lists are about to be replaced.
///
/// `name_of` resolves a device id to a display name; ids that no longer
/// resolve (e.g. a deleted device) are narrated by id.
pub fn diff_sensor_relations<F>(sensor: &Sensor, connected: &[NodeId], interference: &[NodeId], name_of: F) -> Vec<EventDraft>
where
    F: Fn(&str) -> Option<String>,
{
    let subject = sensor.display_name();
    let draft = |category: EventCategory, message: String| EventDraft {
        floor: sensor.floor,
        node_id: sensor.id.clone(),
        node_kind: NodeKind::Sensor,
        category,
        message,
    };
    let label = |id: &str| name_of(id).unwrap_or_else(|| id.to_string());

    let mut drafts = Vec::new();

    let links = diff_ids(&sensor.connected_device_ids, connected);
    for id in &links.added {
        drafts.push(draft(EventCategory::Connectivity, format!("{} connected to {}", subject, label(id))));
    }
    for id in &links.removed {
        drafts.push(draft(EventCategory::Connectivity, format!("{} disconnected from {}", subject, label(id))));
    }

    let noise = diff_ids(&sensor.interference_ids, interference);
    for id in &noise.added {
        drafts.push(draft(EventCategory::Interference, format!("{} interference from {}", subject, label(id))));
    }
    for id in &noise.removed {
        drafts.push(draft(EventCategory::Interference, format!("{} no longer interferes with {}", subject, label(id))));
    }

    drafts
}

/// Narrate a detection transition.
pub fn motion_draft(change: &MotionChange, sensor_name: &str, person_name: &str) -> EventDraft {
    let message = match change.transition {
        MotionTransition::Started => format!("Motion detected by {}: {} entered range", sensor_name, person_name),
        MotionTransition::Ended(lasted) => format!(
            "Motion ended at {}: {} left range after {:.1}s",
            sensor_name,
            person_name,
            lasted.as_millis() as f64 / 1000.0
        ),
    };
    EventDraft {
        floor: change.floor,
        node_id: change.sensor_id.clone(),
        node_kind: NodeKind::Sensor,
        category: EventCategory::Motion,
        message,
    }
}

/// Attaches sequential ids and wall-clock timestamps to drafts.
///
/// Timestamps are `origin + now`, where `origin` is the wall-clock time that
/// corresponds to the engine clock's zero instant.
#[derive(Debug, Clone)]
pub struct EventStamper {
    next_id: u64,
    origin: DateTime<Utc>,
}

impl Default for EventStamper {
    fn default() -> Self {
        Self {
            next_id: 1,
            origin: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl EventStamper {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self { origin, ..Self::default() }
    }

    /// Continue numbering after `last_id` (e.g. a log restored from disk).
    pub fn resume_after(&mut self, last_id: u64) {
        self.next_id = self.next_id.max(last_id.saturating_add(1));
    }

    pub fn timestamp(&self, now: Instant) -> DateTime<Utc> {
        let offset = TimeDelta::try_milliseconds(now.as_millis() as i64).unwrap_or(TimeDelta::zero());
        self.origin.checked_add_signed(offset).unwrap_or(self.origin)
    }

    pub fn stamp(&mut self, draft: EventDraft, now: Instant) -> SimulationEvent {
        let id = self.next_id;
        self.next_id += 1;
        SimulationEvent {
            id,
            floor: draft.floor,
            node_id: draft.node_id,
            node_kind: draft.node_kind,
            category: draft.category,
            timestamp: self.timestamp(now),
            message: draft.message,
        }
    }
}
