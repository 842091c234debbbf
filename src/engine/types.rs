//! Type definitions for the layout engine.
//!
//! Contains the entity structures shared by every engine stage:
//! - Placed nodes (sensors and devices) with their derived relationship lists
//! - Animated persons walking an open polyline
//! - Events emitted when relationships or detections change

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geometry::{DEFAULT_DEVICE_RADIUS, DEFAULT_SENSOR_RADIUS};

/// Identifier shared by all entity kinds. Unique across the whole layout.
pub type NodeId = String;

/// Sensor types that take part in motion/presence detection.
pub const MOTION_SENSOR_TYPES: [&str; 2] = ["motion", "presence"];

/// Simple 2D point in plan units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A sensor placed on the floor plan.
///
/// `connected_device_ids` and `interference_ids` are owned by the engine and
/// overwritten on every resolve pass. Editors create sensors with both empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    pub floor: i32,
    pub position: Point,
    /// Category tag, e.g. "motion" or "temperature".
    #[serde(rename = "type")]
    pub sensor_type: String,
    /// Detection radius. `None` falls back to [`DEFAULT_SENSOR_RADIUS`].
    #[serde(default)]
    pub radius: Option<f64>,
    /// Protocol tags the sensor can use. Empty means "no protocol".
    #[serde(default)]
    pub connectivity: Vec<String>,
    #[serde(default)]
    pub connected_device_ids: Vec<NodeId>,
    #[serde(default)]
    pub interference_ids: Vec<NodeId>,
}

impl Sensor {
    pub fn new(id: impl Into<NodeId>, floor: i32, position: Point, sensor_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            floor,
            position,
            sensor_type: sensor_type.into(),
            radius: None,
            connectivity: Vec::new(),
            connected_device_ids: Vec::new(),
            interference_ids: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_connectivity<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connectivity = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Radius used for range checks, substituting the default when absent.
    pub fn effective_radius(&self) -> f64 {
        self.radius.unwrap_or(DEFAULT_SENSOR_RADIUS)
    }

    /// Whether this sensor takes part in motion/presence detection.
    pub fn is_motion_sensor(&self) -> bool {
        MOTION_SENSOR_TYPES.contains(&self.sensor_type.as_str())
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

/// A device (hub, appliance, camera...) placed on the floor plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    /// Free-form label such as "appliance" or "security".
    #[serde(default, rename = "type")]
    pub kind: String,
    pub floor: i32,
    pub position: Point,
    /// Radius of the device footprint. `None` falls back to [`DEFAULT_DEVICE_RADIUS`].
    #[serde(default)]
    pub radius: Option<f64>,
    /// Protocol tags the device is actively using.
    #[serde(default)]
    pub connectivity: Vec<String>,
    /// Sensor types this device can legitimately pair with.
    #[serde(default)]
    pub compatible_sensors: Vec<String>,
    /// Protocol tags on which this device is a noisy emitter.
    #[serde(default)]
    pub interference_protocols: Vec<String>,
    #[serde(default)]
    pub connected_sensor_ids: Vec<NodeId>,
    #[serde(default)]
    pub interference_ids: Vec<NodeId>,
}

impl Device {
    pub fn new(id: impl Into<NodeId>, floor: i32, position: Point) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            kind: String::new(),
            floor,
            position,
            radius: None,
            connectivity: Vec::new(),
            compatible_sensors: Vec::new(),
            interference_protocols: Vec::new(),
            connected_sensor_ids: Vec::new(),
            interference_ids: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_connectivity<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connectivity = protocols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_compatible_sensors<I, S>(mut self, sensor_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compatible_sensors = sensor_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_interference_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interference_protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    pub fn effective_radius(&self) -> f64 {
        self.radius.unwrap_or(DEFAULT_DEVICE_RADIUS)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

/// Travel direction along a person's waypoint list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelDirection {
    #[default]
    Forward,
    Backward,
}

impl TravelDirection {
    /// Index reached by taking one step from `index`, if it stays inside `len`.
    pub fn step(self, index: usize, len: usize) -> Option<usize> {
        let next = match self {
            TravelDirection::Forward => index.checked_add(1)?,
            TravelDirection::Backward => index.checked_sub(1)?,
        };
        (next < len).then_some(next)
    }

    pub fn reversed(self) -> Self {
        match self {
            TravelDirection::Forward => TravelDirection::Backward,
            TravelDirection::Backward => TravelDirection::Forward,
        }
    }
}

/// An occupant walking back and forth along an open polyline.
///
/// The animation state (`current_segment_index`, `direction`, `progress`) is
/// advanced by the path animator; `progress` stays within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    pub floor: i32,
    /// Ordered waypoints. Fewer than two makes the person degenerate.
    pub path: Vec<Point>,
    #[serde(default)]
    pub current_segment_index: usize,
    #[serde(default)]
    pub direction: TravelDirection,
    #[serde(default)]
    pub progress: f64,
    /// Walking speed in plan units per second.
    pub speed: f64,
    /// Render color, e.g. "#FF1493".
    #[serde(default)]
    pub color: Option<String>,
}

impl Person {
    pub fn new(id: impl Into<NodeId>, floor: i32, path: Vec<Point>, speed: f64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            floor,
            path,
            current_segment_index: 0,
            direction: TravelDirection::Forward,
            progress: 0.0,
            speed,
            color: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A person needs at least one segment to walk or be located.
    pub fn is_degenerate(&self) -> bool {
        self.path.len() < 2
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

/// Kind of entity an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Sensor,
    Device,
    Person,
}

/// Category an event is filed under in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Connectivity,
    Interference,
    Motion,
    Status,
}

/// Immutable entry of the append-only event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    pub id: u64,
    pub floor: i32,
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    pub category: EventCategory,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}
