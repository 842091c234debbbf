//! Layout loading, validation and saving.
//!
//! A layout document holds every entity of a building (all floors) in one
//! JSON file:
//!
//! ```json
//! { "name": "Office", "sensors": [...], "devices": [...], "persons": [...] }
//! ```
//!
//! Derived relationship lists and person animation state are written out on
//! save but optional on input. Detection sessions are never persisted.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::engine::events::EventLog;
use crate::engine::store::EntityStore;
use crate::engine::types::{Device, Person, Point, Sensor};

/// Error type for layout and event log file failures.
#[derive(Debug)]
pub enum LayoutLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
    WriteError(String),
}

impl std::fmt::Display for LayoutLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            LayoutLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            LayoutLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            LayoutLoadError::WriteError(msg) => write!(f, "Failed to write file: {}", msg),
        }
    }
}

impl std::error::Error for LayoutLoadError {}

/// Root structure of a layout file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub persons: Vec<Person>,
}

impl LayoutDocument {
    /// Snapshot a running store, including its derived lists.
    pub fn from_store(name: impl Into<String>, store: &EntityStore) -> Self {
        Self {
            name: name.into(),
            sensors: store.sensors().to_vec(),
            devices: store.devices().to_vec(),
            persons: store.persons().to_vec(),
        }
    }

    pub fn into_store(self) -> EntityStore {
        EntityStore::from_parts(self.sensors, self.devices, self.persons)
    }
}

/// Load, parse and validate a layout file.
///
/// # Parameters
///
/// * `path` - Path to the layout JSON file
///
/// # Returns
///
/// The validated document or the stage that failed.
pub fn load_layout(path: &str) -> Result<LayoutDocument, LayoutLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| LayoutLoadError::FileReadError(e.to_string()))?;

    let layout = parse_layout(&data)?;
    log::info!(
        "Loaded layout {:?} from {}: {} sensors, {} devices, {} persons",
        layout.name,
        path,
        layout.sensors.len(),
        layout.devices.len(),
        layout.persons.len()
    );
    Ok(layout)
}

/// Parse and validate layout JSON held in memory.
pub fn parse_layout(data: &str) -> Result<LayoutDocument, LayoutLoadError> {
    let layout: LayoutDocument = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| LayoutLoadError::ParseError(format!("{:#}", e)))?;

    validate_layout(&layout).map_err(LayoutLoadError::ValidationError)?;

    for person in layout.persons.iter().filter(|p| p.is_degenerate()) {
        log::warn!("Person {} has {} waypoints and will stay still", person.id, person.path.len());
    }
    Ok(layout)
}

fn check_point(owner: &str, what: &str, point: &Point) -> Result<(), String> {
    if !point.x.is_finite() || !point.y.is_finite() {
        return Err(format!("{} {} ({}, {}) is not a finite coordinate", owner, what, point.x, point.y));
    }
    Ok(())
}

fn check_radius(owner: &str, radius: Option<f64>) -> Result<(), String> {
    match radius {
        Some(r) if !r.is_finite() || r < 0.0 => Err(format!("{} radius {} must be a non-negative number", owner, r)),
        _ => Ok(()),
    }
}

/// Validate a parsed layout.
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with the first problem otherwise.
pub fn validate_layout(layout: &LayoutDocument) -> Result<(), String> {
    let mut ids = HashSet::new();
    let all_ids = layout
        .sensors
        .iter()
        .map(|s| &s.id)
        .chain(layout.devices.iter().map(|d| &d.id))
        .chain(layout.persons.iter().map(|p| &p.id));
    for id in all_ids {
        if id.trim().is_empty() {
            return Err("Entity with an empty id found".to_string());
        }
        if !ids.insert(id.as_str()) {
            return Err(format!("Duplicate id found: {}", id));
        }
    }

    for sensor in &layout.sensors {
        let owner = format!("Sensor {}", sensor.id);
        check_point(&owner, "position", &sensor.position)?;
        check_radius(&owner, sensor.radius)?;
    }

    for device in &layout.devices {
        let owner = format!("Device {}", device.id);
        check_point(&owner, "position", &device.position)?;
        check_radius(&owner, device.radius)?;
    }

    for person in &layout.persons {
        let owner = format!("Person {}", person.id);
        if !person.speed.is_finite() || person.speed < 0.0 {
            return Err(format!("{} speed {} must be a non-negative number", owner, person.speed));
        }
        for (idx, waypoint) in person.path.iter().enumerate() {
            check_point(&owner, &format!("waypoint {}", idx), waypoint)?;
        }
    }

    Ok(())
}

/// Write a layout as pretty-printed JSON.
pub fn save_layout(path: &str, layout: &LayoutDocument) -> Result<(), LayoutLoadError> {
    let data = serde_json::to_string_pretty(layout)
        .context("Failed to encode layout")
        .map_err(|e| LayoutLoadError::WriteError(e.to_string()))?;
    fs::write(path, data)
        .with_context(|| format!("Failed to write file: {}", path))
        .map_err(|e| LayoutLoadError::WriteError(e.to_string()))?;
    log::info!("Saved layout {:?} to {}", layout.name, path);
    Ok(())
}

/// Read an event log written by [`save_event_log`]. A missing file yields an empty log.
pub fn load_event_log(path: &str) -> Result<EventLog, LayoutLoadError> {
    if !Path::new(path).exists() {
        return Ok(EventLog::new());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| LayoutLoadError::FileReadError(e.to_string()))?;
    serde_json::from_str(&data)
        .context("Invalid event log format")
        .map_err(|e| LayoutLoadError::ParseError(format!("{:#}", e)))
}

pub fn save_event_log(path: &str, log: &EventLog) -> Result<(), LayoutLoadError> {
    let data = serde_json::to_string_pretty(log)
        .context("Failed to encode event log")
        .map_err(|e| LayoutLoadError::WriteError(e.to_string()))?;
    fs::write(path, data)
        .with_context(|| format!("Failed to write file: {}", path))
        .map_err(|e| LayoutLoadError::WriteError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "Ground floor",
        "sensors": [
            { "id": "s1", "name": "Hall", "floor": 1, "position": { "x": 0, "y": 0 }, "type": "motion", "connectivity": ["Wi-Fi"] }
        ],
        "devices": [
            { "id": "d1", "name": "Hub", "type": "appliance", "floor": 1, "position": { "x": 50, "y": 0 },
              "connectivity": ["Wi-Fi"], "compatible_sensors": ["motion"] }
        ],
        "persons": [
            { "id": "p1", "floor": 1, "path": [{ "x": 0, "y": 0 }, { "x": 100, "y": 0 }], "speed": 40 }
        ]
    }"#;

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("sensor-layout-{}-{}", std::process::id(), name))
            .to_string_lossy()
            .to_string()
    }

    #[test]
    fn parses_minimal_layout_with_defaults() {
        let layout = parse_layout(SAMPLE).unwrap();
        assert_eq!(layout.name, "Ground floor");
        let sensor = &layout.sensors[0];
        assert_eq!(sensor.radius, None);
        assert!(sensor.connected_device_ids.is_empty());
        assert_eq!(layout.devices[0].kind, "appliance");
        assert_eq!(layout.persons[0].progress, 0.0);

        let store = layout.into_store();
        assert_eq!(store.sensors().len(), 1);
        assert_eq!(store.display_name("d1"), Some("Hub"));
    }

    #[test]
    fn rejects_duplicate_ids_across_kinds() {
        let mut layout = parse_layout(SAMPLE).unwrap();
        layout.devices[0].id = "s1".into();
        let err = validate_layout(&layout).unwrap_err();
        assert!(err.contains("Duplicate id"));
    }

    #[test]
    fn rejects_negative_radius_and_speed() {
        let mut layout = parse_layout(SAMPLE).unwrap();
        layout.sensors[0].radius = Some(-1.0);
        assert!(validate_layout(&layout).is_err());

        let mut layout = parse_layout(SAMPLE).unwrap();
        layout.persons[0].speed = f64::NAN;
        assert!(validate_layout(&layout).is_err());
    }

    #[test]
    fn short_paths_are_accepted() {
        let mut layout = parse_layout(SAMPLE).unwrap();
        layout.persons[0].path.truncate(1);
        assert!(validate_layout(&layout).is_ok());
    }

    #[test]
    fn parse_errors_are_classified() {
        assert!(matches!(parse_layout("{ not json"), Err(LayoutLoadError::ParseError(_))));
        assert!(matches!(load_layout("/definitely/not/here.json"), Err(LayoutLoadError::FileReadError(_))));
    }

    #[test]
    fn save_then_load_keeps_derived_lists() {
        let mut layout = parse_layout(SAMPLE).unwrap();
        layout.sensors[0].connected_device_ids = vec!["d1".into()];
        let path = temp_path("layout.json");
        save_layout(&path, &layout).unwrap();
        let loaded = load_layout(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, layout);
    }

    #[test]
    fn missing_event_log_is_empty() {
        let log = load_event_log(&temp_path("no-such-log.json")).unwrap();
        assert!(log.is_empty());
    }
}
