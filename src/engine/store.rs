//! Entity store holding the current layout snapshot.
//!
//! The store owns the sensor, device and person collections in insertion
//! order. That order is the deterministic iteration order every resolver and
//! detector uses, so relationship lists and emitted events are stable.
//!
//! Only the frame coordinator mutates the store while the engine runs; edits
//! coming from outside are expressed as [`LayoutEdit`] values and applied
//! between ticks.

use log::warn;
use serde::{Deserialize, Serialize};

use super::types::{Device, NodeId, NodeKind, Person, Point, Sensor};

/// Edit request produced by an editing surface (forms, drag gestures).
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutEdit {
    AddSensor(Sensor),
    AddDevice(Device),
    AddPerson(Person),
    /// Replace a sensor's editable fields; derived fields are kept.
    UpdateSensor(Sensor),
    /// Replace a device's editable fields; derived fields are kept.
    UpdateDevice(Device),
    /// Replace a person's editable fields; animation state is kept.
    UpdatePerson(Person),
    /// Move a sensor or device to a new position.
    MoveNode { node_id: NodeId, position: Point },
    Remove { node_id: NodeId },
}

/// Entity taken out of the store by a remove edit.
#[derive(Debug, Clone, PartialEq)]
pub enum RemovedNode {
    Sensor(Sensor),
    Device(Device),
    Person(Person),
}

impl RemovedNode {
    pub fn id(&self) -> &str {
        match self {
            RemovedNode::Sensor(s) => &s.id,
            RemovedNode::Device(d) => &d.id,
            RemovedNode::Person(p) => &p.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            RemovedNode::Sensor(_) => NodeKind::Sensor,
            RemovedNode::Device(_) => NodeKind::Device,
            RemovedNode::Person(_) => NodeKind::Person,
        }
    }

    pub fn floor(&self) -> i32 {
        match self {
            RemovedNode::Sensor(s) => s.floor,
            RemovedNode::Device(d) => d.floor,
            RemovedNode::Person(p) => p.floor,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            RemovedNode::Sensor(s) => s.display_name(),
            RemovedNode::Device(d) => d.display_name(),
            RemovedNode::Person(p) => p.display_name(),
        }
    }
}

/// Names of the counterparts a node is related to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub connected: Vec<String>,
    pub interfering: Vec<String>,
}

impl ConnectionSummary {
    pub fn is_empty(&self) -> bool {
        self.connected.is_empty() && self.interfering.is_empty()
    }
}

/// A node matched by [`EntityStore::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub floor: i32,
}

#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    sensors: Vec<Sensor>,
    devices: Vec<Device>,
    persons: Vec<Person>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from loaded collections. Later duplicates of an id are dropped.
    pub fn from_parts(sensors: Vec<Sensor>, devices: Vec<Device>, persons: Vec<Person>) -> Self {
        let mut store = Self::new();
        for sensor in sensors {
            store.add_sensor(sensor);
        }
        for device in devices {
            store.add_device(device);
        }
        for person in persons {
            store.add_person(person);
        }
        store
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub(crate) fn sensors_mut(&mut self) -> &mut [Sensor] {
        &mut self.sensors
    }

    pub(crate) fn devices_mut(&mut self) -> &mut [Device] {
        &mut self.devices
    }

    pub(crate) fn persons_mut(&mut self) -> &mut [Person] {
        &mut self.persons
    }

    pub fn sensor(&self, id: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.id == id)
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.persons.iter().find(|p| p.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty() && self.devices.is_empty() && self.persons.is_empty()
    }

    /// Kind of the entity registered under `id`, if any.
    pub fn node_kind(&self, id: &str) -> Option<NodeKind> {
        if self.sensor(id).is_some() {
            Some(NodeKind::Sensor)
        } else if self.device(id).is_some() {
            Some(NodeKind::Device)
        } else if self.person(id).is_some() {
            Some(NodeKind::Person)
        } else {
            None
        }
    }

    /// Display name of any entity, if it still exists.
    pub fn display_name(&self, id: &str) -> Option<&str> {
        if let Some(s) = self.sensor(id) {
            return Some(s.display_name());
        }
        if let Some(d) = self.device(id) {
            return Some(d.display_name());
        }
        self.person(id).map(|p| p.display_name())
    }

    pub fn add_sensor(&mut self, sensor: Sensor) -> bool {
        if self.node_kind(&sensor.id).is_some() {
            warn!("Ignoring sensor with duplicate id {}", sensor.id);
            return false;
        }
        self.sensors.push(sensor);
        true
    }

    pub fn add_device(&mut self, device: Device) -> bool {
        if self.node_kind(&device.id).is_some() {
            warn!("Ignoring device with duplicate id {}", device.id);
            return false;
        }
        self.devices.push(device);
        true
    }

    pub fn add_person(&mut self, person: Person) -> bool {
        if self.node_kind(&person.id).is_some() {
            warn!("Ignoring person with duplicate id {}", person.id);
            return false;
        }
        self.persons.push(person);
        true
    }

    pub fn update_sensor(&mut self, mut sensor: Sensor) -> bool {
        let Some(existing) = self.sensors.iter_mut().find(|s| s.id == sensor.id) else {
            return false;
        };
        sensor.connected_device_ids = std::mem::take(&mut existing.connected_device_ids);
        sensor.interference_ids = std::mem::take(&mut existing.interference_ids);
        *existing = sensor;
        true
    }

    pub fn update_device(&mut self, mut device: Device) -> bool {
        let Some(existing) = self.devices.iter_mut().find(|d| d.id == device.id) else {
            return false;
        };
        device.connected_sensor_ids = std::mem::take(&mut existing.connected_sensor_ids);
        device.interference_ids = std::mem::take(&mut existing.interference_ids);
        *existing = device;
        true
    }

    pub fn update_person(&mut self, mut person: Person) -> bool {
        let Some(existing) = self.persons.iter_mut().find(|p| p.id == person.id) else {
            return false;
        };
        person.current_segment_index = existing.current_segment_index;
        person.direction = existing.direction;
        person.progress = existing.progress;
        *existing = person;
        true
    }

    /// Move a sensor or device. Persons follow their path and cannot be moved.
    pub fn move_node(&mut self, id: &str, position: Point) -> bool {
        if let Some(sensor) = self.sensors.iter_mut().find(|s| s.id == id) {
            sensor.position = position;
            return true;
        }
        if let Some(device) = self.devices.iter_mut().find(|d| d.id == id) {
            device.position = position;
            return true;
        }
        false
    }

    pub fn remove(&mut self, id: &str) -> Option<RemovedNode> {
        if let Some(idx) = self.sensors.iter().position(|s| s.id == id) {
            return Some(RemovedNode::Sensor(self.sensors.remove(idx)));
        }
        if let Some(idx) = self.devices.iter().position(|d| d.id == id) {
            return Some(RemovedNode::Device(self.devices.remove(idx)));
        }
        if let Some(idx) = self.persons.iter().position(|p| p.id == id) {
            return Some(RemovedNode::Person(self.persons.remove(idx)));
        }
        None
    }

    /// Distinct floors that hold at least one entity, ascending.
    pub fn floors(&self) -> Vec<i32> {
        let mut floors: Vec<i32> = self
            .sensors
            .iter()
            .map(|s| s.floor)
            .chain(self.devices.iter().map(|d| d.floor))
            .chain(self.persons.iter().map(|p| p.floor))
            .collect();
        floors.sort_unstable();
        floors.dedup();
        floors
    }

    /// Names of the nodes related to `id`.
    ///
    /// Ids that no longer resolve to an entity on the same floor are skipped,
    /// so a transiently stale relationship list never surfaces as an error.
    pub fn connection_summary(&self, id: &str) -> Option<ConnectionSummary> {
        if let Some(sensor) = self.sensor(id) {
            let resolve = |ids: &[NodeId]| -> Vec<String> {
                ids.iter()
                    .filter_map(|d| self.device(d))
                    .filter(|d| d.floor == sensor.floor)
                    .map(|d| d.display_name().to_string())
                    .collect()
            };
            return Some(ConnectionSummary {
                connected: resolve(&sensor.connected_device_ids),
                interfering: resolve(&sensor.interference_ids),
            });
        }
        if let Some(device) = self.device(id) {
            let resolve = |ids: &[NodeId]| -> Vec<String> {
                ids.iter()
                    .filter_map(|s| self.sensor(s))
                    .filter(|s| s.floor == device.floor)
                    .map(|s| s.display_name().to_string())
                    .collect()
            };
            return Some(ConnectionSummary {
                connected: resolve(&device.connected_sensor_ids),
                interfering: resolve(&device.interference_ids),
            });
        }
        None
    }

    /// Case-insensitive substring search over names and ids.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let matches = |id: &str, name: &str| id.to_lowercase().contains(&needle) || name.to_lowercase().contains(&needle);

        let sensors = self.sensors.iter().filter(|s| matches(&s.id, &s.name)).map(|s| SearchHit {
            id: s.id.clone(),
            name: s.display_name().to_string(),
            kind: NodeKind::Sensor,
            floor: s.floor,
        });
        let devices = self.devices.iter().filter(|d| matches(&d.id, &d.name)).map(|d| SearchHit {
            id: d.id.clone(),
            name: d.display_name().to_string(),
            kind: NodeKind::Device,
            floor: d.floor,
        });
        let persons = self.persons.iter().filter(|p| matches(&p.id, &p.name)).map(|p| SearchHit {
            id: p.id.clone(),
            name: p.display_name().to_string(),
            kind: NodeKind::Person,
            floor: p.floor,
        });
        sensors.chain(devices).chain(persons).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> EntityStore {
        let sensor = Sensor::new("s1", 1, Point::new(0.0, 0.0), "motion").with_name("Hall Motion");
        let device = Device::new("d1", 1, Point::new(10.0, 0.0)).with_name("Ceiling Light");
        let person = Person::new("p1", 2, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)], 50.0);
        EntityStore::from_parts(vec![sensor], vec![device], vec![person])
    }

    #[test]
    fn ids_are_unique_across_kinds() {
        let mut store = store();
        assert!(!store.add_device(Device::new("s1", 1, Point::default())));
        assert!(!store.add_person(Person::new("d1", 1, Vec::new(), 1.0)));
        assert_eq!(store.node_kind("p1"), Some(NodeKind::Person));
        assert_eq!(store.floors(), vec![1, 2]);
    }

    #[test]
    fn update_keeps_derived_fields() {
        let mut store = store();
        store.sensors_mut()[0].connected_device_ids = vec!["d1".into()];
        let edited = Sensor::new("s1", 1, Point::new(5.0, 5.0), "motion").with_name("Renamed");
        assert!(store.update_sensor(edited));
        let sensor = store.sensor("s1").unwrap();
        assert_eq!(sensor.name, "Renamed");
        assert_eq!(sensor.connected_device_ids, vec!["d1".to_string()]);
    }

    #[test]
    fn summary_skips_dangling_and_cross_floor_ids() {
        let mut store = store();
        store.add_device(Device::new("d2", 3, Point::default()).with_name("Upstairs"));
        store.sensors_mut()[0].connected_device_ids = vec!["d1".into(), "gone".into(), "d2".into()];
        let summary = store.connection_summary("s1").unwrap();
        assert_eq!(summary.connected, vec!["Ceiling Light".to_string()]);
        assert!(summary.interfering.is_empty());
        assert!(store.connection_summary("p1").is_none());
    }

    #[test]
    fn move_and_remove() {
        let mut store = store();
        assert!(store.move_node("d1", Point::new(99.0, 1.0)));
        assert!(!store.move_node("p1", Point::new(1.0, 1.0)));
        assert_eq!(store.device("d1").unwrap().position, Point::new(99.0, 1.0));
        let removed = store.remove("d1").unwrap();
        assert_eq!(removed.kind(), NodeKind::Device);
        assert_eq!(removed.display_name(), "Ceiling Light");
        assert!(store.remove("d1").is_none());
    }

    #[test]
    fn search_matches_names_and_ids() {
        let store = store();
        let hits = store.search("LIGHT");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "d1");
        assert_eq!(store.search("p1")[0].kind, NodeKind::Person);
        assert!(store.search("  ").is_empty());
    }
}
