//! Connectivity resolution between sensors and devices.
//!
//! A sensor and a device are connected when all of these hold:
//! - both sit on the same floor
//! - their footprints are in range (distance ≤ sum of radii)
//! - their protocol sets share at least one tag
//! - the device lists the sensor's type as compatible
//!
//! The graph is rebuilt from scratch on every resolve pass; event diffing
//! against the previous pass happens elsewhere.

use std::collections::HashSet;

use super::geometry::in_range;
use super::types::{Device, NodeId, Sensor};

/// Bipartite sensor↔device relation, indexed by position in the slices it
/// was resolved from.
///
/// Each sensor's list follows device iteration order and each device's list
/// follows sensor iteration order, so the output is deterministic for a given
/// store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationGraph {
    sensor_links: Vec<Vec<NodeId>>,
    device_links: Vec<Vec<NodeId>>,
    pairs: HashSet<(usize, usize)>,
}

impl RelationGraph {
    pub fn with_size(sensor_count: usize, device_count: usize) -> Self {
        Self {
            sensor_links: vec![Vec::new(); sensor_count],
            device_links: vec![Vec::new(); device_count],
            pairs: HashSet::new(),
        }
    }

    /// Record the pair on both sides. Relies on the caller iterating sensors
    /// in the outer loop so both sides keep discovery order.
    pub(crate) fn link(&mut self, sensor_idx: usize, sensor: &Sensor, device_idx: usize, device: &Device) {
        if self.pairs.insert((sensor_idx, device_idx)) {
            self.sensor_links[sensor_idx].push(device.id.clone());
            self.device_links[device_idx].push(sensor.id.clone());
        }
    }

    pub fn contains(&self, sensor_idx: usize, device_idx: usize) -> bool {
        self.pairs.contains(&(sensor_idx, device_idx))
    }

    /// Device ids related to the sensor at `sensor_idx`.
    pub fn sensor_links(&self, sensor_idx: usize) -> &[NodeId] {
        self.sensor_links.get(sensor_idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sensor ids related to the device at `device_idx`.
    pub fn device_links(&self, device_idx: usize) -> &[NodeId] {
        self.device_links.get(device_idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub(crate) fn into_links(self) -> (Vec<Vec<NodeId>>, Vec<Vec<NodeId>>) {
        (self.sensor_links, self.device_links)
    }
}

/// True if the two protocol sets share at least one tag.
pub fn shares_protocol(a: &[String], b: &[String]) -> bool {
    a.iter().any(|protocol| b.contains(protocol))
}

/// Connection predicate for a single sensor/device pair.
pub fn is_connected_pair(sensor: &Sensor, device: &Device) -> bool {
    sensor.floor == device.floor
        && in_range(&sensor.position, sensor.effective_radius(), &device.position, device.effective_radius())
        && shares_protocol(&sensor.connectivity, &device.connectivity)
        && device.compatible_sensors.contains(&sensor.sensor_type)
}

/// Build the full connectivity graph for the given snapshot.
pub fn resolve(sensors: &[Sensor], devices: &[Device]) -> RelationGraph {
    let mut graph = RelationGraph::with_size(sensors.len(), devices.len());
    for (si, sensor) in sensors.iter().enumerate() {
        for (di, device) in devices.iter().enumerate() {
            if is_connected_pair(sensor, device) {
                graph.link(si, sensor, di, device);
            }
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::Point;

    fn wifi_sensor(id: &str, x: f64) -> Sensor {
        Sensor::new(id, 1, Point::new(x, 0.0), "motion").with_radius(30.0).with_connectivity(["Wi-Fi"])
    }

    fn wifi_device(id: &str, x: f64) -> Device {
        Device::new(id, 1, Point::new(x, 0.0))
            .with_radius(30.0)
            .with_connectivity(["Wi-Fi"])
            .with_compatible_sensors(["motion"])
    }

    #[test]
    fn connects_in_range_compatible_pair() {
        let sensors = vec![wifi_sensor("s2", 0.0)];
        let devices = vec![wifi_device("d1", 50.0)];
        let graph = resolve(&sensors, &devices);
        assert!(graph.contains(0, 0));
        assert_eq!(graph.sensor_links(0), ["d1".to_string()]);
        assert_eq!(graph.device_links(0), ["s2".to_string()]);
    }

    #[test]
    fn every_condition_is_required() {
        let sensor = wifi_sensor("s", 0.0);

        let far = wifi_device("far", 61.0);
        let other_floor = Device { floor: 2, ..wifi_device("up", 10.0) };
        let no_protocol = wifi_device("np", 10.0).with_connectivity(Vec::<String>::new());
        let incompatible = wifi_device("inc", 10.0).with_compatible_sensors(["temperature"]);

        for device in [far, other_floor, no_protocol, incompatible] {
            assert!(!is_connected_pair(&sensor, &device), "{} should not connect", device.id);
        }

        let silent_sensor = wifi_sensor("quiet", 0.0).with_connectivity(Vec::<String>::new());
        assert!(!is_connected_pair(&silent_sensor, &wifi_device("d", 10.0)));
    }

    #[test]
    fn lists_follow_iteration_order_and_are_symmetric() {
        let sensors = vec![wifi_sensor("s1", 0.0), wifi_sensor("s2", 20.0)];
        let devices = vec![wifi_device("d9", 40.0), wifi_device("d1", 10.0), wifi_device("d5", 500.0)];
        let graph = resolve(&sensors, &devices);
        assert_eq!(graph.sensor_links(0), ["d9".to_string(), "d1".to_string()]);
        assert_eq!(graph.sensor_links(1), ["d9".to_string(), "d1".to_string()]);
        assert_eq!(graph.device_links(0), ["s1".to_string(), "s2".to_string()]);
        assert!(graph.device_links(2).is_empty());
        assert_eq!(graph.pair_count(), 4);

        for (si, sensor) in sensors.iter().enumerate() {
            for (di, device) in devices.iter().enumerate() {
                assert_eq!(graph.sensor_links(si).contains(&device.id), graph.device_links(di).contains(&sensor.id));
            }
        }
    }

    #[test]
    fn missing_radii_use_defaults() {
        // default sensor radius 150 + default device radius 30 = 180
        let sensor = Sensor::new("s", 1, Point::new(0.0, 0.0), "motion").with_connectivity(["BLE 5.0"]);
        let near = Device::new("d", 1, Point::new(180.0, 0.0)).with_connectivity(["BLE 5.0"]).with_compatible_sensors(["motion"]);
        let far = Device { position: Point::new(181.0, 0.0), ..near.clone() };
        assert!(is_connected_pair(&sensor, &near));
        assert!(!is_connected_pair(&sensor, &far));
    }
}
