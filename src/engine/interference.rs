//! Interference resolution between sensors and devices.
//!
//! Interference models protocol collision: a device flagged as a noisy
//! emitter on some band disturbs sensors in range that use the same band.
//! A pair interferes when:
//! - both sit on the same floor and are in range
//! - the protocols they share include one of the device's
//!   `interference_protocols` (blank tags on the device side are ignored)
//! - the pair is not already connected
//!
//! Connectivity must be resolved first in the same pass so the exclusion uses
//! the current connection graph instead of last tick's lists.

use super::connectivity::RelationGraph;
use super::geometry::in_range;
use super::types::{Device, Sensor};

/// Protocols used by both sides, skipping blank tags on the device side.
pub fn shared_protocols<'a>(sensor: &'a Sensor, device: &Device) -> Vec<&'a str> {
    sensor
        .connectivity
        .iter()
        .filter(|protocol| device.connectivity.iter().any(|d| !d.trim().is_empty() && d == *protocol))
        .map(String::as_str)
        .collect()
}

/// Interference predicate for a single pair, ignoring the connected-pair exclusion.
pub fn is_interfering_pair(sensor: &Sensor, device: &Device) -> bool {
    if sensor.floor != device.floor {
        return false;
    }
    if !in_range(&sensor.position, sensor.effective_radius(), &device.position, device.effective_radius()) {
        return false;
    }
    shared_protocols(sensor, device)
        .iter()
        .any(|protocol| device.interference_protocols.iter().any(|noisy| noisy == protocol))
}

/// Build the interference graph for the snapshot, excluding connected pairs.
///
/// `connections` must have been resolved from the same `sensors` and
/// `devices` slices.
pub fn resolve(sensors: &[Sensor], devices: &[Device], connections: &RelationGraph) -> RelationGraph {
    let mut graph = RelationGraph::with_size(sensors.len(), devices.len());
    for (si, sensor) in sensors.iter().enumerate() {
        for (di, device) in devices.iter().enumerate() {
            if connections.contains(si, di) {
                continue;
            }
            if is_interfering_pair(sensor, device) {
                graph.link(si, sensor, di, device);
            }
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::connectivity;
    use crate::engine::types::Point;

    fn zigbee_sensor() -> Sensor {
        Sensor::new("s3", 1, Point::new(0.0, 0.0), "temperature").with_radius(30.0).with_connectivity(["Zigbee"])
    }

    fn noisy_device() -> Device {
        Device::new("d2", 1, Point::new(40.0, 0.0))
            .with_radius(30.0)
            .with_connectivity(["Zigbee"])
            .with_interference_protocols(["Zigbee"])
    }

    #[test]
    fn incompatible_noisy_device_interferes_both_ways() {
        let sensors = vec![zigbee_sensor()];
        let devices = vec![noisy_device()];
        let connections = connectivity::resolve(&sensors, &devices);
        assert_eq!(connections.pair_count(), 0);

        let graph = resolve(&sensors, &devices, &connections);
        assert_eq!(graph.sensor_links(0), ["d2".to_string()]);
        assert_eq!(graph.device_links(0), ["s3".to_string()]);
    }

    #[test]
    fn connected_pair_never_interferes() {
        let sensors = vec![zigbee_sensor()];
        let devices = vec![noisy_device().with_compatible_sensors(["temperature"])];
        let connections = connectivity::resolve(&sensors, &devices);
        assert!(connections.contains(0, 0));
        // the raw predicate still matches; only the exclusion removes it
        assert!(is_interfering_pair(&sensors[0], &devices[0]));

        let graph = resolve(&sensors, &devices, &connections);
        assert_eq!(graph.pair_count(), 0);
    }

    #[test]
    fn requires_shared_noisy_protocol_range_and_floor() {
        let sensor = zigbee_sensor();

        let quiet_band = noisy_device().with_interference_protocols(["Wi-Fi 2.4GHz"]);
        let not_shared = noisy_device().with_connectivity(["BLE 5.0"]).with_interference_protocols(["BLE 5.0"]);
        let far = Device { position: Point::new(61.0, 0.0), ..noisy_device() };
        let upstairs = Device { floor: 2, ..noisy_device() };

        for device in [quiet_band, not_shared, far, upstairs] {
            assert!(!is_interfering_pair(&sensor, &device));
        }
    }

    #[test]
    fn blank_device_protocols_are_discarded() {
        let sensor = zigbee_sensor().with_connectivity(["", "Zigbee"]);
        let device = noisy_device().with_connectivity([" ", ""]).with_interference_protocols(["", " "]);
        assert!(shared_protocols(&sensor, &device).is_empty());
        assert!(!is_interfering_pair(&sensor, &device));
    }
}
