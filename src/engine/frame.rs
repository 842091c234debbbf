//! Frame coordinator driving one simulation tick at a time.
//!
//! High-level flow of a running tick:
//! 1) Compute `dt` from the previous tick's timestamp.
//! 2) Advance every person along its path.
//! 3) Run motion detection against the new positions.
//! 4) Resolve connectivity, then interference (which needs the fresh
//!    connection graph for its exclusion rule).
//! 5) Diff the new lists against the stored ones, emit events, overwrite.
//!
//! While a drag or pan gesture is active the tick only tracks wall-clock
//! time; animation, detection and resolution are frozen. Releasing the
//! gesture re-bases the clock to the release instant (so no accumulated
//! time is replayed as one jump) and runs one synchronous resolve pass so
//! the moved node's relationships are correct immediately.
//!
//! The coordinator owns the store; edits are applied through
//! [`FrameCoordinator::apply_edit`] between ticks, never during one.

use chrono::{DateTime, Utc};
use embassy_time::{Duration, Instant};
use log::{debug, info, warn};

use super::animator;
use super::connectivity;
use super::events::{EventDraft, EventSink, EventStamper, diff_sensor_relations, motion_draft};
use super::interference;
use super::motion::MotionDetector;
use super::store::{EntityStore, LayoutEdit, RemovedNode};
use super::types::{EventCategory, NodeKind, Person};

/// What a call to [`FrameCoordinator::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Simulated time consumed by this tick (zero while paused).
    pub dt: Duration,
    pub paused: bool,
    /// Number of persons that moved or reached a waypoint.
    pub animated: usize,
    /// Number of events appended to the sink.
    pub emitted: usize,
}

pub struct FrameCoordinator {
    store: EntityStore,
    motion: MotionDetector,
    stamper: EventStamper,
    /// Wall-clock instant the next `dt` is measured from.
    last_timestamp: Option<Instant>,
    paused: bool,
    ticks: u64,
}

impl FrameCoordinator {
    pub fn new(store: EntityStore) -> Self {
        Self {
            store,
            motion: MotionDetector::new(),
            stamper: EventStamper::default(),
            last_timestamp: None,
            paused: false,
            ticks: 0,
        }
    }

    /// Set the wall-clock time matching the engine clock's zero instant.
    pub fn with_wall_clock_origin(mut self, origin: DateTime<Utc>) -> Self {
        self.stamper = EventStamper::new(origin);
        self
    }

    /// Continue event numbering after a restored log.
    pub fn resume_event_ids_after(&mut self, last_id: u64) {
        self.stamper.resume_after(last_id);
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn motion(&self) -> &MotionDetector {
        &self.motion
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Swap in a freshly loaded layout. Detection sessions restart empty and
    /// the clock re-bases on the next tick.
    pub fn replace_store(&mut self, store: EntityStore) {
        self.store = store;
        self.motion.clear();
        self.last_timestamp = None;
        info!(
            "Layout replaced: {} sensors, {} devices, {} persons",
            self.store.sensors().len(),
            self.store.devices().len(),
            self.store.persons().len()
        );
    }

    /// Run one tick.
    ///
    /// # Parameters
    ///
    /// * `now` - Current wall-clock instant of the engine clock
    /// * `paused_for_drag` - A drag or pan gesture is in progress
    /// * `sink` - Receives the events emitted by this tick, in order
    pub fn tick(&mut self, now: Instant, paused_for_drag: bool, sink: &mut dyn EventSink) -> TickReport {
        self.ticks += 1;

        if paused_for_drag {
            if !self.paused {
                debug!("Gesture started, freezing animation");
                self.paused = true;
            }
            self.last_timestamp = Some(now);
            return TickReport {
                dt: Duration::from_ticks(0),
                paused: true,
                animated: 0,
                emitted: 0,
            };
        }

        let mut emitted = 0;
        if self.paused {
            // Gesture ended without an explicit release call
            emitted += self.release_drag(now, sink);
        }

        let dt = self
            .last_timestamp
            .and_then(|last| now.checked_duration_since(last))
            .unwrap_or(Duration::from_ticks(0));
        self.last_timestamp = Some(now);

        let animated = animator::advance_all(self.store.persons_mut(), dt);
        emitted += self.detect_motion(now, sink);
        emitted += self.resolve_relations(now, sink);

        TickReport {
            dt,
            paused: false,
            animated,
            emitted,
        }
    }

    /// End a drag/pan gesture at `now`.
    ///
    /// The dt baseline is re-based to `now` and connectivity plus
    /// interference are recomputed right away. Returns the number of events
    /// emitted by that recompute.
    pub fn release_drag(&mut self, now: Instant, sink: &mut dyn EventSink) -> usize {
        self.paused = false;
        self.last_timestamp = Some(now);
        info!("Gesture released, recomputing relationships");
        self.resolve_relations(now, sink)
    }

    /// Recompute connectivity and interference for the whole store and emit
    /// the differences against the stored lists.
    pub fn resolve_relations(&mut self, now: Instant, sink: &mut dyn EventSink) -> usize {
        let sensors = self.store.sensors();
        let devices = self.store.devices();
        let connections = connectivity::resolve(sensors, devices);
        let interferences = interference::resolve(sensors, devices, &connections);

        let device_name = |id: &str| self.store.device(id).map(|d| d.display_name().to_string());
        let drafts: Vec<EventDraft> = sensors
            .iter()
            .enumerate()
            .flat_map(|(si, sensor)| diff_sensor_relations(sensor, connections.sensor_links(si), interferences.sensor_links(si), &device_name))
            .collect();

        let (sensor_links, device_links) = connections.into_links();
        let (sensor_noise, device_noise) = interferences.into_links();

        for ((sensor, linked), noisy) in self.store.sensors_mut().iter_mut().zip(sensor_links).zip(sensor_noise) {
            sensor.connected_device_ids = linked;
            sensor.interference_ids = noisy;
        }
        for ((device, linked), noisy) in self.store.devices_mut().iter_mut().zip(device_links).zip(device_noise) {
            device.connected_sensor_ids = linked;
            device.interference_ids = noisy;
        }

        self.publish(drafts, now, sink)
    }

    fn detect_motion(&mut self, now: Instant, sink: &mut dyn EventSink) -> usize {
        let changes = self.motion.detect(self.store.sensors(), self.store.persons(), now);
        if changes.is_empty() {
            return 0;
        }
        let drafts: Vec<EventDraft> = changes
            .iter()
            .map(|change| {
                let sensor_name = self.store.display_name(&change.sensor_id).unwrap_or(&change.sensor_id);
                let person_name = self.store.display_name(&change.person_id).unwrap_or(&change.person_id);
                motion_draft(change, sensor_name, person_name)
            })
            .collect();
        self.publish(drafts, now, sink)
    }

    fn publish(&mut self, drafts: Vec<EventDraft>, now: Instant, sink: &mut dyn EventSink) -> usize {
        let count = drafts.len();
        for draft in drafts {
            sink.append(self.stamper.stamp(draft, now));
        }
        count
    }

    /// Apply an edit between ticks.
    ///
    /// Adding or removing nodes narrates a status event (a motion event for
    /// new persons). Unknown ids are logged and ignored; returns whether the
    /// store changed.
    pub fn apply_edit(&mut self, edit: LayoutEdit, now: Instant, sink: &mut dyn EventSink) -> bool {
        match edit {
            LayoutEdit::AddSensor(mut sensor) => {
                sensor.connected_device_ids.clear();
                sensor.interference_ids.clear();
                let draft = EventDraft {
                    floor: sensor.floor,
                    node_id: sensor.id.clone(),
                    node_kind: NodeKind::Sensor,
                    category: EventCategory::Status,
                    message: format!("Sensor \"{}\" ({}) added", sensor.display_name(), sensor.sensor_type),
                };
                if !self.store.add_sensor(sensor) {
                    return false;
                }
                self.publish(vec![draft], now, sink);
                true
            }
            LayoutEdit::AddDevice(mut device) => {
                device.connected_sensor_ids.clear();
                device.interference_ids.clear();
                let draft = EventDraft {
                    floor: device.floor,
                    node_id: device.id.clone(),
                    node_kind: NodeKind::Device,
                    category: EventCategory::Status,
                    message: format!("Device \"{}\" added", device.display_name()),
                };
                if !self.store.add_device(device) {
                    return false;
                }
                self.publish(vec![draft], now, sink);
                true
            }
            LayoutEdit::AddPerson(person) => {
                let draft = person_added_draft(&person);
                if !self.store.add_person(person) {
                    return false;
                }
                self.publish(vec![draft], now, sink);
                true
            }
            LayoutEdit::UpdateSensor(sensor) => {
                let id = sensor.id.clone();
                let updated = self.store.update_sensor(sensor);
                if !updated {
                    warn!("Update for unknown sensor {} ignored", id);
                }
                updated
            }
            LayoutEdit::UpdateDevice(device) => {
                let id = device.id.clone();
                let updated = self.store.update_device(device);
                if !updated {
                    warn!("Update for unknown device {} ignored", id);
                }
                updated
            }
            LayoutEdit::UpdatePerson(person) => {
                let id = person.id.clone();
                let updated = self.store.update_person(person);
                if !updated {
                    warn!("Update for unknown person {} ignored", id);
                }
                updated
            }
            LayoutEdit::MoveNode { node_id, position } => {
                let moved = self.store.move_node(&node_id, position);
                if !moved {
                    warn!("Move for unknown or immovable node {} ignored", node_id);
                }
                moved
            }
            LayoutEdit::Remove { node_id } => {
                let Some(removed) = self.store.remove(&node_id) else {
                    warn!("Remove for unknown node {} ignored", node_id);
                    return false;
                };
                let dropped = self.motion.forget_node(&node_id);
                if dropped > 0 {
                    debug!("Dropped {} detection sessions of removed node {}", dropped, node_id);
                }
                let draft = removed_draft(&removed);
                self.publish(vec![draft], now, sink);
                true
            }
        }
    }
}

fn person_added_draft(person: &Person) -> EventDraft {
    EventDraft {
        floor: person.floor,
        node_id: person.id.clone(),
        node_kind: NodeKind::Person,
        category: EventCategory::Motion,
        message: format!("New animated person added: \"{}\" with speed \"{}px/sec\"", person.display_name(), person.speed),
    }
}

fn removed_draft(removed: &RemovedNode) -> EventDraft {
    let label = match removed.kind() {
        NodeKind::Sensor => "Sensor",
        NodeKind::Device => "Device",
        NodeKind::Person => "Person",
    };
    EventDraft {
        floor: removed.floor(),
        node_id: removed.id().to_string(),
        node_kind: removed.kind(),
        category: EventCategory::Status,
        message: format!("{} \"{}\" removed", label, removed.display_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{Device, Point, Sensor, SimulationEvent, TravelDirection};

    fn ms(value: u64) -> Instant {
        Instant::from_millis(value)
    }

    fn motion_events(events: &[SimulationEvent]) -> Vec<&SimulationEvent> {
        events.iter().filter(|e| e.category == EventCategory::Motion).collect()
    }

    fn scenario_a() -> FrameCoordinator {
        let sensor = Sensor::new("S1", 1, Point::new(0.0, 0.0), "motion").with_radius(150.0);
        let person = Person::new("P1", 1, vec![Point::new(0.0, 0.0), Point::new(500.0, 0.0)], 150.0);
        FrameCoordinator::new(EntityStore::from_parts(vec![sensor], Vec::new(), vec![person]))
    }

    fn scenario_b() -> FrameCoordinator {
        let sensor = Sensor::new("S2", 1, Point::new(0.0, 0.0), "motion").with_radius(30.0).with_connectivity(["Wi-Fi"]);
        let device = Device::new("D1", 1, Point::new(50.0, 0.0))
            .with_radius(30.0)
            .with_connectivity(["Wi-Fi"])
            .with_compatible_sensors(["motion"]);
        FrameCoordinator::new(EntityStore::from_parts(vec![sensor], vec![device], Vec::new()))
    }

    #[test]
    fn scenario_a_walker_leaves_motion_range_once() {
        let mut coordinator = scenario_a();
        let mut events = Vec::new();

        coordinator.tick(ms(0), false, &mut events);
        assert_eq!(motion_events(&events).len(), 1);
        assert!(coordinator.motion().is_detecting("S1", "P1"));

        let mut last_x = 0.0;
        let mut exit_x = None;
        for step in 1..=34u64 {
            let before = motion_events(&events).len();
            coordinator.tick(ms(step * 100), false, &mut events);
            let x = animator::current_position(coordinator.store().person("P1").unwrap()).unwrap().x;
            if motion_events(&events).len() > before {
                assert!(exit_x.is_none(), "end event fired twice");
                assert!(last_x <= 150.0);
                exit_x = Some(x);
            }
            last_x = x;
        }

        let exit_x = exit_x.expect("exit event never fired");
        assert!(exit_x > 150.0 && exit_x < 170.0);

        let motion = motion_events(&events);
        assert_eq!(motion.len(), 2);
        assert!(motion[1].message.starts_with("Motion ended"));

        let person = coordinator.store().person("P1").unwrap();
        assert_eq!(animator::current_position(person), Some(Point::new(500.0, 0.0)));
        assert_eq!(person.current_segment_index, 1);
        assert_eq!(person.direction, TravelDirection::Backward);
        assert_eq!(person.progress, 0.0);
    }

    #[test]
    fn scenario_b_connect_then_disconnect_once() {
        let mut coordinator = scenario_b();
        let mut events = Vec::new();

        coordinator.tick(ms(0), false, &mut events);
        assert_eq!(coordinator.store().sensor("S2").unwrap().connected_device_ids, vec!["D1".to_string()]);
        assert_eq!(coordinator.store().device("D1").unwrap().connected_sensor_ids, vec!["S2".to_string()]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "S2 connected to D1");

        events.clear();
        let moved = LayoutEdit::MoveNode {
            node_id: "D1".into(),
            position: Point::new(1000.0, 0.0),
        };
        assert!(coordinator.apply_edit(moved, ms(10), &mut events));
        coordinator.resolve_relations(ms(10), &mut events);

        assert!(coordinator.store().sensor("S2").unwrap().connected_device_ids.is_empty());
        assert!(coordinator.store().device("D1").unwrap().connected_sensor_ids.is_empty());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, EventCategory::Connectivity);
        assert_eq!(events[0].message, "S2 disconnected from D1");
    }

    #[test]
    fn scenario_c_interference_is_symmetric() {
        let sensor = Sensor::new("S3", 1, Point::new(0.0, 0.0), "temperature").with_connectivity(["Zigbee"]);
        let device = Device::new("D2", 1, Point::new(100.0, 0.0))
            .with_connectivity(["Zigbee"])
            .with_interference_protocols(["Zigbee"]);
        let mut coordinator = FrameCoordinator::new(EntityStore::from_parts(vec![sensor], vec![device], Vec::new()));
        let mut events = Vec::new();
        coordinator.tick(ms(0), false, &mut events);

        let sensor = coordinator.store().sensor("S3").unwrap();
        let device = coordinator.store().device("D2").unwrap();
        assert_eq!(sensor.interference_ids, vec!["D2".to_string()]);
        assert_eq!(device.interference_ids, vec!["S3".to_string()]);
        assert!(sensor.connected_device_ids.is_empty());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, EventCategory::Interference);
    }

    #[test]
    fn scenario_d_single_waypoint_person_is_ignored() {
        let sensor = Sensor::new("S1", 1, Point::new(0.0, 0.0), "motion");
        let person = Person::new("P1", 1, vec![Point::new(0.0, 0.0)], 100.0);
        let mut coordinator = FrameCoordinator::new(EntityStore::from_parts(vec![sensor], Vec::new(), vec![person]));
        let mut events = Vec::new();
        for step in 0..5 {
            let report = coordinator.tick(ms(step * 16), false, &mut events);
            assert_eq!(report.animated, 0);
        }
        let person = coordinator.store().person("P1").unwrap();
        assert_eq!(person.current_segment_index, 0);
        assert_eq!(person.progress, 0.0);
        assert!(events.is_empty());
    }

    #[test]
    fn truncating_a_detected_walker_ends_its_session() {
        let mut coordinator = scenario_a();
        let mut events = Vec::new();
        coordinator.tick(ms(0), false, &mut events);
        assert!(coordinator.motion().is_detecting("S1", "P1"));

        let truncated = Person::new("P1", 1, vec![Point::new(0.0, 0.0)], 150.0);
        assert!(coordinator.apply_edit(LayoutEdit::UpdatePerson(truncated), ms(50), &mut events));
        for step in 1..=48u64 {
            coordinator.tick(ms(step * 100), false, &mut events);
        }

        let motion = motion_events(&events);
        assert_eq!(motion.len(), 2);
        assert!(motion[1].message.starts_with("Motion ended"));
        assert!(!coordinator.motion().is_detecting("S1", "P1"));
    }

    #[test]
    fn resolving_twice_is_idempotent() {
        let mut coordinator = scenario_b();
        let mut events = Vec::new();
        assert_eq!(coordinator.resolve_relations(ms(0), &mut events), 1);
        let snapshot = coordinator.store().sensors().to_vec();
        assert_eq!(coordinator.resolve_relations(ms(1), &mut events), 0);
        assert_eq!(coordinator.store().sensors(), snapshot.as_slice());
        assert_eq!(coordinator.tick(ms(2), false, &mut events).emitted, 0);
    }

    #[test]
    fn drag_pause_freezes_animation_and_rebases_clock() {
        let mut coordinator = scenario_a();
        let mut events = Vec::new();
        coordinator.tick(ms(0), false, &mut events);
        coordinator.tick(ms(1000), false, &mut events);
        let progress_before = coordinator.store().person("P1").unwrap().progress;
        assert!((progress_before - 0.3).abs() < 1e-9);

        for t in [1100, 2000, 5000] {
            let report = coordinator.tick(ms(t), true, &mut events);
            assert!(report.paused);
            assert_eq!(report.dt, Duration::from_ticks(0));
        }
        assert!(coordinator.is_paused());
        assert_eq!(coordinator.store().person("P1").unwrap().progress, progress_before);

        coordinator.release_drag(ms(6000), &mut events);
        assert!(!coordinator.is_paused());

        // only the 100 ms after the release count, not the 5 s spent dragging
        let report = coordinator.tick(ms(6100), false, &mut events);
        assert_eq!(report.dt, Duration::from_millis(100));
        let progress = coordinator.store().person("P1").unwrap().progress;
        assert!((progress - (progress_before + 0.03)).abs() < 1e-9);
    }

    #[test]
    fn resuming_without_release_still_recomputes_without_a_jump() {
        let mut coordinator = scenario_b();
        let mut events = Vec::new();
        coordinator.tick(ms(0), false, &mut events);
        coordinator.tick(ms(16), true, &mut events);
        let moved = LayoutEdit::MoveNode {
            node_id: "D1".into(),
            position: Point::new(900.0, 0.0),
        };
        assert!(coordinator.apply_edit(moved, ms(20), &mut events));
        events.clear();

        let report = coordinator.tick(ms(5000), false, &mut events);
        assert_eq!(report.dt, Duration::from_ticks(0));
        assert_eq!(report.emitted, 1);
        assert_eq!(events[0].message, "S2 disconnected from D1");
    }

    #[test]
    fn edits_narrate_status_and_drop_sessions() {
        let mut coordinator = scenario_a();
        let mut events = Vec::new();
        coordinator.tick(ms(0), false, &mut events);
        assert!(coordinator.motion().is_detecting("S1", "P1"));

        events.clear();
        assert!(coordinator.apply_edit(LayoutEdit::Remove { node_id: "P1".into() }, ms(5), &mut events));
        assert_eq!(coordinator.motion().active_session_count(), 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, EventCategory::Status);
        assert_eq!(events[0].node_kind, NodeKind::Person);

        let newcomer = Person::new("P2", 1, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)], 100.0).with_name("Alice");
        assert!(coordinator.apply_edit(LayoutEdit::AddPerson(newcomer), ms(6), &mut events));
        assert_eq!(events[1].message, "New animated person added: \"Alice\" with speed \"100px/sec\"");
        assert!(!coordinator.apply_edit(LayoutEdit::Remove { node_id: "nobody".into() }, ms(7), &mut events));
        assert_eq!(events.len(), 2);
        assert!(events[0].id < events[1].id);
    }

    #[test]
    fn deleting_a_device_narrates_the_lost_link_by_id() {
        let mut coordinator = scenario_b();
        let mut events = Vec::new();
        coordinator.tick(ms(0), false, &mut events);
        events.clear();

        coordinator.apply_edit(LayoutEdit::Remove { node_id: "D1".into() }, ms(1), &mut events);
        coordinator.tick(ms(2), false, &mut events);
        let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["Device \"D1\" removed", "S2 disconnected from D1"]);
    }

    #[test]
    fn floors_are_isolated() {
        let sensor = Sensor::new("S", 1, Point::new(0.0, 0.0), "motion").with_connectivity(["Zigbee"]);
        let device = Device::new("D", 2, Point::new(0.0, 0.0))
            .with_connectivity(["Zigbee"])
            .with_compatible_sensors(["motion"])
            .with_interference_protocols(["Zigbee"]);
        let person = Person::new("P", 2, vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)], 1.0);
        let mut coordinator = FrameCoordinator::new(EntityStore::from_parts(vec![sensor], vec![device], vec![person]));
        let mut events = Vec::new();
        coordinator.tick(ms(0), false, &mut events);
        assert!(events.is_empty());
        assert!(coordinator.store().sensor("S").unwrap().connected_device_ids.is_empty());
        assert!(coordinator.store().sensor("S").unwrap().interference_ids.is_empty());
    }
}
