//! Motion and presence detection with session tracking.
//!
//! Every motion/presence sensor is tested against the interpolated position
//! of every person on the same floor. A [`DetectionSession`] exists for a
//! `(sensor, person)` pair exactly while the person stays inside the
//! sensor's radius, so only the enter and leave transitions produce changes;
//! a person lingering inside a sensor's range is reported once.
//!
//! The session table is owned by the detector and survives across ticks. It
//! is pruned when a sensor or person is removed, and starts empty after a
//! layout is loaded.

use std::collections::HashMap;

use embassy_time::{Duration, Instant};
use log::{debug, info};

use super::animator::current_position;
use super::geometry::point_in_circle;
use super::types::{NodeId, Person, Sensor};

/// Composite key of a detection session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub sensor_id: NodeId,
    pub person_id: NodeId,
}

impl SessionKey {
    pub fn new(sensor_id: &str, person_id: &str) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            person_id: person_id.to_string(),
        }
    }
}

/// Live record that a sensor currently sees a person.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSession {
    pub sensor_id: NodeId,
    pub person_id: NodeId,
    pub started_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionTransition {
    Started,
    /// Carries how long the session lasted.
    Ended(Duration),
}

/// A detection transition observed during one detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionChange {
    pub sensor_id: NodeId,
    pub person_id: NodeId,
    /// Floor of the sensor that observed the change.
    pub floor: i32,
    pub transition: MotionTransition,
}

#[derive(Debug, Default)]
pub struct MotionDetector {
    sessions: HashMap<SessionKey, DetectionSession>,
}

impl MotionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_detecting(&self, sensor_id: &str, person_id: &str) -> bool {
        self.sessions.contains_key(&SessionKey::new(sensor_id, person_id))
    }

    pub fn session(&self, sensor_id: &str, person_id: &str) -> Option<&DetectionSession> {
        self.sessions.get(&SessionKey::new(sensor_id, person_id))
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Person ids currently seen by `sensor_id`.
    pub fn persons_seen_by(&self, sensor_id: &str) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .sessions
            .values()
            .filter(|s| s.sensor_id == sensor_id)
            .map(|s| s.person_id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Drop every session referencing `node_id` (sensor or person).
    ///
    /// Returns the number of sessions removed. No change is reported for
    /// them; the entity is gone.
    pub fn forget_node(&mut self, node_id: &str) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|key, _| key.sensor_id != node_id && key.person_id != node_id);
        before - self.sessions.len()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Run one detection pass against the current person positions.
    ///
    /// Sensors and persons are visited in slice order, so the returned
    /// changes are deterministic. A degenerate person has no position and
    /// counts as outside every sensor, so an open session for it ends.
    pub fn detect(&mut self, sensors: &[Sensor], persons: &[Person], now: Instant) -> Vec<MotionChange> {
        let mut changes = Vec::new();

        for sensor in sensors.iter().filter(|s| s.is_motion_sensor()) {
            let radius = sensor.effective_radius();
            for person in persons {
                let inside = sensor.floor == person.floor
                    && current_position(person).is_some_and(|position| point_in_circle(&position, &sensor.position, radius));
                let key = SessionKey::new(&sensor.id, &person.id);

                match (inside, self.sessions.contains_key(&key)) {
                    (true, false) => {
                        info!("[MOTION START] sensor {} sees person {}", sensor.id, person.id);
                        self.sessions.insert(
                            key,
                            DetectionSession {
                                sensor_id: sensor.id.clone(),
                                person_id: person.id.clone(),
                                started_at: now,
                            },
                        );
                        changes.push(MotionChange {
                            sensor_id: sensor.id.clone(),
                            person_id: person.id.clone(),
                            floor: sensor.floor,
                            transition: MotionTransition::Started,
                        });
                    }
                    (false, true) => {
                        let lasted = self
                            .sessions
                            .remove(&key)
                            .and_then(|s| now.checked_duration_since(s.started_at))
                            .unwrap_or(Duration::from_ticks(0));
                        info!("[MOTION END] sensor {} lost person {} after {} ms", sensor.id, person.id, lasted.as_millis());
                        changes.push(MotionChange {
                            sensor_id: sensor.id.clone(),
                            person_id: person.id.clone(),
                            floor: sensor.floor,
                            transition: MotionTransition::Ended(lasted),
                        });
                    }
                    _ => {}
                }
            }
        }

        self.discard_stale_sessions(sensors, persons);
        changes
    }

    /// Remove sessions whose sensor stopped being a motion sensor or whose
    /// sensor/person no longer exists.
    fn discard_stale_sessions(&mut self, sensors: &[Sensor], persons: &[Person]) {
        let before = self.sessions.len();
        self.sessions.retain(|key, _| {
            sensors.iter().any(|s| s.id == key.sensor_id && s.is_motion_sensor()) && persons.iter().any(|p| p.id == key.person_id)
        });
        let dropped = before - self.sessions.len();
        if dropped > 0 {
            debug!("Discarded {} stale detection sessions", dropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::Point;

    fn motion_sensor() -> Sensor {
        Sensor::new("s1", 1, Point::new(0.0, 0.0), "motion").with_radius(150.0)
    }

    fn person_at(x: f64) -> Person {
        Person::new("p1", 1, vec![Point::new(x, 0.0), Point::new(x + 1000.0, 0.0)], 100.0)
    }

    #[test]
    fn reports_enter_once_and_leave_once() {
        let mut detector = MotionDetector::new();
        let sensors = vec![motion_sensor()];

        let changes = detector.detect(&sensors, &[person_at(10.0)], Instant::from_millis(0));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].transition, MotionTransition::Started);
        assert!(detector.is_detecting("s1", "p1"));

        // still inside: no flapping
        assert!(detector.detect(&sensors, &[person_at(100.0)], Instant::from_millis(500)).is_empty());
        assert!(detector.detect(&sensors, &[person_at(150.0)], Instant::from_millis(900)).is_empty());

        let changes = detector.detect(&sensors, &[person_at(151.0)], Instant::from_millis(1500));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].transition, MotionTransition::Ended(Duration::from_millis(1500)));
        assert!(!detector.is_detecting("s1", "p1"));
        assert!(detector.detect(&sensors, &[person_at(400.0)], Instant::from_millis(2000)).is_empty());
    }

    #[test]
    fn only_motion_and_presence_sensors_detect() {
        let mut detector = MotionDetector::new();
        let sensors = vec![
            Sensor::new("temp", 1, Point::new(0.0, 0.0), "temperature"),
            Sensor::new("pres", 1, Point::new(0.0, 0.0), "presence"),
        ];
        let changes = detector.detect(&sensors, &[person_at(0.0)], Instant::from_millis(0));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].sensor_id, "pres");
    }

    #[test]
    fn other_floors_are_never_detected() {
        let mut detector = MotionDetector::new();
        let mut person = person_at(0.0);
        person.floor = 2;
        assert!(detector.detect(&[motion_sensor()], &[person.clone()], Instant::from_millis(0)).is_empty());

        // moving to another floor ends an open session
        person.floor = 1;
        assert_eq!(detector.detect(&[motion_sensor()], &[person.clone()], Instant::from_millis(10)).len(), 1);
        person.floor = 3;
        let changes = detector.detect(&[motion_sensor()], &[person], Instant::from_millis(20));
        assert!(matches!(changes[0].transition, MotionTransition::Ended(_)));
    }

    #[test]
    fn degenerate_person_does_not_crash_or_detect() {
        let mut detector = MotionDetector::new();
        let stuck = Person::new("p1", 1, vec![Point::new(0.0, 0.0)], 100.0);
        assert!(detector.detect(&[motion_sensor()], &[stuck], Instant::from_millis(0)).is_empty());
        assert_eq!(detector.active_session_count(), 0);
    }

    #[test]
    fn person_losing_its_path_ends_detection() {
        let mut detector = MotionDetector::new();
        let sensors = vec![motion_sensor()];
        assert_eq!(detector.detect(&sensors, &[person_at(0.0)], Instant::from_millis(0)).len(), 1);

        let stuck = Person::new("p1", 1, vec![Point::new(0.0, 0.0)], 100.0);
        let changes = detector.detect(&sensors, std::slice::from_ref(&stuck), Instant::from_millis(700));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].transition, MotionTransition::Ended(Duration::from_millis(700)));
        assert!(!detector.is_detecting("s1", "p1"));
        assert!(detector.persons_seen_by("s1").is_empty());

        // stays quiet afterwards
        assert!(detector.detect(&sensors, &[stuck], Instant::from_millis(5000)).is_empty());
    }

    #[test]
    fn sessions_are_pruned_with_their_nodes() {
        let mut detector = MotionDetector::new();
        let sensors = vec![motion_sensor()];
        detector.detect(&sensors, &[person_at(0.0)], Instant::from_millis(0));
        assert_eq!(detector.persons_seen_by("s1"), vec!["p1"]);
        assert_eq!(detector.forget_node("p1"), 1);
        assert_eq!(detector.active_session_count(), 0);

        detector.detect(&sensors, &[person_at(0.0)], Instant::from_millis(10));
        // sensor retyped to a non-motion type: session silently discarded
        let retyped = vec![Sensor { sensor_type: "humidity".into(), ..motion_sensor() }];
        assert!(detector.detect(&retyped, &[person_at(0.0)], Instant::from_millis(20)).is_empty());
        assert_eq!(detector.active_session_count(), 0);
    }
}
