//! Spatial relationship and motion detection engine.
//!
//! Holds the floor-plan entities (sensors, devices, animated persons) and
//! recomputes, once per tick, which pairs are connected, which interfere,
//! and which motion sensors currently see a person. Changes are reported as
//! timestamped [`SimulationEvent`]s through an [`EventSink`].
//!
//! ## Module Organization
//!
//! - `types`: Entities, ids and the event record
//! - `geometry`: Range predicates and default radii
//! - `store`: Entity store and the edit command set
//! - `connectivity`: Sensor/device connection graph
//! - `interference`: Protocol collision graph (excludes connected pairs)
//! - `animator`: Ping-pong path following for persons
//! - `motion`: Detection sessions and enter/leave transitions
//! - `events`: Relationship diffing, event log and stamping
//! - `frame`: Per-tick orchestration, drag pause and edits
//!
//! The engine is single-threaded and synchronous. Callers drive it by
//! calling [`FrameCoordinator::tick`] with the current engine clock.

pub mod animator;
pub mod connectivity;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod interference;
pub mod motion;
pub mod store;
pub mod types;

pub use events::{EventLog, EventSink};
pub use frame::{FrameCoordinator, TickReport};
pub use store::{ConnectionSummary, EntityStore, LayoutEdit, SearchHit};
pub use types::{Device, EventCategory, NodeId, NodeKind, Person, Point, Sensor, SimulationEvent, TravelDirection};
