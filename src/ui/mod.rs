// UI module for the Sensor Layout Simulator
//
// This module organizes the UI into separate components:
// - `top_panel`: Layout file controls, floor selector and counters
// - `right_panel`: Node inspector, search and the floor event log
// - `map`: Central floor plan with nodes, links and walkers
// - `app_state`: Application state management and main update loop

pub mod app_state;
pub mod map;
pub mod right_panel;
pub mod top_panel;

use std::collections::{HashMap, HashSet};

use sensor_layout_simulator::engine::{EntityStore, NodeId, Point, SimulationEvent};

pub use app_state::AppState;

/// Everything the viewer needs to draw one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshot {
    pub store: EntityStore,
    /// Interpolated position of every non-degenerate person.
    pub person_positions: HashMap<NodeId, Point>,
    /// Motion sensors that currently see at least one person.
    pub detecting_sensors: HashSet<NodeId>,
    pub paused: bool,
    pub tick: u64,
}

#[derive(Debug)]
pub enum UIRefreshState {
    Alert(String),
    LayoutLoaded { name: String, path: String },
    LayoutSaved(String),
    FrameUpdated(FrameSnapshot),
    EventsEmitted(Vec<SimulationEvent>),
    /// Full event log after a layout load.
    EventLogReplaced(Vec<SimulationEvent>),
}

/// Pointer gesture that freezes the simulation while active.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    DragNode(NodeId),
    Pan,
}

pub enum UICommand {
    LoadLayout(String),
    SaveLayout(String),
    GestureStarted(Gesture),
    MoveNode { node_id: NodeId, position: Point },
    GestureEnded,
    RemoveNode(NodeId),
}
