//! # Application State Management
//!
//! This module implements the central `AppState` struct which holds all UI
//! state and coordinates rendering of the panels. It implements the
//! `eframe::App` trait to integrate with the egui application framework.
//!
//! ## Responsibilities
//!
//! - Processes snapshots, events and alerts from the engine via `ui_refresh_rx`
//! - Sends user commands (load/save, gestures, edits) via `ui_command_tx`
//! - Keeps the viewer-only state: current floor, selection, pan and zoom
//! - Persists user settings (last directory, panel width) across sessions

use eframe::egui;
use egui::Color32;
use embassy_sync::channel::TrySendError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use sensor_layout_simulator::engine::{EventCategory, EventLog, EventSink, NodeId, Person, Point};

use super::{FrameSnapshot, Gesture, UICommand, UIRefreshState};

/// Colors cycled through for persons without an explicit color.
const PERSON_PALETTE: [Color32; 5] = [
    Color32::from_rgb(255, 20, 147),
    Color32::from_rgb(255, 165, 0),
    Color32::from_rgb(50, 205, 50),
    Color32::from_rgb(186, 85, 211),
    Color32::from_rgb(255, 215, 0),
];

/// Central application state for the viewer.
pub struct AppState {
    /// Optional alert message to display in a modal dialog.
    pub alert: Option<String>,
    /// One-line status shown in the top panel (e.g. after saving).
    pub status: Option<String>,
    /// Receiver for UI refresh messages from the engine.
    pub ui_refresh_rx: crate::UIRefreshQueueReceiver,
    /// Sender for commands from the UI to the engine.
    pub ui_command_tx: crate::UICommandQueueSender,

    pub layout_name: Option<String>,
    pub layout_path: Option<String>,
    /// Latest engine state.
    pub snapshot: FrameSnapshot,
    /// Every event received since the layout was loaded.
    pub events: EventLog,

    // Map view state
    pub current_floor: i32,
    pub selected: Option<NodeId>,
    /// Gesture in progress on the map, mirrored to the engine.
    pub gesture: Option<Gesture>,
    /// Gesture commands not yet accepted by the engine queue, oldest first.
    /// Retried every frame; only the latest move is kept.
    pub gesture_outbox: VecDeque<UICommand>,
    /// Screen offset of the plan origin, in pixels.
    pub pan: egui::Vec2,
    /// Pixels per plan unit.
    pub zoom: f32,
    pub show_labels: bool,

    // Inspector state
    pub search_query: String,
    pub right_panel_width: f32,

    /// Last directory used for the layout file pickers.
    pub last_open_dir: Option<String>,
}

/// Settings persisted across application sessions.
#[derive(Default, Serialize, Deserialize)]
struct PersistedSettings {
    last_open_dir: Option<String>,
    right_panel_width: Option<f32>,
    show_labels: Option<bool>,
}

impl AppState {
    /// Create a new AppState, loading persisted settings if available.
    ///
    /// # Parameters
    ///
    /// * `rx` - Receiver for UI refresh messages from the engine
    /// * `tx` - Sender for commands to the engine
    /// * `storage` - Optional persistent storage for loading saved settings
    pub fn new(rx: crate::UIRefreshQueueReceiver, tx: crate::UICommandQueueSender, storage: Option<&dyn eframe::Storage>) -> Self {
        let persisted: PersistedSettings = storage.and_then(|s| eframe::get_value(s, "app_settings")).unwrap_or_default();

        Self {
            alert: None,
            status: None,
            ui_refresh_rx: rx,
            ui_command_tx: tx,
            layout_name: None,
            layout_path: None,
            snapshot: FrameSnapshot::default(),
            events: EventLog::new(),
            current_floor: 1,
            selected: None,
            gesture: None,
            gesture_outbox: VecDeque::new(),
            pan: egui::vec2(40.0, 40.0),
            zoom: 1.0,
            show_labels: persisted.show_labels.unwrap_or(true),
            search_query: String::new(),
            right_panel_width: persisted.right_panel_width.unwrap_or(420.0),
            last_open_dir: persisted.last_open_dir,
        }
    }

    fn layout_dialog(&self) -> rfd::FileDialog {
        let mut dialog = rfd::FileDialog::new().add_filter("Layout files", &["json"]);
        if let Some(dir) = &self.last_open_dir {
            dialog = dialog.set_directory(dir);
        }
        dialog
    }

    fn remember_dir(&mut self, file: &std::path::Path) {
        if let Some(parent) = file.parent() {
            self.last_open_dir = Some(parent.to_string_lossy().to_string());
        }
    }

    /// Pick a layout file and ask the engine to load it.
    pub fn open_layout_picker(&mut self) {
        let Some(file) = self.layout_dialog().pick_file() else {
            return;
        };
        self.remember_dir(&file);
        let path = file.to_string_lossy().to_string();
        if self.ui_command_tx.try_send(UICommand::LoadLayout(path)).is_err() {
            self.alert = Some("Engine is busy, try again".to_string());
        }
    }

    /// Pick a destination and ask the engine to save the current layout.
    pub fn save_layout_picker(&mut self) {
        let mut dialog = self.layout_dialog();
        if let Some(name) = &self.layout_path {
            if let Some(file_name) = std::path::Path::new(name).file_name() {
                dialog = dialog.set_file_name(file_name.to_string_lossy());
            }
        }
        let Some(file) = dialog.save_file() else {
            return;
        };
        self.remember_dir(&file);
        let path = file.to_string_lossy().to_string();
        if self.ui_command_tx.try_send(UICommand::SaveLayout(path)).is_err() {
            self.alert = Some("Engine is busy, try again".to_string());
        }
    }

    pub fn start_gesture(&mut self, gesture: Gesture) {
        self.send_gesture_command(UICommand::GestureStarted(gesture.clone()));
        self.gesture = Some(gesture);
    }

    /// Move the dragged node. A move still waiting in the outbox is replaced.
    pub fn move_dragged_node(&mut self, node_id: NodeId, position: Point) {
        self.send_gesture_command(UICommand::MoveNode { node_id, position });
    }

    /// End the current gesture. The engine stays frozen until it sees this.
    pub fn end_gesture(&mut self) {
        if self.gesture.take().is_some() {
            self.send_gesture_command(UICommand::GestureEnded);
        }
    }

    fn send_gesture_command(&mut self, command: UICommand) {
        if matches!(command, UICommand::MoveNode { .. }) && matches!(self.gesture_outbox.back(), Some(UICommand::MoveNode { .. })) {
            self.gesture_outbox.pop_back();
        }
        self.gesture_outbox.push_back(command);
        self.flush_gesture_commands();
    }

    /// Push queued gesture commands to the engine in order, stopping at the
    /// first one the full queue rejects.
    pub fn flush_gesture_commands(&mut self) {
        while let Some(command) = self.gesture_outbox.pop_front() {
            if let Err(TrySendError::Full(command)) = self.ui_command_tx.try_send(command) {
                log::debug!("Command queue full, {} gesture commands deferred", self.gesture_outbox.len() + 1);
                self.gesture_outbox.push_front(command);
                break;
            }
        }
    }

    /// Floors present in the layout, always including the current one.
    pub fn floors(&self) -> Vec<i32> {
        let mut floors = self.snapshot.store.floors();
        if !floors.contains(&self.current_floor) {
            floors.push(self.current_floor);
            floors.sort_unstable();
        }
        floors
    }

    pub fn select_floor(&mut self, floor: i32) {
        if floor != self.current_floor {
            self.current_floor = floor;
            self.selected = None;
        }
    }

    /// Fold one engine message into the UI state.
    pub fn apply_refresh(&mut self, message: UIRefreshState) {
        match message {
            UIRefreshState::Alert(alert) => {
                self.alert = Some(alert);
            }
            UIRefreshState::LayoutLoaded { name, path } => {
                log::info!("Viewer showing layout {:?}", name);
                self.status = Some(format!("Loaded {}", path));
                self.layout_name = Some(name);
                self.layout_path = Some(path);
                self.selected = None;
                self.gesture = None;
                self.pan = egui::vec2(40.0, 40.0);
            }
            UIRefreshState::LayoutSaved(path) => {
                self.status = Some(format!("Saved {}", path));
            }
            UIRefreshState::FrameUpdated(snapshot) => {
                self.snapshot = snapshot;
                let floors = self.snapshot.store.floors();
                if !floors.is_empty() && !floors.contains(&self.current_floor) {
                    self.current_floor = floors[0];
                }
                if let Some(id) = &self.selected {
                    if self.snapshot.store.node_kind(id).is_none() {
                        self.selected = None;
                    }
                }
            }
            UIRefreshState::EventsEmitted(events) => {
                for event in events {
                    self.events.append(event);
                }
            }
            UIRefreshState::EventLogReplaced(events) => {
                self.events = EventLog::from_events(events);
            }
        }
    }
}

/// Parse a `#RRGGBB` color string.
pub fn parse_hex_color(value: &str) -> Option<Color32> {
    let hex = value.trim().strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| hex.get(range).and_then(|c| u8::from_str_radix(c, 16).ok());
    Some(Color32::from_rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Color a person is drawn with: its own color, or a palette entry picked by index.
pub fn color_for_person(person: &Person, index: usize) -> Color32 {
    person
        .color
        .as_deref()
        .and_then(parse_hex_color)
        .unwrap_or(PERSON_PALETTE[index % PERSON_PALETTE.len()])
}

/// Map an event category to the color used in the event log.
pub fn color_for_category(category: EventCategory) -> Color32 {
    match category {
        EventCategory::Connectivity => Color32::from_rgb(80, 160, 255),
        EventCategory::Interference => Color32::from_rgb(255, 90, 90),
        EventCategory::Motion => Color32::from_rgb(255, 200, 60),
        EventCategory::Status => Color32::from_rgb(180, 180, 180),
    }
}

impl eframe::App for AppState {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedSettings {
            last_open_dir: self.last_open_dir.clone(),
            right_panel_width: Some(self.right_panel_width),
            show_labels: Some(self.show_labels),
        };
        eframe::set_value(storage, "app_settings", &settings);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Repaint periodically so walkers move without input
        ctx.request_repaint_after(std::time::Duration::from_millis(20));

        while let Ok(message) = self.ui_refresh_rx.try_receive() {
            self.apply_refresh(message);
        }
        if !self.gesture_outbox.is_empty() {
            self.flush_gesture_commands();
        }

        if let Some(alert) = self.alert.clone() {
            egui::Window::new("Alert")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(20.0);
                        ui.label(alert);
                        ui.add_space(20.0);

                        if ui.button("OK").clicked() {
                            self.alert = None;
                        }
                        ui.add_space(10.0);
                    });
                });
        }

        // Panels layout: top (fixed), right (resizable), map fills the remaining using CentralPanel
        super::top_panel::render(ctx, self);
        super::right_panel::render(ctx, self);
        super::map::render(ctx, self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{UICommandQueue, UIRefreshQueue};

    fn app_with_queues() -> (AppState, &'static UICommandQueue) {
        let refresh: &'static UIRefreshQueue = Box::leak(Box::new(UIRefreshQueue::new()));
        let commands: &'static UICommandQueue = Box::leak(Box::new(UICommandQueue::new()));
        (AppState::new(refresh.receiver(), commands.sender(), None), commands)
    }

    #[test]
    fn gesture_commands_survive_a_full_queue() {
        let (mut state, commands) = app_with_queues();
        while commands.try_send(UICommand::RemoveNode("filler".into())).is_ok() {}

        state.start_gesture(Gesture::DragNode("d1".into()));
        state.move_dragged_node("d1".into(), Point::new(10.0, 0.0));
        state.move_dragged_node("d1".into(), Point::new(20.0, 0.0));
        state.end_gesture();
        // start, latest move, end
        assert_eq!(state.gesture_outbox.len(), 3);

        while commands.try_receive().is_ok() {}
        state.flush_gesture_commands();
        assert!(state.gesture_outbox.is_empty());

        assert!(matches!(commands.try_receive(), Ok(UICommand::GestureStarted(Gesture::DragNode(ref id))) if id == "d1"));
        assert!(matches!(
            commands.try_receive(),
            Ok(UICommand::MoveNode { ref node_id, position }) if node_id == "d1" && position == Point::new(20.0, 0.0)
        ));
        assert!(matches!(commands.try_receive(), Ok(UICommand::GestureEnded)));
        assert!(commands.try_receive().is_err());
    }

    #[test]
    fn gesture_commands_go_straight_through_when_queue_has_room() {
        let (mut state, commands) = app_with_queues();
        state.start_gesture(Gesture::Pan);
        state.end_gesture();
        assert!(state.gesture_outbox.is_empty());
        assert!(matches!(commands.try_receive(), Ok(UICommand::GestureStarted(Gesture::Pan))));
        assert!(matches!(commands.try_receive(), Ok(UICommand::GestureEnded)));
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#FF1493"), Some(Color32::from_rgb(255, 20, 147)));
        assert_eq!(parse_hex_color(" #00ff00 "), Some(Color32::from_rgb(0, 255, 0)));
        assert_eq!(parse_hex_color("FF1493"), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
    }

    #[test]
    fn persons_without_color_use_palette() {
        let mut person = Person::new("p1", 1, vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)], 10.0);
        assert_eq!(color_for_person(&person, 6), PERSON_PALETTE[1]);
        person.color = Some("#000080".into());
        assert_eq!(color_for_person(&person, 6), Color32::from_rgb(0, 0, 128));
    }
}
