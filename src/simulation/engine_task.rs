//! Engine task driving the frame loop and UI updates.
//!
//! High-level flow each loop iteration:
//! 1) `select` waits for either a UI command or the next frame deadline.
//! 2) Commands (load/save, gestures, edits) are applied between ticks.
//! 3) On the deadline the coordinator ticks; emitted events go to the log
//!    and to the UI, and a snapshot is published when anything changed.
//!
//! While a drag or pan gesture is active the coordinator is ticked in its
//! paused mode, so dragging a node never replays the gesture's duration as
//! one animation jump.

use chrono::{DateTime, TimeDelta, Utc};
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};
use log::{debug, info, warn};
use std::path::Path;

use sensor_layout_simulator::common::SimulatorConfig;
use sensor_layout_simulator::common::layout::{self, LayoutDocument};
use sensor_layout_simulator::engine::animator::current_position;
use sensor_layout_simulator::engine::{EntityStore, EventLog, EventSink, FrameCoordinator, LayoutEdit, SimulationEvent};

use crate::ui::{FrameSnapshot, Gesture, UICommand, UIRefreshState};
use crate::{UICommandQueueReceiver, UIRefreshQueueSender};

/// Engine-side state owned by the task.
pub struct EngineSession {
    coordinator: FrameCoordinator,
    log: EventLog,
    layout_name: String,
    gesture: Option<Gesture>,
    event_log_path: Option<String>,
    /// A snapshot must be published on the next frame even if nothing moved.
    dirty: bool,
}

impl EngineSession {
    /// # Parameters
    ///
    /// * `origin` - Wall-clock time of the engine clock's zero instant
    /// * `event_log_path` - File the event log is restored from and saved to
    pub fn new(origin: DateTime<Utc>, event_log_path: Option<String>) -> Self {
        Self {
            coordinator: FrameCoordinator::new(EntityStore::new()).with_wall_clock_origin(origin),
            log: EventLog::new(),
            layout_name: String::new(),
            gesture: None,
            event_log_path,
            dirty: true,
        }
    }

    pub fn load(&mut self, path: &str) -> Vec<UIRefreshState> {
        let document = match layout::load_layout(path) {
            Ok(document) => document,
            Err(err) => return vec![UIRefreshState::Alert(format!("Error loading layout: {}", err))],
        };

        self.layout_name = if document.name.is_empty() {
            Path::new(path).file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
        } else {
            document.name.clone()
        };
        self.coordinator.replace_store(document.into_store());
        self.gesture = None;
        self.dirty = true;

        self.log = match &self.event_log_path {
            Some(log_path) => layout::load_event_log(log_path).unwrap_or_else(|err| {
                warn!("Ignoring event log {}: {}", log_path, err);
                EventLog::new()
            }),
            None => EventLog::new(),
        };
        if let Some(last_id) = self.log.last_id() {
            self.coordinator.resume_event_ids_after(last_id);
        }

        vec![
            UIRefreshState::LayoutLoaded {
                name: self.layout_name.clone(),
                path: path.to_string(),
            },
            UIRefreshState::EventLogReplaced(self.log.events().to_vec()),
        ]
    }

    pub fn save(&self, path: &str) -> Vec<UIRefreshState> {
        let document = LayoutDocument::from_store(self.layout_name.clone(), self.coordinator.store());
        if let Err(err) = layout::save_layout(path, &document) {
            return vec![UIRefreshState::Alert(format!("Error saving layout: {}", err))];
        }
        if let Some(log_path) = &self.event_log_path {
            if let Err(err) = layout::save_event_log(log_path, &self.log) {
                return vec![UIRefreshState::Alert(format!("Error saving event log: {}", err))];
            }
        }
        vec![UIRefreshState::LayoutSaved(path.to_string())]
    }

    pub fn handle_command(&mut self, command: UICommand, now: Instant) -> Vec<UIRefreshState> {
        let mut emitted: Vec<SimulationEvent> = Vec::new();
        let mut messages = Vec::new();

        match command {
            UICommand::LoadLayout(path) => messages.extend(self.load(&path)),
            UICommand::SaveLayout(path) => messages.extend(self.save(&path)),
            UICommand::GestureStarted(gesture) => {
                debug!("Gesture started: {:?}", gesture);
                self.gesture = Some(gesture);
                self.dirty = true;
            }
            UICommand::MoveNode { node_id, position } => {
                if !matches!(&self.gesture, Some(Gesture::DragNode(dragged)) if *dragged == node_id) {
                    debug!("Move of {} outside a drag gesture", node_id);
                }
                if self.coordinator.apply_edit(LayoutEdit::MoveNode { node_id, position }, now, &mut emitted) {
                    self.dirty = true;
                }
            }
            UICommand::GestureEnded => {
                if self.gesture.take().is_some() {
                    self.coordinator.release_drag(now, &mut emitted);
                    self.dirty = true;
                }
            }
            UICommand::RemoveNode(node_id) => {
                if self.coordinator.apply_edit(LayoutEdit::Remove { node_id }, now, &mut emitted) {
                    self.dirty = true;
                }
            }
        }

        messages.extend(self.record(emitted));
        messages
    }

    /// Run one frame of the engine.
    pub fn frame(&mut self, now: Instant) -> Vec<UIRefreshState> {
        let mut emitted: Vec<SimulationEvent> = Vec::new();
        let report = self.coordinator.tick(now, self.gesture.is_some(), &mut emitted);

        let mut messages: Vec<UIRefreshState> = self.record(emitted).into_iter().collect();
        if self.dirty || report.animated > 0 || report.emitted > 0 {
            self.dirty = false;
            messages.push(UIRefreshState::FrameUpdated(self.snapshot()));
        }
        messages
    }

    fn record(&mut self, emitted: Vec<SimulationEvent>) -> Option<UIRefreshState> {
        if emitted.is_empty() {
            return None;
        }
        for event in &emitted {
            self.log.append(event.clone());
        }
        Some(UIRefreshState::EventsEmitted(emitted))
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        let store = self.coordinator.store();
        let motion = self.coordinator.motion();
        FrameSnapshot {
            store: store.clone(),
            person_positions: store
                .persons()
                .iter()
                .filter_map(|p| current_position(p).map(|position| (p.id.clone(), position)))
                .collect(),
            detecting_sensors: store
                .sensors()
                .iter()
                .filter(|s| !motion.persons_seen_by(&s.id).is_empty())
                .map(|s| s.id.clone())
                .collect(),
            paused: self.coordinator.is_paused(),
            tick: self.coordinator.tick_count(),
        }
    }
}

async fn publish(ui_refresh_tx: &UIRefreshQueueSender, messages: Vec<UIRefreshState>) {
    for message in messages {
        match message {
            // Snapshots are superseded by the next one, so a full queue just drops it
            UIRefreshState::FrameUpdated(_) => {
                if ui_refresh_tx.try_send(message).is_err() {
                    warn!("UI queue full, frame snapshot dropped");
                }
            }
            other => ui_refresh_tx.send(other).await,
        }
    }
}

/// Engine task: owns the session and runs the frame loop.
///
/// # Parameters
///
/// * `ui_refresh_tx` - Channel for snapshots, events and alerts to the UI
/// * `ui_command_rx` - Channel for commands from the UI
/// * `config` - Runtime configuration (frame interval, startup layout)
#[embassy_executor::task]
pub async fn engine_task(ui_refresh_tx: UIRefreshQueueSender, ui_command_rx: UICommandQueueReceiver, config: SimulatorConfig) {
    let since_start = TimeDelta::try_milliseconds(Instant::now().as_millis() as i64).unwrap_or(TimeDelta::zero());
    let mut session = EngineSession::new(Utc::now() - since_start, config.event_log_path.clone());
    let frame_interval = Duration::from_millis(config.frame_interval_ms);

    if let Some(path) = &config.layout_path {
        let messages = session.load(path);
        publish(&ui_refresh_tx, messages).await;
    }

    info!("Engine task running, frame interval {} ms", config.frame_interval_ms);
    let mut next_frame = Instant::now();

    loop {
        match select(ui_command_rx.receive(), Timer::at(next_frame)).await {
            Either::First(command) => {
                let messages = session.handle_command(command, Instant::now());
                publish(&ui_refresh_tx, messages).await;
            }
            Either::Second(()) => {
                let now = Instant::now();
                let messages = session.frame(now);
                publish(&ui_refresh_tx, messages).await;

                next_frame += frame_interval;
                if next_frame < now {
                    // Fell behind: skip the missed frames instead of bursting
                    next_frame = now + frame_interval;
                }
            }
        }
    }
}
