//! # Central Floor Plan
//!
//! This module renders the current floor of the layout:
//! - A grid every 100 plan units
//! - Sensors as circles with their detection radius ring; motion sensors
//!   light up while they see a person
//! - Devices as squares with their footprint ring
//! - Connection lines (blue) and interference lines (dashed red)
//! - Persons as small squares with their dotted walking path
//!
//! ## Coordinate Mapping
//!
//! Plan units map to screen pixels as `rect.min + pan + p * zoom`. Scrolling
//! over the map zooms around the pointer.
//!
//! ## Gestures
//!
//! Dragging a sensor or device moves it; dragging empty space pans. Both
//! freeze the simulation until the pointer is released (see
//! `UICommand::GestureStarted`). Clicking selects the nearest node.

use eframe::egui;
use egui::Color32;

use sensor_layout_simulator::engine::{NodeId, Point};

use crate::ui::app_state::color_for_person;
use crate::ui::{AppState, Gesture};

/// Pick distance around a node marker, in pixels.
const PICK_RADIUS: f32 = 12.0;
const GRID_SPACING: f32 = 100.0;

const CONNECTION_COLOR: Color32 = Color32::from_rgb(60, 140, 255);
const INTERFERENCE_COLOR: Color32 = Color32::from_rgb(255, 70, 70);
const SENSOR_COLOR: Color32 = Color32::from_rgb(40, 200, 160);
const SENSOR_ACTIVE_COLOR: Color32 = Color32::from_rgb(255, 220, 0);
const DEVICE_COLOR: Color32 = Color32::from_rgb(255, 150, 40);

fn to_screen(rect: egui::Rect, state: &AppState, p: &Point) -> egui::Pos2 {
    rect.min + state.pan + egui::vec2(p.x as f32, p.y as f32) * state.zoom
}

fn to_world(rect: egui::Rect, state: &AppState, pos: egui::Pos2) -> Point {
    let v = (pos - rect.min - state.pan) / state.zoom;
    Point::new(v.x as f64, v.y as f64)
}

/// Render the central map panel.
///
/// # Parameters
///
/// * `ctx` - egui context for rendering
/// * `state` - Mutable application state for selection, gestures and view
pub fn render(ctx: &egui::Context, state: &mut AppState) {
    egui::CentralPanel::default().show(ctx, |ui| {
        let rect = ui.available_rect_before_wrap();
        let response = ui.interact(rect, egui::Id::new("map_canvas"), egui::Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        painter.rect_filled(rect, 4.0, ui.visuals().extreme_bg_color);
        draw_grid(&painter, rect, state);

        if state.layout_name.is_none() {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Open a layout to start",
                egui::FontId::proportional(18.0),
                ui.visuals().weak_text_color(),
            );
        }

        // Links first so markers appear on top
        draw_links(&painter, rect, state);
        draw_devices(&painter, rect, state);
        draw_sensors(&painter, rect, state);
        draw_persons(&painter, rect, state);

        handle_zoom(ui, &response, rect, state);
        handle_gestures(&response, rect, state);
        handle_selection(&response, rect, state);
    });
}

fn draw_grid(painter: &egui::Painter, rect: egui::Rect, state: &AppState) {
    let stroke = egui::Stroke::new(1.0, Color32::from_rgb(0, 0, 70));
    let step = GRID_SPACING * state.zoom;
    if step < 8.0 {
        return;
    }
    let origin = rect.min + state.pan;

    let mut x = origin.x - ((origin.x - rect.left()) / step).floor() * step;
    while x <= rect.right() {
        painter.line_segment([egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())], stroke);
        x += step;
    }
    let mut y = origin.y - ((origin.y - rect.top()) / step).floor() * step;
    while y <= rect.bottom() {
        painter.line_segment([egui::pos2(rect.left(), y), egui::pos2(rect.right(), y)], stroke);
        y += step;
    }
}

/// Connection and interference lines of the current floor, drawn from the
/// sensor side so every pair is drawn once.
fn draw_links(painter: &egui::Painter, rect: egui::Rect, state: &AppState) {
    let store = &state.snapshot.store;
    for sensor in store.sensors().iter().filter(|s| s.floor == state.current_floor) {
        let from = to_screen(rect, state, &sensor.position);
        for device in sensor.connected_device_ids.iter().filter_map(|id| store.device(id)) {
            if device.floor != sensor.floor {
                continue;
            }
            let to = to_screen(rect, state, &device.position);
            painter.line_segment([from, to], egui::Stroke::new(2.0, CONNECTION_COLOR));
        }
        for device in sensor.interference_ids.iter().filter_map(|id| store.device(id)) {
            if device.floor != sensor.floor {
                continue;
            }
            let to = to_screen(rect, state, &device.position);
            painter.extend(egui::Shape::dashed_line(&[from, to], egui::Stroke::new(1.5, INTERFERENCE_COLOR), 6.0, 4.0));
        }
    }
}

fn draw_label(painter: &egui::Painter, pos: egui::Pos2, text: &str, color: Color32) {
    painter.text(
        egui::pos2(pos.x + 8.0, pos.y - 8.0),
        egui::Align2::LEFT_BOTTOM,
        text,
        egui::FontId::proportional(12.0),
        color,
    );
}

fn draw_selection(painter: &egui::Painter, pos: egui::Pos2) {
    painter.circle_stroke(pos, PICK_RADIUS, egui::Stroke::new(2.0, Color32::WHITE));
}

fn draw_sensors(painter: &egui::Painter, rect: egui::Rect, state: &AppState) {
    for sensor in state.snapshot.store.sensors().iter().filter(|s| s.floor == state.current_floor) {
        let pos = to_screen(rect, state, &sensor.position);
        let active = state.snapshot.detecting_sensors.contains(&sensor.id);
        let color = if active { SENSOR_ACTIVE_COLOR } else { SENSOR_COLOR };

        let range = sensor.effective_radius() as f32 * state.zoom;
        painter.circle_filled(pos, range, color.gamma_multiply(if active { 0.18 } else { 0.06 }));
        painter.circle_stroke(pos, range, egui::Stroke::new(1.0, color.gamma_multiply(0.5)));
        painter.circle_filled(pos, 6.0, color);

        if state.selected.as_deref() == Some(sensor.id.as_str()) {
            draw_selection(painter, pos);
        }
        if state.show_labels {
            draw_label(painter, pos, sensor.display_name(), color);
        }
    }
}

fn draw_devices(painter: &egui::Painter, rect: egui::Rect, state: &AppState) {
    for device in state.snapshot.store.devices().iter().filter(|d| d.floor == state.current_floor) {
        let pos = to_screen(rect, state, &device.position);
        let range = device.effective_radius() as f32 * state.zoom;
        painter.circle_stroke(pos, range, egui::Stroke::new(1.0, DEVICE_COLOR.gamma_multiply(0.4)));

        let color = if device.interference_ids.is_empty() { DEVICE_COLOR } else { INTERFERENCE_COLOR };
        painter.rect_filled(egui::Rect::from_center_size(pos, egui::vec2(12.0, 12.0)), 2.0, color);

        if state.selected.as_deref() == Some(device.id.as_str()) {
            draw_selection(painter, pos);
        }
        if state.show_labels {
            draw_label(painter, pos, device.display_name(), DEVICE_COLOR);
        }
    }
}

fn draw_persons(painter: &egui::Painter, rect: egui::Rect, state: &AppState) {
    for (index, person) in state.snapshot.store.persons().iter().enumerate() {
        if person.floor != state.current_floor {
            continue;
        }
        let color = color_for_person(person, index);

        let path: Vec<egui::Pos2> = person.path.iter().map(|p| to_screen(rect, state, p)).collect();
        if path.len() >= 2 {
            painter.extend(egui::Shape::dotted_line(&path, color.gamma_multiply(0.6), 8.0, 1.5));
        }

        // Degenerate persons have no position and are not drawn
        let Some(position) = state.snapshot.person_positions.get(&person.id) else {
            continue;
        };
        let pos = to_screen(rect, state, position);
        painter.rect_filled(egui::Rect::from_center_size(pos, egui::vec2(8.0, 8.0)), 1.0, color);

        if state.selected.as_deref() == Some(person.id.as_str()) {
            draw_selection(painter, pos);
        }
        if state.show_labels {
            draw_label(painter, pos, person.display_name(), color);
        }
    }
}

/// Nearest node marker under `pos` on the current floor.
///
/// Persons are only considered when `include_persons` is set; they cannot be
/// dragged.
fn node_at(rect: egui::Rect, state: &AppState, pos: egui::Pos2, include_persons: bool) -> Option<NodeId> {
    let store = &state.snapshot.store;
    let floor = state.current_floor;

    let sensors = store.sensors().iter().filter(|s| s.floor == floor).map(|s| (&s.id, s.position));
    let devices = store.devices().iter().filter(|d| d.floor == floor).map(|d| (&d.id, d.position));
    let persons = store
        .persons()
        .iter()
        .filter(|p| include_persons && p.floor == floor)
        .filter_map(|p| state.snapshot.person_positions.get(&p.id).map(|position| (&p.id, *position)));

    let mut best: Option<(&NodeId, f32)> = None;
    for (id, position) in sensors.chain(devices).chain(persons) {
        let d2 = to_screen(rect, state, &position).distance_sq(pos);
        if d2 <= PICK_RADIUS * PICK_RADIUS && best.is_none_or(|(_, bd)| d2 < bd) {
            best = Some((id, d2));
        }
    }
    best.map(|(id, _)| id.clone())
}

fn handle_zoom(ui: &egui::Ui, response: &egui::Response, rect: egui::Rect, state: &mut AppState) {
    if !response.hovered() {
        return;
    }
    let scroll = ui.input(|i| i.smooth_scroll_delta.y);
    if scroll == 0.0 {
        return;
    }
    let Some(pointer) = response.hover_pos() else {
        return;
    };
    // Keep the plan point under the pointer fixed while zooming
    let anchor = to_world(rect, state, pointer);
    state.zoom = (state.zoom * (1.0 + scroll * 0.002)).clamp(0.1, 10.0);
    state.pan = pointer - rect.min - egui::vec2(anchor.x as f32, anchor.y as f32) * state.zoom;
}

fn handle_gestures(response: &egui::Response, rect: egui::Rect, state: &mut AppState) {
    if response.drag_started() {
        let target = response.interact_pointer_pos().and_then(|pos| node_at(rect, state, pos, false));
        let gesture = match target {
            Some(id) => {
                state.selected = Some(id.clone());
                Gesture::DragNode(id)
            }
            None => Gesture::Pan,
        };
        state.start_gesture(gesture);
    }

    if response.dragged() {
        match state.gesture.clone() {
            Some(Gesture::DragNode(node_id)) => {
                if let Some(pointer) = response.interact_pointer_pos() {
                    let position = to_world(rect, state, pointer);
                    state.move_dragged_node(node_id, position);
                }
            }
            Some(Gesture::Pan) => {
                state.pan += response.drag_delta();
            }
            None => {}
        }
    }

    if response.drag_stopped() {
        state.end_gesture();
    }
}

fn handle_selection(response: &egui::Response, rect: egui::Rect, state: &mut AppState) {
    if !response.clicked() {
        return;
    }
    if let Some(click_pos) = response.interact_pointer_pos() {
        let hit = node_at(rect, state, click_pos, true);
        state.selected = if hit == state.selected { None } else { hit };
    }
}
