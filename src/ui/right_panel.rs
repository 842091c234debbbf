//! # Right Panel - Node Inspector and Event Log
//!
//! Top: a search box over node names and ids (all floors). Picking a hit
//! selects the node and switches to its floor.
//!
//! Middle: details of the selected node, including the names of the nodes it
//! is connected to or interferes with, and a button to remove it.
//!
//! Bottom: the event log of the current floor, newest first, color coded by
//! category:
//! - Blue: connectivity
//! - Red: interference
//! - Yellow: motion
//! - Grey: status (nodes added or removed)

use chrono::Local;
use eframe::egui;
use egui::Color32;

use sensor_layout_simulator::engine::{NodeKind, SimulationEvent};

use crate::ui::app_state::color_for_category;
use crate::ui::{AppState, UICommand};

/// Render the right inspector panel.
///
/// # Parameters
///
/// * `ctx` - egui context
/// * `state` - Mutable application state
pub fn render(ctx: &egui::Context, state: &mut AppState) {
    let panel = egui::SidePanel::right("inspector_right")
        .resizable(true)
        .default_width(state.right_panel_width)
        .width_range(280.0..=900.0)
        .show(ctx, |ui| {
            ui.heading("Inspector");
            ui.separator();

            render_search(ui, state);
            ui.separator();

            if state.selected.is_some() {
                render_selected(ui, state);
            } else {
                ui.label(egui::RichText::new("Click a node on the map to inspect it").weak());
            }
            ui.separator();

            render_event_log(ui, state);
        });
    state.right_panel_width = panel.response.rect.width();
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Sensor => "Sensor",
        NodeKind::Device => "Device",
        NodeKind::Person => "Person",
    }
}

fn render_search(ui: &mut egui::Ui, state: &mut AppState) {
    ui.horizontal(|ui| {
        ui.label("Search:");
        ui.text_edit_singleline(&mut state.search_query);
    });

    let hits = state.snapshot.store.search(&state.search_query);
    if state.search_query.trim().is_empty() {
        return;
    }
    if hits.is_empty() {
        ui.label(egui::RichText::new("No matches").weak());
        return;
    }

    let mut picked = None;
    egui::ScrollArea::vertical().id_salt("search_hits").max_height(120.0).show(ui, |ui| {
        for hit in &hits {
            let label = format!("{} {} (floor {})", kind_label(hit.kind), hit.name, hit.floor);
            let is_selected = state.selected.as_deref() == Some(hit.id.as_str());
            if ui.selectable_label(is_selected, label).clicked() {
                picked = Some((hit.id.clone(), hit.floor));
            }
        }
    });
    if let Some((id, floor)) = picked {
        state.select_floor(floor);
        state.selected = Some(id);
    }
}

fn value_row(ui: &mut egui::Ui, label: &str, value: impl Into<String>) {
    ui.horizontal(|ui| {
        ui.label(label);
        ui.label(egui::RichText::new(value.into()).strong());
    });
}

fn list_or_none(values: &[String]) -> String {
    if values.is_empty() { "none".to_string() } else { values.join(", ") }
}

fn render_selected(ui: &mut egui::Ui, state: &mut AppState) {
    let Some(id) = state.selected.clone() else {
        return;
    };
    let store = &state.snapshot.store;

    if let Some(sensor) = store.sensor(&id) {
        ui.horizontal(|ui| {
            ui.label("Selected sensor:");
            ui.label(egui::RichText::new(sensor.display_name()).strong().color(Color32::from_rgb(40, 200, 160)));
        });
        value_row(ui, "Id:", sensor.id.as_str());
        value_row(ui, "Type:", sensor.sensor_type.as_str());
        value_row(ui, "Position:", format!("({:.1}, {:.1})", sensor.position.x, sensor.position.y));
        value_row(ui, "Radius:", format!("{:.0}", sensor.effective_radius()));
        value_row(ui, "Protocols:", list_or_none(&sensor.connectivity));
        if sensor.is_motion_sensor() {
            let seeing = state.snapshot.detecting_sensors.contains(&sensor.id);
            value_row(ui, "Detecting:", if seeing { "yes" } else { "no" });
        }
    } else if let Some(device) = store.device(&id) {
        ui.horizontal(|ui| {
            ui.label("Selected device:");
            ui.label(egui::RichText::new(device.display_name()).strong().color(Color32::from_rgb(255, 150, 40)));
        });
        value_row(ui, "Id:", device.id.as_str());
        if !device.kind.is_empty() {
            value_row(ui, "Kind:", device.kind.as_str());
        }
        value_row(ui, "Position:", format!("({:.1}, {:.1})", device.position.x, device.position.y));
        value_row(ui, "Radius:", format!("{:.0}", device.effective_radius()));
        value_row(ui, "Protocols:", list_or_none(&device.connectivity));
        value_row(ui, "Pairs with:", list_or_none(&device.compatible_sensors));
        value_row(ui, "Noisy on:", list_or_none(&device.interference_protocols));
    } else if let Some(person) = store.person(&id) {
        ui.horizontal(|ui| {
            ui.label("Selected person:");
            ui.label(egui::RichText::new(person.display_name()).strong());
        });
        value_row(ui, "Id:", person.id.as_str());
        value_row(ui, "Speed:", format!("{} px/s", person.speed));
        value_row(ui, "Waypoints:", person.path.len().to_string());
        match state.snapshot.person_positions.get(&person.id) {
            Some(position) => value_row(ui, "Position:", format!("({:.1}, {:.1})", position.x, position.y)),
            None => value_row(ui, "Position:", "not walking (path too short)"),
        }
    } else {
        return;
    }

    if let Some(summary) = store.connection_summary(&id) {
        ui.add_space(4.0);
        value_row(ui, "Connected to:", list_or_none(&summary.connected));
        ui.horizontal(|ui| {
            ui.label("Interference:");
            let color = if summary.interfering.is_empty() { ui.visuals().text_color() } else { Color32::from_rgb(255, 90, 90) };
            ui.label(egui::RichText::new(list_or_none(&summary.interfering)).strong().color(color));
        });
    }

    ui.add_space(6.0);
    if ui.button("Remove").clicked() {
        if state.ui_command_tx.try_send(UICommand::RemoveNode(id)).is_ok() {
            state.selected = None;
        } else {
            state.alert = Some("Engine is busy, try again".to_string());
        }
    }
}

fn render_event_row(ui: &mut egui::Ui, event: &SimulationEvent) {
    ui.horizontal(|ui| {
        let time = event.timestamp.with_timezone(&Local).format("%H:%M:%S");
        ui.label(egui::RichText::new(time.to_string()).monospace().weak());
        ui.label(egui::RichText::new(&event.message).color(color_for_category(event.category)));
    });
}

fn render_event_log(ui: &mut egui::Ui, state: &AppState) {
    let events: Vec<&SimulationEvent> = state.events.for_floor(state.current_floor).collect();
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new(format!("Events on floor {}", state.current_floor)).strong());
        ui.label(egui::RichText::new(format!("({})", events.len())).weak());
    });

    let row_height = ui.text_style_height(&egui::TextStyle::Body) + 4.0;
    egui::ScrollArea::vertical()
        .id_salt("event_log")
        .auto_shrink([false, false])
        .show_rows(ui, row_height, events.len(), |ui, rows| {
            // Newest first
            for row in rows {
                let event = events[events.len() - 1 - row];
                render_event_row(ui, event);
            }
        });
}
