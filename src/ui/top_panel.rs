//! # Top Panel - Layout Controls and Floor Summary
//!
//! Column 1: layout name, open/save buttons and the last status line.
//! Column 2: counters for the current floor (nodes, links, live detections).
//! Column 3: view controls (floor selector, zoom, labels) and the pause badge
//! shown while a gesture holds the simulation.

use eframe::egui;
use egui::Color32;

use crate::ui::AppState;

/// Render the top panel.
///
/// # Parameters
///
/// * `ctx` - egui context
/// * `state` - Mutable application state for reading counters and updating controls
pub fn render(ctx: &egui::Context, state: &mut AppState) {
    egui::TopBottomPanel::top("top_controls").exact_height(110.0).show(ctx, |ui| {
        let floor = state.current_floor;
        let store = &state.snapshot.store;
        let sensors = store.sensors().iter().filter(|s| s.floor == floor).count();
        let devices = store.devices().iter().filter(|d| d.floor == floor).count();
        let persons = store.persons().iter().filter(|p| p.floor == floor).count();
        let connections: usize = store.sensors().iter().filter(|s| s.floor == floor).map(|s| s.connected_device_ids.len()).sum();
        let interferences: usize = store.sensors().iter().filter(|s| s.floor == floor).map(|s| s.interference_ids.len()).sum();
        let detecting = store
            .sensors()
            .iter()
            .filter(|s| s.floor == floor && state.snapshot.detecting_sensors.contains(&s.id))
            .count();

        ui.columns(3, |cols| {
            cols[0].vertical(|ui| {
                ui.heading("Layout");
                ui.separator();
                ui.horizontal(|ui| {
                    ui.label("Name:");
                    let name = state.layout_name.clone().unwrap_or_else(|| "(none)".to_string());
                    ui.label(egui::RichText::new(name).strong());
                });
                ui.horizontal(|ui| {
                    if ui.button("Open…").clicked() {
                        state.open_layout_picker();
                    }
                    let can_save = state.layout_name.is_some();
                    if ui.add_enabled(can_save, egui::Button::new("Save as…")).clicked() {
                        state.save_layout_picker();
                    }
                });
                if let Some(status) = &state.status {
                    ui.label(egui::RichText::new(status).small().weak());
                }
            });

            cols[1].vertical(|ui| {
                ui.heading(format!("Floor {}", floor));
                ui.separator();
                ui.horizontal(|ui| {
                    ui.label("Sensors:");
                    ui.label(egui::RichText::new(format!("{:<4}", sensors)).monospace().strong());
                    ui.label("Devices:");
                    ui.label(egui::RichText::new(format!("{:<4}", devices)).monospace().strong());
                    ui.label("Persons:");
                    ui.label(egui::RichText::new(format!("{:<4}", persons)).monospace().strong());
                });
                ui.horizontal(|ui| {
                    ui.label("Connections:");
                    ui.label(egui::RichText::new(connections.to_string()).strong());
                    ui.label("  Interference:");
                    let color = if interferences > 0 { Color32::from_rgb(255, 90, 90) } else { ui.visuals().text_color() };
                    ui.label(egui::RichText::new(interferences.to_string()).strong().color(color));
                });
                ui.horizontal(|ui| {
                    ui.label("Active detections:");
                    ui.label(egui::RichText::new(detecting.to_string()).strong());
                    ui.label("  Events:");
                    ui.label(egui::RichText::new(state.events.len().to_string()).strong());
                });
            });

            cols[2].vertical(|ui| {
                ui.heading("View");
                ui.separator();
                ui.horizontal(|ui| {
                    ui.label("Floor:");
                    let mut selected_floor = state.current_floor;
                    egui::ComboBox::from_id_salt("floor_selector")
                        .selected_text(selected_floor.to_string())
                        .show_ui(ui, |ui| {
                            for f in state.floors() {
                                ui.selectable_value(&mut selected_floor, f, f.to_string());
                            }
                        });
                    state.select_floor(selected_floor);

                    ui.label(egui::RichText::new(format!("tick {}", state.snapshot.tick)).monospace().weak());
                    if state.snapshot.paused {
                        ui.label(egui::RichText::new("PAUSED").strong().color(Color32::from_rgb(255, 200, 0)));
                    }
                });
                ui.horizontal(|ui| {
                    ui.label("Zoom:");
                    ui.add(egui::Slider::new(&mut state.zoom, 0.1..=10.0).logarithmic(true));
                    if ui.button("Reset").clicked() {
                        state.zoom = 1.0;
                        state.pan = egui::vec2(40.0, 40.0);
                    }
                });
                ui.checkbox(&mut state.show_labels, "Show names");
            });
        });
    });
}
