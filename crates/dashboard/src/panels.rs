//! Painéis do armário renderizados com egui.

use crate::theme_egui::EguiTheme;
use cabinet_core::config::{AlertThresholds, Chamber};
use cabinet_core::state::CabinetState;
use cabinet_core::types::{SensorId, SensorReading, format_remaining};
use cabinet_core::vision::Prediction;
use egui::{Color32, RichText, Ui};

// ──────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────

fn metric_row(ui: &mut Ui, label: &str, value: &str, color: Color32, dim: Color32) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(RichText::new(format!("{label}:")).color(dim).monospace());
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui: &mut Ui| {
            ui.label(RichText::new(value).color(color).monospace().strong());
        });
    });
}

fn panel_frame(
    ui: &mut Ui,
    title: &str,
    accent: Color32,
    theme: &EguiTheme,
    add_body: impl FnOnce(&mut Ui),
) {
    egui::Frame::new()
        .fill(theme.panel)
        .stroke(egui::Stroke::new(2.0, accent))
        .corner_radius(4.0)
        .inner_margin(8.0)
        .show(ui, |ui: &mut Ui| {
            ui.vertical_centered(|ui: &mut Ui| {
                ui.label(
                    RichText::new(format!("── {title} ──"))
                        .color(accent)
                        .strong()
                        .monospace()
                        .size(13.0),
                );
            });
            ui.add_space(4.0);
            add_body(ui);
        });
}

/// Título de cada câmara.
pub fn chamber_title(chamber: Chamber) -> &'static str {
    match chamber {
        Chamber::Dehumidify => "DESUMIDIFICAÇÃO",
        Chamber::Drying => "SECAGEM",
        Chamber::Ambient => "AMBIENTE",
    }
}

// ──────────────────────────────────────────
// Sensor
// ──────────────────────────────────────────

/// Temperatura e umidade de um sensor; "--" enquanto não houver leitura.
pub fn render_sensor(
    ui: &mut Ui,
    sensor: SensorId,
    chamber: Chamber,
    reading: Option<&SensorReading>,
    theme: &EguiTheme,
    th: &AlertThresholds,
) {
    let accent = theme.chamber_color(chamber);
    panel_frame(ui, chamber_title(chamber), accent, theme, |ui: &mut Ui| {
        match reading {
            Some(r) => {
                metric_row(
                    ui,
                    "Temp",
                    &format!("{:.1}°C", r.temperature()),
                    theme.value_color(r.temperature(), th.temp_warning, th.temp_critical),
                    theme.dim,
                );
                metric_row(
                    ui,
                    "Umidade",
                    &format!("{:.1}%", r.humidity()),
                    theme.value_color(r.humidity(), th.humidity_warning, th.humidity_critical),
                    theme.dim,
                );
            }
            None => {
                metric_row(ui, "Temp", "--", theme.dim, theme.dim);
                metric_row(ui, "Umidade", "--", theme.dim, theme.dim);
            }
        }
        ui.label(
            RichText::new(sensor.as_str())
                .color(theme.dim)
                .monospace()
                .size(10.0),
        );
    });
}

// ──────────────────────────────────────────
// Secagem
// ──────────────────────────────────────────

pub fn render_drying(ui: &mut Ui, state: &CabinetState, heater_on: bool, theme: &EguiTheme) {
    panel_frame(ui, "CICLO", theme.title, theme, |ui: &mut Ui| {
        metric_row(
            ui,
            "Status",
            state.status.label(),
            theme.status_color(state.status),
            theme.dim,
        );
        metric_row(
            ui,
            "Restante",
            &format_remaining(state.remaining_seconds),
            theme.text,
            theme.dim,
        );
        metric_row(
            ui,
            "Aquecedor",
            if heater_on { "ligado" } else { "desligado" },
            if heater_on { theme.chamber_color(Chamber::Drying) } else { theme.dim },
            theme.dim,
        );
        let shoe = state.shoe_type.map_or("--", |s| s.label());
        metric_row(ui, "Calçado", shoe, theme.text, theme.dim);
    });
}

// ──────────────────────────────────────────
// Reconhecimento
// ──────────────────────────────────────────

/// Probabilidades por classe; a escolhida fica destacada.
pub fn render_prediction(
    ui: &mut Ui,
    prediction: &Prediction,
    chosen_runner_up: bool,
    theme: &EguiTheme,
) {
    let chosen = if chosen_runner_up {
        prediction.runner_up().0
    } else {
        prediction.best().0
    };

    egui::Frame::new()
        .fill(theme.panel)
        .stroke(egui::Stroke::new(1.0, theme.border))
        .corner_radius(4.0)
        .inner_margin(8.0)
        .show(ui, |ui: &mut Ui| {
            for &(shoe, p) in prediction.ranked() {
                let color = if shoe == chosen { theme.title } else { theme.dim };
                ui.horizontal(|ui: &mut Ui| {
                    ui.label(
                        RichText::new(format!("{:<10}", shoe.label()))
                            .color(color)
                            .monospace(),
                    );
                    ui.add(
                        egui::ProgressBar::new(p.clamp(0.0, 1.0))
                            .desired_width(160.0)
                            .fill(color)
                            .text(format!("{:.0}%", p * 100.0)),
                    );
                });
            }
        });
}
