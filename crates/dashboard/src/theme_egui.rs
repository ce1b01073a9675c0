//! Paletas do dashboard.
//!
//! Cada tema dá uma cor por câmara do armário; os painéis e as linhas dos
//! gráficos pegam a cor pela [`Chamber`] do sensor.

use cabinet_core::alerts::{AlertLevel, level_for_value};
use cabinet_core::config::Chamber;
use cabinet_core::types::DryingStatus;
use egui::Color32;

/// Nomes aceitos em `ui.theme`.
pub const THEME_NAMES: [&str; 3] = ["dark", "light", "high_contrast"];

#[derive(Clone)]
pub struct EguiTheme {
    pub name: &'static str,
    pub bg: Color32,
    pub panel: Color32,
    pub border: Color32,
    pub text: Color32,
    pub dim: Color32,
    pub title: Color32,
    pub warning: Color32,
    pub critical: Color32,
    /// Desumidificação, secagem, ambiente
    chambers: [Color32; 3],
    dark_base: bool,
}

impl EguiTheme {
    /// Tema pelo nome; desconhecido cai no escuro.
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "light" => Self::light(),
            "high_contrast" => Self::high_contrast(),
            _ => Self::dark(),
        }
    }

    fn dark() -> Self {
        Self {
            name: "dark",
            bg: Color32::from_rgb(0x1a, 0x1a, 0x1a),
            panel: Color32::from_rgb(0x25, 0x25, 0x25),
            border: Color32::from_rgb(0x33, 0x33, 0x33),
            text: Color32::WHITE,
            dim: Color32::from_rgb(0x66, 0x66, 0x66),
            title: Color32::from_rgb(0x00, 0xd9, 0xff),
            warning: Color32::from_rgb(0xff, 0xcc, 0x00),
            critical: Color32::from_rgb(0xff, 0x33, 0x33),
            chambers: [
                Color32::from_rgb(0x4f, 0xc3, 0xf7),
                Color32::from_rgb(0xff, 0xa5, 0x00),
                Color32::from_rgb(0x00, 0xff, 0x88),
            ],
            dark_base: true,
        }
    }

    fn light() -> Self {
        Self {
            name: "light",
            bg: Color32::from_rgb(0xf9, 0xf9, 0xf9),
            panel: Color32::WHITE,
            border: Color32::from_rgb(0xcc, 0xcc, 0xcc),
            text: Color32::BLACK,
            dim: Color32::from_rgb(0x88, 0x88, 0x88),
            title: Color32::from_rgb(0x00, 0x66, 0xcc),
            warning: Color32::from_rgb(0xcc, 0x99, 0x00),
            critical: Color32::from_rgb(0xcc, 0x22, 0x22),
            chambers: [
                Color32::from_rgb(0x02, 0x77, 0xbd),
                Color32::from_rgb(0xcc, 0x77, 0x00),
                Color32::from_rgb(0x00, 0xaa, 0x55),
            ],
            dark_base: false,
        }
    }

    fn high_contrast() -> Self {
        Self {
            name: "high_contrast",
            bg: Color32::BLACK,
            panel: Color32::from_rgb(0x1a, 0x1a, 0x1a),
            border: Color32::WHITE,
            text: Color32::WHITE,
            dim: Color32::from_rgb(0xcc, 0xcc, 0xcc),
            title: Color32::from_rgb(0x00, 0xff, 0xff),
            warning: Color32::YELLOW,
            critical: Color32::RED,
            chambers: [Color32::from_rgb(0x00, 0xff, 0xff), Color32::YELLOW, Color32::GREEN],
            dark_base: true,
        }
    }

    pub fn chamber_color(&self, chamber: Chamber) -> Color32 {
        match chamber {
            Chamber::Dehumidify => self.chambers[0],
            Chamber::Drying => self.chambers[1],
            Chamber::Ambient => self.chambers[2],
        }
    }

    pub fn status_color(&self, status: DryingStatus) -> Color32 {
        match status {
            DryingStatus::Idle => self.dim,
            DryingStatus::Active => self.chamber_color(Chamber::Drying),
            DryingStatus::Complete => self.chamber_color(Chamber::Ambient),
        }
    }

    /// Retorna a cor baseada em thresholds.
    pub fn value_color(&self, value: f32, warn: f32, crit: f32) -> Color32 {
        match level_for_value(value, warn, crit) {
            AlertLevel::Critical => self.critical,
            AlertLevel::Warning => self.warning,
            AlertLevel::Normal => self.text,
        }
    }

    /// Visuals do egui com o fundo e o texto do tema.
    pub fn visuals(&self) -> egui::Visuals {
        let mut visuals = if self.dark_base {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        visuals.panel_fill = self.bg;
        visuals.window_fill = self.panel;
        visuals.override_text_color = Some(self.text);
        visuals
    }
}

/// Carrega todos os temas disponíveis.
pub fn all_themes() -> Vec<EguiTheme> {
    THEME_NAMES.iter().map(|name| EguiTheme::by_name(name)).collect()
}
