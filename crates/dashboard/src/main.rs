//! # Cabinet Dashboard
//!
//! Painel do armário secador com GUI acelerada por GPU via eframe/egui:
//! leituras ao vivo, ciclo de secagem, desumidificação e reconhecimento
//! do tipo de calçado.
//!
//! ## Atalhos
//! - `F` / `F11`: Fullscreen
//! - `G`: Toggle gráficos
//! - `T`: Alternar tema
//! - `Q` / `Esc`: Sair

mod dashboard;
mod panels;
mod theme_egui;

use cabinet_core::config::AppConfig;
use dashboard::CabinetDashboard;
use tracing::{error, warn};

fn main() -> eframe::Result<()> {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }
    for e in config.validate() {
        error!("Config inválida: {e}");
    }

    // ── Janela eframe ──
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("Shoe Cabinet")
            .with_inner_size([1280.0, 760.0])
            .with_min_inner_size([960.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Shoe Cabinet",
        options,
        Box::new(move |cc| Ok(Box::new(CabinetDashboard::new(cc, config)))),
    )
}
