//! # Cabinet Logger
//!
//! Lê o Arduino do armário pela porta serial, grava o histórico CSV e
//! mostra as leituras no terminal. Sem interface gráfica.
//!
//! ## Uso
//! ```bash
//! cabinet_logger                        # porta do config.toml
//! cabinet_logger --port /dev/ttyUSB0    # sobrescreve a porta
//! cabinet_logger --dry 1800             # inicia secagem de 30 min
//! ```

use cabinet_core::alerts::{AlertLevel, evaluate_alerts};
use cabinet_core::config::AppConfig;
use cabinet_core::history::CsvHistory;
use cabinet_core::poll::{CabinetEvent, LoopCommand, PollLoop};
use cabinet_core::serial::SerialConnection;
use cabinet_core::state::StateStore;
use cabinet_core::types::{DryingStatus, format_remaining};
use tracing::{error, info, warn};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let mut config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    if let Some(port) = arg_value("--port") {
        config.serial.port = port;
    }
    let dry_secs = match arg_value("--dry").map(|v| v.parse::<u32>()) {
        Some(Ok(secs)) => Some(secs),
        Some(Err(e)) => {
            error!("Valor inválido para --dry: {e}");
            std::process::exit(2);
        }
        None => None,
    };

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        std::process::exit(2);
    }

    // ── Porta serial ──
    let link = match SerialConnection::open(
        &config.serial.port,
        config.serial.baud_rate,
        config.serial.timeout(),
    ) {
        Ok(link) => link,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    // ── Loop de polling ──
    let store = StateStore::new(config.drying.duration_secs);
    let mut poll = PollLoop::new(Box::new(link), store, &config);

    let mut history_path = None;
    if config.history.enabled {
        match CsvHistory::open(&config.history.path) {
            Ok(history) => {
                history_path = Some(history.path().to_path_buf());
                poll = poll.with_sink(Box::new(history));
            }
            Err(e) => warn!("Histórico desativado: {e}"),
        }
    }

    let events = poll.subscribe();
    let mut handle = match poll.start() {
        Ok(handle) => handle,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    if let Some(secs) = dry_secs {
        handle.send(LoopCommand::StartDrying {
            seconds: Some(secs),
        });
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   👟 CABINET LOGGER – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Porta:     {} @ {}", config.serial.port, config.serial.baud_rate);
    println!("  Intervalo: {} ms", config.poll.interval_ms);
    if let Some(path) = &history_path {
        println!("  Histórico: {}", path.display());
    }
    println!("══════════════════════════════════════════════");
    println!();

    // ── Eventos ──
    for event in events.iter() {
        match event {
            CabinetEvent::Reading(r) => {
                info!(
                    "← {} | {:.1}°C {:.1}%",
                    r.sensor(),
                    r.temperature(),
                    r.humidity()
                );
            }
            CabinetEvent::StatusChanged { from, to } => {
                info!("Status: {from} → {to}");
            }
            CabinetEvent::Heater(on) => {
                info!("Aquecedor {}", if on { "ligado" } else { "desligado" });
            }
            CabinetEvent::Snapshot(state) => {
                for alert in evaluate_alerts(&state, &config.alerts) {
                    let msg = format!("{}: {:.1}{}", alert.label, alert.value, alert.unit);
                    match alert.level {
                        AlertLevel::Critical => error!("{msg}"),
                        _ => warn!("{msg}"),
                    }
                }
                if state.status == DryingStatus::Active {
                    info!("Restante: {}", format_remaining(state.remaining_seconds));
                }
            }
            CabinetEvent::Stopped => break,
        }
    }

    handle.stop();
}

/// Valor do argumento `--nome valor`.
fn arg_value(name: &str) -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == name {
            return args.next();
        }
    }
    None
}
