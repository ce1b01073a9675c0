//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável, compartilhado pelo logger
//! e pelo dashboard.

use crate::types::SensorId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Porta serial do Arduino.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Dispositivo (ex: "/dev/ttyACM0", "COM3")
    pub port: String,
    pub baud_rate: u32,
    /// Espera máxima por uma linha em cada ciclo (ms)
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".into(),
            baud_rate: 9600,
            timeout_ms: 500,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Cadência do loop de polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Intervalo entre ciclos (ms). Cada ciclo avança a contagem em 1 s.
    pub interval_ms: u64,
    /// Capacidade do channel de eventos de cada assinante
    pub event_buffer: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            event_buffer: 64,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Ciclo de secagem e aquecedor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DryingConfig {
    /// Duração padrão (s), restaurada pelo reset
    pub duration_secs: u32,
    /// Temperatura alvo da câmara (°C); ausente = aquecedor manual
    pub target_temp_c: Option<f32>,
    pub heater_pin: u8,
    /// Espera antes de religar o aquecedor após superaquecimento (s)
    pub recheck_secs: u64,
    /// Sensor da câmara de secagem
    pub sensor: SensorId,
}

impl Default for DryingConfig {
    fn default() -> Self {
        Self {
            duration_secs: crate::state::DEFAULT_DRYING_SECS,
            target_temp_c: Some(40.0),
            heater_pin: 8,
            recheck_secs: 60,
            sensor: SensorId::Sensor2,
        }
    }
}

/// Desumidificação (Peltier, UV, ventilador).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DehumidifyConfig {
    pub pins: Vec<u8>,
    /// Sensor da câmara de desumidificação
    pub sensor: SensorId,
}

impl Default for DehumidifyConfig {
    fn default() -> Self {
        Self {
            pins: vec![3, 12, 13],
            sensor: SensorId::Sensor1,
        }
    }
}

/// Thresholds de alerta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub humidity_warning: f32,
    pub humidity_critical: f32,
    pub temp_warning: f32,
    pub temp_critical: f32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            humidity_warning: 60.0,
            humidity_critical: 75.0,
            temp_warning: 50.0,
            temp_critical: 60.0,
        }
    }
}

/// Configuração de histórico.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("sensor_data.csv"),
        }
    }
}

/// Configuração da interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Tema: "dark", "light", "high_contrast"
    pub theme: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: "dark".into(),
        }
    }
}

/// Câmera e classificador externos.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Comando de captura; recebe o caminho da foto como último argumento
    pub capture_command: String,
    /// Onde a foto é salva
    pub image_path: PathBuf,
    /// Comando do classificador; recebe o caminho da foto e imprime as probabilidades
    pub classify_command: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            capture_command: "rpicam-still --nopreview -t 2000 -o".into(),
            image_path: PathBuf::from("data/pic.jpg"),
            classify_command: String::new(),
        }
    }
}

/// Papel de um sensor no armário.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chamber {
    Dehumidify,
    Drying,
    Ambient,
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub poll: PollConfig,
    pub drying: DryingConfig,
    pub dehumidify: DehumidifyConfig,
    pub alerts: AlertThresholds,
    pub history: HistoryConfig,
    pub ui: UiConfig,
    pub vision: VisionConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Câmara monitorada por `sensor`; sensores sem papel ficam como ambiente.
    pub fn chamber_of(&self, sensor: SensorId) -> Chamber {
        if sensor == self.drying.sensor {
            Chamber::Drying
        } else if sensor == self.dehumidify.sensor {
            Chamber::Dehumidify
        } else {
            Chamber::Ambient
        }
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.serial.port.trim().is_empty() {
            errors.push("Porta serial não pode ser vazia".into());
        }
        if self.serial.baud_rate == 0 {
            errors.push("Baud rate não pode ser 0".into());
        }
        if self.poll.interval_ms < 100 || self.poll.interval_ms > 60_000 {
            errors.push(format!(
                "Intervalo de polling inválido: {} ms (100–60000)",
                self.poll.interval_ms
            ));
        }
        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > self.poll.interval_ms {
            errors.push(format!(
                "Timeout serial inválido: {} ms (1–{} ms, não pode passar do intervalo)",
                self.serial.timeout_ms, self.poll.interval_ms
            ));
        }
        if self.poll.event_buffer == 0 {
            errors.push("Buffer de eventos não pode ser 0".into());
        }
        if self.drying.sensor == self.dehumidify.sensor {
            errors.push(format!(
                "Secagem e desumidificação não podem usar o mesmo sensor ({})",
                self.drying.sensor
            ));
        }

        let a = &self.alerts;
        for (name, value) in [
            ("humidity_warning", a.humidity_warning),
            ("humidity_critical", a.humidity_critical),
        ] {
            if !(0.0..=100.0).contains(&value) {
                errors.push(format!("{name} fora da faixa: {value} (0–100)"));
            }
        }
        if a.humidity_warning >= a.humidity_critical {
            errors.push("humidity_warning deve ser menor que humidity_critical".into());
        }
        if a.temp_warning >= a.temp_critical {
            errors.push("temp_warning deve ser menor que temp_critical".into());
        }

        errors
    }
}
