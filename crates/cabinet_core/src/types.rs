//! Definição de tipos/structs do armário de sapatos.
//!
//! Leituras dos sensores DHT do Arduino, status do ciclo de secagem e o
//! registro achatado gravado no histórico CSV.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ──────────────────────────────────────────────
// Sensores
// ──────────────────────────────────────────────

/// Identificador de sensor. Conjunto fixo definido pelo firmware.
///
/// - `sensor1`: câmara de desumidificação
/// - `sensor2`: câmara de secagem (controla o aquecedor)
/// - `sensor3`: ambiente
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorId {
    Sensor1,
    Sensor2,
    Sensor3,
}

impl SensorId {
    /// Todos os sensores, na ordem das colunas do CSV.
    pub const ALL: [SensorId; 3] = [SensorId::Sensor1, SensorId::Sensor2, SensorId::Sensor3];

    /// Nome usado no frame serial.
    pub fn as_str(self) -> &'static str {
        match self {
            SensorId::Sensor1 => "sensor1",
            SensorId::Sensor2 => "sensor2",
            SensorId::Sensor3 => "sensor3",
        }
    }

    /// Prefixo das colunas do CSV (ex: `Sensor1`).
    pub fn column_prefix(self) -> &'static str {
        match self {
            SensorId::Sensor1 => "Sensor1",
            SensorId::Sensor2 => "Sensor2",
            SensorId::Sensor3 => "Sensor3",
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Erro ao interpretar um nome de sensor desconhecido.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Sensor desconhecido: {0:?}")]
pub struct UnknownSensor(pub String);

impl FromStr for SensorId {
    type Err = UnknownSensor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sensor1" => Ok(SensorId::Sensor1),
            "sensor2" => Ok(SensorId::Sensor2),
            "sensor3" => Ok(SensorId::Sensor3),
            other => Err(UnknownSensor(other.to_string())),
        }
    }
}

/// Leitura de um sensor, criada pelo parser a partir de um frame.
///
/// Imutável depois de criada: novas leituras substituem a anterior no
/// [`crate::state::StateStore`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    sensor: SensorId,
    /// Temperatura (°C)
    temperature: f32,
    /// Umidade relativa (0–100%)
    humidity: f32,
}

impl SensorReading {
    /// Construtor restrito ao crate; fora dele leituras vêm de
    /// [`crate::protocol::parse_frame`].
    pub(crate) fn new(sensor: SensorId, temperature: f32, humidity: f32) -> Self {
        Self {
            sensor,
            temperature,
            humidity,
        }
    }

    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn humidity(&self) -> f32 {
        self.humidity
    }
}

// ──────────────────────────────────────────────
// Ciclo de secagem
// ──────────────────────────────────────────────

/// Status do ciclo de secagem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DryingStatus {
    #[default]
    Idle,
    Active,
    Complete,
}

impl DryingStatus {
    pub fn label(self) -> &'static str {
        match self {
            DryingStatus::Idle => "Aguardando",
            DryingStatus::Active => "Secando",
            DryingStatus::Complete => "Secagem concluída",
        }
    }
}

impl fmt::Display for DryingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Formata segundos restantes como `HH:MM:SS`.
pub fn format_remaining(seconds: u32) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

// ──────────────────────────────────────────────
// Histórico
// ──────────────────────────────────────────────

/// Registro achatado de um ciclo de polling, uma linha do CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    /// `(temperatura, umidade)` por sensor, `None` se ainda sem leitura.
    pub readings: [Option<(f32, f32)>; 3],
}

impl LogRecord {
    /// Achata as leituras mais recentes de cada sensor.
    pub fn from_readings(
        readings: &BTreeMap<SensorId, SensorReading>,
        timestamp: DateTime<Local>,
    ) -> Self {
        let mut flat = [None; 3];
        for (slot, id) in flat.iter_mut().zip(SensorId::ALL) {
            *slot = readings
                .get(&id)
                .map(|r| (r.temperature(), r.humidity()));
        }
        Self {
            timestamp,
            readings: flat,
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
