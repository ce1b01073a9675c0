//! Protocolo de texto da porta serial.
//!
//! Cada leitura chega como uma linha terminada em `\n`:
//!
//! ```text
//! <sensor>:<temperatura>,<umidade>
//! sensor1:22.5,41.0
//! ```
//!
//! - `sensor` é um dos ids de [`SensorId`] (`sensor1`..`sensor3`)
//! - temperatura em °C, umidade em % (0–100)
//! - espaços ao redor dos campos e `\r` final são tolerados
//!
//! Apenas este formato é aceito. Payloads JSON com vários sensores na mesma
//! linha são rejeitados como frame inválido.
//!
//! No sentido contrário o Arduino recebe comandos de pino ([`DeviceCommand`]).

use crate::types::{SensorId, SensorReading, UnknownSensor};

/// Tamanho máximo de um frame (bytes, sem o `\n`).
pub const MAX_FRAME_LEN: usize = 256;

/// Separador entre id do sensor e valores.
const ID_SEPARATOR: char = ':';

/// Separador entre temperatura e umidade.
const FIELD_SEPARATOR: char = ',';

/// Erros do protocolo.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Frame vazio")]
    Empty,

    #[error("Frame muito longo ({0} bytes, máximo {MAX_FRAME_LEN})")]
    TooLong(usize),

    #[error("Separador '{ID_SEPARATOR}' ausente em {0:?}")]
    MissingSeparator(String),

    #[error(transparent)]
    UnknownSensor(#[from] UnknownSensor),

    #[error("Esperados 2 campos (temperatura, umidade), recebidos {0}")]
    FieldCount(usize),

    #[error("Valor inválido para {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Umidade fora da faixa: {0} (0–100)")]
    HumidityOutOfRange(f32),
}

/// Decodifica uma linha recebida do Arduino em [`SensorReading`].
pub fn parse_frame(text: &str) -> Result<SensorReading, ParseError> {
    let line = text.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }
    if line.len() > MAX_FRAME_LEN {
        return Err(ParseError::TooLong(line.len()));
    }

    let (id, values) = line
        .split_once(ID_SEPARATOR)
        .ok_or_else(|| ParseError::MissingSeparator(line.to_string()))?;
    let sensor: SensorId = id.parse()?;

    let fields: Vec<&str> = values.split(FIELD_SEPARATOR).map(str::trim).collect();
    if fields.len() != 2 {
        return Err(ParseError::FieldCount(fields.len()));
    }

    let temperature = parse_number("temperatura", fields[0])?;
    let humidity = parse_number("umidade", fields[1])?;
    if !(0.0..=100.0).contains(&humidity) {
        return Err(ParseError::HumidityOutOfRange(humidity));
    }

    Ok(SensorReading::new(sensor, temperature, humidity))
}

fn parse_number(field: &'static str, raw: &str) -> Result<f32, ParseError> {
    raw.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

/// Codifica uma leitura no formato do frame (sem `\n`).
///
/// Usado pelo simulador e pelos testes; `parse_frame(&format_frame(r)) == r`.
pub fn format_frame(reading: &SensorReading) -> String {
    format!(
        "{}{ID_SEPARATOR}{}{FIELD_SEPARATOR}{}",
        reading.sensor(),
        reading.temperature(),
        reading.humidity()
    )
}

// ──────────────────────────────────────────────
// Comandos para o Arduino
// ──────────────────────────────────────────────

/// Comando enviado ao Arduino, uma linha por comando.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Liga um pino (`"8"`).
    PinOn(u8),
    /// Desliga pinos específicos (`"stop 8"`).
    PinsOff(Vec<u8>),
    /// Desliga tudo (`"0"`).
    AllOff,
    /// Linha livre digitada pelo usuário.
    Raw(String),
}

impl DeviceCommand {
    /// Texto da linha enviada (sem `\n`).
    pub fn encode(&self) -> String {
        match self {
            DeviceCommand::PinOn(pin) => pin.to_string(),
            DeviceCommand::PinsOff(pins) => {
                let list: Vec<String> = pins.iter().map(u8::to_string).collect();
                format!("stop {}", list.join(" "))
            }
            DeviceCommand::AllOff => "0".into(),
            DeviceCommand::Raw(text) => text.trim().to_string(),
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
