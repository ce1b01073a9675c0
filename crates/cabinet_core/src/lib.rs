//! # Cabinet Core
//!
//! Crate compartilhada do armário secador de calçados: protocolo serial do
//! Arduino, estado do armário, loop de polling, histórico CSV, configuração
//! TOML e classificação do tipo de calçado.
//!
//! ## Módulos
//! - [`types`] – Sensores, leituras, status de secagem e registros
//! - [`protocol`] – Parse de frames `sensorN:temp,umid` e comandos de pino
//! - [`state`] – Estado do armário e contagem de secagem
//! - [`serial`] – Link serial com reconexão
//! - [`heater`] – Controle liga/desliga do aquecedor
//! - [`history`] – Histórico CSV só de acréscimo
//! - [`poll`] – Thread de polling, comandos e eventos
//! - [`vision`] – Câmera e classificador externos
//! - [`config`] – Configuração unificada via TOML
//! - [`alerts`] – Thresholds e níveis de alerta

pub mod types;
pub mod protocol;
pub mod state;
pub mod serial;
pub mod heater;
pub mod history;
pub mod poll;
pub mod vision;
pub mod config;
pub mod alerts;

// Re-exports convenientes
pub use types::{DryingStatus, LogRecord, SensorId, SensorReading};
pub use protocol::{DeviceCommand, ParseError, parse_frame};
pub use state::{CabinetState, StateStore};
pub use serial::{SerialConnection, SerialLink};
pub use history::{CsvHistory, RecordSink};
pub use poll::{CabinetEvent, LoopCommand, LoopState, PollHandle, PollLoop};
pub use config::AppConfig;
