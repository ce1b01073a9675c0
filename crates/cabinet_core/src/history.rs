//! Histórico em CSV das leituras, uma linha por ciclo de polling.
//!
//! O arquivo é só de acréscimo: o cabeçalho é escrito quando o arquivo está
//! vazio e linhas existentes nunca são reescritas.

use crate::types::{LogRecord, SensorId};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Formato do timestamp na primeira coluna.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Erros do histórico.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Falha ao abrir {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Falha ao gravar histórico: {0}")]
    Io(#[from] std::io::Error),
}

/// Destino dos registros de cada ciclo.
pub trait RecordSink: Send {
    fn append(&mut self, record: &LogRecord) -> Result<(), HistoryError>;
}

/// Cabeçalho fixo do CSV.
pub fn csv_header() -> String {
    let mut header = String::from("Timestamp");
    for id in SensorId::ALL {
        let prefix = id.column_prefix();
        header.push_str(&format!(",{prefix}_Temperature,{prefix}_Humidity"));
    }
    header
}

/// Linha CSV de um registro. Sensores sem leitura ficam com células vazias.
pub fn csv_row(record: &LogRecord) -> String {
    let mut row = record.timestamp.format(TIMESTAMP_FORMAT).to_string();
    for reading in &record.readings {
        match reading {
            Some((temp, humid)) => row.push_str(&format!(",{temp},{humid}")),
            None => row.push_str(",,"),
        }
    }
    row
}

/// Histórico CSV em disco.
pub struct CsvHistory {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvHistory {
    /// Abre (ou cria) o arquivo em modo append.
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| HistoryError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| HistoryError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let is_empty = file.metadata().map(|m| m.len() == 0)?;

        let mut writer = BufWriter::new(file);
        if is_empty {
            writeln!(writer, "{}", csv_header())?;
            writer.flush()?;
            info!("Histórico criado em {}", path.display());
        } else {
            info!("Histórico continuando em {}", path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvHistory {
    fn append(&mut self, record: &LogRecord) -> Result<(), HistoryError> {
        writeln!(self.writer, "{}", csv_row(record))?;
        self.writer.flush()?;
        Ok(())
    }
}
