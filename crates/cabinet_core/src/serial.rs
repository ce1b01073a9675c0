//! Link serial com o Arduino.
//!
//! [`SerialConnection`] é dono do handle da porta; o handle é liberado no
//! `Drop`, inclusive quando a thread de polling termina por erro. Leituras
//! nunca bloqueiam além do timeout configurado.

use crate::protocol::MAX_FRAME_LEN;
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Intervalo mínimo entre tentativas de reabrir a porta.
const REOPEN_INTERVAL: Duration = Duration::from_secs(2);

/// Tamanho do bloco lido por chamada.
const READ_CHUNK: usize = 128;

/// Erros do link serial.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Falha ao abrir {port} @ {baud} baud: {source}")]
    Connection {
        port: String,
        baud: u32,
        #[source]
        source: serialport::Error,
    },

    #[error("Falha ao escrever na porta: {0}")]
    Write(#[source] std::io::Error),

    #[error("Porta desconectada")]
    Disconnected,
}

/// Contrato do link serial usado pelo loop de polling.
pub trait SerialLink: Send {
    /// Próxima linha completa, ou `None` se nenhuma chegar dentro do timeout.
    fn read_line(&mut self) -> Option<String>;

    /// Envia `text` seguido de `\n`.
    fn write_line(&mut self, text: &str) -> Result<(), LinkError>;
}

// ──────────────────────────────────────────────
// Buffer de linhas
// ──────────────────────────────────────────────

/// Acumula bytes até `\n`, descartando linhas maiores que [`MAX_FRAME_LEN`].
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    overflowed: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona bytes recebidos.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Retira a próxima linha completa, sem `\r\n`. Linhas vazias e linhas
    /// longas demais são descartadas.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                if self.buf.len() > MAX_FRAME_LEN {
                    // Sem '\n' à vista: descarta até o próximo terminador
                    self.buf.clear();
                    self.overflowed = true;
                }
                return None;
            };

            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            if std::mem::take(&mut self.overflowed) {
                debug!("Descartando frame longo demais");
                continue;
            }

            let line = String::from_utf8_lossy(&raw[..pos]);
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            if line.len() > MAX_FRAME_LEN {
                debug!("Descartando frame com {} bytes", line.len());
                continue;
            }
            return Some(line.to_string());
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }
}

// ──────────────────────────────────────────────
// Porta real
// ──────────────────────────────────────────────

/// Conexão com a porta serial física.
pub struct SerialConnection {
    port_name: String,
    baud: u32,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
    lines: LineBuffer,
    last_open_attempt: Instant,
}

impl SerialConnection {
    /// Abre a porta. Falha aqui é fatal para o início do polling.
    pub fn open(port: &str, baud: u32, timeout: Duration) -> Result<Self, LinkError> {
        let handle = open_port(port, baud, timeout)?;
        info!("Porta serial {port} aberta ({baud} baud, timeout {timeout:?})");
        Ok(Self {
            port_name: port.to_string(),
            baud,
            timeout,
            port: Some(handle),
            lines: LineBuffer::new(),
            last_open_attempt: Instant::now(),
        })
    }

    /// Tenta reabrir a porta perdida, no máximo uma vez a cada [`REOPEN_INTERVAL`].
    fn ensure_open(&mut self) -> bool {
        if self.port.is_some() {
            return true;
        }
        if self.last_open_attempt.elapsed() < REOPEN_INTERVAL {
            return false;
        }
        self.last_open_attempt = Instant::now();
        match open_port(&self.port_name, self.baud, self.timeout) {
            Ok(handle) => {
                info!("Porta serial {} reconectada", self.port_name);
                self.port = Some(handle);
                self.lines.clear();
                true
            }
            Err(e) => {
                debug!("Reconexão falhou: {e}");
                false
            }
        }
    }

    fn drop_port(&mut self, reason: &std::io::Error) {
        warn!("Erro na porta {}: {reason}. Fechando handle.", self.port_name);
        self.port = None;
        self.last_open_attempt = Instant::now();
    }
}

fn open_port(port: &str, baud: u32, timeout: Duration) -> Result<Box<dyn SerialPort>, LinkError> {
    serialport::new(port, baud)
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .timeout(timeout)
        .open()
        .map_err(|source| LinkError::Connection {
            port: port.to_string(),
            baud,
            source,
        })
}

/// Tempo que ainda cabe numa leitura; `None` quando o prazo acabou.
fn read_budget(deadline: Instant, now: Instant) -> Option<Duration> {
    let left = deadline.saturating_duration_since(now);
    (!left.is_zero()).then_some(left)
}

impl SerialLink for SerialConnection {
    fn read_line(&mut self) -> Option<String> {
        if let Some(line) = self.lines.next_line() {
            return Some(line);
        }
        if !self.ensure_open() {
            return None;
        }

        let deadline = Instant::now() + self.timeout;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let budget = read_budget(deadline, Instant::now())?;
            let port = self.port.as_mut()?;
            if let Err(e) = port.set_timeout(budget) {
                debug!("Falha ao ajustar timeout: {e}");
            }
            match port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => {
                    self.lines.extend(&chunk[..n]);
                    if let Some(line) = self.lines.next_line() {
                        return Some(line);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                    return None;
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.drop_port(&e);
                    return None;
                }
            }
        }
    }

    fn write_line(&mut self, text: &str) -> Result<(), LinkError> {
        if !self.ensure_open() {
            return Err(LinkError::Disconnected);
        }
        let port = self.port.as_mut().ok_or(LinkError::Disconnected)?;
        if let Err(e) = port.set_timeout(self.timeout) {
            debug!("Falha ao ajustar timeout: {e}");
        }
        let result = port
            .write_all(text.as_bytes())
            .and_then(|_| port.write_all(b"\n"))
            .and_then(|_| port.flush());
        if let Err(e) = result {
            if e.kind() != ErrorKind::TimedOut {
                self.drop_port(&e);
            }
            return Err(LinkError::Write(e));
        }
        debug!("→ Arduino: {text}");
        Ok(())
    }
}

impl Drop for SerialConnection {
    fn drop(&mut self) {
        if self.port.take().is_some() {
            info!("Porta serial {} fechada", self.port_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_complete_lines_only() {
        let mut lines = LineBuffer::new();
        lines.extend(b"sensor1:22");
        assert_eq!(lines.next_line(), None);
        lines.extend(b".5,41.0\r\nsensor2:3");
        assert_eq!(lines.next_line().as_deref(), Some("sensor1:22.5,41.0"));
        assert_eq!(lines.next_line(), None);
        lines.extend(b"5,20\n");
        assert_eq!(lines.next_line().as_deref(), Some("sensor2:35,20"));
    }

    #[test]
    fn skips_blank_lines() {
        let mut lines = LineBuffer::new();
        lines.extend(b"\r\n\n  \nsensor3:20,50\n");
        assert_eq!(lines.next_line().as_deref(), Some("sensor3:20,50"));
        assert_eq!(lines.next_line(), None);
    }

    #[test]
    fn drops_oversized_line_until_newline() {
        let mut lines = LineBuffer::new();
        lines.extend(&vec![b'x'; MAX_FRAME_LEN + 10]);
        assert_eq!(lines.next_line(), None);
        lines.extend(b"yyyy\nsensor1:1,2\n");
        assert_eq!(lines.next_line().as_deref(), Some("sensor1:1,2"));
    }

    #[test]
    fn drops_oversized_line_with_terminator() {
        let mut lines = LineBuffer::new();
        let mut data = vec![b'x'; MAX_FRAME_LEN + 1];
        data.extend_from_slice(b"\nsensor2:1,2\n");
        lines.extend(&data);
        assert_eq!(lines.next_line().as_deref(), Some("sensor2:1,2"));
    }

    #[test]
    fn invalid_utf8_is_lossy() {
        let mut lines = LineBuffer::new();
        lines.extend(b"sen\xffsor\n");
        assert!(lines.next_line().is_some());
    }

    #[test]
    fn each_read_only_gets_what_is_left_of_the_deadline() {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(500);
        assert_eq!(read_budget(deadline, start), Some(Duration::from_millis(500)));
        // Bytes parciais após 400 ms: a próxima leitura espera só 100 ms
        assert_eq!(
            read_budget(deadline, start + Duration::from_millis(400)),
            Some(Duration::from_millis(100))
        );
        assert_eq!(read_budget(deadline, deadline), None);
        assert_eq!(read_budget(deadline, deadline + Duration::from_millis(10)), None);
    }

    #[test]
    fn open_missing_port_fails_with_connection_error() {
        let result = SerialConnection::open(
            "/dev/does-not-exist-cabinet",
            9600,
            Duration::from_millis(50),
        );
        assert!(matches!(result, Err(LinkError::Connection { .. })));
    }
}
