//! Loop de polling: porta serial → parser → estado → histórico/assinantes.
//!
//! O [`PollLoop`] é dono do link serial e do [`StateStore`]. Depois de
//! [`PollLoop::start`] ele roda numa thread própria; o resto do programa só
//! conversa com ele por channels:
//!
//! - comandos ([`LoopCommand`]) entram pelo [`PollHandle`]
//! - eventos ([`CabinetEvent`]) saem pelos receivers de [`PollLoop::subscribe`]
//!
//! Nenhum erro de um ciclo encerra a thread: frames inválidos, falhas de
//! escrita e de histórico são logados e o próximo ciclo segue normalmente.

use crate::config::AppConfig;
use crate::heater::HeaterControl;
use crate::history::RecordSink;
use crate::protocol::{DeviceCommand, ParseError, parse_frame};
use crate::serial::SerialLink;
use crate::state::{CabinetState, StateStore};
use crate::types::{DryingStatus, LogRecord, SensorId, SensorReading};
use crate::vision::ShoeType;
use chrono::Local;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, unbounded};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Comandos aceitos pelo loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopCommand {
    /// Inicia a secagem; `None` usa a contagem atual.
    StartDrying { seconds: Option<u32> },
    /// Interrompe tudo e volta ao estado padrão.
    Reset,
    SetShoeType(Option<ShoeType>),
    SetTargetTemp(Option<f32>),
    StartDehumidify,
    StopDehumidify,
    /// Linha livre para o Arduino (ex: número de pino).
    SendRaw(String),
}

/// Eventos publicados para os assinantes.
#[derive(Debug, Clone, PartialEq)]
pub enum CabinetEvent {
    /// Nova leitura aplicada ao estado.
    Reading(SensorReading),
    StatusChanged { from: DryingStatus, to: DryingStatus },
    Heater(bool),
    /// Cópia do estado ao fim de cada ciclo.
    Snapshot(CabinetState),
    /// A thread terminou e a porta foi liberada.
    Stopped,
}

/// Estado da thread de polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// Erros ao iniciar o loop.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Falha ao criar thread de polling: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Resumo de um ciclo, usado em logs e testes.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub line_received: bool,
    pub reading: Option<SensorReading>,
    pub parse_error: Option<ParseError>,
    pub sink_failures: usize,
    pub remaining_seconds: u32,
    pub status: DryingStatus,
}

pub struct PollLoop {
    link: Box<dyn SerialLink>,
    store: StateStore,
    heater: HeaterControl,
    sinks: Vec<Box<dyn RecordSink>>,
    subscribers: Vec<Sender<CabinetEvent>>,
    drying_sensor: SensorId,
    dehumidify_pins: Vec<u8>,
    interval: Duration,
    event_buffer: usize,
}

impl PollLoop {
    pub fn new(link: Box<dyn SerialLink>, store: StateStore, config: &AppConfig) -> Self {
        let drying = &config.drying;
        Self {
            link,
            store,
            heater: HeaterControl::new(
                drying.heater_pin,
                drying.target_temp_c,
                Duration::from_secs(drying.recheck_secs),
            ),
            sinks: Vec::new(),
            subscribers: Vec::new(),
            drying_sensor: drying.sensor,
            dehumidify_pins: config.dehumidify.pins.clone(),
            interval: config.poll.interval(),
            event_buffer: config.poll.event_buffer.max(1),
        }
    }

    /// Adiciona um destino de histórico.
    pub fn with_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Registra um assinante. Eventos são descartados quando o channel
    /// dele está cheio, nunca bloqueando o loop.
    pub fn subscribe(&mut self) -> Receiver<CabinetEvent> {
        let (tx, rx) = bounded(self.event_buffer);
        self.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> &CabinetState {
        self.store.state()
    }

    pub fn heater_on(&self) -> bool {
        self.heater.is_on()
    }

    /// Executa um ciclo completo: leitura, parse, estado, contagem,
    /// histórico e notificação.
    pub fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        if let Some(line) = self.link.read_line() {
            report.line_received = true;
            match parse_frame(&line) {
                Ok(reading) => {
                    let changes = self.store.apply_reading(reading);
                    debug!(
                        "← {} {:.1}°C {:.1}% (alterado: {})",
                        reading.sensor(),
                        reading.temperature(),
                        reading.humidity(),
                        changes.any()
                    );
                    report.reading = Some(reading);
                    self.notify(CabinetEvent::Reading(reading));
                }
                Err(e) => {
                    debug!("Frame inválido {line:?}: {e}");
                    report.parse_error = Some(e);
                }
            }
        }

        let before = self.store.status();
        if before == DryingStatus::Active {
            self.regulate_heater();
            let (_, after) = self.store.tick();
            if after != before {
                self.on_status_change(before, after);
            }
        } else if self.heater.is_on() {
            // "stop" anterior não chegou ao Arduino
            self.switch_heater_off();
        }

        let record = LogRecord::from_readings(&self.store.state().readings, Local::now());
        for sink in &mut self.sinks {
            if let Err(e) = sink.append(&record) {
                warn!("Histórico indisponível neste ciclo: {e}");
                report.sink_failures += 1;
            }
        }

        let snapshot = self.store.snapshot();
        report.remaining_seconds = snapshot.remaining_seconds;
        report.status = snapshot.status;
        self.notify(CabinetEvent::Snapshot(snapshot));

        report
    }

    /// Aplica um comando vindo da UI.
    pub fn handle_command(&mut self, command: LoopCommand) {
        debug!("Comando: {command:?}");
        match command {
            LoopCommand::StartDrying { seconds } => {
                let before = self.store.status();
                match self.store.start_drying(seconds) {
                    Ok(()) => {
                        info!(
                            "Secagem iniciada ({} s)",
                            self.store.state().remaining_seconds
                        );
                        self.on_status_change(before, DryingStatus::Active);
                    }
                    Err(e) => warn!("{e}"),
                }
            }
            LoopCommand::Reset => {
                self.switch_heater_off();
                let before = self.store.status();
                let state = self.store.reset();
                info!("Estado reiniciado");
                if state.status != before {
                    self.notify(CabinetEvent::StatusChanged {
                        from: before,
                        to: state.status,
                    });
                }
                self.notify(CabinetEvent::Snapshot(state));
            }
            LoopCommand::SetShoeType(shoe_type) => {
                self.store.set_shoe_type(shoe_type);
            }
            LoopCommand::SetTargetTemp(target) => {
                self.heater.set_target(target);
                match self.heater.target() {
                    Some(t) => info!("Alvo do aquecedor: {t:.1}°C"),
                    None => info!("Aquecedor automático desligado"),
                }
                if target.is_none() {
                    self.switch_heater_off();
                }
            }
            LoopCommand::StartDehumidify => {
                info!("Desumidificação iniciada");
                for pin in self.dehumidify_pins.clone() {
                    self.send(&DeviceCommand::PinOn(pin));
                }
            }
            LoopCommand::StopDehumidify => {
                info!("Desumidificação parada");
                if self.send(&DeviceCommand::AllOff) && self.heater.force_off().is_some() {
                    // "0" desliga todos os pinos, inclusive o aquecedor
                    self.notify(CabinetEvent::Heater(false));
                }
            }
            LoopCommand::SendRaw(text) => {
                self.send(&DeviceCommand::Raw(text));
            }
        }
    }

    /// STOPPED → RUNNING: move o loop para uma thread dedicada.
    pub fn start(self) -> Result<PollHandle, PollError> {
        let (cmd_tx, cmd_rx) = unbounded::<LoopCommand>();
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread = std::thread::Builder::new()
            .name("serial-poll".into())
            .spawn(move || self.run(&cmd_rx, &stop_rx))
            .map_err(PollError::Spawn)?;

        Ok(PollHandle {
            commands: cmd_tx,
            stop_tx,
            thread: Some(thread),
        })
    }

    fn run(mut self, commands: &Receiver<LoopCommand>, stop: &Receiver<()>) {
        info!("Loop de polling iniciado (intervalo {:?})", self.interval);

        'cycles: loop {
            let cycle_start = Instant::now();
            let report = self.run_cycle();
            if report.parse_error.is_some() || report.sink_failures > 0 {
                debug!("Ciclo com falhas: {report:?}");
            }

            // Espera o restante do intervalo atendendo comandos
            let deadline = cycle_start + self.interval;
            loop {
                let timeout = deadline.saturating_duration_since(Instant::now());
                select! {
                    recv(stop) -> _ => break 'cycles,
                    recv(commands) -> msg => match msg {
                        Ok(command) => self.handle_command(command),
                        Err(_) => break 'cycles,
                    },
                    default(timeout) => break,
                }
                if Instant::now() >= deadline {
                    break;
                }
            }
        }

        // Comandos enviados antes do stop ainda são aplicados
        for command in commands.try_iter() {
            self.handle_command(command);
        }
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.switch_heater_off();
        self.notify(CabinetEvent::Stopped);
        info!("Loop de polling encerrado");
    }

    fn regulate_heater(&mut self) {
        let Some(reading) = self.store.state().reading(self.drying_sensor).copied() else {
            return;
        };
        if let Some(command) = self.heater.evaluate(reading.temperature(), Instant::now()) {
            if self.send(&command) {
                self.notify(CabinetEvent::Heater(self.heater.is_on()));
            } else {
                self.heater.rollback(&command);
            }
        }
    }

    fn switch_heater_off(&mut self) {
        if let Some(command) = self.heater.force_off() {
            if self.send(&command) {
                self.notify(CabinetEvent::Heater(false));
            } else {
                self.heater.rollback(&command);
            }
        }
    }

    fn on_status_change(&mut self, from: DryingStatus, to: DryingStatus) {
        if to == DryingStatus::Complete {
            info!("Secagem concluída");
            self.switch_heater_off();
        }
        self.notify(CabinetEvent::StatusChanged { from, to });
    }

    /// Escreve um comando no Arduino. Falhas são logadas e o comando é
    /// abandonado.
    fn send(&mut self, command: &DeviceCommand) -> bool {
        match self.link.write_line(&command.encode()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Comando {command:?} não enviado: {e}");
                false
            }
        }
    }

    fn notify(&mut self, event: CabinetEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Assinante lento, descartando evento");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

/// Controle do loop em execução.
///
/// `stop()` é chamado no `Drop`; a thread termina após a leitura em curso
/// (limitada pelo timeout da porta) e libera o link.
pub struct PollHandle {
    commands: Sender<LoopCommand>,
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Envia um comando; `false` se o loop já terminou.
    pub fn send(&self, command: LoopCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Sender clonável para outras threads.
    pub fn commands(&self) -> Sender<LoopCommand> {
        self.commands.clone()
    }

    pub fn state(&self) -> LoopState {
        match &self.thread {
            Some(thread) if !thread.is_finished() => LoopState::Running,
            _ => LoopState::Stopped,
        }
    }

    /// RUNNING → STOPPED. Bloqueia até a thread liberar a porta.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.stop_tx.try_send(());
        if thread.join().is_err() {
            error!("Thread de polling terminou com panic");
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryError;
    use crate::serial::LinkError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Link serial roteirizado.
    #[derive(Default)]
    struct ScriptedLink {
        lines: Arc<Mutex<VecDeque<String>>>,
        written: Arc<Mutex<Vec<String>>>,
        fail_writes: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    impl ScriptedLink {
        fn with_lines(lines: &[&str]) -> Self {
            let link = Self::default();
            link.lines
                .lock()
                .unwrap()
                .extend(lines.iter().map(|l| l.to_string()));
            link
        }

        fn remote(&self) -> LinkSide {
            LinkSide {
                lines: self.lines.clone(),
                written: self.written.clone(),
                fail_writes: self.fail_writes.clone(),
                dropped: self.dropped.clone(),
            }
        }
    }

    impl SerialLink for ScriptedLink {
        fn read_line(&mut self) -> Option<String> {
            self.lines.lock().unwrap().pop_front()
        }

        fn write_line(&mut self, text: &str) -> Result<(), LinkError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(LinkError::Write(std::io::Error::other("cabo solto")));
            }
            self.written.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    impl Drop for ScriptedLink {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    struct LinkSide {
        lines: Arc<Mutex<VecDeque<String>>>,
        written: Arc<Mutex<Vec<String>>>,
        fail_writes: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    impl LinkSide {
        fn push(&self, line: &str) {
            self.lines.lock().unwrap().push_back(line.to_string());
        }

        fn written(&self) -> Vec<String> {
            self.written.lock().unwrap().clone()
        }
    }

    struct MemorySink(Arc<Mutex<Vec<LogRecord>>>);

    impl RecordSink for MemorySink {
        fn append(&mut self, record: &LogRecord) -> Result<(), HistoryError> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct BrokenSink;

    impl RecordSink for BrokenSink {
        fn append(&mut self, _record: &LogRecord) -> Result<(), HistoryError> {
            Err(HistoryError::Io(std::io::Error::other("disco cheio")))
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.poll.interval_ms = 10;
        config.drying.duration_secs = 3;
        config
    }

    fn make_loop(link: ScriptedLink) -> PollLoop {
        let config = test_config();
        PollLoop::new(
            Box::new(link),
            StateStore::new(config.drying.duration_secs),
            &config,
        )
    }

    fn drain(rx: &Receiver<CabinetEvent>) -> Vec<CabinetEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn malformed_line_does_not_block_next_valid_line() {
        let mut poll = make_loop(ScriptedLink::with_lines(&["garbage", "sensor1:22.5,41.0"]));
        let rx = poll.subscribe();

        let first = poll.run_cycle();
        assert!(first.line_received);
        assert!(first.parse_error.is_some());

        let second = poll.run_cycle();
        assert!(second.reading.is_some());

        let updates = drain(&rx)
            .into_iter()
            .filter(|e| matches!(e, CabinetEvent::Reading(_)))
            .count();
        assert_eq!(updates, 1);
        let s1 = poll.state().reading(SensorId::Sensor1).unwrap();
        assert_eq!((s1.temperature(), s1.humidity()), (22.5, 41.0));
    }

    #[test]
    fn every_cycle_persists_and_notifies() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let mut poll = make_loop(ScriptedLink::with_lines(&["sensor2:35.0,20.0"]))
            .with_sink(Box::new(MemorySink(records.clone())));
        let rx = poll.subscribe();

        poll.run_cycle();
        poll.run_cycle(); // sem linha

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].readings[1], Some((35.0, 20.0)));

        let snapshots = drain(&rx)
            .into_iter()
            .filter(|e| matches!(e, CabinetEvent::Snapshot(_)))
            .count();
        assert_eq!(snapshots, 2);
    }

    #[test]
    fn sink_failure_is_not_fatal() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let mut poll = make_loop(ScriptedLink::with_lines(&["sensor1:20,50"]))
            .with_sink(Box::new(BrokenSink))
            .with_sink(Box::new(MemorySink(records.clone())));
        let rx = poll.subscribe();

        let report = poll.run_cycle();
        assert_eq!(report.sink_failures, 1);
        assert_eq!(records.lock().unwrap().len(), 1);
        assert!(
            drain(&rx)
                .iter()
                .any(|e| matches!(e, CabinetEvent::Snapshot(s) if s.readings.len() == 1))
        );
    }

    #[test]
    fn countdown_advances_only_while_drying() {
        let mut poll = make_loop(ScriptedLink::default());
        let rx = poll.subscribe();

        assert_eq!(poll.run_cycle().remaining_seconds, 3);

        poll.handle_command(LoopCommand::StartDrying { seconds: None });
        let remaining: Vec<u32> = (0..5).map(|_| poll.run_cycle().remaining_seconds).collect();
        assert_eq!(remaining, vec![2, 1, 0, 0, 0]);
        assert_eq!(poll.state().status, DryingStatus::Complete);

        let transitions: Vec<_> = drain(&rx)
            .into_iter()
            .filter_map(|e| match e {
                CabinetEvent::StatusChanged { from, to } => Some((from, to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                (DryingStatus::Idle, DryingStatus::Active),
                (DryingStatus::Active, DryingStatus::Complete),
            ]
        );
    }

    #[test]
    fn heater_follows_dryer_temperature() {
        let link = ScriptedLink::with_lines(&["sensor2:30.0,20.0"]);
        let remote = link.remote();
        let mut poll = make_loop(link);
        poll.handle_command(LoopCommand::StartDrying { seconds: Some(100) });

        poll.run_cycle();
        assert!(poll.heater_on());
        assert_eq!(remote.written(), vec!["8"]);

        remote.push("sensor2:45.0,15.0");
        poll.run_cycle();
        assert!(!poll.heater_on());
        assert_eq!(remote.written(), vec!["8", "stop 8"]);
    }

    #[test]
    fn heater_is_switched_off_when_drying_completes() {
        let link = ScriptedLink::with_lines(&["sensor2:30.0,20.0"]);
        let remote = link.remote();
        let mut poll = make_loop(link);
        poll.handle_command(LoopCommand::StartDrying { seconds: Some(1) });

        poll.run_cycle();
        assert_eq!(poll.state().status, DryingStatus::Complete);
        assert!(!poll.heater_on());
        assert_eq!(remote.written(), vec!["8", "stop 8"]);
    }

    #[test]
    fn failed_heater_write_is_retried_next_cycle() {
        let link = ScriptedLink::with_lines(&["sensor2:30.0,20.0"]);
        let remote = link.remote();
        let mut poll = make_loop(link);
        poll.handle_command(LoopCommand::StartDrying { seconds: Some(100) });

        remote.fail_writes.store(true, Ordering::SeqCst);
        poll.run_cycle();
        assert!(!poll.heater_on());

        remote.fail_writes.store(false, Ordering::SeqCst);
        poll.run_cycle();
        assert!(poll.heater_on());
        assert_eq!(remote.written(), vec!["8"]);
    }

    #[test]
    fn failed_switch_off_is_retried_after_completion() {
        let link = ScriptedLink::with_lines(&["sensor2:30.0,20.0"]);
        let remote = link.remote();
        let mut poll = make_loop(link);
        poll.handle_command(LoopCommand::StartDrying { seconds: Some(2) });

        poll.run_cycle();
        assert_eq!(remote.written(), vec!["8"]);

        remote.fail_writes.store(true, Ordering::SeqCst);
        poll.run_cycle();
        assert_eq!(poll.state().status, DryingStatus::Complete);
        assert!(poll.heater_on());

        remote.fail_writes.store(false, Ordering::SeqCst);
        for _ in 0..3 {
            poll.run_cycle();
        }
        assert!(!poll.heater_on());
        assert_eq!(remote.written(), vec!["8", "stop 8"]);
    }

    #[test]
    fn failed_switch_off_on_reset_is_retried() {
        let link = ScriptedLink::with_lines(&["sensor2:30.0,20.0"]);
        let remote = link.remote();
        let mut poll = make_loop(link);
        poll.handle_command(LoopCommand::StartDrying { seconds: Some(100) });
        poll.run_cycle();

        remote.fail_writes.store(true, Ordering::SeqCst);
        poll.handle_command(LoopCommand::Reset);
        assert!(poll.heater_on());

        remote.fail_writes.store(false, Ordering::SeqCst);
        poll.run_cycle();
        assert!(!poll.heater_on());
        assert_eq!(remote.written(), vec!["8", "stop 8"]);
    }

    #[test]
    fn reset_returns_to_defaults() {
        let mut poll = make_loop(ScriptedLink::with_lines(&["sensor1:20,50"]));
        poll.handle_command(LoopCommand::StartDrying { seconds: Some(10) });
        poll.handle_command(LoopCommand::SetShoeType(Some(ShoeType::Boots)));
        poll.run_cycle();

        let rx = poll.subscribe();
        poll.handle_command(LoopCommand::Reset);
        let state = poll.state();
        assert_eq!(state.status, DryingStatus::Idle);
        assert_eq!(state.remaining_seconds, 3);
        assert_eq!(state.shoe_type, None);
        assert!(drain(&rx).contains(&CabinetEvent::StatusChanged {
            from: DryingStatus::Active,
            to: DryingStatus::Idle,
        }));
    }

    #[test]
    fn dehumidify_commands_write_pins() {
        let link = ScriptedLink::default();
        let remote = link.remote();
        let mut poll = make_loop(link);

        poll.handle_command(LoopCommand::StartDehumidify);
        poll.handle_command(LoopCommand::StopDehumidify);
        poll.handle_command(LoopCommand::SendRaw("7".into()));
        assert_eq!(remote.written(), vec!["3", "12", "13", "0", "7"]);
    }

    #[test]
    fn slow_or_gone_subscribers_never_block() {
        let mut config = test_config();
        config.poll.event_buffer = 1;
        let mut poll = PollLoop::new(Box::new(ScriptedLink::default()), StateStore::new(3), &config);
        let slow = poll.subscribe();
        let gone = poll.subscribe();
        drop(gone);

        for _ in 0..5 {
            poll.run_cycle();
        }
        assert_eq!(slow.try_iter().count(), 1);
        assert_eq!(poll.subscribers.len(), 1);
    }

    #[test]
    fn start_and_stop_release_the_link() {
        let link = ScriptedLink::with_lines(&["sensor1:22.5,41.0"]);
        let remote = link.remote();
        let mut poll = make_loop(link);
        let rx = poll.subscribe();

        let mut handle = poll.start().unwrap();
        assert_eq!(handle.state(), LoopState::Running);

        let reading = rx
            .iter()
            .find_map(|e| match e {
                CabinetEvent::Reading(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(reading.sensor(), SensorId::Sensor1);

        assert!(handle.send(LoopCommand::SendRaw("13".into())));
        handle.stop();
        assert_eq!(handle.state(), LoopState::Stopped);
        assert!(remote.dropped.load(Ordering::SeqCst));
        assert!(remote.written().contains(&"13".to_string()));
        assert!(rx.try_iter().any(|e| e == CabinetEvent::Stopped));

        // stop() é idempotente e comandos após o fim falham
        handle.stop();
        assert!(!handle.send(LoopCommand::Reset));
    }

    #[test]
    fn dropping_handle_stops_thread() {
        let link = ScriptedLink::default();
        let remote = link.remote();
        let handle = make_loop(link).start().unwrap();
        drop(handle);
        assert!(remote.dropped.load(Ordering::SeqCst));
    }

    /// Link cuja leitura bloqueia pelo timeout inteiro, como uma porta sem dados.
    struct SlowLink {
        read_time: Duration,
        reading: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    impl SerialLink for SlowLink {
        fn read_line(&mut self) -> Option<String> {
            self.reading.store(true, Ordering::SeqCst);
            std::thread::sleep(self.read_time);
            self.reading.store(false, Ordering::SeqCst);
            None
        }

        fn write_line(&mut self, _text: &str) -> Result<(), LinkError> {
            Ok(())
        }
    }

    impl Drop for SlowLink {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn stop_during_read_returns_within_timeout_and_releases_link() {
        let read_time = Duration::from_millis(200);
        let reading = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicBool::new(false));
        let link = SlowLink {
            read_time,
            reading: reading.clone(),
            dropped: dropped.clone(),
        };
        let config = test_config();
        let interval = config.poll.interval();
        let mut handle = PollLoop::new(Box::new(link), StateStore::new(3), &config)
            .start()
            .unwrap();

        // Espera uma leitura em curso
        let wait_start = Instant::now();
        while !reading.load(Ordering::SeqCst) {
            assert!(wait_start.elapsed() < Duration::from_secs(2));
            std::thread::sleep(Duration::from_millis(1));
        }

        let stop_start = Instant::now();
        handle.stop();
        let elapsed = stop_start.elapsed();

        assert!(
            elapsed < interval + read_time + Duration::from_millis(300),
            "stop levou {elapsed:?}"
        );
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(handle.state(), LoopState::Stopped);
    }
}
